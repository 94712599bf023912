//! Library facade: wires persistence, the catalog coordinator, the worker pool
//! and the import and thumbnail pipelines together.
//!
//! Catalog reads and mutations go through the coordination thread. Edits that
//! must be persisted follow request, then persist, then mutate the catalog and
//! notify observers. A persistence failure leaves the catalog untouched.

use log::{debug, info, warn};
use rayon::ThreadPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogObserver, Observers};
use crate::config::LibraryConfig;
use crate::coordinator::{Coordinator, CoordinatorHandle};
use crate::db::{MediaDatabase, MediaRepository};
use crate::error::{ImportBatchError, LibraryError, StoreError};
use crate::import::{ImportHandle, Importer};
use crate::models::{ImportOutcome, ImportProgress, MediaId, MediaRecord, SortOrder};
use crate::thumbnail::ThumbnailPipeline;

/// An opened media library
pub struct MediaLibrary {
    config: Arc<LibraryConfig>,
    repository: Arc<dyn MediaRepository>,
    thumbnails: ThumbnailPipeline,
    importer: Importer,
    observers: Observers,
    handle: CoordinatorHandle,
    coordinator: Coordinator,
}

impl MediaLibrary {
    /// Open (or create) the library described by `config`, backed by SQLite
    pub fn open(config: LibraryConfig) -> Result<Self, LibraryError> {
        std::fs::create_dir_all(&config.library_dir)?;
        let db = MediaDatabase::open(&config.effective_db_path())?;
        Self::with_repository(config, Arc::new(db))
    }

    /// Open a library over any repository implementation
    pub fn with_repository(
        config: LibraryConfig,
        repository: Arc<dyn MediaRepository>,
    ) -> Result<Self, LibraryError> {
        let config = Arc::new(config);
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.effective_threads())
                .thread_name(|i| format!("media-worker-{}", i))
                .build()?,
        );

        let mut catalog = Catalog::new(config.default_sort);
        catalog.load(repository.fetch_all()?);
        catalog.resort();
        let observers = catalog.observers().clone();
        info!(
            "Opened library {:?} with {} records",
            config.library_dir,
            catalog.len()
        );

        let coordinator = Coordinator::spawn(catalog)?;
        let handle = coordinator.handle();
        let thumbnails = ThumbnailPipeline::new(&config, Arc::clone(&pool));
        let importer = Importer::new(
            Arc::clone(&config),
            Arc::clone(&repository),
            thumbnails.clone(),
            pool,
            handle.clone(),
        );

        Ok(Self {
            config,
            repository,
            thumbnails,
            importer,
            observers,
            handle,
            coordinator,
        })
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Handle for queueing work onto the catalog's coordination thread
    pub fn coordinator(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    pub fn thumbnails(&self) -> &ThumbnailPipeline {
        &self.thumbnails
    }

    /// Register an observer. Returns false if it was already registered.
    pub fn subscribe(&self, observer: Arc<dyn CatalogObserver>) -> bool {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, observer: &Arc<dyn CatalogObserver>) -> bool {
        self.observers.unsubscribe(observer)
    }

    fn call<F, R>(&self, task: F) -> Result<R, LibraryError>
    where
        F: FnOnce(&mut Catalog) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.call(task).ok_or(LibraryError::CoordinatorClosed)
    }

    /// Copy of the catalog contents in display order
    pub fn snapshot(&self) -> Result<Vec<MediaRecord>, LibraryError> {
        self.call(|catalog| catalog.records().to_vec())
    }

    pub fn find(&self, id: MediaId) -> Result<Option<MediaRecord>, LibraryError> {
        self.call(move |catalog| catalog.find(&id).cloned())
    }

    pub fn selected(&self) -> Result<Option<MediaRecord>, LibraryError> {
        self.call(|catalog| catalog.selected().cloned())
    }

    pub fn sort_order(&self) -> Result<SortOrder, LibraryError> {
        self.call(|catalog| catalog.sort_order())
    }

    /// Move the cursor. Unknown ids are ignored and return false.
    pub fn select(&self, id: Option<MediaId>) -> Result<bool, LibraryError> {
        self.call(move |catalog| catalog.select(id))
    }

    pub fn select_next(&self) -> Result<bool, LibraryError> {
        self.call(|catalog| catalog.select_next())
    }

    pub fn select_previous(&self) -> Result<bool, LibraryError> {
        self.call(|catalog| catalog.select_previous())
    }

    pub fn sort(&self, order: SortOrder) -> Result<(), LibraryError> {
        self.call(move |catalog| catalog.sort(order))
    }

    /// Persist `edit` applied to the record with `id`, then publish it.
    /// Returns `None` if the id is not in the catalog.
    fn edit<F>(&self, id: MediaId, edit: F) -> Result<Option<MediaRecord>, LibraryError>
    where
        F: FnOnce(MediaRecord) -> MediaRecord + Send + 'static,
    {
        let repository = Arc::clone(&self.repository);
        let result = self.call(move |catalog| -> Result<Option<MediaRecord>, StoreError> {
            let Some(current) = catalog.find(&id).cloned() else {
                return Ok(None);
            };
            let stored = repository.update(&edit(current))?;
            catalog.update(stored.clone());
            Ok(Some(stored))
        })?;
        Ok(result?)
    }

    pub fn set_favorite(
        &self,
        id: MediaId,
        is_favorite: bool,
    ) -> Result<Option<MediaRecord>, LibraryError> {
        self.edit(id, move |record| record.with_favorite(is_favorite))
    }

    pub fn toggle_favorite(&self, id: MediaId) -> Result<Option<MediaRecord>, LibraryError> {
        self.edit(id, |record| {
            let is_favorite = !record.is_favorite;
            record.with_favorite(is_favorite)
        })
    }

    pub fn rename(
        &self,
        id: MediaId,
        name: impl Into<String>,
    ) -> Result<Option<MediaRecord>, LibraryError> {
        let name = name.into();
        self.edit(id, move |record| record.with_name(name))
    }

    /// Delete a record from persistence and the catalog, then remove its
    /// managed files. File removal is best effort.
    pub fn delete(&self, id: MediaId) -> Result<Option<MediaRecord>, LibraryError> {
        let repository = Arc::clone(&self.repository);
        let removed = self.call(move |catalog| -> Result<Option<MediaRecord>, StoreError> {
            let Some(record) = catalog.find(&id).cloned() else {
                return Ok(None);
            };
            if !repository.delete(&record)? {
                debug!("Media {} was already gone from storage", id);
            }
            Ok(catalog.delete(&id))
        })??;

        if let Some(record) = &removed {
            remove_managed_file(&record.file_path);
            remove_managed_file(&record.thumbnail.file_path);
            info!("Deleted {} ({})", record.name, record.id);
        }
        Ok(removed)
    }

    /// Reload the catalog from persistence. Returns the record count.
    pub fn refresh(&self) -> Result<usize, LibraryError> {
        let repository = Arc::clone(&self.repository);
        let count = self.call(move |catalog| -> Result<usize, StoreError> {
            catalog.load(repository.fetch_all()?);
            catalog.resort();
            Ok(catalog.len())
        })??;
        Ok(count)
    }

    /// Import files in the background. Successful records are inserted at the
    /// front of the catalog before `on_complete` runs.
    pub fn import<P, C>(&self, paths: Vec<PathBuf>, on_progress: P, on_complete: C) -> ImportHandle
    where
        P: FnMut(&mut Catalog, &ImportProgress) + Send + 'static,
        C: FnOnce(&mut Catalog, Result<ImportOutcome, ImportBatchError>) + Send + 'static,
    {
        self.importer.import(paths, on_progress, move |catalog, result| {
            if let Ok(outcome) = &result {
                if !outcome.records.is_empty() {
                    catalog.insert(outcome.records.clone(), true);
                }
            }
            on_complete(catalog, result);
        })
    }

    /// Regenerate the preview of a record on the worker pool.
    ///
    /// Returns false if the id is not in the catalog. Otherwise `callback` runs
    /// once on the coordination thread after the catalog has been updated.
    pub fn refresh_thumbnail<F>(&self, id: MediaId, callback: F) -> Result<bool, LibraryError>
    where
        F: FnOnce(&mut Catalog, Result<MediaRecord, LibraryError>) + Send + 'static,
    {
        let Some(record) = self.find(id)? else {
            return Ok(false);
        };

        let repository = Arc::clone(&self.repository);
        let handle = self.handle.clone();
        let target = record.thumbnail.file_path;
        self.thumbnails.request(record.file_path, record.kind, move |preview| {
            let written = preview.and_then(|preview| preview.write_to(&target));

            // Only the thumbnail is replaced; the rest comes from the catalog
            // as it is when the preview lands.
            let queued = handle.dispatch(move |catalog| {
                let result = written.map_err(LibraryError::from).and_then(|thumbnail| {
                    let Some(current) = catalog.find(&id).cloned() else {
                        remove_managed_file(&thumbnail.file_path);
                        return Err(StoreError::NotFound(id).into());
                    };
                    let stored = repository.update(&MediaRecord {
                        thumbnail,
                        ..current
                    })?;
                    catalog.update(stored.clone());
                    Ok(stored)
                });
                callback(catalog, result);
            });
            if !queued {
                warn!("Catalog coordinator is gone; dropping thumbnail refresh for {}", id);
            }
        });
        Ok(true)
    }

    /// Stop the coordination thread after queued work and return the catalog
    pub fn shutdown(self) -> Option<Catalog> {
        self.coordinator.shutdown()
    }
}

fn remove_managed_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {:?}", path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove {:?}: {}", path, err),
    }
}

impl std::fmt::Debug for MediaLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaLibrary")
            .field("library_dir", &self.config.library_dir)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{Event, Recorder};
    use crate::models::{fixtures, MediaKind};
    use crossbeam_channel::unbounded;
    use image::{Rgb, RgbImage};
    use std::time::Duration;

    struct Fixture {
        dir: tempfile::TempDir,
        library: MediaLibrary,
    }

    fn config(dir: &Path, threads: usize) -> LibraryConfig {
        LibraryConfig::builder()
            .library_dir(dir.join("library"))
            .thumbnail_size(46, 36)
            .num_threads(threads)
            .build()
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_threads(2)
        }

        fn with_threads(threads: usize) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let library = MediaLibrary::open(config(dir.path(), threads)).unwrap();
            Self { dir, library }
        }

        fn image(&self, name: &str, color: [u8; 3]) -> PathBuf {
            let path = self.dir.path().join(name);
            RgbImage::from_pixel(20, 20, Rgb(color)).save(&path).unwrap();
            path
        }

        fn import(&self, paths: Vec<PathBuf>) -> ImportOutcome {
            let (tx, rx) = unbounded();
            self.library.import(paths, |_, _| {}, move |_, result| {
                tx.send(result).unwrap();
            });
            rx.recv_timeout(Duration::from_secs(30)).unwrap().unwrap()
        }

        fn reopen(self) -> (tempfile::TempDir, MediaLibrary) {
            let Fixture { dir, library } = self;
            library.shutdown();
            let library = MediaLibrary::open(config(dir.path(), 2)).unwrap();
            (dir, library)
        }
    }

    #[test]
    fn test_import_inserts_at_front() {
        let fixture = Fixture::new();
        let first = fixture.import(vec![fixture.image("first.png", [1, 1, 1])]);

        let recorder = Arc::new(Recorder::default());
        fixture.library.subscribe(recorder.clone());
        let second = fixture.import(vec![
            fixture.image("a.png", [2, 2, 2]),
            fixture.image("b.png", [3, 3, 3]),
        ]);

        let snapshot = fixture.library.snapshot().unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(&snapshot[..2], &second.records[..]);
        assert_eq!(snapshot[2], first.records[0]);
        assert_eq!(recorder.events(), vec![Event::Inserted(vec![0, 1])]);
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let fixture = Fixture::new();
        let recorder: Arc<dyn CatalogObserver> = Arc::new(Recorder::default());
        assert!(fixture.library.subscribe(recorder.clone()));
        assert!(!fixture.library.subscribe(recorder.clone()));
        assert!(fixture.library.unsubscribe(&recorder));
        assert!(!fixture.library.unsubscribe(&recorder));
    }

    #[test]
    fn test_favorite_persists_across_reopen() {
        let fixture = Fixture::new();
        let outcome = fixture.import(vec![fixture.image("cat.png", [9, 9, 9])]);
        let id = outcome.records[0].id;

        let recorder = Arc::new(Recorder::default());
        fixture.library.subscribe(recorder.clone());
        let updated = fixture.library.toggle_favorite(id).unwrap().unwrap();
        assert!(updated.is_favorite);
        assert_eq!(recorder.events(), vec![Event::Updated(id, 0)]);

        let (_dir, library) = fixture.reopen();
        assert!(library.find(id).unwrap().unwrap().is_favorite);

        let updated = library.set_favorite(id, false).unwrap().unwrap();
        assert!(!updated.is_favorite);
    }

    #[test]
    fn test_rename_persists() {
        let fixture = Fixture::new();
        let id = fixture.import(vec![fixture.image("old.png", [4, 4, 4])]).records[0].id;

        let renamed = fixture.library.rename(id, "new name").unwrap().unwrap();
        assert_eq!(renamed.name, "new name");

        let (_dir, library) = fixture.reopen();
        assert_eq!(library.find(id).unwrap().unwrap().name, "new name");
    }

    #[test]
    fn test_edits_of_unknown_ids_are_noops() {
        let fixture = Fixture::new();
        let unknown = MediaId::new();
        assert!(fixture.library.toggle_favorite(unknown).unwrap().is_none());
        assert!(fixture.library.rename(unknown, "x").unwrap().is_none());
        assert!(fixture.library.delete(unknown).unwrap().is_none());
        assert!(!fixture.library.select(Some(unknown)).unwrap());
        assert!(!fixture.library.refresh_thumbnail(unknown, |_, _| {}).unwrap());
    }

    #[test]
    fn test_delete_removes_record_and_files() {
        let fixture = Fixture::new();
        let outcome = fixture.import(vec![
            fixture.image("keep.png", [1, 0, 0]),
            fixture.image("drop.png", [0, 1, 0]),
        ]);
        let doomed = outcome.records[1].clone();
        fixture.library.select(Some(doomed.id)).unwrap();

        let recorder = Arc::new(Recorder::default());
        fixture.library.subscribe(recorder.clone());
        let removed = fixture.library.delete(doomed.id).unwrap().unwrap();
        assert_eq!(removed.id, doomed.id);
        assert_eq!(
            recorder.events(),
            vec![Event::SelectionChanged(None), Event::Deleted(doomed.id, 1)]
        );

        assert!(!doomed.file_path.exists());
        assert!(!doomed.thumbnail.file_path.exists());
        assert!(fixture.library.selected().unwrap().is_none());

        let (_dir, library) = fixture.reopen();
        let remaining = library.snapshot().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "keep");
    }

    #[test]
    fn test_navigation_and_sort() {
        let fixture = Fixture::new();
        fixture.import(vec![
            fixture.image("b.png", [1, 1, 1]),
            fixture.image("c.png", [2, 2, 2]),
            fixture.image("a.png", [3, 3, 3]),
        ]);

        fixture.library.sort(SortOrder::Name).unwrap();
        assert_eq!(fixture.library.sort_order().unwrap(), SortOrder::Name);
        let names: Vec<_> = fixture
            .library
            .snapshot()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);

        assert!(!fixture.library.select_next().unwrap());
        let last = fixture.library.snapshot().unwrap()[2].id;
        fixture.library.select(Some(last)).unwrap();
        assert!(fixture.library.select_next().unwrap());
        assert_eq!(fixture.library.selected().unwrap().unwrap().name, "c");
        assert!(fixture.library.select_previous().unwrap());
        assert_eq!(fixture.library.selected().unwrap().unwrap().name, "a");
    }

    #[test]
    fn test_refresh_reloads_from_storage() {
        let fixture = Fixture::new();
        fixture.import(vec![fixture.image("a.png", [1, 2, 3])]);

        let recorder = Arc::new(Recorder::default());
        fixture.library.subscribe(recorder.clone());
        assert_eq!(fixture.library.refresh().unwrap(), 1);
        assert_eq!(
            recorder.events(),
            vec![Event::Reloaded(1), Event::Sorted(SortOrder::CreatedAt)]
        );
    }

    #[test]
    fn test_refresh_thumbnail_rewrites_preview() {
        let fixture = Fixture::new();
        let record = fixture.import(vec![fixture.image("a.png", [200, 10, 10])]).records[0].clone();
        std::fs::remove_file(&record.thumbnail.file_path).unwrap();

        let (tx, rx) = unbounded();
        let started = fixture
            .library
            .refresh_thumbnail(record.id, move |catalog, result| {
                let in_catalog = catalog.find(&record.id).cloned();
                tx.send((result.map_err(|e| e.to_string()), in_catalog)).unwrap();
            })
            .unwrap();
        assert!(started);

        let (result, in_catalog) = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        let updated = result.unwrap();
        assert!(updated.thumbnail.file_path.exists());
        assert_eq!((updated.thumbnail.width, updated.thumbnail.height), (46, 36));
        assert_eq!(in_catalog, Some(updated));
    }

    #[test]
    fn test_refresh_sees_writes_queued_before_it() {
        let fixture = Fixture::new();
        fixture.import(vec![fixture.image("a.png", [1, 1, 1])]);

        // Hold the coordinator while another writer's insert queues up behind it.
        let coordinator = fixture.library.coordinator();
        let (busy_tx, busy_rx) = unbounded();
        let (release_tx, release_rx) = unbounded::<()>();
        assert!(coordinator.dispatch(move |_| {
            busy_tx.send(()).unwrap();
            release_rx.recv_timeout(Duration::from_secs(30)).ok();
        }));
        busy_rx.recv_timeout(Duration::from_secs(30)).unwrap();

        let late = fixtures::record("late", 5);
        let inserted = late.clone();
        let db_path = fixture.library.config().effective_db_path();
        assert!(coordinator.dispatch(move |catalog| {
            MediaDatabase::open(&db_path).unwrap().insert(&inserted).unwrap();
            catalog.insert(vec![inserted], true);
        }));

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            release_tx.send(()).unwrap();
        });
        let count = fixture.library.refresh().unwrap();
        releaser.join().unwrap();

        assert_eq!(count, 2);
        let snapshot = fixture.library.snapshot().unwrap();
        assert!(snapshot.iter().any(|r| r.id == late.id));
    }

    #[test]
    fn test_refresh_thumbnail_keeps_concurrent_edits() {
        let fixture = Fixture::with_threads(1);
        let record = fixture.import(vec![fixture.image("a.png", [10, 200, 10])]).records[0].clone();
        let blocker = fixture.image("blocker.png", [0, 0, 0]);

        // Occupy the only worker so the refresh stays queued while the record is edited.
        let (busy_tx, busy_rx) = unbounded();
        let (release_tx, release_rx) = unbounded::<()>();
        fixture.library.thumbnails().request(blocker, MediaKind::Image, move |_| {
            busy_tx.send(()).unwrap();
            release_rx.recv_timeout(Duration::from_secs(30)).ok();
        });
        busy_rx.recv_timeout(Duration::from_secs(30)).unwrap();

        let (tx, rx) = unbounded();
        let started = fixture
            .library
            .refresh_thumbnail(record.id, move |catalog, result| {
                let in_catalog = catalog.find(&record.id).cloned();
                tx.send((result.map_err(|e| e.to_string()), in_catalog)).unwrap();
            })
            .unwrap();
        assert!(started);

        fixture.library.rename(record.id, "renamed").unwrap().unwrap();
        assert!(fixture.library.set_favorite(record.id, true).unwrap().unwrap().is_favorite);
        release_tx.send(()).unwrap();

        let (result, in_catalog) = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        let refreshed = result.unwrap();
        assert!(refreshed.is_favorite);
        assert_eq!(refreshed.name, "renamed");
        assert_eq!(in_catalog, Some(refreshed));

        let (_dir, library) = fixture.reopen();
        let stored = library.find(record.id).unwrap().unwrap();
        assert!(stored.is_favorite);
        assert_eq!(stored.name, "renamed");
        assert!(stored.thumbnail.file_path.exists());
    }

    #[test]
    fn test_refresh_thumbnail_after_delete_reports_failure() {
        let fixture = Fixture::with_threads(1);
        let record = fixture.import(vec![fixture.image("a.png", [5, 5, 5])]).records[0].clone();
        let blocker = fixture.image("blocker.png", [0, 0, 0]);

        let (busy_tx, busy_rx) = unbounded();
        let (release_tx, release_rx) = unbounded::<()>();
        fixture.library.thumbnails().request(blocker, MediaKind::Image, move |_| {
            busy_tx.send(()).unwrap();
            release_rx.recv_timeout(Duration::from_secs(30)).ok();
        });
        busy_rx.recv_timeout(Duration::from_secs(30)).unwrap();

        let (tx, rx) = unbounded();
        fixture
            .library
            .refresh_thumbnail(record.id, move |_, result| {
                tx.send(result.map_err(|e| e.to_string())).unwrap();
            })
            .unwrap();
        fixture.library.delete(record.id).unwrap().unwrap();
        release_tx.send(()).unwrap();

        // The managed copy is gone, so rendering fails and nothing is written back.
        let result = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        assert!(result.is_err());
        assert!(!record.thumbnail.file_path.exists());
        assert!(fixture.library.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_returns_catalog() {
        let fixture = Fixture::new();
        fixture.import(vec![fixture.image("a.png", [0, 0, 0])]);
        let catalog = fixture.library.shutdown().unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
