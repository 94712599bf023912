//! Import pipeline: external files → managed copies, thumbnails and persisted records

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::catalog::Catalog;
use crate::config::LibraryConfig;
use crate::coordinator::CoordinatorHandle;
use crate::db::MediaRepository;
use crate::error::{ImportBatchError, ImportError, ImportErrorKind};
use crate::inspect::inspect_file;
use crate::models::{ImportOutcome, ImportProgress, MediaId, MediaRecord};
use crate::provenance;
use crate::thumbnail::ThumbnailPipeline;

/// Progress callback type. Runs on the coordination context.
pub type ProgressCallback = Box<dyn FnMut(&mut Catalog, &ImportProgress) + Send>;

/// Completion callback type. Runs once, on the coordination context.
pub type CompletionCallback =
    Box<dyn FnOnce(&mut Catalog, Result<ImportOutcome, ImportBatchError>) + Send>;

/// Cooperative cancellation flag shared between a batch and its caller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a running batch
#[derive(Debug, Clone)]
pub struct ImportHandle {
    token: CancellationToken,
    total: usize,
}

impl ImportHandle {
    /// Stop before the next per-file step. Completion still fires once.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of paths in the batch
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Turns external files into persisted media records
#[derive(Clone)]
pub struct Importer {
    config: Arc<LibraryConfig>,
    repository: Arc<dyn MediaRepository>,
    thumbnails: ThumbnailPipeline,
    pool: Arc<ThreadPool>,
    coordinator: CoordinatorHandle,
}

impl Importer {
    pub fn new(
        config: Arc<LibraryConfig>,
        repository: Arc<dyn MediaRepository>,
        thumbnails: ThumbnailPipeline,
        pool: Arc<ThreadPool>,
        coordinator: CoordinatorHandle,
    ) -> Self {
        Self {
            config,
            repository,
            thumbnails,
            pool,
            coordinator,
        }
    }

    /// Start importing `paths` without blocking the caller.
    ///
    /// `on_progress` fires after every finished file and `on_complete` fires
    /// exactly once after the last progress event. Both run on the
    /// coordination context.
    pub fn import<P, C>(&self, paths: Vec<PathBuf>, on_progress: P, on_complete: C) -> ImportHandle
    where
        P: FnMut(&mut Catalog, &ImportProgress) + Send + 'static,
        C: FnOnce(&mut Catalog, Result<ImportOutcome, ImportBatchError>) + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = ImportHandle {
            token: token.clone(),
            total: paths.len(),
        };

        let importer = self.clone();
        let on_progress: ProgressCallback = Box::new(on_progress);
        let on_complete: CompletionCallback = Box::new(on_complete);
        self.pool.spawn(move || {
            let result = importer.run_batch(paths, &token, on_progress);
            importer.deliver(move |catalog| on_complete(catalog, result));
        });

        handle
    }

    fn deliver<F>(&self, task: F)
    where
        F: FnOnce(&mut Catalog) + Send + 'static,
    {
        if !self.coordinator.dispatch(task) {
            warn!("Catalog coordinator is gone; dropping import callback");
        }
    }

    fn run_batch(
        &self,
        paths: Vec<PathBuf>,
        token: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> Result<ImportOutcome, ImportBatchError> {
        let start = Instant::now();
        let total = paths.len();
        if total == 0 {
            return Ok(ImportOutcome::new());
        }

        info!("Importing {} files into {:?}", total, self.config.library_dir);
        self.prepare_storage()?;

        let progress = ProgressSink::new(self.coordinator.clone(), on_progress, total);
        let results: Vec<Option<Result<MediaRecord, ImportError>>> = paths
            .par_iter()
            .map(|path| {
                if token.is_cancelled() {
                    return None;
                }
                let result = self.import_file(path, token)?;
                progress.file_finished(path, result.is_ok());
                Some(result)
            })
            .collect();

        let mut outcome = ImportOutcome {
            total,
            ..ImportOutcome::default()
        };
        for result in results {
            match result {
                Some(Ok(record)) => outcome.records.push(record),
                Some(Err(err)) => {
                    warn!("Import failed: {}", err);
                    outcome.failures.push(err);
                }
                None => outcome.cancelled = true,
            }
        }
        outcome.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Imported {} of {} files in {}ms ({} failed{})",
            outcome.records.len(),
            total,
            outcome.duration_ms,
            outcome.failures.len(),
            if outcome.cancelled { ", cancelled" } else { "" }
        );
        Ok(outcome)
    }

    fn prepare_storage(&self) -> Result<(), ImportBatchError> {
        for dir in [self.config.media_dir(), self.config.thumbnail_dir()] {
            let unavailable = |source| ImportBatchError::StorageUnavailable {
                path: dir.clone(),
                source,
            };
            std::fs::create_dir_all(&dir).map_err(unavailable)?;
            let metadata = std::fs::metadata(&dir).map_err(unavailable)?;
            if metadata.permissions().readonly() {
                return Err(unavailable(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "directory is read-only",
                )));
            }
        }
        Ok(())
    }

    /// Import one file. `None` means the batch was cancelled before this file finished.
    fn import_file(
        &self,
        source: &Path,
        token: &CancellationToken,
    ) -> Option<Result<MediaRecord, ImportError>> {
        let metadata = match std::fs::metadata(source) {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                return Some(Err(ImportError::unreadable(
                    source.to_path_buf(),
                    "not a regular file",
                )))
            }
            Err(err) => return Some(Err(ImportError::unreadable(source.to_path_buf(), err.to_string()))),
        };

        let inspection = match inspect_file(source) {
            Ok(Some(inspection)) => inspection,
            Ok(None) => return Some(Err(ImportError::unsupported(source.to_path_buf()))),
            Err(err) => return Some(Err(ImportError::unreadable(source.to_path_buf(), err.to_string()))),
        };

        let Some(name) = display_name(source) else {
            return Some(Err(ImportError::new(
                ImportErrorKind::Metadata,
                Some(source.to_path_buf()),
                "file has no name",
            )));
        };

        if token.is_cancelled() {
            return None;
        }

        let id = MediaId::new();
        let mut managed = ManagedFiles::default();
        let file_path = self
            .config
            .media_dir()
            .join(format!("{}.{}", id, inspection.extension));
        managed.track(file_path.clone());
        let file_size = match std::fs::copy(source, &file_path) {
            Ok(size) => size,
            Err(err) => return Some(Err(ImportError::copy(source.to_path_buf(), &err))),
        };

        if token.is_cancelled() {
            return None;
        }

        let thumbnail_path = self.config.thumbnail_dir().join(format!("{}.jpg", id));
        managed.track(thumbnail_path.clone());
        let thumbnail = match self
            .thumbnails
            .render(&file_path, inspection.kind)
            .and_then(|preview| preview.write_to(&thumbnail_path))
        {
            Ok(thumbnail) => thumbnail,
            Err(err) => return Some(Err(ImportError::thumbnail(source.to_path_buf(), &err))),
        };

        if token.is_cancelled() {
            return None;
        }

        let modification_date = metadata.modified().ok().map(DateTime::<Utc>::from);
        let creation_date = metadata
            .created()
            .ok()
            .map(DateTime::<Utc>::from)
            .or(modification_date)
            .unwrap_or_else(Utc::now);

        let record = MediaRecord {
            id,
            name,
            kind: inspection.kind,
            file_path,
            original_file_path: source.to_path_buf(),
            file_size,
            mime_type: inspection.mime_type,
            thumbnail,
            creation_date,
            modification_date,
            where_from: provenance::where_from(source),
            is_favorite: false,
        };

        match self.repository.insert(&record) {
            Ok(stored) => {
                managed.keep();
                debug!("Imported {:?} as {}", source, stored.id);
                Some(Ok(stored))
            }
            Err(err) => {
                error!("Failed to persist {:?}: {}", source, err);
                Some(Err(ImportError::persistence(source.to_path_buf(), &err)))
            }
        }
    }
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("library_dir", &self.config.library_dir)
            .finish_non_exhaustive()
    }
}

/// Display name derived from the original filename
fn display_name(path: &Path) -> Option<String> {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}

/// Serializes progress events onto the coordination context.
///
/// Counting and enqueueing happen under one lock so the coordinator sees
/// strictly increasing counts even when workers finish concurrently.
struct ProgressSink {
    coordinator: CoordinatorHandle,
    callback: Arc<Mutex<ProgressCallback>>,
    completed: Mutex<usize>,
    total: usize,
}

impl ProgressSink {
    fn new(coordinator: CoordinatorHandle, callback: ProgressCallback, total: usize) -> Self {
        Self {
            coordinator,
            callback: Arc::new(Mutex::new(callback)),
            completed: Mutex::new(0),
            total,
        }
    }

    fn file_finished(&self, path: &Path, succeeded: bool) {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        *completed += 1;
        let progress = ImportProgress {
            completed: *completed,
            total: self.total,
            path: path.to_path_buf(),
            succeeded,
        };

        let callback = Arc::clone(&self.callback);
        let queued = self.coordinator.dispatch(move |catalog| {
            let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
            (*callback)(catalog, &progress);
        });
        if !queued {
            debug!("Dropping progress {}/{}: coordinator is gone", *completed, self.total);
        }
    }
}

/// Managed files created for one import, removed again unless kept
#[derive(Default)]
struct ManagedFiles {
    paths: Vec<PathBuf>,
}

impl ManagedFiles {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn keep(&mut self) {
        self.paths.clear();
    }
}

impl Drop for ManagedFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed partial import {:?}", path),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!("Failed to remove partial import {:?}: {}", path, err),
            }
        }
    }
}
