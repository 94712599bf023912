//! Observable in-memory catalog of media records
//!
//! The catalog holds the authoritative ordered list of records and the single
//! selection cursor. Every mutation notifies the registered observers
//! synchronously, in registration order, before returning.

use log::{debug, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::{MediaId, MediaRecord, SortOrder};

/// Receives catalog change notifications.
///
/// Every method has an empty default so observers implement only what they need.
pub trait CatalogObserver: Send + Sync {
    /// The whole collection was replaced
    fn reloaded(&self, _count: usize) {}

    /// The selection cursor changed, possibly to none
    fn selection_changed(&self, _record: Option<&MediaRecord>) {}

    /// New records now occupy these positions
    fn items_inserted(&self, _indexes: &[usize]) {}

    /// The record at `index` was replaced
    fn item_updated(&self, _record: &MediaRecord, _index: usize) {}

    /// The record formerly at `index` was removed
    fn item_deleted(&self, _record: &MediaRecord, _index: usize) {}

    /// The cursor advanced with `select_next`
    fn selection_moved_next(&self) {}

    /// The cursor moved back with `select_previous`
    fn selection_moved_previous(&self) {}

    /// The collection was re-ordered
    fn sorted(&self, _order: SortOrder) {}
}

/// Ordered set of observer handles.
///
/// Cloning yields another handle to the same registry, so an observer may keep
/// one and (un)subscribe from inside a callback. Dispatch iterates over a
/// snapshot taken before the first callback runs.
#[derive(Clone, Default)]
pub struct Observers {
    inner: Arc<Mutex<Vec<Arc<dyn CatalogObserver>>>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self) -> MutexGuard<'_, Vec<Arc<dyn CatalogObserver>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an observer. Returns false if it was already registered.
    pub fn subscribe(&self, observer: Arc<dyn CatalogObserver>) -> bool {
        let mut list = self.list();
        if list.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        list.push(observer);
        true
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, observer: &Arc<dyn CatalogObserver>) -> bool {
        let mut list = self.list();
        let before = list.len();
        list.retain(|o| !same_observer(o, observer));
        list.len() != before
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Current observers, in registration order
    pub fn snapshot(&self) -> Vec<Arc<dyn CatalogObserver>> {
        self.list().clone()
    }

    fn notify(&self, f: impl Fn(&dyn CatalogObserver)) {
        // The lock is released before any callback runs.
        let observers = self.snapshot();
        for observer in &observers {
            f(observer.as_ref());
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.len())
            .finish()
    }
}

// Compares the data pointers only; vtable pointers of the same type may differ
// between codegen units.
fn same_observer(a: &Arc<dyn CatalogObserver>, b: &Arc<dyn CatalogObserver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// The in-memory ordered collection plus selection cursor
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<MediaRecord>,
    selected: Option<MediaId>,
    sort_order: SortOrder,
    observers: Observers,
}

impl Catalog {
    /// Create an empty catalog with the given sort criterion
    pub fn new(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            ..Default::default()
        }
    }

    /// Handle to the observer registry
    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    pub fn subscribe(&self, observer: Arc<dyn CatalogObserver>) -> bool {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, observer: &Arc<dyn CatalogObserver>) -> bool {
        self.observers.unsubscribe(observer)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records in catalog order
    pub fn records(&self) -> &[MediaRecord] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&MediaRecord> {
        self.items.get(index)
    }

    /// Records at the given positions, skipping positions out of range
    pub fn get_all(&self, indexes: &[usize]) -> Vec<&MediaRecord> {
        indexes.iter().filter_map(|&i| self.get(i)).collect()
    }

    pub fn position(&self, id: &MediaId) -> Option<usize> {
        self.items.iter().position(|r| r.id == *id)
    }

    pub fn find(&self, id: &MediaId) -> Option<&MediaRecord> {
        self.items.iter().find(|r| r.id == *id)
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        self.position(id).is_some()
    }

    pub fn selected(&self) -> Option<&MediaRecord> {
        self.selected.as_ref().and_then(|id| self.find(id))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected.as_ref().and_then(|id| self.position(id))
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Replace the entire collection
    pub fn load(&mut self, records: Vec<MediaRecord>) {
        let mut seen = HashSet::with_capacity(records.len());
        self.items = records
            .into_iter()
            .filter(|r| {
                let fresh = seen.insert(r.id);
                if !fresh {
                    warn!("Dropping duplicate media {} on load", r.id);
                }
                fresh
            })
            .collect();
        debug!("Catalog loaded with {} records", self.items.len());

        if let Some(id) = self.selected {
            if !self.contains(&id) {
                self.selected = None;
                self.observers.notify(|o| o.selection_changed(None));
            }
        }

        let count = self.items.len();
        self.observers.notify(|o| o.reloaded(count));
    }

    /// Add new records, at the front or at the end. Returns the positions they now occupy.
    pub fn insert(&mut self, records: Vec<MediaRecord>, at_front: bool) -> Vec<usize> {
        let mut fresh = Vec::with_capacity(records.len());
        for record in records {
            if self.contains(&record.id) || fresh.iter().any(|r: &MediaRecord| r.id == record.id) {
                warn!("Ignoring insert of media {} already in catalog", record.id);
                continue;
            }
            fresh.push(record);
        }
        if fresh.is_empty() {
            return Vec::new();
        }

        let count = fresh.len();
        let indexes: Vec<usize> = if at_front {
            self.items.splice(0..0, fresh);
            (0..count).collect()
        } else {
            let start = self.items.len();
            self.items.extend(fresh);
            (start..start + count).collect()
        };

        self.observers.notify(|o| o.items_inserted(&indexes));
        indexes
    }

    /// Replace the record with the same id. Unknown ids are ignored.
    pub fn update(&mut self, record: MediaRecord) -> bool {
        let Some(index) = self.position(&record.id) else {
            debug!("Update of media {} not in catalog ignored", record.id);
            return false;
        };

        self.items[index] = record;
        let record = &self.items[index];

        if self.selected == Some(record.id) {
            self.observers.notify(|o| o.selection_changed(Some(record)));
        }
        self.observers.notify(|o| o.item_updated(record, index));
        true
    }

    /// Remove the record with this id
    pub fn delete(&mut self, id: &MediaId) -> Option<MediaRecord> {
        let index = self.position(id)?;
        self.delete_at(index)
    }

    /// Remove the record at this position
    pub fn delete_at(&mut self, index: usize) -> Option<MediaRecord> {
        if index >= self.items.len() {
            return None;
        }
        let record = self.items.remove(index);

        if self.selected == Some(record.id) {
            self.selected = None;
            self.observers.notify(|o| o.selection_changed(None));
        }
        self.observers.notify(|o| o.item_deleted(&record, index));
        Some(record)
    }

    /// Move the cursor. `None` clears the selection; unknown ids are ignored.
    pub fn select(&mut self, id: Option<MediaId>) -> bool {
        match id {
            Some(id) if !self.contains(&id) => {
                debug!("Selection of media {} not in catalog ignored", id);
                false
            }
            id => {
                self.selected = id;
                let record = self.selected();
                self.observers.notify(|o| o.selection_changed(record));
                true
            }
        }
    }

    /// Advance the cursor, wrapping from the last record to the first
    pub fn select_next(&mut self) -> bool {
        let Some(index) = self.selected_index() else {
            return false;
        };
        let next = if index + 1 >= self.items.len() { 0 } else { index + 1 };

        self.move_selection_to(next);
        self.observers.notify(|o| o.selection_moved_next());
        true
    }

    /// Move the cursor back, wrapping from the first record to the last
    pub fn select_previous(&mut self) -> bool {
        let Some(index) = self.selected_index() else {
            return false;
        };
        let previous = if index == 0 { self.items.len() - 1 } else { index - 1 };

        self.move_selection_to(previous);
        self.observers.notify(|o| o.selection_moved_previous());
        true
    }

    fn move_selection_to(&mut self, index: usize) {
        let record = &self.items[index];
        self.selected = Some(record.id);
        self.observers.notify(|o| o.selection_changed(Some(record)));
    }

    /// Re-order the collection by `order` and remember it as the active criterion
    pub fn sort(&mut self, order: SortOrder) {
        self.sort_order = order;
        // Stable: records equal under the criterion keep their relative order.
        self.items.sort_by(|a, b| order.compare(a, b));
        self.observers.notify(|o| o.sorted(order));
    }

    /// Re-apply the active criterion
    pub fn resort(&mut self) {
        self.sort(self.sort_order);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Event, Recorder};
    use super::*;
    use crate::models::fixtures::record;
    use proptest::prelude::*;

    fn catalog_with(names: &[&str]) -> (Catalog, Arc<Recorder>) {
        let mut catalog = Catalog::new(SortOrder::CreatedAt);
        let records = names
            .iter()
            .enumerate()
            .map(|(i, name)| record(name, i as i64))
            .collect();
        catalog.load(records);
        let recorder = Arc::new(Recorder::default());
        catalog.subscribe(recorder.clone());
        (catalog, recorder)
    }

    fn names(catalog: &Catalog) -> Vec<String> {
        catalog.records().iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_load_notifies_reload() {
        let mut catalog = Catalog::default();
        let recorder = Arc::new(Recorder::default());
        catalog.subscribe(recorder.clone());

        catalog.load(vec![record("a", 1), record("b", 2)]);
        assert_eq!(recorder.events(), vec![Event::Reloaded(2)]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_load_clears_stale_selection() {
        let (mut catalog, recorder) = catalog_with(&["a", "b"]);
        let id = catalog.get(0).unwrap().id;
        catalog.select(Some(id));
        recorder.clear();

        catalog.load(vec![record("c", 3)]);
        assert!(catalog.selected().is_none());
        assert_eq!(
            recorder.events(),
            vec![Event::SelectionChanged(None), Event::Reloaded(1)]
        );
    }

    #[test]
    fn test_insert_at_front_and_back() {
        let (mut catalog, recorder) = catalog_with(&["a", "b"]);

        let front = catalog.insert(vec![record("x", 9), record("y", 9)], true);
        assert_eq!(front, vec![0, 1]);
        assert_eq!(names(&catalog), vec!["x", "y", "a", "b"]);

        let back = catalog.insert(vec![record("z", 9)], false);
        assert_eq!(back, vec![4]);
        assert_eq!(names(&catalog), vec!["x", "y", "a", "b", "z"]);

        assert_eq!(
            recorder.events(),
            vec![Event::Inserted(vec![0, 1]), Event::Inserted(vec![4])]
        );
    }

    #[test]
    fn test_insert_skips_known_ids_and_empty_batches() {
        let (mut catalog, recorder) = catalog_with(&["a"]);
        let existing = catalog.get(0).unwrap().clone();

        assert!(catalog.insert(vec![existing], true).is_empty());
        assert!(catalog.insert(Vec::new(), true).is_empty());
        assert_eq!(catalog.len(), 1);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_update_replaces_by_identity() {
        let (mut catalog, recorder) = catalog_with(&["a", "b"]);
        let edited = catalog.get(1).unwrap().clone().with_favorite(true);

        assert!(catalog.update(edited.clone()));
        assert!(catalog.get(1).unwrap().is_favorite);
        assert_eq!(recorder.events(), vec![Event::Updated(edited.id, 1)]);
    }

    #[test]
    fn test_update_selected_refires_selection() {
        let (mut catalog, recorder) = catalog_with(&["a", "b"]);
        let id = catalog.get(0).unwrap().id;
        catalog.select(Some(id));
        recorder.clear();

        let edited = catalog.get(0).unwrap().clone().with_name("renamed");
        catalog.update(edited);

        assert_eq!(
            recorder.events(),
            vec![Event::SelectionChanged(Some(id)), Event::Updated(id, 0)]
        );
        assert_eq!(catalog.selected().unwrap().name, "renamed");
    }

    #[test]
    fn test_update_missing_is_silent() {
        let (mut catalog, recorder) = catalog_with(&["a"]);
        assert!(!catalog.update(record("ghost", 0)));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_favorite_toggle_keeps_position_under_date_sort() {
        let (mut catalog, _) = catalog_with(&["a", "b", "c"]);
        catalog.sort(SortOrder::CreatedAt);
        let before = names(&catalog);

        let edited = catalog.get(2).unwrap().clone().with_favorite(true);
        catalog.update(edited);
        assert_eq!(names(&catalog), before);
    }

    #[test]
    fn test_delete_selected_clears_selection() {
        let (mut catalog, recorder) = catalog_with(&["a", "b", "c"]);
        let id = catalog.get(1).unwrap().id;
        catalog.select(Some(id));
        recorder.clear();

        let removed = catalog.delete(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(catalog.selected().is_none());
        assert_eq!(
            recorder.events(),
            vec![Event::SelectionChanged(None), Event::Deleted(id, 1)]
        );
    }

    #[test]
    fn test_delete_unselected_keeps_selection() {
        let (mut catalog, recorder) = catalog_with(&["a", "b"]);
        let selected = catalog.get(0).unwrap().id;
        catalog.select(Some(selected));
        recorder.clear();

        let removed = catalog.delete_at(1).unwrap();
        assert_eq!(catalog.selected().unwrap().id, selected);
        assert_eq!(recorder.events(), vec![Event::Deleted(removed.id, 1)]);
    }

    #[test]
    fn test_delete_missing_is_silent() {
        let (mut catalog, recorder) = catalog_with(&["a"]);
        assert!(catalog.delete(&MediaId::new()).is_none());
        assert!(catalog.delete_at(5).is_none());
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_select_none_notifies() {
        let (mut catalog, recorder) = catalog_with(&["a"]);
        assert!(catalog.select(None));
        assert_eq!(recorder.events(), vec![Event::SelectionChanged(None)]);

        assert!(!catalog.select(Some(MediaId::new())));
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_select_next_wraps() {
        let (mut catalog, recorder) = catalog_with(&["a", "b", "c"]);
        let last = catalog.get(2).unwrap().id;
        let first = catalog.get(0).unwrap().id;
        catalog.select(Some(last));
        recorder.clear();

        assert!(catalog.select_next());
        assert_eq!(catalog.selected().unwrap().id, first);
        assert_eq!(
            recorder.events(),
            vec![Event::SelectionChanged(Some(first)), Event::MovedNext]
        );
    }

    #[test]
    fn test_select_previous_wraps() {
        let (mut catalog, recorder) = catalog_with(&["a", "b", "c"]);
        let first = catalog.get(0).unwrap().id;
        let last = catalog.get(2).unwrap().id;
        catalog.select(Some(first));
        recorder.clear();

        assert!(catalog.select_previous());
        assert_eq!(catalog.selected().unwrap().id, last);
        assert_eq!(
            recorder.events(),
            vec![Event::SelectionChanged(Some(last)), Event::MovedPrevious]
        );
    }

    #[test]
    fn test_navigation_noop_without_selection_or_items() {
        let (mut catalog, recorder) = catalog_with(&["a", "b"]);
        assert!(!catalog.select_next());
        assert!(!catalog.select_previous());

        let mut empty = Catalog::default();
        assert!(!empty.select_next());
        assert!(!empty.select_previous());
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_single_item_navigation_stays_put() {
        let (mut catalog, _) = catalog_with(&["only"]);
        let id = catalog.get(0).unwrap().id;
        catalog.select(Some(id));
        catalog.select_next();
        assert_eq!(catalog.selected_index(), Some(0));
        catalog.select_previous();
        assert_eq!(catalog.selected_index(), Some(0));
    }

    #[test]
    fn test_sort_by_name_descending() {
        let (mut catalog, recorder) = catalog_with(&["b", "c", "a"]);
        catalog.sort(SortOrder::Name);
        assert_eq!(names(&catalog), vec!["c", "b", "a"]);
        assert_eq!(catalog.sort_order(), SortOrder::Name);
        assert_eq!(recorder.events(), vec![Event::Sorted(SortOrder::Name)]);
    }

    #[test]
    fn test_sort_by_date_descending() {
        // fixture creation times follow the slice order
        let (mut catalog, _) = catalog_with(&["old", "mid", "new"]);
        catalog.sort(SortOrder::CreatedAt);
        assert_eq!(names(&catalog), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_sort_keeps_selection_identity() {
        let (mut catalog, _) = catalog_with(&["b", "c", "a"]);
        let id = catalog.get(0).unwrap().id;
        catalog.select(Some(id));

        catalog.sort(SortOrder::Name);
        assert_eq!(catalog.selected().unwrap().id, id);
        assert_eq!(catalog.selected_index(), Some(1));
    }

    #[test]
    fn test_favorites_sort_is_stable() {
        let (mut catalog, _) = catalog_with(&["a", "b", "c", "d"]);
        for index in [1, 3] {
            let edited = catalog.get(index).unwrap().clone().with_favorite(true);
            catalog.update(edited);
        }

        catalog.sort(SortOrder::Favorites);
        assert_eq!(names(&catalog), vec!["b", "d", "a", "c"]);
        catalog.resort();
        assert_eq!(names(&catalog), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let catalog = Catalog::default();
        let recorder: Arc<dyn CatalogObserver> = Arc::new(Recorder::default());

        assert!(catalog.subscribe(recorder.clone()));
        assert!(!catalog.subscribe(recorder.clone()));
        assert_eq!(catalog.observers().len(), 1);

        assert!(catalog.unsubscribe(&recorder));
        assert!(!catalog.unsubscribe(&recorder));
        assert!(catalog.observers().is_empty());
    }

    #[test]
    fn test_partial_observer() {
        struct OnlyDeletes(Mutex<usize>);
        impl CatalogObserver for OnlyDeletes {
            fn item_deleted(&self, _record: &MediaRecord, _index: usize) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let (mut catalog, _) = catalog_with(&["a", "b"]);
        let observer = Arc::new(OnlyDeletes(Mutex::new(0)));
        catalog.subscribe(observer.clone());

        let id = catalog.get(0).unwrap().id;
        catalog.select(Some(id));
        catalog.sort(SortOrder::Name);
        catalog.delete_at(0);
        assert_eq!(*observer.0.lock().unwrap(), 1);
    }

    #[test]
    fn test_observer_can_unsubscribe_during_dispatch() {
        struct OneShot {
            registry: Observers,
            me: Mutex<Option<Arc<dyn CatalogObserver>>>,
            calls: Mutex<usize>,
        }
        impl CatalogObserver for OneShot {
            fn selection_changed(&self, _record: Option<&MediaRecord>) {
                *self.calls.lock().unwrap() += 1;
                if let Some(me) = self.me.lock().unwrap().take() {
                    self.registry.unsubscribe(&me);
                }
            }
        }

        let (mut catalog, recorder) = catalog_with(&["a"]);
        let one_shot = Arc::new(OneShot {
            registry: catalog.observers().clone(),
            me: Mutex::new(None),
            calls: Mutex::new(0),
        });
        let handle: Arc<dyn CatalogObserver> = one_shot.clone();
        *one_shot.me.lock().unwrap() = Some(handle.clone());
        catalog.observers().unsubscribe(&(recorder.clone() as Arc<dyn CatalogObserver>));
        catalog.subscribe(handle);
        catalog.subscribe(recorder.clone());

        catalog.select(None);
        catalog.select(None);

        assert_eq!(*one_shot.calls.lock().unwrap(), 1);
        // The recorder registered after the one-shot still saw both notifications.
        assert_eq!(
            recorder.events(),
            vec![Event::SelectionChanged(None), Event::SelectionChanged(None)]
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(usize, bool),
        DeleteAt(usize),
        ToggleFavorite(usize),
        Select(usize),
        Next,
        Previous,
        Sort(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1usize..4, any::<bool>()).prop_map(|(n, front)| Op::Insert(n, front)),
            (0usize..8).prop_map(Op::DeleteAt),
            (0usize..8).prop_map(Op::ToggleFavorite),
            (0usize..8).prop_map(Op::Select),
            Just(Op::Next),
            Just(Op::Previous),
            (0u8..3).prop_map(Op::Sort),
        ]
    }

    proptest! {
        #[test]
        fn prop_notification_counts_match_size(
            initial in 0usize..5,
            ops in proptest::collection::vec(op(), 0..40),
        ) {
            let mut catalog = Catalog::default();
            let recorder = Arc::new(Recorder::default());
            catalog.subscribe(recorder.clone());
            catalog.load((0..initial).map(|i| record(&format!("r{}", i), i as i64)).collect());

            let mut counter = 100;
            for op in ops {
                match op {
                    Op::Insert(n, front) => {
                        let batch = (0..n)
                            .map(|_| {
                                counter += 1;
                                record(&format!("r{}", counter), counter)
                            })
                            .collect();
                        catalog.insert(batch, front);
                    }
                    Op::DeleteAt(i) => {
                        catalog.delete_at(i);
                    }
                    Op::ToggleFavorite(i) => {
                        if let Some(r) = catalog.get(i).cloned() {
                            let fav = !r.is_favorite;
                            catalog.update(r.with_favorite(fav));
                        }
                    }
                    Op::Select(i) => {
                        let id = catalog.get(i).map(|r| r.id);
                        catalog.select(id);
                    }
                    Op::Next => {
                        catalog.select_next();
                    }
                    Op::Previous => {
                        catalog.select_previous();
                    }
                    Op::Sort(n) => catalog.sort(SortOrder::ALL[n as usize]),
                }

                if let Some(selected) = catalog.selected.as_ref() {
                    prop_assert!(catalog.contains(selected));
                }
            }

            let mut size: i64 = 0;
            for event in recorder.events() {
                match event {
                    Event::Reloaded(n) => size += n as i64,
                    Event::Inserted(indexes) => size += indexes.len() as i64,
                    Event::Deleted(..) => size -= 1,
                    _ => {}
                }
            }
            prop_assert_eq!(size, catalog.len() as i64);

            let ids: HashSet<_> = catalog.records().iter().map(|r| r.id).collect();
            prop_assert_eq!(ids.len(), catalog.len());
        }

        #[test]
        fn prop_sort_is_idempotent(
            entries in proptest::collection::vec(("[a-d]{1,3}", 0i64..5, any::<bool>()), 0..20),
            order in 0u8..3,
        ) {
            let order = SortOrder::ALL[order as usize];
            let mut catalog = Catalog::default();
            catalog.load(
                entries
                    .iter()
                    .map(|(name, created, fav)| record(name, *created).with_favorite(*fav))
                    .collect(),
            );

            catalog.sort(order);
            let once: Vec<MediaId> = catalog.records().iter().map(|r| r.id).collect();
            catalog.sort(order);
            let twice: Vec<MediaId> = catalog.records().iter().map(|r| r.id).collect();
            prop_assert_eq!(&once, &twice);

            for pair in catalog.records().windows(2) {
                prop_assert!(order.compare(&pair[0], &pair[1]) != std::cmp::Ordering::Greater);
            }
        }
    }
}
