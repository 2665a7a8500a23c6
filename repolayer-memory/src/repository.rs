//! The in-memory repository backend.
//!
//! [`MemoryRepository`] stages additions, updates and deletions privately and
//! reconciles them with a shared [`MemoryStore`] on save.
//!
//! # Locking
//!
//! Two reader-writer locks are involved: the store's lock, shared by every
//! repository pointing at the store, and this repository's staging lock. When
//! an operation needs both, the store lock is always taken first.
//!
//! | Operation            | Store lock | Staging lock |
//! |----------------------|------------|--------------|
//! | add                  | none       | write        |
//! | update, delete       | read       | write        |
//! | find                 | read       | read         |
//! | save                 | write      | write        |

use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use repolayer_core::{
    backend::{RepositoryBackend, SaveReport},
    entity::{Entity, RecordId},
    equality::RecordIdComparer,
    error::{RepositoryError, RepositoryResult},
    query::Query,
    source::DataSourceInfo,
};

use crate::{
    options::{MemoryRepositoryBuilder, MemoryRepositoryOptions},
    staging::{StagedChanges, StagingArea},
    store::MemoryStore,
    view::{concatenated_view, share},
};

/// A repository backend holding staged changes in memory.
///
/// # Data source overrides
///
/// Every operation honours two [`DataSourceInfo`] keys:
///
/// - [`DataSourceInfo::MEMORY_STORE`]: a `MemoryStore<T>` used instead of the
///   repository's own store for that call
/// - [`DataSourceInfo::CLONE_ITEMS`]: a `bool` replacing the clone policy for
///   that call
///
/// # Example
///
/// ```ignore
/// use repolayer::prelude::*;
/// use repolayer::memory::{MemoryRepository, MemoryStore};
///
/// let store = MemoryStore::with_items(vec![Customer::new(1, "Ada")]);
/// let repository = Repository::new(MemoryRepository::new(store));
///
/// let grace = repository.add_entity(Customer::named("Grace"))?;
/// assert_eq!(grace.record_id(), -1);
///
/// let report = repository.save_changes()?;
/// assert_eq!(report.assigned_id(-1), Some(2));
/// ```
pub struct MemoryRepository<T: Entity> {
    store: MemoryStore<T>,
    staging: RwLock<StagingArea<T>>,
    clone_items: bool,
}

impl<T: Entity> MemoryRepository<T> {
    /// Creates a repository over `store` that hands out shared handles.
    pub fn new(store: MemoryStore<T>) -> Self {
        Self::with_options(store, MemoryRepositoryOptions::default())
    }

    pub fn with_options(store: MemoryStore<T>, options: MemoryRepositoryOptions) -> Self {
        Self {
            store,
            staging: RwLock::new(StagingArea::default()),
            clone_items: options.clone_items,
        }
    }

    pub fn builder() -> MemoryRepositoryBuilder<T> {
        MemoryRepositoryBuilder::new()
    }

    /// Returns the store this repository reconciles against by default.
    pub fn store(&self) -> &MemoryStore<T> {
        &self.store
    }

    /// Returns the default clone policy.
    pub fn clone_items(&self) -> bool {
        self.clone_items
    }

    /// Returns the ids currently staged in each cache.
    pub fn pending(&self) -> StagedChanges {
        self.staging.read().staged_changes()
    }

    /// Returns `true` if any change is staged.
    pub fn has_changes(&self) -> bool {
        !self.staging.read().is_empty()
    }

    fn store_for(&self, info: &DataSourceInfo) -> MemoryStore<T> {
        info.get::<MemoryStore<T>>(DataSourceInfo::MEMORY_STORE)
            .cloned()
            .unwrap_or_else(|| self.store.clone())
    }

    fn clone_items_for(&self, info: &DataSourceInfo) -> bool {
        info.clone_items().unwrap_or(self.clone_items)
    }

    fn view(&self, info: &DataSourceInfo) -> Vec<Arc<T>> {
        let store = self.store_for(info);
        let stored = store.read();
        let staging = self.staging.read();

        concatenated_view(stored.as_slice(), &*staging, self.clone_items_for(info))
    }

    /// Runs `stage` against a working copy of the staging area and commits the
    /// copy only if it succeeds.
    fn transact<R>(
        &self,
        info: &DataSourceInfo,
        stage: impl FnOnce(&mut StagingArea<T>, &[Arc<T>]) -> RepositoryResult<R>,
    ) -> RepositoryResult<R> {
        let store = self.store_for(info);
        let stored = store.read();
        let mut staging = self.staging.write();

        let mut working = staging.clone();
        let result = stage(&mut working, stored.as_slice())?;
        *staging = working;

        Ok(result)
    }
}

impl<T: Entity> RepositoryBackend<T> for MemoryRepository<T> {
    fn add_entity_core(&self, entity: T, _info: &DataSourceInfo) -> RepositoryResult<Arc<T>> {
        Ok(self.staging.write().stage_addition(entity))
    }

    fn add_entities_core(&self, entities: Vec<T>, _info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
        let mut staging = self.staging.write();
        let mut working = staging.clone();

        let staged = entities
            .into_iter()
            .map(|entity| working.stage_addition(entity))
            .collect();
        *staging = working;

        Ok(staged)
    }

    fn update_entity_core(&self, entity: T, info: &DataSourceInfo) -> RepositoryResult<Arc<T>> {
        self.transact(info, |working, stored| working.stage_update(stored, entity))
    }

    fn update_entities_core(&self, entities: Vec<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
        self.transact(info, |working, stored| {
            entities
                .into_iter()
                .map(|entity| working.stage_update(stored, entity))
                .collect()
        })
    }

    fn delete_entity_core(&self, entity: &T, info: &DataSourceInfo) -> RepositoryResult<()> {
        self.transact(info, |working, stored| working.stage_deletion(stored, entity))
    }

    fn delete_entities_core(&self, entities: &[T], info: &DataSourceInfo) -> RepositoryResult<()> {
        let (cancellations, deletions): (Vec<&T>, Vec<&T>) = entities
            .iter()
            .partition(|entity| entity.record_id() < 0);

        self.transact(info, |working, stored| {
            cancellations
                .into_iter()
                .chain(deletions)
                .try_for_each(|entity| working.stage_deletion(stored, entity))
        })
    }

    fn find_all_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
        Ok(query.apply(self.view(info)))
    }

    fn find_first_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>> {
        Ok(query.first(self.view(info)))
    }

    fn find_single_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>> {
        let mut matched = query.filter(self.view(info));

        match matched.len() {
            0 | 1 => Ok(matched.pop()),
            count => Err(RepositoryError::MultipleMatches(count)),
        }
    }

    fn save_changes_core(&self, info: &DataSourceInfo) -> RepositoryResult<SaveReport> {
        let store = self.store_for(info);
        let clone_items = self.clone_items_for(info);

        let mut stored = store.write();
        let mut staging = self.staging.write();

        let locate = |entity: &Arc<T>| {
            let record_id = entity.record_id();

            RecordIdComparer::position_of(stored.as_slice(), record_id).ok_or_else(|| {
                warn!(record_id, "Staged entity is no longer in the store");
                RepositoryError::ConcurrentModification(record_id)
            })
        };

        let update_slots = staging
            .updates
            .iter()
            .map(&locate)
            .collect::<RepositoryResult<Vec<_>>>()?;
        let mut deletion_slots = staging
            .deletions
            .iter()
            .map(&locate)
            .collect::<RepositoryResult<Vec<_>>>()?;

        deletion_slots.sort_unstable();

        let highest = stored
            .iter()
            .enumerate()
            .filter(|(slot, _)| deletion_slots.binary_search(slot).is_err())
            .map(|(_, item)| item.record_id())
            .max()
            .unwrap_or(0)
            .max(0);
        let assigned_ids = (1..=staging.additions.len())
            .map(|offset| {
                RecordId::try_from(offset)
                    .ok()
                    .and_then(|offset| highest.checked_add(offset))
                    .ok_or_else(|| {
                        warn!(highest, "Record id space exhausted");
                        RepositoryError::Backend(format!("record id space exhausted after {highest}"))
                    })
            })
            .collect::<RepositoryResult<Vec<RecordId>>>()?;

        // Infallible from here on.
        for (slot, entity) in update_slots.into_iter().zip(&staging.updates) {
            stored[slot] = share(entity, clone_items);
        }

        for (removed, slot) in deletion_slots.iter().enumerate() {
            stored.remove(slot - removed);
        }

        let mut report = SaveReport {
            added: Vec::with_capacity(staging.additions.len()),
            updated: staging.updates.len(),
            deleted: deletion_slots.len(),
        };

        for (addition, record_id) in staging.additions.iter().zip(assigned_ids) {
            let mut entity = T::clone(addition);
            entity.set_record_id(record_id);

            report.added.push((addition.record_id(), record_id));
            stored.push(Arc::new(entity));
        }

        staging.clear();

        info!(
            added = report.added.len(),
            updated = report.updated,
            deleted = report.deleted,
            "Saved staged changes"
        );

        Ok(report)
    }

    fn reset_core(&self) {
        self.staging.write().clear();
        debug!("Staging caches cleared");
    }
}

impl<T: Entity> fmt::Debug for MemoryRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("store", &self.store)
            .field("pending", &self.pending())
            .field("clone_items", &self.clone_items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::Item;

    fn seeded() -> (MemoryStore<Item>, MemoryRepository<Item>) {
        let store = MemoryStore::with_items(vec![Item::new(1, "a"), Item::new(2, "b"), Item::new(3, "c")]);
        let repository = MemoryRepository::new(store.clone());
        (store, repository)
    }

    fn names(items: &[Arc<Item>]) -> Vec<&str> {
        items.iter().map(|item| item.name.as_str()).collect()
    }

    #[test]
    fn save_applies_every_cache() {
        let (store, repository) = seeded();
        let none = DataSourceInfo::default();

        repository.add_entity_core(Item::new(0, "d"), &none).unwrap();
        repository.update_entity_core(Item::new(2, "b2"), &none).unwrap();
        repository.delete_entity_core(&Item::new(1, "a"), &none).unwrap();
        repository.delete_entity_core(&Item::new(3, "c"), &none).unwrap();

        let report = repository.save_changes_core(&none).unwrap();

        assert_eq!(report.added, vec![(-1, 3)]);
        assert_eq!((report.updated, report.deleted), (1, 2));
        assert_eq!(names(&store.snapshot()), vec!["b2", "d"]);
        assert!(!repository.has_changes());
    }

    #[test]
    fn deletions_compensate_for_shifting_indices() {
        let store = MemoryStore::with_items((1..=6).map(|id| Item::new(id, "x")));
        let repository = MemoryRepository::new(store.clone());
        let none = DataSourceInfo::default();

        let doomed = [Item::new(5, "x"), Item::new(2, "x"), Item::new(3, "x")];
        repository.delete_entities_core(&doomed, &none).unwrap();
        repository.save_changes_core(&none).unwrap();

        let ids = store.snapshot().iter().map(|item| item.record_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 4, 6]);
    }

    #[test]
    fn vanished_target_aborts_the_whole_save() {
        let (store, repository) = seeded();
        let none = DataSourceInfo::default();

        repository.update_entity_core(Item::new(1, "a1"), &none).unwrap();
        repository.update_entity_core(Item::new(3, "c1"), &none).unwrap();
        repository.add_entity_core(Item::new(0, "d"), &none).unwrap();
        store.write().retain(|item| item.record_id != 3);

        let result = repository.save_changes_core(&none);

        assert!(matches!(result, Err(RepositoryError::ConcurrentModification(3))));
        assert_eq!(names(&store.snapshot()), vec!["a", "b"]);
        assert_eq!(repository.pending().updates, vec![1, 3]);
        assert_eq!(repository.pending().additions, vec![-1]);
    }

    #[test]
    fn exhausted_id_space_leaves_the_store_untouched() {
        let store = MemoryStore::with_items(vec![Item::new(1, "a"), Item::new(RecordId::MAX, "last")]);
        let repository = MemoryRepository::new(store.clone());
        let none = DataSourceInfo::default();

        repository.update_entity_core(Item::new(1, "a1"), &none).unwrap();
        repository.add_entity_core(Item::new(0, "overflow"), &none).unwrap();

        let result = repository.save_changes_core(&none);

        assert!(matches!(result, Err(RepositoryError::Backend(_))));
        assert_eq!(names(&store.snapshot()), vec!["a", "last"]);
        assert!(repository.has_changes());
    }

    #[test]
    fn ids_continue_after_the_highest_survivor() {
        let store = MemoryStore::with_items(vec![Item::new(1, "a"), Item::new(RecordId::MAX, "last")]);
        let repository = MemoryRepository::new(store.clone());
        let none = DataSourceInfo::default();

        repository.delete_entity_core(&Item::new(RecordId::MAX, "last"), &none).unwrap();
        repository.add_entity_core(Item::new(0, "b"), &none).unwrap();
        let report = repository.save_changes_core(&none).unwrap();

        assert_eq!(report.added, vec![(-1, 2)]);
        assert_eq!(names(&store.snapshot()), vec!["a", "b"]);
    }

    #[test]
    fn find_single_rejects_multiple_matches() {
        let (_, repository) = seeded();
        let none = DataSourceInfo::default();

        let one = Query::from_predicate(|item: &Item| item.name == "b");
        let many = Query::from_predicate(|item: &Item| item.record_id > 1);
        let nothing = Query::from_predicate(|item: &Item| item.name == "z");

        assert_eq!(repository.find_single_core(&one, &none).unwrap().map(|item| item.record_id), Some(2));
        assert!(matches!(repository.find_single_core(&many, &none), Err(RepositoryError::MultipleMatches(2))));
        assert!(repository.find_single_core(&nothing, &none).unwrap().is_none());
    }

    #[test]
    fn data_source_info_redirects_a_single_call() {
        let (store, repository) = seeded();
        let other = MemoryStore::with_items(vec![Item::new(10, "elsewhere")]);
        let redirected = DataSourceInfo::new().with(DataSourceInfo::MEMORY_STORE, other.clone());

        let found = repository.find_all_core(&Query::all(), &redirected).unwrap();
        assert_eq!(names(&found), vec!["elsewhere"]);

        repository.add_entity_core(Item::new(0, "new"), &redirected).unwrap();
        repository.save_changes_core(&redirected).unwrap();

        assert_eq!(other.len(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn clone_policy_can_be_overridden_per_call() {
        let (store, repository) = seeded();
        let cloned = DataSourceInfo::new().with(DataSourceInfo::CLONE_ITEMS, true);

        let live = repository.find_all_core(&Query::all(), &DataSourceInfo::default()).unwrap();
        let copies = repository.find_all_core(&Query::all(), &cloned).unwrap();
        let stored = store.snapshot();

        assert!(Arc::ptr_eq(&live[0], &stored[0]));
        assert!(!Arc::ptr_eq(&copies[0], &stored[0]));
    }

    #[test]
    fn reset_discards_staging() {
        let (store, repository) = seeded();
        let none = DataSourceInfo::default();

        repository.add_entity_core(Item::new(0, "d"), &none).unwrap();
        repository.delete_entity_core(&Item::new(1, "a"), &none).unwrap();
        assert!(repository.has_changes());

        repository.reset_core();

        assert!(!repository.has_changes());
        assert_eq!(repository.find_all_core(&Query::all(), &none).unwrap().len(), store.len());
    }
}
