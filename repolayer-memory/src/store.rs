//! Shared backing stores for in-memory repositories.
//!
//! A [`MemoryStore`] is a handle to one ordered sequence of entities guarded by
//! its own reader-writer lock. Cloning the handle shares the sequence, so several
//! repositories (each with private staging) can reconcile against the same store.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use repolayer_core::entity::Entity;

/// Thread-safe ordered storage shared by every repository pointing at it.
///
/// The sequence may only be read while holding [`read`](MemoryStore::read) and
/// only be changed while holding [`write`](MemoryStore::write). Guards release
/// the lock when dropped, on every exit path.
///
/// # Example
///
/// ```ignore
/// use repolayer_memory::MemoryStore;
///
/// let store = MemoryStore::with_items(vec![Customer::new(1, "Ada")]);
/// let shared = store.clone();
///
/// shared.write().clear();
/// assert!(store.is_empty());
/// ```
pub struct MemoryStore<T> {
    items: Arc<RwLock<Vec<Arc<T>>>>,
}

impl<T> MemoryStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a store seeded with `items`, in iteration order.
    ///
    /// Items are stored as given; record ids are not checked or assigned.
    pub fn with_items(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items.into_iter().map(Arc::new).collect())),
        }
    }

    /// Acquires the shared read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<T>>> {
        self.items.read()
    }

    /// Acquires the exclusive write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<T>>> {
        self.items.write()
    }

    /// Returns the number of stored items, taking the read lock.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the store holds no items, taking the read lock.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the live handles currently stored, in store order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.read().clone()
    }

    /// Removes every item.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Returns `true` if both handles share the same sequence.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.len())
            .finish()
    }
}

/// A named registry of stores, keyed by name and entity type.
///
/// Replaces process-wide statics: hold one registry for the lifetime of the
/// process to get process-scoped stores, or one per session to get
/// session-scoped stores. Asking twice for the same name and type returns
/// handles to the same store.
///
/// # Example
///
/// ```ignore
/// let registry = StoreRegistry::new();
///
/// let first = registry.store::<Customer>("customers");
/// let second = registry.store::<Customer>("customers");
/// assert!(first.same_store(&second));
/// ```
#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<(String, TypeId), Box<dyn Any + Send + Sync>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store registered under `name` for `T`, creating it if needed.
    pub fn store<T: Entity>(&self, name: &str) -> MemoryStore<T> {
        let mut stores = self.stores.lock();
        let entry = stores
            .entry((name.to_string(), TypeId::of::<T>()))
            .or_insert_with(|| Box::new(MemoryStore::<T>::new()));

        // Keys carry the entity's `TypeId`, so the downcast always succeeds.
        entry
            .downcast_ref::<MemoryStore<T>>()
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if a store exists under `name` for `T`.
    pub fn contains<T: Entity>(&self, name: &str) -> bool {
        self.stores
            .lock()
            .contains_key(&(name.to_string(), TypeId::of::<T>()))
    }

    /// Forgets the store under `name` for `T`. Existing handles keep working.
    pub fn remove<T: Entity>(&self, name: &str) -> bool {
        self.stores
            .lock()
            .remove(&(name.to_string(), TypeId::of::<T>()))
            .is_some()
    }

    /// Returns the registered store names, sorted and deduplicated.
    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .stores
            .lock()
            .keys()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        names.sort();
        names.dedup();
        names
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::Item;

    #[test]
    fn clones_share_items() {
        let store = MemoryStore::with_items(vec![Item::new(1, "a"), Item::new(2, "b")]);
        let shared = store.clone();

        shared.write().pop();

        assert_eq!(store.len(), 1);
        assert!(store.same_store(&shared));
        assert!(!store.same_store(&MemoryStore::new()));
    }

    #[test]
    fn snapshot_holds_live_handles() {
        let store = MemoryStore::with_items(vec![Item::new(1, "a")]);
        let snapshot = store.snapshot();

        assert!(Arc::ptr_eq(&snapshot[0], &store.read()[0]));

        store.clear();
        assert!(store.is_empty());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn registry_returns_the_same_store_per_name_and_type() {
        let registry = StoreRegistry::new();

        let first = registry.store::<Item>("items");
        first.write().push(Arc::new(Item::new(1, "a")));

        assert_eq!(registry.store::<Item>("items").len(), 1);
        assert!(registry.store::<Item>("other").is_empty());
        assert!(registry.contains::<Item>("items"));
        assert_eq!(registry.names(), vec!["items".to_string(), "other".to_string()]);

        assert!(registry.remove::<Item>("items"));
        assert!(registry.store::<Item>("items").is_empty());
        assert_eq!(first.len(), 1);
    }
}
