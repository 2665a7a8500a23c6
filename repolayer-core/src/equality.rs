//! Equality helpers used by staging and reconciliation.
//!
//! Repositories hold entities as `Arc<T>`. Two notions of "the same entity" are needed:
//!
//! - [`RecordIdComparer`] treats entities as equal when their record ids match,
//!   regardless of field values. Staging caches and the concatenated view use it.
//! - [`ReferenceComparer`] treats entities as equal only when they are the same
//!   allocation. The clone policy is observable through it.

use std::{
    collections::HashSet,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::entity::{Entity, RecordId};

/// Equality strategy over shared entity handles.
pub trait EqualityComparer<T> {
    /// Returns `true` when `left` and `right` denote the same entity.
    fn equals(&self, left: &Arc<T>, right: &Arc<T>) -> bool;

    /// Returns the position of the first element in `items` equal to `item`.
    fn position(&self, items: &[Arc<T>], item: &Arc<T>) -> Option<usize> {
        items.iter().position(|candidate| self.equals(candidate, item))
    }

    /// Returns `true` when `items` contains an element equal to `item`.
    fn contains(&self, items: &[Arc<T>], item: &Arc<T>) -> bool {
        self.position(items, item).is_some()
    }
}

/// Identity keyed on the record id.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordIdComparer;

impl<T: Entity> EqualityComparer<T> for RecordIdComparer {
    fn equals(&self, left: &Arc<T>, right: &Arc<T>) -> bool {
        left.record_id() == right.record_id()
    }
}

impl RecordIdComparer {
    /// Returns the position of the entity with record id `id`.
    pub fn position_of<T: Entity>(items: &[Arc<T>], id: RecordId) -> Option<usize> {
        items.iter().position(|item| item.record_id() == id)
    }

    /// Collects the record ids of `items` into a set for repeated lookups.
    pub fn id_set<T: Entity>(items: &[Arc<T>]) -> HashSet<RecordId> {
        items.iter().map(|item| item.record_id()).collect()
    }
}

/// Identity keyed on the allocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceComparer;

impl<T> EqualityComparer<T> for ReferenceComparer {
    fn equals(&self, left: &Arc<T>, right: &Arc<T>) -> bool {
        Arc::ptr_eq(left, right)
    }
}

/// Hashable wrapper that compares entities by record id.
///
/// Useful as a `HashSet`/`HashMap` key when deduplicating entity handles.
#[derive(Debug, Clone)]
pub struct ByRecordId<T>(pub Arc<T>);

impl<T: Entity> PartialEq for ByRecordId<T> {
    fn eq(&self, other: &Self) -> bool {
        RecordIdComparer.equals(&self.0, &other.0)
    }
}

impl<T: Entity> Eq for ByRecordId<T> {}

impl<T: Entity> Hash for ByRecordId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.record_id().hash(state);
    }
}

/// Hashable wrapper that compares entity handles by allocation.
#[derive(Debug, Clone)]
pub struct ByReference<T>(pub Arc<T>);

impl<T> PartialEq for ByReference<T> {
    fn eq(&self, other: &Self) -> bool {
        ReferenceComparer.equals(&self.0, &other.0)
    }
}

impl<T> Eq for ByReference<T> {}

impl<T> Hash for ByReference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;

    #[test]
    fn record_id_equality_ignores_fields() {
        let left = Arc::new(Item::new(3, "left", 1));
        let right = Arc::new(Item::new(3, "right", 2));

        assert!(RecordIdComparer.equals(&left, &right));
        assert!(!ReferenceComparer.equals(&left, &right));
        assert!(ReferenceComparer.equals(&left, &left.clone()));
    }

    #[test]
    fn position_lookups() {
        let items = vec![
            Arc::new(Item::new(1, "a", 0)),
            Arc::new(Item::new(2, "b", 0)),
        ];
        let probe = Arc::new(Item::new(2, "other", 0));

        assert_eq!(RecordIdComparer.position(&items, &probe), Some(1));
        assert_eq!(ReferenceComparer.position(&items, &probe), None);
        assert_eq!(RecordIdComparer::position_of(&items, 1), Some(0));
        assert_eq!(RecordIdComparer::position_of(&items, 7), None);
    }

    #[test]
    fn wrappers_deduplicate() {
        let shared = Arc::new(Item::new(1, "a", 0));
        let copy = Arc::new(Item::new(1, "a", 0));

        let by_id: HashSet<_> = [ByRecordId(shared.clone()), ByRecordId(copy.clone())].into_iter().collect();
        let by_ref: HashSet<_> = [ByReference(shared.clone()), ByReference(shared), ByReference(copy)]
            .into_iter()
            .collect();

        assert_eq!(by_id.len(), 1);
        assert_eq!(by_ref.len(), 2);
    }
}
