//! The entity contract moved through every repository.
//!
//! An entity is anything with an integer record identifier and a value-copy
//! operation. The sign of the identifier carries meaning:
//!
//! - `0` is unset and never accepted by a repository,
//! - negative ids belong to additions that are staged but not yet saved,
//! - positive ids belong to entities present (or formerly present) in a backing store.

/// Integer identity of an entity.
pub type RecordId = i64;

/// Core trait that all entities held by a repository must implement.
///
/// The `Clone` bound is the cloning capability: repositories configured to clone
/// items use it to hand out copies that cannot alias stored state.
///
/// # Example
///
/// ```ignore
/// use repolayer::entity::{Entity, RecordId};
///
/// #[derive(Debug, Clone, Default)]
/// pub struct Customer {
///     pub record_id: RecordId,
///     pub name: String,
/// }
///
/// impl Entity for Customer {
///     fn record_id(&self) -> RecordId {
///         self.record_id
///     }
///
///     fn set_record_id(&mut self, id: RecordId) {
///         self.record_id = id;
///     }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + 'static {
    /// Returns this entity's record identifier.
    fn record_id(&self) -> RecordId;

    /// Replaces this entity's record identifier.
    fn set_record_id(&mut self, id: RecordId);

    /// Copies the field values of `other` into `self`.
    ///
    /// Used to merge updated values into an instance that is already staged.
    /// The default replaces every field, including the record id; override it
    /// when some fields must survive a merge.
    fn copy_from(&mut self, other: &Self) {
        *self = other.clone();
    }

    /// Returns `true` when the entity is a staged, unsaved addition.
    fn is_transient(&self) -> bool {
        self.record_id() < 0
    }

    /// Returns `true` when the entity carries a store-assigned identifier.
    fn is_persistent(&self) -> bool {
        self.record_id() > 0
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Item {
        pub record_id: RecordId,
        pub name: String,
        pub rank: i64,
    }

    impl Item {
        pub fn new(record_id: RecordId, name: &str, rank: i64) -> Self {
            Self { record_id, name: name.to_string(), rank }
        }
    }

    impl Entity for Item {
        fn record_id(&self) -> RecordId {
            self.record_id
        }

        fn set_record_id(&mut self, id: RecordId) {
            self.record_id = id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::Item;
    use super::*;

    #[test]
    fn id_sign_classification() {
        assert!(Item::new(-2, "a", 0).is_transient());
        assert!(Item::new(4, "a", 0).is_persistent());

        let unset = Item::default();
        assert!(!unset.is_transient());
        assert!(!unset.is_persistent());
    }

    #[test]
    fn copy_from_replaces_values() {
        let mut target = Item::new(1, "old", 1);
        target.copy_from(&Item::new(1, "new", 9));

        assert_eq!(target, Item::new(1, "new", 9));
    }
}
