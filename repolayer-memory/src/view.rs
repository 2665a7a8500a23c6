//! The logical current state seen by an in-memory repository.
//!
//! The view is the backing store with this repository's staged changes laid over
//! it. It is rebuilt for every read; nothing here is cached.

use std::sync::Arc;

use repolayer_core::{entity::Entity, equality::RecordIdComparer};

use crate::staging::StagingArea;

/// Returns `item` itself, or a fresh copy when `clone_items` is set.
pub(crate) fn share<T: Entity>(item: &Arc<T>, clone_items: bool) -> Arc<T> {
    if clone_items {
        Arc::new(T::clone(item))
    } else {
        Arc::clone(item)
    }
}

/// Builds the concatenated view of `stored` and `staging`, ordered by record id.
///
/// Stored items come first (copied per the clone policy), followed by pending
/// additions. Items with a staged update are replaced by the staged version and
/// items staged for deletion are dropped. The final sort is stable.
pub(crate) fn concatenated_view<T: Entity>(
    stored: &[Arc<T>],
    staging: &StagingArea<T>,
    clone_items: bool,
) -> Vec<Arc<T>> {
    let mut items = stored
        .iter()
        .map(|item| share(item, clone_items))
        .chain(staging.additions.iter().cloned())
        .collect::<Vec<_>>();

    if !staging.updates.is_empty() {
        let updated = RecordIdComparer::id_set(&staging.updates);
        items.retain(|item| !updated.contains(&item.record_id()));
        items.extend(staging.updates.iter().cloned());
    }

    if !staging.deletions.is_empty() {
        let deleted = RecordIdComparer::id_set(&staging.deletions);
        items.retain(|item| !deleted.contains(&item.record_id()));
    }

    items.sort_by_key(|item| item.record_id());
    items
}
