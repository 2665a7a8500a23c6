//! Staging caches and the rules for moving entities between them.
//!
//! Every rule operates on a [`StagingArea`] value. Batch operations run against a
//! clone of the area and replace the original only once every entity succeeded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use repolayer_core::{
    entity::{Entity, RecordId},
    equality::RecordIdComparer,
    error::{RepositoryError, RepositoryResult},
};

/// The three pending-change caches of one repository.
pub(crate) struct StagingArea<T> {
    pub additions: Vec<Arc<T>>,
    pub updates: Vec<Arc<T>>,
    pub deletions: Vec<Arc<T>>,
}

impl<T> Default for StagingArea<T> {
    fn default() -> Self {
        Self {
            additions: Vec::new(),
            updates: Vec::new(),
            deletions: Vec::new(),
        }
    }
}

impl<T> Clone for StagingArea<T> {
    fn clone(&self) -> Self {
        Self {
            additions: self.additions.clone(),
            updates: self.updates.clone(),
            deletions: self.deletions.clone(),
        }
    }
}

impl<T: Entity> StagingArea<T> {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }

    pub fn clear(&mut self) {
        self.additions.clear();
        self.updates.clear();
        self.deletions.clear();
    }

    /// The next negative id: one below the smallest pending addition, or `-1`.
    fn next_transient_id(&self) -> RecordId {
        self.additions
            .iter()
            .map(|item| item.record_id())
            .min()
            .map_or(-1, |min| min.min(0) - 1)
    }

    /// Stages `entity` as an addition, or un-deletes it.
    ///
    /// A positive id staged for deletion leaves the deletion cache and becomes a
    /// staged update carrying the new field values. Anything else receives a fresh
    /// negative id.
    pub fn stage_addition(&mut self, entity: T) -> Arc<T> {
        let record_id = entity.record_id();

        if record_id > 0 {
            if let Some(position) = RecordIdComparer::position_of(&self.deletions, record_id) {
                let deleted = self.deletions.remove(position);
                let mut restored = T::clone(&deleted);
                restored.copy_from(&entity);

                let restored = Arc::new(restored);
                self.put_update(Arc::clone(&restored));

                debug!(record_id, "Un-deleted entity staged as update");
                return restored;
            }
        }

        let mut entity = entity;
        let transient_id = self.next_transient_id();
        entity.set_record_id(transient_id);

        let staged = Arc::new(entity);
        self.additions.push(Arc::clone(&staged));

        debug!(record_id = transient_id, "Staged addition");
        staged
    }

    /// Stages an update of a pending addition (negative id) or a stored entity.
    pub fn stage_update(&mut self, stored: &[Arc<T>], entity: T) -> RepositoryResult<Arc<T>> {
        let record_id = entity.record_id();

        if record_id == 0 {
            return Err(RepositoryError::InvalidRecordId);
        }

        if record_id < 0 {
            let position = RecordIdComparer::position_of(&self.additions, record_id)
                .ok_or(RepositoryError::EntityNotFound(record_id))?;

            let staged = Arc::new(entity);
            self.additions[position] = Arc::clone(&staged);

            debug!(record_id, "Replaced pending addition");
            return Ok(staged);
        }

        if RecordIdComparer::position_of(stored, record_id).is_none() {
            return Err(RepositoryError::EntityNotFoundInStore(record_id));
        }

        if RecordIdComparer::position_of(&self.deletions, record_id).is_some() {
            return Err(RepositoryError::MarkedForDeletion(record_id));
        }

        let staged = Arc::new(entity);
        self.put_update(Arc::clone(&staged));

        debug!(record_id, "Staged update");
        Ok(staged)
    }

    /// Cancels a pending addition (negative id) or stages a stored entity for deletion.
    pub fn stage_deletion(&mut self, stored: &[Arc<T>], entity: &T) -> RepositoryResult<()> {
        let record_id = entity.record_id();

        if record_id == 0 {
            return Err(RepositoryError::InvalidRecordId);
        }

        if record_id < 0 {
            let position = RecordIdComparer::position_of(&self.additions, record_id)
                .ok_or(RepositoryError::EntityNotFound(record_id))?;

            self.additions.remove(position);

            debug!(record_id, "Cancelled pending addition");
            return Ok(());
        }

        if let Some(position) = RecordIdComparer::position_of(&self.updates, record_id) {
            self.updates.remove(position);
        }

        let position = RecordIdComparer::position_of(stored, record_id)
            .ok_or(RepositoryError::EntityNotFoundInStore(record_id))?;

        if RecordIdComparer::position_of(&self.deletions, record_id).is_some() {
            return Err(RepositoryError::AlreadyMarkedForDeletion(record_id));
        }

        self.deletions.push(Arc::clone(&stored[position]));

        debug!(record_id, "Staged deletion");
        Ok(())
    }

    fn put_update(&mut self, entity: Arc<T>) {
        match RecordIdComparer::position_of(&self.updates, entity.record_id()) {
            Some(position) => self.updates[position] = entity,
            None => self.updates.push(entity),
        }
    }

    pub fn staged_changes(&self) -> StagedChanges {
        let ids = |items: &[Arc<T>]| items.iter().map(|item| item.record_id()).collect();

        StagedChanges {
            additions: ids(&self.additions),
            updates: ids(&self.updates),
            deletions: ids(&self.deletions),
        }
    }
}

/// Snapshot of the record ids waiting in each staging cache, in staging order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedChanges {
    pub additions: Vec<RecordId>,
    pub updates: Vec<RecordId>,
    pub deletions: Vec<RecordId>,
}

impl StagedChanges {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }
}
