//! Repository backend abstraction.
//!
//! This module defines the traits that abstract over different data sources
//! (memory, file, database, remote service), allowing [`Repository`](crate::repository::Repository)
//! to apply argument checks, validation and specification compilation once and
//! hand the rest to a backend.
//!
//! # Overview
//!
//! [`RepositoryBackend`] is the set of `*_core` operations a backend implements.
//! Mutations are staged; nothing reaches the data source until
//! [`save_changes_core`](RepositoryBackend::save_changes_core) runs. Every
//! operation receives a [`DataSourceInfo`] bag carrying per-call overrides.
//!
//! # Traits
//!
//! - [`RepositoryBackend`]: The core trait for repository backends
//! - [`RepositoryBackendBuilder`]: Factory trait for creating backend instances

use std::{fmt::Debug, sync::Arc};

use crate::{
    entity::{Entity, RecordId},
    error::{RepositoryError, RepositoryResult},
    query::Query,
    source::DataSourceInfo,
    specification::BusinessRule,
};

/// Outcome of a successful save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// `(staged_id, assigned_id)` for every addition, in staging order.
    pub added: Vec<(RecordId, RecordId)>,
    /// Number of staged updates written to the data source.
    pub updated: usize,
    /// Number of staged deletions removed from the data source.
    pub deleted: usize,
}

impl SaveReport {
    /// Returns the id assigned to the addition staged as `staged_id`.
    pub fn assigned_id(&self, staged_id: RecordId) -> Option<RecordId> {
        self.added
            .iter()
            .find(|(staged, _)| *staged == staged_id)
            .map(|(_, assigned)| *assigned)
    }

    /// Returns `true` if the save changed nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated == 0 && self.deleted == 0
    }
}

/// Abstract interface for repository backends.
///
/// Implementers provide staging and persistence for one entity type. Arguments
/// reaching a `*_core` method have already been checked and validated by the
/// calling [`Repository`](crate::repository::Repository); backends only enforce
/// state rules (identifier signs, conflicts with the data source).
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent calls from
/// multiple threads. The locking discipline is implementation-specific and should
/// be documented by the implementer.
///
/// # Error Handling
///
/// Operations return [`RepositoryResult<T>`](crate::error::RepositoryResult).
/// A failing operation must leave staged state exactly as it was before the call.
pub trait RepositoryBackend<T: Entity>: Send + Sync + Debug {
    /// Stages a new entity and returns the staged handle.
    ///
    /// An entity with a positive id that is staged for deletion is un-deleted and
    /// staged as an update instead. Any other entity receives a fresh negative id.
    fn add_entity_core(&self, entity: T, info: &DataSourceInfo) -> RepositoryResult<Arc<T>>;

    /// Stages several new entities atomically: either all are staged or none.
    fn add_entities_core(&self, entities: Vec<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>>;

    /// Stages an update of an existing or staged entity.
    fn update_entity_core(&self, entity: T, info: &DataSourceInfo) -> RepositoryResult<Arc<T>>;

    /// Stages several updates atomically.
    fn update_entities_core(&self, entities: Vec<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>>;

    /// Stages a deletion, or cancels a staged addition.
    fn delete_entity_core(&self, entity: &T, info: &DataSourceInfo) -> RepositoryResult<()>;

    /// Stages several deletions atomically.
    fn delete_entities_core(&self, entities: &[T], info: &DataSourceInfo) -> RepositoryResult<()>;

    /// Returns every entity of the current view matching `query`, sorted and capped.
    fn find_all_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>>;

    /// Returns the first entity matching `query` after sorting.
    fn find_first_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>>;

    /// Returns the only entity matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::MultipleMatches`] if more than one entity matches.
    fn find_single_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>>;

    /// Writes every staged change to the data source and clears the staging area.
    ///
    /// Either every staged change is applied or none is.
    fn save_changes_core(&self, info: &DataSourceInfo) -> RepositoryResult<SaveReport>;

    /// Discards every staged change.
    fn reset_core(&self);

    /// Executes a named business rule.
    ///
    /// The default implementation refuses every rule.
    fn execute_business_rule_core(
        &self,
        rule: &BusinessRule,
        _info: &DataSourceInfo,
    ) -> RepositoryResult<Vec<Arc<T>>> {
        Err(RepositoryError::Unsupported(format!(
            "business rule {} is not supported by this repository",
            rule.name()
        )))
    }
}

macro_rules! forward_backend {
    ($($wrapper:ty),*) => {
        $(
            impl<T: Entity, B: RepositoryBackend<T> + ?Sized> RepositoryBackend<T> for $wrapper {
                fn add_entity_core(&self, entity: T, info: &DataSourceInfo) -> RepositoryResult<Arc<T>> {
                    (**self).add_entity_core(entity, info)
                }

                fn add_entities_core(&self, entities: Vec<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
                    (**self).add_entities_core(entities, info)
                }

                fn update_entity_core(&self, entity: T, info: &DataSourceInfo) -> RepositoryResult<Arc<T>> {
                    (**self).update_entity_core(entity, info)
                }

                fn update_entities_core(&self, entities: Vec<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
                    (**self).update_entities_core(entities, info)
                }

                fn delete_entity_core(&self, entity: &T, info: &DataSourceInfo) -> RepositoryResult<()> {
                    (**self).delete_entity_core(entity, info)
                }

                fn delete_entities_core(&self, entities: &[T], info: &DataSourceInfo) -> RepositoryResult<()> {
                    (**self).delete_entities_core(entities, info)
                }

                fn find_all_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
                    (**self).find_all_core(query, info)
                }

                fn find_first_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>> {
                    (**self).find_first_core(query, info)
                }

                fn find_single_core(&self, query: &Query<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>> {
                    (**self).find_single_core(query, info)
                }

                fn save_changes_core(&self, info: &DataSourceInfo) -> RepositoryResult<SaveReport> {
                    (**self).save_changes_core(info)
                }

                fn reset_core(&self) {
                    (**self).reset_core()
                }

                fn execute_business_rule_core(
                    &self,
                    rule: &BusinessRule,
                    info: &DataSourceInfo,
                ) -> RepositoryResult<Vec<Arc<T>>> {
                    (**self).execute_business_rule_core(rule, info)
                }
            }
        )*
    };
}

forward_backend!(&B, Box<B>, Arc<B>);

/// Factory trait for constructing repository backends.
///
/// Builders collect configuration and produce a ready backend.
pub trait RepositoryBackendBuilder<T: Entity> {
    /// The backend type produced by this builder.
    type Backend: RepositoryBackend<T>;

    /// Builds and returns the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent.
    fn build(self) -> RepositoryResult<Self::Backend>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lookup() {
        let report = SaveReport {
            added: vec![(-1, 3), (-2, 4)],
            updated: 1,
            deleted: 0,
        };

        assert_eq!(report.assigned_id(-2), Some(4));
        assert_eq!(report.assigned_id(-5), None);
        assert!(!report.is_empty());
        assert!(SaveReport::default().is_empty());
    }
}
