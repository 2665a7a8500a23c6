//! Error types and result types for repository operations.
//!
//! This module provides the error taxonomy shared by every repository backend.
//! Use [`RepositoryResult<T>`] as the return type for fallible operations.

use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::{entity::RecordId, validation::ValidationError};

/// Represents all possible errors that can occur when interacting with a repository.
///
/// The variants fall into four groups: argument errors, validation failures,
/// state conflicts between staged changes and the backing store, and unsupported
/// operations. All of them propagate to the caller; nothing is retried internally.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A required argument was missing or empty (entities, specifications, include paths).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The entity carries the reserved record id `0`.
    #[error("Record id 0 is not a valid identifier")]
    InvalidRecordId,
    /// The entity could not be found among the staged changes or in the backing store.
    #[error("Entity {0} not found")]
    EntityNotFound(RecordId),
    /// The entity does not exist in the backing store.
    #[error("Entity {0} not found in memory")]
    EntityNotFoundInStore(RecordId),
    /// The entity is already staged for deletion.
    #[error("Entity {0} is already marked for deletion")]
    AlreadyMarkedForDeletion(RecordId),
    /// The entity cannot be updated because it is staged for deletion.
    #[error("Cannot update entity {0}, it is marked for deletion")]
    MarkedForDeletion(RecordId),
    /// A staged update or deletion targets an entity that left the backing store
    /// between staging and saving.
    #[error("Entity {0} was removed from the store before changes could be saved")]
    ConcurrentModification(RecordId),
    /// A lookup that requires a result matched nothing.
    #[error("No entity matched the query")]
    NoMatch,
    /// A single-result lookup matched more than one entity.
    #[error("Expected a single entity but {0} matched")]
    MultipleMatches(usize),
    /// The entity failed validation before it could be staged.
    #[error("Entity validation failed")]
    Validation(#[source] ValidationError),
    /// The operation is not supported by this backend or specification kind.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// A like pattern could not be compiled into a regular expression.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    /// Serialization or deserialization failed (options, business rule arguments).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    /// Returns `true` for conflicts between staged changes and the store.
    ///
    /// These are local, expected failures: the caller asked for something the
    /// current state does not allow. Retrying the same call will fail again.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::InvalidRecordId
                | RepositoryError::EntityNotFound(_)
                | RepositoryError::EntityNotFoundInStore(_)
                | RepositoryError::AlreadyMarkedForDeletion(_)
                | RepositoryError::MarkedForDeletion(_)
                | RepositoryError::ConcurrentModification(_)
        )
    }
}

/// A specialized `Result` type for repository operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`RepositoryError`].
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<SerdeJsonError> for RepositoryError {
    fn from(err: SerdeJsonError) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<RegexError> for RepositoryError {
    fn from(err: RegexError) -> Self {
        RepositoryError::InvalidPattern(err.to_string())
    }
}

impl From<ValidationError> for RepositoryError {
    fn from(err: ValidationError) -> Self {
        RepositoryError::Validation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Violation;
    use std::error::Error as _;

    #[test]
    fn conflict_classification() {
        assert!(RepositoryError::AlreadyMarkedForDeletion(3).is_conflict());
        assert!(RepositoryError::ConcurrentModification(5).is_conflict());
        assert!(!RepositoryError::NoMatch.is_conflict());
        assert!(!RepositoryError::Unsupported("x".into()).is_conflict());
    }

    #[test]
    fn validation_error_is_kept_as_source() {
        let err = RepositoryError::from(ValidationError::new(vec![Violation::new("name is required")]));

        let source = err.source().expect("validation cause");
        assert!(source.to_string().contains("name is required"));
    }
}
