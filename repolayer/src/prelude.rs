//! Convenient re-exports of commonly used types from repolayer.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use repolayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - The entity trait and record ids
//! - The repository and its backend traits
//! - Specifications, sorting and visitors
//! - Validators and error types

pub use repolayer_core::{
    backend::{RepositoryBackend, RepositoryBackendBuilder, SaveReport},
    entity::{Entity, RecordId},
    equality::{ByRecordId, ByReference, EqualityComparer, RecordIdComparer, ReferenceComparer},
    error::{RepositoryError, RepositoryResult},
    query::Query,
    repository::{DataSourceScope, Repository},
    sort::{SortDirection, SortKey, SortRule},
    source::DataSourceInfo,
    specification::{BusinessRule, CustomSpecification, Specification, SpecificationKind},
    validation::{RuleValidator, ValidationError, Validator, Violation},
    visitor::{PredicateCompiler, SpecificationVisitor},
};
