//! Main repolayer crate providing a unified repository interface.
//!
//! This crate is the primary entry point for users of the repolayer framework.
//! It re-exports the core types from the sub-crates and provides access to the
//! available backends.
//!
//! # Features
//!
//! - **Unit of work** - Additions, updates and deletions are staged and saved together
//! - **Composable specifications** - Build queries from lambdas, wildcard matches and boolean combinators
//! - **Validation gate** - Plug in a validator that runs before anything is staged
//! - **Pluggable backends** - Implement `RepositoryBackend` for any data source
//!
//! # Quick Start
//!
//! ```ignore
//! use repolayer::{prelude::*, memory::{MemoryRepository, MemoryStore}};
//!
//! #[derive(Debug, Clone, Default)]
//! pub struct Customer {
//!     pub record_id: RecordId,
//!     pub name: String,
//! }
//!
//! impl Entity for Customer {
//!     fn record_id(&self) -> RecordId { self.record_id }
//!     fn set_record_id(&mut self, id: RecordId) { self.record_id = id; }
//! }
//!
//! fn main() -> RepositoryResult<()> {
//!     let store = MemoryStore::new();
//!     let customers = Repository::new(MemoryRepository::new(store.clone()));
//!
//!     // Stage a new customer; it is not in the store yet
//!     let mut ada = customers.create_entity();
//!     ada.name = "Ada".to_string();
//!     customers.add_entity(ada)?;
//!
//!     // Persist every staged change
//!     let report = customers.save_changes()?;
//!     println!("Assigned ids: {:?}", report.added);
//!
//!     // Query with a specification
//!     let found = customers.find_all(
//!         &Specification::like("name", |c: &Customer| Some(c.name.as_str()), "A*")
//!             .order_by(|c: &Customer| c.name.clone())
//!             .with_maximum_results(10),
//!     )?;
//!
//!     println!("Found customers: {:?}", found);
//!     Ok(())
//! }
//! ```
//!
//! # Validation
//!
//! ```ignore
//! use repolayer::prelude::*;
//!
//! let customers = Repository::new(MemoryRepository::new(MemoryStore::new()))
//!     .with_validator(
//!         RuleValidator::new()
//!             .rule("name-required", |c: &Customer| !c.name.is_empty(), "name is required"),
//!     );
//!
//! assert!(matches!(
//!     customers.add_entity(Customer::default()),
//!     Err(RepositoryError::Validation(_))
//! ));
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory staging over shared stores

pub mod prelude;

pub use repolayer_core::{
    backend, entity, equality, error, query, repository, sort, source, specification, validation, visitor,
};

// Re-export JSON values used as business rule arguments
pub use serde_json;

/// In-memory repository backend implementations.
pub mod memory {
    pub use repolayer_memory::{
        MemoryRepository, MemoryRepositoryBuilder, MemoryRepositoryOptions, MemoryStore, StagedChanges,
        StoreRegistry,
    };
}
