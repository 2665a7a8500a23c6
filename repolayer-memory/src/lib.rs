//! In-memory repository backend for repolayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `RepositoryBackend` trait with unit-of-work staging: changes are held in
//! private caches until they are saved into a shared [`MemoryStore`].
//!
//! # Features
//!
//! - **Shared stores** - Several repositories can reconcile against one store
//! - **All-or-nothing batches** - Batch staging either applies completely or not at all
//! - **Atomic saves** - A save whose targets vanished from the store changes nothing
//! - **Clone policy** - Reads return shared handles or fresh copies, per repository or per call
//!
//! # Quick Start
//!
//! ```ignore
//! use repolayer::prelude::*;
//! use repolayer::memory::{MemoryRepository, MemoryStore};
//!
//! let store = MemoryStore::<Customer>::new();
//! let customers = Repository::new(MemoryRepository::new(store.clone()));
//!
//! customers.add_entity(Customer::named("Ada"))?;
//! assert!(store.is_empty());
//!
//! customers.save_changes()?;
//! assert_eq!(store.len(), 1);
//! ```

#[allow(unused_extern_crates)]
extern crate self as repolayer_memory;

pub mod options;
pub mod repository;
pub mod staging;
pub mod store;
mod view;

pub use options::{MemoryRepositoryBuilder, MemoryRepositoryOptions};
pub use repository::MemoryRepository;
pub use staging::StagedChanges;
pub use store::{MemoryStore, StoreRegistry};

#[cfg(test)]
pub(crate) mod tests_support {
    use repolayer_core::entity::{Entity, RecordId};

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Item {
        pub record_id: RecordId,
        pub name: String,
    }

    impl Item {
        pub fn new(record_id: RecordId, name: &str) -> Self {
            Self { record_id, name: name.to_string() }
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
