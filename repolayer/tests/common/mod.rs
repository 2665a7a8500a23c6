#![allow(dead_code)]

use repolayer::{
    memory::{MemoryRepository, MemoryStore},
    prelude::*,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    pub record_id: RecordId,
    pub name: String,
    pub credit: i64,
}

impl Customer {
    pub fn new(record_id: RecordId, name: &str) -> Self {
        Self {
            record_id,
            name: name.to_string(),
            credit: 0,
        }
    }

    pub fn named(name: &str) -> Self {
        Self::new(0, name)
    }

    pub fn with_credit(mut self, credit: i64) -> Self {
        self.credit = credit;
        self
    }
}

impl Entity for Customer {
    fn record_id(&self) -> RecordId {
        self.record_id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.record_id = id;
    }
}

pub type CustomerRepository = Repository<Customer, MemoryRepository<Customer>>;

pub fn repository_over(store: &MemoryStore<Customer>) -> CustomerRepository {
    Repository::new(MemoryRepository::new(store.clone()))
}

/// A store holding `a` (1) and `b` (2).
pub fn seeded_store() -> MemoryStore<Customer> {
    MemoryStore::with_items(vec![Customer::new(1, "a"), Customer::new(2, "b")])
}

pub fn ids(items: &[std::sync::Arc<Customer>]) -> Vec<RecordId> {
    items.iter().map(|item| item.record_id).collect()
}

pub fn names(items: &[std::sync::Arc<Customer>]) -> Vec<String> {
    items.iter().map(|item| item.name.clone()).collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("repolayer_core=debug,repolayer_memory=debug")
        .try_init();
}
