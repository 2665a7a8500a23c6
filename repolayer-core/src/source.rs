//! Per-call data source overrides.
//!
//! [`DataSourceInfo`] is a string-keyed bag of type-erased values handed to a
//! backend alongside each operation. Backends document the keys they honour;
//! unknown keys are ignored. An empty bag means "use the repository defaults".

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::Arc,
};

#[derive(Clone, Default)]
pub struct DataSourceInfo {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl DataSourceInfo {
    /// Key for an explicit backing store instance.
    pub const MEMORY_STORE: &'static str = "MemoryStore";
    /// Key for the clone-items policy (`bool`).
    pub const CLONE_ITEMS: &'static str = "CloneItems";

    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) -> &mut Self {
        self.values.insert(key.into(), Arc::new(value));
        self
    }

    /// Builder form of [`DataSourceInfo::insert`].
    pub fn with<V: Any + Send + Sync>(mut self, key: impl Into<String>, value: V) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value under `key` if it exists and has type `V`.
    pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
        self.values
            .get(key)
            .and_then(|value| value.downcast_ref::<V>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the clone-items override, if present.
    pub fn clone_items(&self) -> Option<bool> {
        self.get::<bool>(Self::CLONE_ITEMS).copied()
    }
}

impl fmt::Debug for DataSourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.values.keys().collect::<Vec<_>>();
        keys.sort();

        f.debug_struct("DataSourceInfo")
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let info = DataSourceInfo::new()
            .with(DataSourceInfo::CLONE_ITEMS, true)
            .with("region", "eu".to_string());

        assert_eq!(info.clone_items(), Some(true));
        assert_eq!(info.get::<String>("region").map(String::as_str), Some("eu"));
        assert!(info.get::<i32>("region").is_none());
        assert!(info.get::<bool>("missing").is_none());
    }

    #[test]
    fn wrong_type_is_ignored() {
        let info = DataSourceInfo::new().with(DataSourceInfo::CLONE_ITEMS, "yes");

        assert!(info.contains(DataSourceInfo::CLONE_ITEMS));
        assert_eq!(info.clone_items(), None);
    }

    #[test]
    fn debug_lists_keys() {
        let mut info = DataSourceInfo::new();
        info.insert("b", 1).insert("a", 2);

        assert_eq!(format!("{:?}", info), r#"DataSourceInfo { keys: ["a", "b"] }"#);
        assert!(info.remove("a"));
        assert!(!info.remove("a"));
    }
}
