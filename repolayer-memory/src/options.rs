//! Configuration and construction of in-memory repositories.

use serde::{Deserialize, Serialize};

use repolayer_core::{
    backend::RepositoryBackendBuilder,
    entity::Entity,
    error::RepositoryResult,
};

use crate::{repository::MemoryRepository, store::MemoryStore};

/// Repository-wide defaults, overridable per call through
/// [`DataSourceInfo`](repolayer_core::source::DataSourceInfo).
///
/// # Example
///
/// ```ignore
/// let options = MemoryRepositoryOptions::from_json(r#"{ "clone_items": true }"#)?;
/// assert!(options.clone_items);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryRepositoryOptions {
    /// Hand out copies of stored entities instead of shared handles.
    pub clone_items: bool,
}

impl MemoryRepositoryOptions {
    /// Parses options from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Serialization`](repolayer_core::error::RepositoryError::Serialization)
    /// if `json` is malformed.
    pub fn from_json(json: &str) -> RepositoryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for [`MemoryRepository`] instances.
///
/// Without an explicit store the repository gets a fresh, private one.
///
/// # Example
///
/// ```ignore
/// use repolayer::backend::RepositoryBackendBuilder;
///
/// let store = MemoryStore::<Customer>::new();
/// let backend = MemoryRepository::builder()
///     .store(store.clone())
///     .clone_items(true)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct MemoryRepositoryBuilder<T> {
    store: Option<MemoryStore<T>>,
    options: MemoryRepositoryOptions,
}

impl<T> MemoryRepositoryBuilder<T> {
    pub fn new() -> Self {
        Self {
            store: None,
            options: MemoryRepositoryOptions::default(),
        }
    }

    /// Reconciles against `store` instead of a private one.
    pub fn store(mut self, store: MemoryStore<T>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: MemoryRepositoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn clone_items(mut self, clone_items: bool) -> Self {
        self.options.clone_items = clone_items;
        self
    }
}

impl<T> Default for MemoryRepositoryBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> RepositoryBackendBuilder<T> for MemoryRepositoryBuilder<T> {
    type Backend = MemoryRepository<T>;

    /// Builds the repository. This always succeeds.
    fn build(self) -> RepositoryResult<Self::Backend> {
        Ok(MemoryRepository::with_options(
            self.store.unwrap_or_default(),
            self.options,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::Item;
    use repolayer_core::error::RepositoryError;

    #[test]
    fn options_from_json() {
        assert!(MemoryRepositoryOptions::from_json(r#"{"clone_items": true}"#).unwrap().clone_items);
        assert_eq!(MemoryRepositoryOptions::from_json("{}").unwrap(), MemoryRepositoryOptions::default());
        assert!(matches!(
            MemoryRepositoryOptions::from_json("{"),
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[test]
    fn builder_shares_the_given_store() {
        let store = MemoryStore::with_items(vec![Item::new(1, "a")]);
        let repository = MemoryRepositoryBuilder::new()
            .store(store.clone())
            .clone_items(true)
            .build()
            .unwrap();

        assert!(repository.store().same_store(&store));
        assert!(repository.clone_items());
    }
}
