//! The generic repository shared by every backend.
//!
//! [`Repository`] is the public CRUD and query surface. It checks arguments,
//! runs the configured [`Validator`] before staging anything, compiles
//! specifications into [`Query`] values and dispatches to the backend's `*_core`
//! operations.
//!
//! # Example
//!
//! ```ignore
//! use repolayer::prelude::*;
//! use repolayer::memory::{MemoryRepository, MemoryStore};
//!
//! let store = MemoryStore::<Customer>::new();
//! let customers = Repository::new(MemoryRepository::new(store.clone()));
//!
//! let staged = customers.add_entity(Customer::named("Ada"))?;
//! assert!(staged.record_id() < 0);
//!
//! customers.save_changes()?;
//! let ada = customers.find_single(&Specification::lambda(|c: &Customer| c.name == "Ada"))?;
//! ```

use std::{fmt, marker::PhantomData, sync::Arc};

use tracing::{debug, warn};

use crate::{
    backend::{RepositoryBackend, SaveReport},
    entity::Entity,
    error::{RepositoryError, RepositoryResult},
    query::Query,
    source::DataSourceInfo,
    specification::Specification,
    validation::Validator,
};

/// A strongly-typed repository bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `T` - The entity type
/// * `B` - The backend implementation type
pub struct Repository<T: Entity, B: RepositoryBackend<T>> {
    backend: B,
    validator: Option<Arc<dyn Validator<T>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity, B: RepositoryBackend<T>> Repository<T, B> {
    /// Creates a new repository over the given backend, without validation.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            validator: None,
            _marker: PhantomData,
        }
    }

    /// Runs `validator` before every add and update.
    pub fn with_validator(mut self, validator: impl Validator<T> + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a scope whose operations run with the given data source overrides.
    pub fn using(&self, info: DataSourceInfo) -> DataSourceScope<'_, T, B> {
        DataSourceScope { repository: self, info }
    }

    /// Creates a new, unstaged entity with default values.
    pub fn create_entity(&self) -> T
    where
        T: Default,
    {
        T::default()
    }

    /// Validates and stages a new entity.
    ///
    /// # Returns
    ///
    /// The staged entity, carrying a negative id (or its own id when it was
    /// un-deleted).
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Validation`] if the entity breaks a rule.
    pub fn add_entity(&self, entity: T) -> RepositoryResult<Arc<T>> {
        self.add_entity_in(entity, &DataSourceInfo::default())
    }

    /// Validates every entity, then stages all of them atomically.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] for an empty batch and
    /// [`RepositoryError::Validation`] if any entity breaks a rule. Nothing is
    /// staged in either case.
    pub fn add_entities(&self, entities: Vec<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.add_entities_in(entities, &DataSourceInfo::default())
    }

    /// Validates and stages an update.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or a conflict if the entity is unknown,
    /// has id `0`, or is staged for deletion.
    pub fn update_entity(&self, entity: T) -> RepositoryResult<Arc<T>> {
        self.update_entity_in(entity, &DataSourceInfo::default())
    }

    /// Validates every entity, then stages all updates atomically.
    pub fn update_entities(&self, entities: Vec<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.update_entities_in(entities, &DataSourceInfo::default())
    }

    /// Stages a deletion, or cancels a staged addition when the id is negative.
    ///
    /// # Errors
    ///
    /// Deleting the same stored entity twice is an error, as is deleting an
    /// entity that exists neither among the additions nor in the store.
    pub fn delete_entity(&self, entity: &T) -> RepositoryResult<()> {
        self.delete_entity_in(entity, &DataSourceInfo::default())
    }

    /// Stages several deletions atomically.
    pub fn delete_entities(&self, entities: &[T]) -> RepositoryResult<()> {
        self.delete_entities_in(entities, &DataSourceInfo::default())
    }

    /// Applies every staged change to the data source.
    pub fn save_changes(&self) -> RepositoryResult<SaveReport> {
        self.save_changes_in(&DataSourceInfo::default())
    }

    /// Discards every staged change.
    pub fn reset(&self) {
        debug!("Discarding staged changes");
        self.backend.reset_core();
    }

    /// Returns every entity matching `spec`, sorted and capped as it specifies.
    ///
    /// Business rule specifications are executed by the backend instead of
    /// being compiled.
    pub fn find_all(&self, spec: &Specification<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.find_all_in(spec, &DataSourceInfo::default())
    }

    /// Returns every entity satisfying `predicate`.
    pub fn find_all_where<F>(&self, predicate: F) -> RepositoryResult<Vec<Arc<T>>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.backend
            .find_all_core(&Query::from_predicate(predicate), &DataSourceInfo::default())
    }

    /// Returns the first entity matching `spec` after sorting.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NoMatch`] if nothing matches.
    pub fn find_first(&self, spec: &Specification<T>) -> RepositoryResult<Arc<T>> {
        self.find_first_in(spec, &DataSourceInfo::default())?
            .ok_or(RepositoryError::NoMatch)
    }

    /// Returns the first entity satisfying `predicate`.
    pub fn find_first_where<F>(&self, predicate: F) -> RepositoryResult<Arc<T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.backend
            .find_first_core(&Query::from_predicate(predicate), &DataSourceInfo::default())?
            .ok_or(RepositoryError::NoMatch)
    }

    /// Returns the first entity matching `spec`, or `default` if nothing matches.
    pub fn find_first_or(&self, spec: &Specification<T>, default: impl Into<Arc<T>>) -> RepositoryResult<Arc<T>> {
        Ok(self
            .find_first_in(spec, &DataSourceInfo::default())?
            .unwrap_or_else(|| default.into()))
    }

    /// Returns the first entity satisfying `predicate`, or `default` if nothing does.
    pub fn find_first_where_or<F>(&self, predicate: F, default: impl Into<Arc<T>>) -> RepositoryResult<Arc<T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .find_first_core(&Query::from_predicate(predicate), &DataSourceInfo::default())?
            .unwrap_or_else(|| default.into()))
    }

    /// Returns the only entity matching `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NoMatch`] if nothing matches and
    /// [`RepositoryError::MultipleMatches`] if more than one entity does.
    pub fn find_single(&self, spec: &Specification<T>) -> RepositoryResult<Arc<T>> {
        self.find_single_in(spec, &DataSourceInfo::default())?
            .ok_or(RepositoryError::NoMatch)
    }

    /// Returns the only entity satisfying `predicate`.
    pub fn find_single_where<F>(&self, predicate: F) -> RepositoryResult<Arc<T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.backend
            .find_single_core(&Query::from_predicate(predicate), &DataSourceInfo::default())?
            .ok_or(RepositoryError::NoMatch)
    }

    /// Returns the only entity matching `spec`, or `default` if nothing matches.
    ///
    /// More than one match is still an error.
    pub fn find_single_or(&self, spec: &Specification<T>, default: impl Into<Arc<T>>) -> RepositoryResult<Arc<T>> {
        Ok(self
            .find_single_in(spec, &DataSourceInfo::default())?
            .unwrap_or_else(|| default.into()))
    }

    /// Returns the only entity satisfying `predicate`, or `default` if nothing does.
    ///
    /// More than one match is still an error.
    pub fn find_single_where_or<F>(&self, predicate: F, default: impl Into<Arc<T>>) -> RepositoryResult<Arc<T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .find_single_core(&Query::from_predicate(predicate), &DataSourceInfo::default())?
            .unwrap_or_else(|| default.into()))
    }

    /// Counts the entities matching `spec`, ignoring its result cap.
    pub fn count(&self, spec: &Specification<T>) -> RepositoryResult<usize> {
        let mut query = self.compile(spec)?;
        query.maximum_results = None;

        Ok(self.backend.find_all_core(&query, &DataSourceInfo::default())?.len())
    }

    /// Returns `true` if any entity matches `spec`.
    pub fn exists(&self, spec: &Specification<T>) -> RepositoryResult<bool> {
        Ok(self.find_first_in(spec, &DataSourceInfo::default())?.is_some())
    }

    /// Executes a business rule specification on the backend.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] if `spec` is not a business
    /// rule, and whatever the backend reports otherwise.
    pub fn execute_business_rule(&self, spec: &Specification<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.execute_business_rule_in(spec, &DataSourceInfo::default())
    }

    fn compile(&self, spec: &Specification<T>) -> RepositoryResult<Query<T>> {
        Query::from_specification(spec)
    }

    fn validate(&self, entity: &T) -> RepositoryResult<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };

        validator.validate_or_fail(entity).map_err(|err| {
            warn!(record_id = entity.record_id(), error = %err, "Entity failed validation");
            RepositoryError::Validation(err)
        })
    }

    fn validate_all(&self, entities: &[T]) -> RepositoryResult<()> {
        if entities.is_empty() {
            return Err(RepositoryError::InvalidArgument("entities must not be empty".to_string()));
        }

        entities
            .iter()
            .try_for_each(|entity| self.validate(entity))
    }

    fn add_entity_in(&self, entity: T, info: &DataSourceInfo) -> RepositoryResult<Arc<T>> {
        self.validate(&entity)?;
        self.backend.add_entity_core(entity, info)
    }

    fn add_entities_in(&self, entities: Vec<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
        self.validate_all(&entities)?;
        self.backend.add_entities_core(entities, info)
    }

    fn update_entity_in(&self, entity: T, info: &DataSourceInfo) -> RepositoryResult<Arc<T>> {
        self.validate(&entity)?;
        self.backend.update_entity_core(entity, info)
    }

    fn update_entities_in(&self, entities: Vec<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
        self.validate_all(&entities)?;
        self.backend.update_entities_core(entities, info)
    }

    fn delete_entity_in(&self, entity: &T, info: &DataSourceInfo) -> RepositoryResult<()> {
        self.backend.delete_entity_core(entity, info)
    }

    fn delete_entities_in(&self, entities: &[T], info: &DataSourceInfo) -> RepositoryResult<()> {
        if entities.is_empty() {
            return Err(RepositoryError::InvalidArgument("entities must not be empty".to_string()));
        }

        self.backend.delete_entities_core(entities, info)
    }

    fn save_changes_in(&self, info: &DataSourceInfo) -> RepositoryResult<SaveReport> {
        self.backend.save_changes_core(info)
    }

    fn find_all_in(&self, spec: &Specification<T>, info: &DataSourceInfo) -> RepositoryResult<Vec<Arc<T>>> {
        if let Some(rule) = spec.as_business_rule() {
            return self.backend.execute_business_rule_core(rule, info);
        }

        let query = self.compile(spec)?;
        debug!(?query, "Finding all entities");

        self.backend.find_all_core(&query, info)
    }

    fn find_first_in(&self, spec: &Specification<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>> {
        if let Some(rule) = spec.as_business_rule() {
            return Ok(self
                .backend
                .execute_business_rule_core(rule, info)?
                .into_iter()
                .next());
        }

        self.backend.find_first_core(&self.compile(spec)?, info)
    }

    fn find_single_in(&self, spec: &Specification<T>, info: &DataSourceInfo) -> RepositoryResult<Option<Arc<T>>> {
        if let Some(rule) = spec.as_business_rule() {
            let mut matched = self.backend.execute_business_rule_core(rule, info)?;

            return match matched.len() {
                0 | 1 => Ok(matched.pop()),
                count => Err(RepositoryError::MultipleMatches(count)),
            };
        }

        self.backend.find_single_core(&self.compile(spec)?, info)
    }

    fn execute_business_rule_in(
        &self,
        spec: &Specification<T>,
        info: &DataSourceInfo,
    ) -> RepositoryResult<Vec<Arc<T>>> {
        match spec.as_business_rule() {
            Some(rule) => self.backend.execute_business_rule_core(rule, info),
            None => Err(RepositoryError::InvalidArgument(
                "specification is not a business rule".to_string(),
            )),
        }
    }
}

impl<T: Entity, B: RepositoryBackend<T>> fmt::Debug for Repository<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("backend", &self.backend)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Repository operations bound to a [`DataSourceInfo`].
///
/// Obtained from [`Repository::using`]. Each operation behaves like its
/// counterpart on [`Repository`] but passes the scope's overrides to the backend,
/// for example to redirect a single save to a different store.
#[derive(Debug)]
pub struct DataSourceScope<'a, T: Entity, B: RepositoryBackend<T>> {
    repository: &'a Repository<T, B>,
    info: DataSourceInfo,
}

impl<'a, T: Entity, B: RepositoryBackend<T>> DataSourceScope<'a, T, B> {
    /// Returns the overrides of this scope.
    pub fn info(&self) -> &DataSourceInfo {
        &self.info
    }

    pub fn add_entity(&self, entity: T) -> RepositoryResult<Arc<T>> {
        self.repository.add_entity_in(entity, &self.info)
    }

    pub fn add_entities(&self, entities: Vec<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.repository.add_entities_in(entities, &self.info)
    }

    pub fn update_entity(&self, entity: T) -> RepositoryResult<Arc<T>> {
        self.repository.update_entity_in(entity, &self.info)
    }

    pub fn update_entities(&self, entities: Vec<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.repository.update_entities_in(entities, &self.info)
    }

    pub fn delete_entity(&self, entity: &T) -> RepositoryResult<()> {
        self.repository.delete_entity_in(entity, &self.info)
    }

    pub fn delete_entities(&self, entities: &[T]) -> RepositoryResult<()> {
        self.repository.delete_entities_in(entities, &self.info)
    }

    pub fn save_changes(&self) -> RepositoryResult<SaveReport> {
        self.repository.save_changes_in(&self.info)
    }

    pub fn find_all(&self, spec: &Specification<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.repository.find_all_in(spec, &self.info)
    }

    pub fn find_first(&self, spec: &Specification<T>) -> RepositoryResult<Arc<T>> {
        self.repository
            .find_first_in(spec, &self.info)?
            .ok_or(RepositoryError::NoMatch)
    }

    pub fn find_single(&self, spec: &Specification<T>) -> RepositoryResult<Arc<T>> {
        self.repository
            .find_single_in(spec, &self.info)?
            .ok_or(RepositoryError::NoMatch)
    }

    pub fn execute_business_rule(&self, spec: &Specification<T>) -> RepositoryResult<Vec<Arc<T>>> {
        self.repository.execute_business_rule_in(spec, &self.info)
    }
}
