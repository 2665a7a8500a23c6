//! Compiled queries handed to repository backends.
//!
//! A [`Query`] is the executable form of a [`Specification`]: the compiled
//! predicate plus the sort rules, result cap and include paths read from the
//! root of the specification tree. Backends receive queries, never raw trees.

use std::{fmt, sync::Arc};

use crate::{
    error::RepositoryResult,
    sort::{SortRule, compare_by_rules},
    specification::{Predicate, Specification},
    visitor::PredicateCompiler,
};

/// An executable query over entities of type `T`.
///
/// Built from a [`Specification`] with [`Query::from_specification`] or from a
/// raw predicate with [`Query::from_predicate`]. [`Query::apply`] filters, then
/// stable-sorts, then caps.
pub struct Query<T> {
    /// Filter every returned entity satisfies.
    pub predicate: Predicate<T>,
    /// Sort rules applied after filtering, highest priority first.
    pub sort_rules: Vec<SortRule<T>>,
    /// Maximum number of results after sorting; `None` is unlimited.
    pub maximum_results: Option<usize>,
    /// Eager-loading hints, preserved for backends with relations.
    pub include_paths: Vec<String>,
}

impl<T: 'static> Query<T> {
    /// A query matching every entity, unsorted and unlimited.
    pub fn all() -> Self {
        Self::from_predicate(|_| true)
    }

    /// A query built from a raw predicate.
    pub fn from_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            sort_rules: Vec::new(),
            maximum_results: None,
            include_paths: Vec::new(),
        }
    }

    /// Compiles `spec` with the [`PredicateCompiler`].
    ///
    /// # Errors
    ///
    /// Fails if any node of the tree refuses predicate conversion.
    pub fn from_specification(spec: &Specification<T>) -> RepositoryResult<Self> {
        Ok(Self {
            predicate: PredicateCompiler::compile(spec)?,
            sort_rules: spec.sort_rules().to_vec(),
            maximum_results: spec.maximum_results(),
            include_paths: spec.include_paths().to_vec(),
        })
    }
}

impl<T> Query<T> {
    /// Returns `true` if `item` satisfies the predicate.
    pub fn matches(&self, item: &T) -> bool {
        (self.predicate)(item)
    }

    /// Filters, stable-sorts and caps `items`.
    ///
    /// Items that compare equal under every sort rule keep their input order.
    pub fn apply(&self, items: Vec<Arc<T>>) -> Vec<Arc<T>> {
        let mut matched = items
            .into_iter()
            .filter(|item| self.matches(item))
            .collect::<Vec<_>>();

        if !self.sort_rules.is_empty() {
            matched.sort_by(|left, right| compare_by_rules(&self.sort_rules, &**left, &**right));
        }

        match self.maximum_results {
            Some(maximum) => matched.into_iter().take(maximum).collect(),
            None => matched,
        }
    }

    /// Filters and sorts `items`, then returns the first match.
    pub fn first(&self, items: Vec<Arc<T>>) -> Option<Arc<T>> {
        let mut matched = items
            .into_iter()
            .filter(|item| self.matches(item))
            .collect::<Vec<_>>();

        if !self.sort_rules.is_empty() {
            matched.sort_by(|left, right| compare_by_rules(&self.sort_rules, &**left, &**right));
        }

        matched.into_iter().next()
    }

    /// Filters `items` without sorting or capping.
    pub fn filter(&self, items: Vec<Arc<T>>) -> Vec<Arc<T>> {
        items
            .into_iter()
            .filter(|item| self.matches(item))
            .collect()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            sort_rules: self.sort_rules.clone(),
            maximum_results: self.maximum_results,
            include_paths: self.include_paths.clone(),
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sort_rules", &self.sort_rules)
            .field("maximum_results", &self.maximum_results)
            .field("include_paths", &self.include_paths)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;

    fn items() -> Vec<Arc<Item>> {
        vec![
            Arc::new(Item::new(1, "c", 2)),
            Arc::new(Item::new(2, "a", 1)),
            Arc::new(Item::new(3, "b", 2)),
            Arc::new(Item::new(4, "d", 0)),
        ]
    }

    fn ids(items: &[Arc<Item>]) -> Vec<i64> {
        items.iter().map(|item| item.record_id).collect()
    }

    #[test]
    fn filter_sort_then_cap() {
        let spec = Specification::<Item>::lambda(|item| item.rank > 0)
            .order_by(|item| item.name.clone())
            .with_maximum_results(2);

        let query = Query::from_specification(&spec).unwrap();
        assert_eq!(ids(&query.apply(items())), vec![2, 3]);
    }

    #[test]
    fn zero_cap_returns_nothing() {
        let query = Query::from_specification(&Specification::<Item>::all().with_maximum_results(0)).unwrap();
        assert!(query.apply(items()).is_empty());
    }

    #[test]
    fn sort_is_stable_and_multi_key() {
        let spec = Specification::<Item>::all()
            .order_by_descending(|item| item.rank);
        let query = Query::from_specification(&spec).unwrap();
        assert_eq!(ids(&query.apply(items())), vec![1, 3, 2, 4]);

        let spec = Specification::<Item>::all()
            .order_by_descending(|item| item.rank)
            .order_by(|item| item.name.clone());
        let query = Query::from_specification(&spec).unwrap();
        assert_eq!(ids(&query.apply(items())), vec![3, 1, 2, 4]);
    }

    #[test]
    fn first_honours_sorting() {
        let spec = Specification::<Item>::all().order_by(|item| item.name.clone());
        let query = Query::from_specification(&spec).unwrap();

        assert_eq!(query.first(items()).map(|item| item.record_id), Some(2));
        assert!(Query::<Item>::from_predicate(|_| false).first(items()).is_none());
    }

    #[test]
    fn combined_caps_apply_to_the_whole_tree() {
        let spec = Specification::<Item>::lambda(|item| item.rank == 2)
            .with_maximum_results(1)
            .or(Specification::<Item>::lambda(|item| item.rank == 0))
            .unwrap();

        let query = Query::from_specification(&spec).unwrap();
        assert_eq!(ids(&query.apply(items())), vec![1]);
    }
}
