//! Composable query specifications.
//!
//! A [`Specification`] is a node in a boolean query tree. Every node carries the
//! same metadata: a maximum result count, an ordered list of [`SortRule`]s and a
//! list of include paths (eager-loading hints that backends without relations
//! simply preserve).
//!
//! # Building specifications
//!
//! ```ignore
//! use repolayer::specification::Specification;
//!
//! let spec = Specification::<Customer>::lambda(|c| c.active)
//!     .and(Specification::like("name", |c| Some(c.name.as_str()), "Ro*"))?
//!     .order_by(|c| c.name.clone())
//!     .with_maximum_results(10);
//! ```
//!
//! # Pending changes
//!
//! Bounds set on a node before it is combined are recorded as a pending change.
//! Combining with [`Specification::and`] or [`Specification::or`] drains the
//! pending changes of both operands and replays them onto the combined node, so a
//! cap or ordering set on either side applies to the whole combination. When both
//! operands carry a change of the same kind, the right-hand operand wins. Include
//! paths from both sides are kept.
//!
//! Business rule specifications cannot be turned into predicates, so they refuse
//! to be combined: `and`/`or` with a business rule on either side fails immediately.

use std::{any::Any, fmt, ops::Not, sync::Arc};

use regex::{Regex, RegexBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{RepositoryError, RepositoryResult},
    sort::{SortDirection, SortKey, SortRule},
    visitor::SpecificationVisitor,
};

/// Executable boolean filter over entities.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Accessor returning the string value a like specification matches against.
pub type FieldAccessor<T> = Arc<dyn Fn(&T) -> Option<&str> + Send + Sync>;

/// Wildcard match on a string field.
///
/// `*` matches any run of characters and `?` at most one character. Every other
/// character matches literally. The translated expression is not anchored, so
/// the pattern matches anywhere inside the field value.
pub struct LikeSpecification<T> {
    field: String,
    accessor: FieldAccessor<T>,
    pattern: String,
    case_sensitive: bool,
}

impl<T> LikeSpecification<T> {
    /// Returns the name of the matched field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the wildcard pattern as given.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if matching is case sensitive.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Reads the matched field from `item`.
    pub fn value<'a>(&self, item: &'a T) -> Option<&'a str> {
        (self.accessor)(item)
    }

    /// Compiles the wildcard pattern into a regular expression.
    pub fn to_regex(&self) -> RepositoryResult<Regex> {
        Ok(RegexBuilder::new(&wildcard_to_regex(&self.pattern))
            .case_insensitive(!self.case_sensitive)
            .build()?)
    }
}

impl<T> Clone for LikeSpecification<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            accessor: self.accessor.clone(),
            pattern: self.pattern.clone(),
            case_sensitive: self.case_sensitive,
        }
    }
}

/// Translates a wildcard pattern into regular expression source.
///
/// `*` becomes `.*`, `?` becomes `.?`, and everything else is escaped.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len() * 2);
    let mut literal = String::new();

    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '*' { ".*" } else { ".?" });
            },
            _ => literal.push(ch),
        }
    }

    source.push_str(&regex::escape(&literal));
    source
}

/// A named business rule with positional arguments.
///
/// Business rules are executed by backends that know them; they never compile
/// into predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRule {
    name: String,
    arguments: Vec<Value>,
}

impl BusinessRule {
    /// Returns the rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the positional arguments.
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Deserializes the argument at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] if there is no such argument and
    /// [`RepositoryError::Serialization`] if it does not deserialize into `V`.
    pub fn argument<V: DeserializeOwned>(&self, index: usize) -> RepositoryResult<V> {
        let value = self.arguments.get(index).ok_or_else(|| {
            RepositoryError::InvalidArgument(format!(
                "business rule {} has no argument at position {}",
                self.name, index
            ))
        })?;

        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Extension point for specification kinds this crate does not know.
///
/// Visitors reach custom specifications through
/// [`SpecificationVisitor::visit_custom`], whose default refuses them and names
/// the concrete type.
pub trait CustomSpecification<T>: Send + Sync {
    /// Returns the concrete type name, used in error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns `self` as `Any` so visitors can downcast to types they support.
    fn as_any(&self) -> &dyn Any;
}

/// The node kinds of a specification tree.
pub enum SpecificationKind<T> {
    /// A raw predicate.
    Lambda(Predicate<T>),
    /// A wildcard match on a string field.
    Like(LikeSpecification<T>),
    /// Logical negation of the inner specification.
    Not(Box<Specification<T>>),
    /// Both operands must match.
    And(Box<Specification<T>>, Box<Specification<T>>),
    /// Either operand must match.
    Or(Box<Specification<T>>, Box<Specification<T>>),
    /// A named business rule, executed by the backend.
    BusinessRule(BusinessRule),
    /// A user-defined specification.
    Custom(Arc<dyn CustomSpecification<T>>),
}

impl<T> SpecificationKind<T> {
    /// Short name of the node kind.
    pub fn name(&self) -> &'static str {
        match self {
            SpecificationKind::Lambda(_) => "Lambda",
            SpecificationKind::Like(_) => "Like",
            SpecificationKind::Not(_) => "Not",
            SpecificationKind::And(..) => "And",
            SpecificationKind::Or(..) => "Or",
            SpecificationKind::BusinessRule(_) => "BusinessRule",
            SpecificationKind::Custom(_) => "Custom",
        }
    }
}

impl<T> Clone for SpecificationKind<T> {
    fn clone(&self) -> Self {
        match self {
            SpecificationKind::Lambda(predicate) => SpecificationKind::Lambda(predicate.clone()),
            SpecificationKind::Like(like) => SpecificationKind::Like(like.clone()),
            SpecificationKind::Not(inner) => SpecificationKind::Not(inner.clone()),
            SpecificationKind::And(left, right) => SpecificationKind::And(left.clone(), right.clone()),
            SpecificationKind::Or(left, right) => SpecificationKind::Or(left.clone(), right.clone()),
            SpecificationKind::BusinessRule(rule) => SpecificationKind::BusinessRule(rule.clone()),
            SpecificationKind::Custom(custom) => SpecificationKind::Custom(custom.clone()),
        }
    }
}

/// Bound changes recorded on a node and not yet replayed onto a combination.
pub struct PendingChanges<T> {
    maximum_results: Option<Option<usize>>,
    sort_rules: Option<Vec<SortRule<T>>>,
    include_paths: Vec<String>,
}

impl<T> PendingChanges<T> {
    fn new() -> Self {
        Self {
            maximum_results: None,
            sort_rules: None,
            include_paths: Vec::new(),
        }
    }

    /// Returns `true` when nothing is waiting to be replayed.
    pub fn is_empty(&self) -> bool {
        self.maximum_results.is_none() && self.sort_rules.is_none() && self.include_paths.is_empty()
    }

    /// The pending maximum-results change, if any (`Some(None)` clears the cap).
    pub fn maximum_results(&self) -> Option<Option<usize>> {
        self.maximum_results
    }

    /// The pending sort-rule change, if any.
    pub fn sort_rules(&self) -> Option<&[SortRule<T>]> {
        self.sort_rules.as_deref()
    }

    /// Include paths added since the last replay.
    pub fn include_paths(&self) -> &[String] {
        &self.include_paths
    }

    // Right-hand changes win over left-hand ones of the same kind.
    fn merge(mut self, right: PendingChanges<T>) -> Self {
        if right.maximum_results.is_some() {
            self.maximum_results = right.maximum_results;
        }
        if right.sort_rules.is_some() {
            self.sort_rules = right.sort_rules;
        }
        for path in right.include_paths {
            if !self.include_paths.contains(&path) {
                self.include_paths.push(path);
            }
        }
        self
    }
}

impl<T> Clone for PendingChanges<T> {
    fn clone(&self) -> Self {
        Self {
            maximum_results: self.maximum_results,
            sort_rules: self.sort_rules.clone(),
            include_paths: self.include_paths.clone(),
        }
    }
}

/// A composable query node with filter, ordering and result-limit intent.
pub struct Specification<T> {
    kind: SpecificationKind<T>,
    maximum_results: Option<usize>,
    sort_rules: Vec<SortRule<T>>,
    include_paths: Vec<String>,
    pending: PendingChanges<T>,
}

impl<T: 'static> Specification<T> {
    fn from_kind(kind: SpecificationKind<T>) -> Self {
        Self {
            kind,
            maximum_results: None,
            sort_rules: Vec::new(),
            include_paths: Vec::new(),
            pending: PendingChanges::new(),
        }
    }

    /// Matches every entity.
    pub fn all() -> Self {
        Self::lambda(|_| true)
    }

    /// Matches no entity.
    pub fn none() -> Self {
        Self::lambda(|_| false)
    }

    /// Wraps a raw predicate.
    pub fn lambda<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_kind(SpecificationKind::Lambda(Arc::new(predicate)))
    }

    /// Case-sensitive wildcard match of `pattern` against the field read by `accessor`.
    ///
    /// # Arguments
    ///
    /// * `field` - The field name, used for diagnostics and by backends that query by name
    /// * `accessor` - Reads the field value; `None` never matches
    /// * `pattern` - Wildcard pattern where `*` is any run and `?` at most one character
    pub fn like<F>(field: impl Into<String>, accessor: F, pattern: impl Into<String>) -> Self
    where
        F: Fn(&T) -> Option<&str> + Send + Sync + 'static,
    {
        Self::like_with_case(field, accessor, pattern, true)
    }

    /// Case-insensitive variant of [`Specification::like`].
    pub fn ilike<F>(field: impl Into<String>, accessor: F, pattern: impl Into<String>) -> Self
    where
        F: Fn(&T) -> Option<&str> + Send + Sync + 'static,
    {
        Self::like_with_case(field, accessor, pattern, false)
    }

    fn like_with_case<F>(
        field: impl Into<String>,
        accessor: F,
        pattern: impl Into<String>,
        case_sensitive: bool,
    ) -> Self
    where
        F: Fn(&T) -> Option<&str> + Send + Sync + 'static,
    {
        Self::from_kind(SpecificationKind::Like(LikeSpecification {
            field: field.into(),
            accessor: Arc::new(accessor),
            pattern: pattern.into(),
            case_sensitive,
        }))
    }

    /// Negates a specification.
    ///
    /// Pending changes of `inner` move to the new root, so a cap or sort order
    /// set before negating still applies.
    pub fn negate(mut inner: Specification<T>) -> Self {
        let pending = inner.take_pending();
        let mut negated = Self::from_kind(SpecificationKind::Not(Box::new(inner)));
        negated.replay(pending);

        negated
    }

    /// Negates a raw predicate.
    pub fn not_lambda<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::negate(Self::lambda(predicate))
    }

    /// Creates a named business rule with positional arguments.
    pub fn business_rule<I, V>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_kind(SpecificationKind::BusinessRule(BusinessRule {
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }))
    }

    /// Wraps a user-defined specification.
    pub fn custom(custom: impl CustomSpecification<T> + 'static) -> Self {
        Self::from_kind(SpecificationKind::Custom(Arc::new(custom)))
    }

    /// Combines with `other` so that both must match.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unsupported`] if either side is a business rule.
    pub fn and(self, other: Specification<T>) -> RepositoryResult<Self> {
        Self::combine(self, other, SpecificationKind::And)
    }

    /// Combines with `other` so that either may match.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unsupported`] if either side is a business rule.
    pub fn or(self, other: Specification<T>) -> RepositoryResult<Self> {
        Self::combine(self, other, SpecificationKind::Or)
    }

    fn combine(
        mut left: Specification<T>,
        mut right: Specification<T>,
        node: fn(Box<Specification<T>>, Box<Specification<T>>) -> SpecificationKind<T>,
    ) -> RepositoryResult<Self> {
        if let Some(rule) = left.wrapped_business_rule().or_else(|| right.wrapped_business_rule()) {
            return Err(RepositoryError::Unsupported(format!(
                "business rule {} cannot be combined with other specifications",
                rule.name()
            )));
        }

        let pending = left.take_pending().merge(right.take_pending());
        let mut combined = Self::from_kind(node(Box::new(left), Box::new(right)));
        combined.replay(pending);

        Ok(combined)
    }

    fn take_pending(&mut self) -> PendingChanges<T> {
        std::mem::replace(&mut self.pending, PendingChanges::new())
    }

    // Applies drained operand changes and keeps them pending for the next combination.
    fn replay(&mut self, pending: PendingChanges<T>) {
        if let Some(maximum_results) = pending.maximum_results {
            self.maximum_results = maximum_results;
        }
        if let Some(rules) = &pending.sort_rules {
            self.sort_rules = rules.clone();
        }
        for path in &pending.include_paths {
            if !self.include_paths.contains(path) {
                self.include_paths.push(path.clone());
            }
        }
        self.pending = pending;
    }

    /// Sets the maximum number of results; `None` means unlimited.
    pub fn set_maximum_results(&mut self, maximum_results: Option<usize>) {
        self.maximum_results = maximum_results;
        self.pending.maximum_results = Some(maximum_results);
    }

    /// Replaces the sort rules.
    pub fn set_sort_rules(&mut self, rules: Vec<SortRule<T>>) {
        self.sort_rules = rules.clone();
        self.pending.sort_rules = Some(rules);
    }

    /// Adds an include path.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] if `path` is blank.
    pub fn add_include_path(&mut self, path: impl Into<String>) -> RepositoryResult<()> {
        let path = path.into();

        if path.trim().is_empty() {
            return Err(RepositoryError::InvalidArgument("include path must not be empty".to_string()));
        }

        if !self.include_paths.contains(&path) {
            self.include_paths.push(path.clone());
            self.pending.include_paths.push(path);
        }

        Ok(())
    }

    /// Builder form of [`Specification::set_maximum_results`] with a finite cap.
    pub fn with_maximum_results(mut self, maximum_results: usize) -> Self {
        self.set_maximum_results(Some(maximum_results));
        self
    }

    /// Appends an ascending sort rule.
    ///
    /// Repeated calls add secondary keys that break ties of earlier ones.
    pub fn order_by<F, K>(self, selector: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortKey>,
    {
        self.push_sort_rule(SortRule::new(selector, SortDirection::Asc))
    }

    /// Appends a descending sort rule.
    pub fn order_by_descending<F, K>(self, selector: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortKey>,
    {
        self.push_sort_rule(SortRule::new(selector, SortDirection::Desc))
    }

    fn push_sort_rule(mut self, rule: SortRule<T>) -> Self {
        let mut rules = self.sort_rules.clone();
        rules.push(rule);
        self.set_sort_rules(rules);
        self
    }

    /// Builder form of [`Specification::add_include_path`].
    pub fn include(mut self, path: impl Into<String>) -> RepositoryResult<Self> {
        self.add_include_path(path)?;
        Ok(self)
    }
}

impl<T> Specification<T> {
    /// Returns the node kind.
    pub fn kind(&self) -> &SpecificationKind<T> {
        &self.kind
    }

    /// Returns the maximum number of results, `None` meaning unlimited.
    pub fn maximum_results(&self) -> Option<usize> {
        self.maximum_results
    }

    /// Returns the sort rules in priority order.
    pub fn sort_rules(&self) -> &[SortRule<T>] {
        &self.sort_rules
    }

    /// Returns the include paths.
    pub fn include_paths(&self) -> &[String] {
        &self.include_paths
    }

    /// Returns the changes that the next combination will replay.
    pub fn pending_changes(&self) -> &PendingChanges<T> {
        &self.pending
    }

    /// Returns the business rule if this node is one.
    pub fn as_business_rule(&self) -> Option<&BusinessRule> {
        match &self.kind {
            SpecificationKind::BusinessRule(rule) => Some(rule),
            _ => None,
        }
    }

    /// Returns the business rule of this node or of the node under its `Not` wrappers.
    fn wrapped_business_rule(&self) -> Option<&BusinessRule> {
        match &self.kind {
            SpecificationKind::BusinessRule(rule) => Some(rule),
            SpecificationKind::Not(inner) => inner.wrapped_business_rule(),
            _ => None,
        }
    }

    /// Dispatches this specification to `visitor`.
    pub fn visit<V>(&self, visitor: &mut V) -> Result<V::Output, V::Error>
    where
        V: SpecificationVisitor<T> + ?Sized,
    {
        visitor.visit_specification(self)
    }
}

impl<T: 'static> Not for Specification<T> {
    type Output = Specification<T>;

    fn not(self) -> Self::Output {
        Specification::negate(self)
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            maximum_results: self.maximum_results,
            sort_rules: self.sort_rules.clone(),
            include_paths: self.include_paths.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.kind.name());

        match &self.kind {
            SpecificationKind::Like(like) => {
                debug.field("field", &like.field).field("pattern", &like.pattern);
            },
            SpecificationKind::Not(inner) => {
                debug.field("inner", inner);
            },
            SpecificationKind::And(left, right) | SpecificationKind::Or(left, right) => {
                debug.field("left", left).field("right", right);
            },
            SpecificationKind::BusinessRule(rule) => {
                debug.field("name", &rule.name).field("arguments", &rule.arguments);
            },
            SpecificationKind::Custom(custom) => {
                debug.field("type", &custom.type_name());
            },
            SpecificationKind::Lambda(_) => {},
        }

        debug
            .field("maximum_results", &self.maximum_results)
            .field("sort_rules", &self.sort_rules.len())
            .field("include_paths", &self.include_paths)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;

    #[test]
    fn wildcard_translation_escapes_literals() {
        assert_eq!(wildcard_to_regex("Ro?X"), "Ro.?X");
        assert_eq!(wildcard_to_regex("a*b"), "a.*b");
        assert_eq!(wildcard_to_regex("1+1=?"), r"1\+1=.?");
        assert_eq!(wildcard_to_regex(""), "");
    }

    #[test]
    fn business_rule_refuses_combination() {
        let rule = Specification::<Item>::business_rule("overdue", [30]);

        let err = Specification::all().and(rule.clone()).unwrap_err();
        assert!(matches!(err, RepositoryError::Unsupported(_)));

        let err = rule.or(Specification::all()).unwrap_err();
        assert!(matches!(err, RepositoryError::Unsupported(_)));
    }

    #[test]
    fn business_rule_arguments_deserialize() {
        let spec = Specification::<Item>::business_rule("between", [1, 9]);
        let rule = spec.as_business_rule().unwrap();

        assert_eq!(rule.name(), "between");
        assert_eq!(rule.argument::<i64>(1).unwrap(), 9);
        assert!(matches!(rule.argument::<i64>(2), Err(RepositoryError::InvalidArgument(_))));
        assert!(matches!(rule.argument::<String>(0), Err(RepositoryError::Serialization(_))));
    }

    #[test]
    fn bounds_set_before_combination_are_replayed() {
        let left = Specification::<Item>::all().with_maximum_results(2);
        let right = Specification::<Item>::all().order_by(|item| item.rank);

        let combined = left.and(right).unwrap();

        assert_eq!(combined.maximum_results(), Some(2));
        assert_eq!(combined.sort_rules().len(), 1);

        match combined.kind() {
            SpecificationKind::And(left, right) => {
                assert!(left.pending_changes().is_empty());
                assert!(right.pending_changes().is_empty());
            },
            other => panic!("unexpected node {}", other.name()),
        }
    }

    #[test]
    fn right_operand_wins_on_conflicting_caps() {
        let left = Specification::<Item>::all().with_maximum_results(5);
        let right = Specification::<Item>::none().with_maximum_results(1);

        let combined = left.or(right).unwrap();
        assert_eq!(combined.maximum_results(), Some(1));
    }

    #[test]
    fn bounds_propagate_through_nested_combinations() {
        let inner = Specification::<Item>::all()
            .include("orders")
            .unwrap()
            .and(Specification::all().with_maximum_results(3))
            .unwrap();

        let outer = Specification::none().or(inner).unwrap();

        assert_eq!(outer.maximum_results(), Some(3));
        assert_eq!(outer.include_paths(), ["orders".to_string()]);
    }

    #[test]
    fn bounds_on_combined_node_apply_directly() {
        let mut combined = Specification::<Item>::all().and(Specification::all()).unwrap();
        combined.set_maximum_results(Some(0));

        assert_eq!(combined.maximum_results(), Some(0));
    }

    #[test]
    fn negation_keeps_bounds_of_the_inner_node() {
        let negated = !Specification::<Item>::lambda(|item| item.rank > 5)
            .with_maximum_results(1)
            .order_by_descending(|item| item.rank)
            .include("orders")
            .unwrap();

        assert_eq!(negated.maximum_results(), Some(1));
        assert_eq!(negated.sort_rules().len(), 1);
        assert_eq!(negated.include_paths(), ["orders".to_string()]);

        let combined = Specification::all().and(negated).unwrap();
        assert_eq!(combined.maximum_results(), Some(1));
        assert_eq!(combined.sort_rules().len(), 1);
    }

    #[test]
    fn negated_business_rule_refuses_combination() {
        let rule = !!Specification::<Item>::business_rule("overdue", [30]);

        let err = rule.clone().and(Specification::all()).unwrap_err();
        assert!(matches!(err, RepositoryError::Unsupported(_)));

        let err = Specification::all().or(rule).unwrap_err();
        assert!(matches!(err, RepositoryError::Unsupported(_)));
    }

    #[test]
    fn blank_include_path_is_rejected() {
        let err = Specification::<Item>::all().include("  ").unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidArgument(_)));
    }

    #[test]
    fn debug_names_node_kinds() {
        let spec = !Specification::<Item>::like("name", |item| Some(item.name.as_str()), "a*");
        let rendered = format!("{:?}", spec);

        assert!(rendered.starts_with("Not"));
        assert!(rendered.contains("Like"));
        assert!(rendered.contains("a*"));
    }
}
