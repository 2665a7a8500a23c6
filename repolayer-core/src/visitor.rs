//! The visitor protocol that turns specification trees into executable filters.
//!
//! [`SpecificationVisitor`] has one method per node kind and a default
//! [`visit_specification`](SpecificationVisitor::visit_specification) that
//! dispatches on [`SpecificationKind`]. Business rules and custom specifications
//! are refused by default. [`PredicateCompiler`] is the visitor every repository
//! uses to build a [`Predicate`].

use std::sync::Arc;

use crate::{
    error::RepositoryError,
    specification::{BusinessRule, CustomSpecification, LikeSpecification, Predicate, Specification, SpecificationKind},
};

/// A visitor over specification trees.
///
/// Implementers provide one method per built-in node kind and usually recurse
/// into child nodes with [`Specification::visit`]. The default
/// [`visit_specification`](SpecificationVisitor::visit_specification) dispatches
/// on the node kind and should rarely need overriding.
///
/// # Example
///
/// ```ignore
/// let predicate = spec.visit(&mut PredicateCompiler::new())?;
/// ```
pub trait SpecificationVisitor<T> {
    /// The value produced for each visited node.
    type Output;
    /// The error raised when a node cannot be visited.
    type Error: From<RepositoryError> + Into<RepositoryError>;

    /// Visits a conjunction; both operands must match.
    fn visit_and(
        &mut self,
        left: &Specification<T>,
        right: &Specification<T>,
    ) -> Result<Self::Output, Self::Error>;

    /// Visits a disjunction; either operand may match.
    fn visit_or(
        &mut self,
        left: &Specification<T>,
        right: &Specification<T>,
    ) -> Result<Self::Output, Self::Error>;

    /// Visits a raw predicate.
    fn visit_lambda(&mut self, predicate: &Predicate<T>) -> Result<Self::Output, Self::Error>;

    /// Visits a negation of `inner`.
    fn visit_not(&mut self, inner: &Specification<T>) -> Result<Self::Output, Self::Error>;

    /// Visits a wildcard match on a string field.
    fn visit_like(&mut self, like: &LikeSpecification<T>) -> Result<Self::Output, Self::Error>;

    /// Business rules never convert to predicates.
    fn visit_business_rule(&mut self, rule: &BusinessRule) -> Result<Self::Output, Self::Error> {
        Err(RepositoryError::Unsupported(format!(
            "business rule {} cannot be converted to a predicate",
            rule.name()
        ))
        .into())
    }

    /// Catch-all for specification types this visitor does not know.
    fn visit_custom(
        &mut self,
        custom: &dyn CustomSpecification<T>,
    ) -> Result<Self::Output, Self::Error> {
        Err(RepositoryError::Unsupported(format!(
            "specification type {} is not supported",
            custom.type_name()
        ))
        .into())
    }

    fn visit_specification(
        &mut self,
        spec: &Specification<T>,
    ) -> Result<Self::Output, Self::Error> {
        match spec.kind() {
            SpecificationKind::And(left, right) => self.visit_and(left, right),
            SpecificationKind::Or(left, right) => self.visit_or(left, right),
            SpecificationKind::Lambda(predicate) => self.visit_lambda(predicate),
            SpecificationKind::Not(inner) => self.visit_not(inner),
            SpecificationKind::Like(like) => self.visit_like(like),
            SpecificationKind::BusinessRule(rule) => self.visit_business_rule(rule),
            SpecificationKind::Custom(custom) => self.visit_custom(&**custom),
        }
    }
}

/// Compiles specification trees into predicates.
///
/// Both operands of `and`/`or` are always compiled, so an unsupported node
/// anywhere in the tree fails compilation even if evaluation would have
/// short-circuited past it.
#[derive(Debug, Default)]
pub struct PredicateCompiler;

impl PredicateCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compiles `spec` into a predicate.
    pub fn compile<T: 'static>(spec: &Specification<T>) -> Result<Predicate<T>, RepositoryError> {
        spec.visit(&mut PredicateCompiler)
    }
}

impl<T: 'static> SpecificationVisitor<T> for PredicateCompiler {
    type Output = Predicate<T>;
    type Error = RepositoryError;

    fn visit_and(
        &mut self,
        left: &Specification<T>,
        right: &Specification<T>,
    ) -> Result<Self::Output, Self::Error> {
        let left = left.visit(self)?;
        let right = right.visit(self)?;

        Ok(Arc::new(move |item: &T| left(item) && right(item)))
    }

    fn visit_or(
        &mut self,
        left: &Specification<T>,
        right: &Specification<T>,
    ) -> Result<Self::Output, Self::Error> {
        let left = left.visit(self)?;
        let right = right.visit(self)?;

        Ok(Arc::new(move |item: &T| left(item) || right(item)))
    }

    fn visit_lambda(&mut self, predicate: &Predicate<T>) -> Result<Self::Output, Self::Error> {
        Ok(predicate.clone())
    }

    fn visit_not(&mut self, inner: &Specification<T>) -> Result<Self::Output, Self::Error> {
        let inner = inner.visit(self)?;

        Ok(Arc::new(move |item: &T| !inner(item)))
    }

    fn visit_like(&mut self, like: &LikeSpecification<T>) -> Result<Self::Output, Self::Error> {
        let regex = like.to_regex()?;
        let like = like.clone();

        Ok(Arc::new(move |item: &T| {
            like.value(item)
                .map(|value| regex.is_match(value))
                .unwrap_or(false)
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::entity::fixtures::Item;

    fn name_like(pattern: &str) -> Specification<Item> {
        Specification::<Item>::like("name", |item| Some(item.name.as_str()), pattern)
    }

    #[test]
    fn and_or_not_combine_predicates() {
        let high = Specification::<Item>::lambda(|item| item.rank > 5);
        let named = Specification::<Item>::lambda(|item| item.name == "a");

        let both = PredicateCompiler::compile(&high.clone().and(named.clone()).unwrap()).unwrap();
        let either = PredicateCompiler::compile(&high.clone().or(named.clone()).unwrap()).unwrap();
        let neither = PredicateCompiler::compile(&!high.or(named).unwrap()).unwrap();

        let item = Item::new(1, "a", 9);
        let low = Item::new(2, "a", 1);
        let other = Item::new(3, "b", 1);

        assert!(both(&item));
        assert!(!both(&low));
        assert!(either(&low));
        assert!(!either(&other));
        assert!(neither(&other));
        assert!(!neither(&item));
    }

    #[test]
    fn like_single_char_wildcard() {
        let predicate = PredicateCompiler::compile(&name_like("Ro?X")).unwrap();

        assert!(predicate(&Item::new(1, "RowX", 0)));
        assert!(predicate(&Item::new(1, "RoX", 0)));
        assert!(!predicate(&Item::new(1, "RoowX", 0)));
    }

    #[test]
    fn like_matches_substrings() {
        let predicate = PredicateCompiler::compile(&name_like("b*d")).unwrap();

        assert!(predicate(&Item::new(1, "abcde", 0)));
        assert!(predicate(&Item::new(1, "bd", 0)));
        assert!(!predicate(&Item::new(1, "db", 0)));
    }

    #[test]
    fn like_is_case_sensitive_unless_requested() {
        let sensitive = PredicateCompiler::compile(&name_like("alice")).unwrap();
        let insensitive = PredicateCompiler::compile(&Specification::<Item>::ilike(
            "name",
            |item| Some(item.name.as_str()),
            "alice",
        ))
        .unwrap();

        let item = Item::new(1, "Alice", 0);
        assert!(!sensitive(&item));
        assert!(insensitive(&item));
    }

    #[test]
    fn like_treats_regex_characters_literally() {
        let predicate = PredicateCompiler::compile(&name_like("a.c")).unwrap();

        assert!(predicate(&Item::new(1, "a.c", 0)));
        assert!(!predicate(&Item::new(1, "abc", 0)));
    }

    #[test]
    fn business_rule_cannot_be_compiled() {
        let Err(err) = PredicateCompiler::compile(&Specification::<Item>::business_rule("vip", Vec::<i32>::new())) else {
            panic!("business rule compiled");
        };

        assert!(matches!(err, RepositoryError::Unsupported(msg) if msg.contains("vip")));
    }

    #[test]
    fn negated_business_rule_fails_at_compile_time() {
        let spec = !Specification::<Item>::business_rule("vip", Vec::<i32>::new());

        assert!(PredicateCompiler::compile(&spec).is_err());
    }

    struct Nearby;

    impl CustomSpecification<Item> for Nearby {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn unknown_specification_names_its_type() {
        let Err(err) = PredicateCompiler::compile(&Specification::<Item>::custom(Nearby)) else {
            panic!("custom specification compiled");
        };

        assert!(matches!(err, RepositoryError::Unsupported(msg) if msg.contains("Nearby")));
    }
}
