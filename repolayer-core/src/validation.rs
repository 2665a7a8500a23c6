//! Pluggable entity validation.
//!
//! Repositories run a configured [`Validator`] in its failing mode before any
//! mutation is staged, and wrap the resulting [`ValidationError`] into
//! [`RepositoryError::Validation`](crate::error::RepositoryError::Validation).

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single broken rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the broken rule, when the validator knows it.
    pub rule: Option<String>,
    /// Human readable description.
    pub message: String,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self { rule: None, message: message.into() }
    }

    pub fn for_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self { rule: Some(rule.into()), message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "{}: {}", rule, self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Raised by [`Validator::validate_or_fail`] when an entity breaks a rule.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", describe(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Returns the violations that caused this error.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

/// Validates entities before they are staged.
pub trait Validator<T>: Send + Sync {
    /// Returns every violation found on `entity`; empty when valid.
    fn validate(&self, entity: &T) -> Vec<Violation>;

    /// Fails on the first violation found on `entity`.
    fn validate_or_fail(&self, entity: &T) -> Result<(), ValidationError> {
        match self.validate(entity).into_iter().next() {
            Some(violation) => Err(ValidationError::new(vec![violation])),
            None => Ok(()),
        }
    }
}

impl<T, F> Validator<T> for F
where
    F: Fn(&T) -> Vec<Violation> + Send + Sync,
{
    fn validate(&self, entity: &T) -> Vec<Violation> {
        self(entity)
    }
}

type Check<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A validator assembled from named boolean rules.
///
/// # Example
///
/// ```ignore
/// let validator = RuleValidator::new()
///     .rule("name-required", |c: &Customer| !c.name.is_empty(), "name is required")
///     .rule("credit-limit", |c: &Customer| c.credit >= 0, "credit must not be negative");
/// ```
pub struct RuleValidator<T> {
    rules: Vec<(String, Check<T>, String)>,
}

impl<T> RuleValidator<T> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule; `check` returns `true` when the entity satisfies it.
    pub fn rule<F>(mut self, name: impl Into<String>, check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.rules.push((name.into(), Arc::new(check), message.into()));
        self
    }
}

impl<T> Default for RuleValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Validator<T> for RuleValidator<T> {
    fn validate(&self, entity: &T) -> Vec<Violation> {
        self.rules
            .iter()
            .filter(|(_, check, _)| !check(entity))
            .map(|(name, _, message)| Violation::for_rule(name.clone(), message.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;

    fn validator() -> RuleValidator<Item> {
        RuleValidator::new()
            .rule("name", |item: &Item| !item.name.is_empty(), "name is required")
            .rule("rank", |item: &Item| item.rank >= 0, "rank must not be negative")
    }

    #[test]
    fn collects_every_violation() {
        let violations = validator().validate(&Item::new(0, "", -1));

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].rule.as_deref(), Some("name"));
    }

    #[test]
    fn fails_on_first_violation() {
        let err = validator().validate_or_fail(&Item::new(0, "", -1)).unwrap_err();

        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.to_string(), "name: name is required");
        assert!(validator().validate_or_fail(&Item::new(0, "ok", 1)).is_ok());
    }

    #[test]
    fn closures_are_validators() {
        let check = |item: &Item| {
            if item.rank > 10 {
                vec![Violation::new("too high")]
            } else {
                Vec::new()
            }
        };

        assert!(check.validate_or_fail(&Item::new(1, "a", 11)).is_err());
        assert!(check.validate(&Item::new(1, "a", 1)).is_empty());
    }
}
