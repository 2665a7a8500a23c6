//! Sort instructions carried by specifications.
//!
//! A [`SortRule`] pairs a key selector with a [`SortDirection`]. Key selectors
//! return a [`SortKey`], a small comparable value that normalizes the common
//! field types so rules over different fields can live in one list.

use std::{cmp::Ordering, fmt, sync::Arc};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Comparable representation of a sort field.
///
/// Integers and floats compare numerically with each other. `Null` sorts
/// before every other value, mirroring a missing field.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (integers and floats normalized to f64)
    Number(f64),
    /// String value
    String(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Null => 0,
            SortKey::Bool(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::String(_) => 3,
        }
    }

    /// Total order used for sorting; values of different kinds order by kind.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::String(a), SortKey::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<bool> for SortKey {
    fn from(value: bool) -> Self {
        SortKey::Bool(value)
    }
}

macro_rules! numeric_sort_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SortKey {
                fn from(value: $ty) -> Self {
                    SortKey::Number(value as f64)
                }
            }
        )*
    };
}

numeric_sort_key!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl From<&str> for SortKey {
    fn from(value: &str) -> Self {
        SortKey::String(value.to_string())
    }
}

impl From<String> for SortKey {
    fn from(value: String) -> Self {
        SortKey::String(value)
    }
}

impl From<&String> for SortKey {
    fn from(value: &String) -> Self {
        SortKey::String(value.clone())
    }
}

impl<V: Into<SortKey>> From<Option<V>> for SortKey {
    fn from(value: Option<V>) -> Self {
        value.map(Into::into).unwrap_or(SortKey::Null)
    }
}

/// Key selector used by a [`SortRule`].
pub type KeySelector<T> = Arc<dyn Fn(&T) -> SortKey + Send + Sync>;

/// A single sort instruction: key selector plus direction.
pub struct SortRule<T> {
    selector: KeySelector<T>,
    direction: SortDirection,
}

impl<T: 'static> SortRule<T> {
    /// Creates a sort rule from a key selector.
    pub fn new<F, K>(selector: F, direction: SortDirection) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortKey>,
    {
        Self {
            selector: Arc::new(move |item: &T| -> SortKey { selector(item).into() }),
            direction,
        }
    }
}

impl<T> SortRule<T> {
    /// Returns the direction of this rule.
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Extracts the sort key for `item`.
    pub fn key(&self, item: &T) -> SortKey {
        (self.selector)(item)
    }

    /// Compares two items under this rule, honouring its direction.
    pub fn compare(&self, left: &T, right: &T) -> Ordering {
        let ordering = self.key(left).compare(&self.key(right));

        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl<T> Clone for SortRule<T> {
    fn clone(&self) -> Self {
        Self {
            selector: self.selector.clone(),
            direction: self.direction,
        }
    }
}

impl<T> fmt::Debug for SortRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortRule")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

/// Compares two items by each rule in turn; later rules break ties of earlier ones.
pub fn compare_by_rules<T>(rules: &[SortRule<T>], left: &T, right: &T) -> Ordering {
    rules
        .iter()
        .map(|rule| rule.compare(left, right))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
