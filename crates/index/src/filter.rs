//! Tag predicates used by [`crate::SeriesIndex::series_ids_by_filter`] and
//! its filter-combinator folds (spec.md §4.4).

use regex::Regex;

/// A single tag predicate. `Regex`/`NotRegex` carry a compiled pattern so
/// repeated evaluation (e.g. across measurements) doesn't recompile it.
#[derive(Debug, Clone)]
pub enum Filter {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Regex { key: String, pattern: Regex },
    NotRegex { key: String, pattern: Regex },
    Exists { key: String },
}

impl Filter {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::NotEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn regex(key: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Filter::Regex {
            key: key.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn not_regex(key: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Filter::NotRegex {
            key: key.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Filter::Exists { key: key.into() }
    }
}

/// How a list of filters combines into one series-ID set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Fold with `Intersect`.
    And,
    /// Fold with `Union`.
    Or,
}
