//! Error types for query construction and facet compilation.

use thiserror::Error;

/// Input-validation errors raised while building a search query.
///
/// These are always fatal: they are reported before any request is issued.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// A range facet has a bound that is not a usable number.
    #[error("invalid {facet} range [{min} TO {max}]: {reason}")]
    InvalidRange {
        /// Facet name as it appears in the filter (`duration`, `avg_rating`).
        facet: &'static str,
        /// Lower bound as supplied (after normalization).
        min: f64,
        /// Upper bound as supplied (after normalization).
        max: f64,
        /// Why the range was rejected.
        reason: &'static str,
    },

    /// A sort order string that the provider does not understand.
    #[error("unknown sort order '{value}'")]
    UnknownSort {
        /// The rejected value.
        value: String,
    },
}

impl QueryError {
    /// Creates an invalid range error.
    pub fn invalid_range(facet: &'static str, min: f64, max: f64, reason: &'static str) -> Self {
        Self::InvalidRange {
            facet,
            min,
            max,
            reason,
        }
    }

    /// Creates an unknown sort error.
    pub fn unknown_sort(value: impl Into<String>) -> Self {
        Self::UnknownSort {
            value: value.into(),
        }
    }
}
