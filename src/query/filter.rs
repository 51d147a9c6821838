//! Compilation of structured facets into the provider's filter syntax.
//!
//! The filter grammar is Solr-like:
//!
//! ```text
//! type:(wav OR aiff) tag:(rain OR storm) avg_rating:[3 TO 5] duration:[2 TO 5]
//! ```

use std::collections::BTreeSet;

use tracing::debug;

use super::QueryError;

/// Highest average rating the provider assigns.
const MAX_RATING: f64 = 5.0;

/// A closed numeric range whose bounds may be given in either order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    a: f64,
    b: f64,
}

impl ValueRange {
    /// Creates a range from two bounds in any order.
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Lower bound.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.a.min(self.b)
    }

    /// Upper bound.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.a.max(self.b)
    }

    fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite()
    }
}

impl From<(f64, f64)> for ValueRange {
    fn from((a, b): (f64, f64)) -> Self {
        Self::new(a, b)
    }
}

/// Structured filter inputs prior to compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterFacets {
    /// Accepted file types (`wav`, `aiff`, ...).
    pub file_types: BTreeSet<String>,
    /// Tags, any of which must match.
    pub tags: BTreeSet<String>,
    /// Duration in seconds.
    pub duration_range: Option<ValueRange>,
    /// Average user rating, 0 to 5.
    pub rating_range: Option<ValueRange>,
}

impl FilterFacets {
    /// Creates empty facets (compiles to no filter).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds accepted file types.
    #[must_use]
    pub fn with_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the duration range in seconds.
    #[must_use]
    pub fn with_duration_range(mut self, range: impl Into<ValueRange>) -> Self {
        self.duration_range = Some(range.into());
        self
    }

    /// Sets the average rating range.
    #[must_use]
    pub fn with_rating_range(mut self, range: impl Into<ValueRange>) -> Self {
        self.rating_range = Some(range.into());
        self
    }
}

/// Compiles facets into a single filter string.
///
/// Returns `Ok(None)` when every facet is empty. Range bounds are normalized
/// so `min TO max` holds regardless of the order they were supplied in.
///
/// # Errors
///
/// Returns [`QueryError::InvalidRange`] for non-finite bounds, negative
/// durations, or ratings outside `0..=5`.
///
/// # Example
///
/// ```
/// use soundgrab_core::query::{FilterFacets, compile_filter};
///
/// let facets = FilterFacets::new()
///     .with_file_types(["wav"])
///     .with_duration_range((5.0, 2.0));
/// let filter = compile_filter(&facets).unwrap();
/// assert_eq!(filter.as_deref(), Some("type:wav duration:[2 TO 5]"));
/// ```
pub fn compile_filter(facets: &FilterFacets) -> Result<Option<String>, QueryError> {
    let mut segments = Vec::new();

    if let Some(segment) = disjunction("type", &facets.file_types) {
        segments.push(segment);
    }
    if let Some(segment) = disjunction("tag", &facets.tags) {
        segments.push(segment);
    }
    if let Some(range) = facets.rating_range {
        validate_rating(range)?;
        segments.push(range_segment("avg_rating", range));
    }
    if let Some(range) = facets.duration_range {
        validate_duration(range)?;
        segments.push(range_segment("duration", range));
    }

    if segments.is_empty() {
        return Ok(None);
    }

    let filter = segments.join(" ");
    debug!(%filter, "compiled filter");
    Ok(Some(filter))
}

fn disjunction(field: &str, values: &BTreeSet<String>) -> Option<String> {
    let values: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    match values.as_slice() {
        [] => None,
        [single] => Some(format!("{field}:{single}")),
        many => Some(format!("{field}:({})", many.join(" OR "))),
    }
}

fn range_segment(field: &str, range: ValueRange) -> String {
    format!("{field}:[{} TO {}]", range.min(), range.max())
}

fn validate_duration(range: ValueRange) -> Result<(), QueryError> {
    if !range.is_finite() {
        return Err(QueryError::invalid_range(
            "duration",
            range.min(),
            range.max(),
            "bounds must be finite numbers",
        ));
    }
    if range.min() < 0.0 {
        return Err(QueryError::invalid_range(
            "duration",
            range.min(),
            range.max(),
            "duration cannot be negative",
        ));
    }
    Ok(())
}

fn validate_rating(range: ValueRange) -> Result<(), QueryError> {
    if !range.is_finite() {
        return Err(QueryError::invalid_range(
            "avg_rating",
            range.min(),
            range.max(),
            "bounds must be finite numbers",
        ));
    }
    if range.min() < 0.0 || range.max() > MAX_RATING {
        return Err(QueryError::invalid_range(
            "avg_rating",
            range.min(),
            range.max(),
            "rating must lie between 0 and 5",
        ));
    }
    Ok(())
}
