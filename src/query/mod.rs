//! Search query construction.
//!
//! A [`Query`] is the immutable description of one search: free text, a
//! compiled filter (see [`compile_filter`]), the response fields, the sort
//! order and whether results are grouped by pack.
//!
//! # Example
//!
//! ```
//! use soundgrab_core::query::{FilterFacets, Query, SortOrder, compile_filter};
//!
//! let facets = FilterFacets::new().with_file_types(["wav"]).with_tags(["rain"]);
//! let query = Query::new(Some("thunder".to_string()), compile_filter(&facets).unwrap())
//!     .with_sort(SortOrder::DownloadsDesc);
//!
//! assert_eq!(query.filter(), Some("type:wav tag:rain"));
//! assert!(query.fields().iter().any(|f| f == "id"));
//! ```

mod error;
mod filter;

pub use error::QueryError;
pub use filter::{FilterFacets, ValueRange, compile_filter};

use std::fmt;
use std::str::FromStr;

/// Fields requested when the caller does not choose any.
pub const DEFAULT_FIELDS: [&str; 5] = ["id", "name", "avg_rating", "tags", "type"];

/// Fields every query carries because asset descriptors are built from them.
pub const REQUIRED_FIELDS: [&str; 4] = ["id", "name", "type", "pack"];

/// Result ordering understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Highest rated first.
    #[default]
    RatingDesc,
    /// Lowest rated first.
    RatingAsc,
    /// Most downloaded first.
    DownloadsDesc,
    /// Least downloaded first.
    DownloadsAsc,
    /// Longest first.
    DurationDesc,
    /// Shortest first.
    DurationAsc,
}

impl SortOrder {
    /// Every sort order, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::RatingDesc,
        Self::RatingAsc,
        Self::DownloadsDesc,
        Self::DownloadsAsc,
        Self::DurationDesc,
        Self::DurationAsc,
    ];

    /// Returns the provider's wire value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RatingDesc => "rating_desc",
            Self::RatingAsc => "rating_asc",
            Self::DownloadsDesc => "downloads_desc",
            Self::DownloadsAsc => "downloads_asc",
            Self::DurationDesc => "duration_desc",
            Self::DurationAsc => "duration_asc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|order| order.as_str() == wanted)
            .ok_or_else(|| QueryError::unknown_sort(s))
    }
}

/// An immutable search request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    text: Option<String>,
    filter: Option<String>,
    fields: Vec<String>,
    sort: SortOrder,
    group_by_pack: bool,
}

impl Query {
    /// Creates a query with default fields, rating-descending sort and no
    /// pack grouping. Blank text or filter strings are treated as absent.
    #[must_use]
    pub fn new(text: Option<String>, filter: Option<String>) -> Self {
        Self {
            text: non_blank(text),
            filter: non_blank(filter),
            fields: normalize_fields(DEFAULT_FIELDS.iter().copied()),
            sort: SortOrder::default(),
            group_by_pack: false,
        }
    }

    /// Replaces the requested fields; required fields are always kept.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<S> = fields.into_iter().collect();
        self.fields = normalize_fields(fields.iter().map(AsRef::as_ref));
        self
    }

    /// Sets the sort order.
    #[must_use]
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Sets whether results are grouped by pack.
    #[must_use]
    pub fn with_group_by_pack(mut self, group_by_pack: bool) -> Self {
        self.group_by_pack = group_by_pack;
        self
    }

    /// Free-text part of the query.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Compiled filter expression.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Response fields, in request order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Fields as the comma-separated list the provider expects.
    #[must_use]
    pub fn fields_param(&self) -> String {
        self.fields.join(",")
    }

    /// Sort order.
    #[must_use]
    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    /// Whether results are grouped by pack.
    #[must_use]
    pub fn group_by_pack(&self) -> bool {
        self.group_by_pack
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_fields<'a>(fields: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for field in fields.chain(REQUIRED_FIELDS.iter().copied()) {
        let field = field.trim();
        if !field.is_empty() && !out.iter().any(|f| f == field) {
            out.push(field.to_string());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let query = Query::new(None, None);
        assert_eq!(query.text(), None);
        assert_eq!(query.filter(), None);
        assert_eq!(query.sort(), SortOrder::RatingDesc);
        assert!(!query.group_by_pack());
        assert_eq!(query.fields_param(), "id,name,avg_rating,tags,type,pack");
    }

    #[test]
    fn test_blank_text_is_absent() {
        let query = Query::new(Some("   ".to_string()), Some(String::new()));
        assert_eq!(query.text(), None);
        assert_eq!(query.filter(), None);
    }

    #[test]
    fn test_with_fields_keeps_order_and_adds_required() {
        let query = Query::new(None, None).with_fields(["duration", "name", "duration"]);
        assert_eq!(query.fields_param(), "duration,name,id,type,pack");
    }

    #[test]
    fn test_sort_order_round_trips_through_str() {
        for order in SortOrder::ALL {
            assert_eq!(order.as_str().parse::<SortOrder>().unwrap(), order);
        }
    }

    #[test]
    fn test_sort_order_unknown_value() {
        let err = "newest".parse::<SortOrder>().unwrap_err();
        assert_eq!(err, QueryError::unknown_sort("newest"));
    }
}
