//! Asset descriptors, search pages and their wire representation.

use serde::{Deserialize, Serialize};

/// One downloadable asset from a result page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Provider id, unique per asset.
    pub id: u64,
    /// Name as shown on the provider.
    pub display_name: String,
    /// File extension without the dot (`wav`, `flac`, ...).
    pub extension: String,
    /// Pack the asset belongs to, if any.
    pub pack_id: Option<u64>,
}

impl AssetDescriptor {
    /// Creates a descriptor without a pack.
    pub fn new(id: u64, display_name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            extension: extension.into(),
            pack_id: None,
        }
    }

    /// Sets the pack id.
    #[must_use]
    pub fn with_pack(mut self, pack_id: u64) -> Self {
        self.pack_id = Some(pack_id);
        self
    }
}

/// Opaque continuation handle for the next page of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(String);

impl PageCursor {
    /// Wraps a continuation value (the provider's `next` URL).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw continuation value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page as returned by the search primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Total number of results for the whole query.
    pub count: u64,
    /// Assets on this page, in provider order.
    pub results: Vec<AssetDescriptor>,
    /// Continuation for the following page, absent on the last page.
    pub next: Option<PageCursor>,
}

/// Search response body (`/search/text/`).
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub(crate) count: u64,
    #[serde(default)]
    pub(crate) next: Option<String>,
    #[serde(default)]
    pub(crate) results: Vec<SoundRecord>,
}

/// One sound in a search response. Extra requested fields are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct SoundRecord {
    pub(crate) id: u64,
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) file_type: String,
    #[serde(default)]
    pub(crate) pack: Option<String>,
}

impl From<SoundRecord> for AssetDescriptor {
    fn from(record: SoundRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.name,
            extension: record.file_type,
            pack_id: record.pack.as_deref().and_then(pack_id_from_uri),
        }
    }
}

/// Extracts the numeric pack id from a pack URI such as
/// `https://freesound.org/apiv2/packs/9876/`.
pub(crate) fn pack_id_from_uri(uri: &str) -> Option<u64> {
    uri.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_id_from_uri() {
        assert_eq!(
            pack_id_from_uri("https://freesound.org/apiv2/packs/9876/"),
            Some(9876)
        );
        assert_eq!(pack_id_from_uri("https://freesound.org/apiv2/packs/12"), Some(12));
        assert_eq!(pack_id_from_uri("not-a-pack"), None);
        assert_eq!(pack_id_from_uri(""), None);
    }

    #[test]
    fn test_search_response_deserializes_into_descriptors() {
        let body = serde_json::json!({
            "count": 2,
            "next": "https://freesound.org/apiv2/search/text/?page=2",
            "previous": null,
            "results": [
                {"id": 1, "name": "Rain - Heavy.wav", "type": "wav", "avg_rating": 4.5,
                 "tags": ["rain"], "pack": "https://freesound.org/apiv2/packs/7/"},
                {"id": 2, "name": "Wind", "type": "flac", "pack": null}
            ]
        });
        let response: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.count, 2);
        assert!(response.next.is_some());

        let assets: Vec<AssetDescriptor> =
            response.results.into_iter().map(AssetDescriptor::from).collect();
        assert_eq!(
            assets,
            vec![
                AssetDescriptor::new(1, "Rain - Heavy.wav", "wav").with_pack(7),
                AssetDescriptor::new(2, "Wind", "flac"),
            ]
        );
    }

    #[test]
    fn test_missing_required_field_fails() {
        let body = serde_json::json!({"count": 1, "results": [{"id": 1, "name": "x"}]});
        assert!(serde_json::from_value::<SearchResponse>(body).is_err());
    }
}
