//! HTTP client for the Freesound APIv2.
//!
//! Implements [`SearchBackend`] over `/search/text/` and [`AssetRetriever`]
//! over `/sounds/{id}/download/`, streaming bodies straight to disk.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::models::SearchResponse;
use super::{
    AssetDescriptor, AssetRetriever, CONNECT_TIMEOUT_SECS, DEFAULT_API_BASE, PageCursor,
    ProviderError, READ_TIMEOUT_SECS, SearchBackend, SearchPage,
};
use crate::auth::{AuthToken, parse_base};
use crate::query::Query;
use crate::user_agent;

/// Freesound APIv2 client.
///
/// Created once per run and shared; reqwest pools connections internally.
#[derive(Debug, Clone)]
pub struct FreesoundClient {
    client: Client,
    base_url: Url,
    token: AuthToken,
    page_size: u32,
}

impl FreesoundClient {
    /// Creates a client against the production API.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(token: AuthToken, page_size: u32) -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_API_BASE, token, page_size)
    }

    /// Creates a client against a custom API base.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidUrl`] for an unparseable base and
    /// [`ProviderError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(token))]
    pub fn with_base_url(
        base_url: &str,
        token: AuthToken,
        page_size: u32,
    ) -> Result<Self, ProviderError> {
        let base_url = parse_base(base_url).ok_or_else(|| ProviderError::invalid_url(base_url))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| ProviderError::ClientBuild { source })?;

        Ok(Self {
            client,
            base_url,
            token,
            page_size: page_size.max(1),
        })
    }

    /// Page size sent with every search.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Builds the first-page search URL for `query`.
    ///
    /// `query` and `filter` parameters are omitted when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidUrl`] if the endpoint cannot be joined.
    pub fn search_url(&self, query: &Query) -> Result<Url, ProviderError> {
        let mut url = self.endpoint("search/text/")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(text) = query.text() {
                pairs.append_pair("query", text);
            }
            if let Some(filter) = query.filter() {
                pairs.append_pair("filter", filter);
            }
            pairs
                .append_pair("fields", &query.fields_param())
                .append_pair("sort", query.sort().as_str())
                .append_pair(
                    "group_by_pack",
                    if query.group_by_pack() { "1" } else { "0" },
                )
                .append_pair("page_size", &self.page_size.to_string());
        }
        Ok(url)
    }

    /// Builds the download URL for an asset.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidUrl`] if the endpoint cannot be joined.
    pub fn download_url(&self, asset_id: u64) -> Result<Url, ProviderError> {
        self.endpoint(&format!("sounds/{asset_id}/download/"))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|_| ProviderError::invalid_url(format!("{}{path}", self.base_url)))
    }

    async fn send_request(&self, url: &Url) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .get(url.as_str())
            .header(AUTHORIZATION, self.token.authorization_header())
            .send()
            .await
            .map_err(|e| ProviderError::network(url.as_str(), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        if matches!(status_code, 401 | 403) {
            return Err(ProviderError::auth_rejected(url.as_str(), status_code));
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        Err(ProviderError::http_status_with_retry_after(
            url.as_str(),
            status_code,
            retry_after,
        ))
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_page(&self, url: &Url) -> Result<SearchPage, ProviderError> {
        let response = self.send_request(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::network(url.as_str(), e))?;
        let parsed: SearchResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::invalid_response(url.as_str(), e.to_string()))?;

        let next = match parsed.next {
            Some(next) => Some(self.validate_cursor(&next)?),
            None => None,
        };

        debug!(
            count = parsed.count,
            items = parsed.results.len(),
            has_next = next.is_some(),
            "search page received"
        );

        Ok(SearchPage {
            count: parsed.count,
            results: parsed
                .results
                .into_iter()
                .map(AssetDescriptor::from)
                .collect(),
            next,
        })
    }

    /// Continuations are followed with the token attached, so they must point
    /// back at the configured API host.
    fn validate_cursor(&self, next: &str) -> Result<PageCursor, ProviderError> {
        let url = Url::parse(next).map_err(|_| ProviderError::invalid_url(next))?;
        if url.host_str() != self.base_url.host_str() || url.port() != self.base_url.port() {
            return Err(ProviderError::invalid_response(
                self.base_url.as_str(),
                format!("continuation {next} points outside the API host"),
            ));
        }
        Ok(PageCursor::new(url))
    }
}

#[async_trait]
impl SearchBackend for FreesoundClient {
    async fn search(&self, query: &Query) -> Result<SearchPage, ProviderError> {
        let url = self.search_url(query)?;
        self.fetch_page(&url).await
    }

    async fn next_page(&self, cursor: &PageCursor) -> Result<SearchPage, ProviderError> {
        let url =
            Url::parse(cursor.as_str()).map_err(|_| ProviderError::invalid_url(cursor.as_str()))?;
        self.fetch_page(&url).await
    }
}

#[async_trait]
impl AssetRetriever for FreesoundClient {
    #[instrument(skip(self), fields(destination = %destination.display()))]
    async fn retrieve(&self, asset_id: u64, destination: &Path) -> Result<u64, ProviderError> {
        let url = self.download_url(asset_id)?;
        let response = self.send_request(&url).await?;

        let mut file = File::create(destination)
            .await
            .map_err(|e| ProviderError::io(destination, e))?;
        let bytes = stream_to_file(&mut file, response, url.as_str(), destination).await?;

        debug!(asset_id, bytes, "asset retrieved");
        Ok(bytes)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, ProviderError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| ProviderError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ProviderError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| ProviderError::io(file_path, e))?;

    Ok(bytes_written)
}
