//! Lazy page-by-page traversal.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::SearchError;
use crate::provider::{AssetDescriptor, PageCursor, SearchBackend, SearchPage};
use crate::query::Query;
use crate::throttle::{RequestClass, ThrottleGovernor};

/// One page of results as handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage {
    /// Assets not produced by any earlier page, in provider order.
    pub items: Vec<AssetDescriptor>,
    /// Total number of results for the query.
    pub total_count: u64,
    /// Whether another page follows.
    pub has_next: bool,
}

#[derive(Debug)]
enum State {
    Fresh,
    Continue(PageCursor),
    Exhausted,
}

/// Finite, non-restartable sequence of result pages for one query.
///
/// Opening performs no I/O. Each [`advance`](Self::advance) performs exactly
/// one upstream request after throttle admission. Assets already produced
/// earlier in the run (by id) are dropped.
pub struct ResultPaginator {
    backend: Arc<dyn SearchBackend>,
    governor: Arc<ThrottleGovernor>,
    query: Query,
    page_size: u32,
    state: State,
    seen: HashSet<u64>,
    total_count: Option<u64>,
    pages_fetched: u32,
}

impl ResultPaginator {
    /// Prepares traversal of `query`; `page_size` is the provider's fixed
    /// page size and only feeds [`page_count`](Self::page_count).
    #[must_use]
    pub fn open(
        backend: Arc<dyn SearchBackend>,
        governor: Arc<ThrottleGovernor>,
        query: Query,
        page_size: u32,
    ) -> Self {
        Self {
            backend,
            governor,
            query,
            page_size: page_size.max(1),
            state: State::Fresh,
            seen: HashSet::new(),
            total_count: None,
            pages_fetched: 0,
        }
    }

    /// Fetches the next page, or `Ok(None)` once the sequence has ended.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Throttled`] when no slot is available within
    /// the wait bound and [`SearchError::Provider`] when the request fails.
    /// A failed request leaves the position unchanged.
    #[instrument(skip(self), fields(page = self.pages_fetched + 1))]
    pub async fn advance(&mut self) -> Result<Option<ResultPage>, SearchError> {
        if matches!(self.state, State::Exhausted) {
            return Ok(None);
        }

        self.governor.acquire(RequestClass::Search).await?;

        let page = match &self.state {
            State::Fresh => self.backend.search(&self.query).await?,
            State::Continue(cursor) => self.backend.next_page(cursor).await?,
            State::Exhausted => return Ok(None),
        };

        Ok(Some(self.accept(page)))
    }

    fn accept(&mut self, page: SearchPage) -> ResultPage {
        self.pages_fetched += 1;
        self.total_count = Some(page.count);

        let was_empty = page.results.is_empty();
        let mut items = Vec::with_capacity(page.results.len());
        for asset in page.results {
            if self.seen.insert(asset.id) {
                items.push(asset);
            } else {
                debug!(asset_id = asset.id, "dropping duplicate result");
            }
        }

        self.state = match page.next {
            Some(cursor) if !was_empty => State::Continue(cursor),
            _ => State::Exhausted,
        };
        let has_next = matches!(self.state, State::Continue(_));

        debug!(
            total = page.count,
            items = items.len(),
            has_next,
            "result page accepted"
        );

        ResultPage {
            items,
            total_count: page.count,
            has_next,
        }
    }

    /// Total result count, known after the first page.
    #[must_use]
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Number of pages the result set spans, known after the first page.
    #[must_use]
    pub fn page_count(&self) -> Option<u64> {
        self.total_count
            .map(|total| total.div_ceil(u64::from(self.page_size)))
    }

    /// Pages fetched so far.
    #[must_use]
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Returns whether the sequence has ended.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }
}

impl std::fmt::Debug for ResultPaginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultPaginator")
            .field("query", &self.query)
            .field("state", &self.state)
            .field("total_count", &self.total_count)
            .field("pages_fetched", &self.pages_fetched)
            .finish_non_exhaustive()
    }
}
