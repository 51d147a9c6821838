//! In-memory search backend, retriever and reporter for engine tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use soundgrab_core::provider::{PageCursor, ProviderError, SearchPage};
use soundgrab_core::{
    AssetDescriptor, AssetRetriever, BatchReport, DownloadOutcome, ProgressReporter, Query,
    SearchBackend,
};

/// Bytes every fake download writes.
pub const FAKE_BODY: &[u8] = b"RIFF0000WAVEfmt ";

/// Builds `count` descriptors with ids starting at 1000.
pub fn assets(count: u64) -> Vec<AssetDescriptor> {
    (0..count)
        .map(|i| AssetDescriptor::new(1000 + i, format!("Rain take {i}.wav"), "wav"))
        .collect()
}

/// Serves a fixed result set in pages of `page_size`.
pub struct PagedBackend {
    assets: Vec<AssetDescriptor>,
    page_size: usize,
    search_failures: Mutex<VecDeque<ProviderError>>,
    calls: AtomicUsize,
}

impl PagedBackend {
    pub fn new(assets: Vec<AssetDescriptor>, page_size: usize) -> Self {
        Self {
            assets,
            page_size: page_size.max(1),
            search_failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails the next search requests with `errors`, in order.
    pub fn failing_first(self, errors: Vec<ProviderError>) -> Self {
        *self.search_failures.lock().unwrap() = errors.into();
        self
    }

    /// Number of search and next-page requests served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn page(&self, index: usize) -> Result<SearchPage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.search_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let start = index * self.page_size;
        let end = (start + self.page_size).min(self.assets.len());
        let results = self.assets.get(start..end).unwrap_or_default().to_vec();
        let next = (end < self.assets.len()).then(|| PageCursor::new(format!("page:{}", index + 1)));
        Ok(SearchPage {
            count: self.assets.len() as u64,
            results,
            next,
        })
    }
}

#[async_trait]
impl SearchBackend for PagedBackend {
    async fn search(&self, _query: &Query) -> Result<SearchPage, ProviderError> {
        self.page(0)
    }

    async fn next_page(&self, cursor: &PageCursor) -> Result<SearchPage, ProviderError> {
        let index = cursor
            .as_str()
            .strip_prefix("page:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ProviderError::invalid_response(cursor.as_str(), "bad cursor"))?;
        self.page(index)
    }
}

/// Writes [`FAKE_BODY`] unless a failure is scripted for the asset.
#[derive(Default)]
pub struct ScriptedRetriever {
    failures: Mutex<HashMap<u64, VecDeque<ProviderError>>>,
    calls: AtomicUsize,
    cancel_after: Mutex<Option<(usize, Arc<AtomicBool>)>>,
    panics: Mutex<Vec<u64>>,
}

impl ScriptedRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next retrievals of `asset_id` with `errors`, in order.
    pub fn fail(self, asset_id: u64, errors: Vec<ProviderError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(asset_id, errors.into());
        self
    }

    /// Makes the retrieval task for `asset_id` panic.
    pub fn panic_on(self, asset_id: u64) -> Self {
        self.panics.lock().unwrap().push(asset_id);
        self
    }

    /// Sets `flag` once `calls` retrievals have happened.
    pub fn cancel_after(&self, calls: usize, flag: Arc<AtomicBool>) {
        *self.cancel_after.lock().unwrap() = Some((calls, flag));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetRetriever for ScriptedRetriever {
    async fn retrieve(&self, asset_id: u64, destination: &Path) -> Result<u64, ProviderError> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, flag)) = self.cancel_after.lock().unwrap().as_ref()
            && calls >= *after
        {
            flag.store(true, Ordering::SeqCst);
        }

        if self.panics.lock().unwrap().contains(&asset_id) {
            panic!("retrieval of asset {asset_id} blew up");
        }

        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&asset_id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        tokio::fs::write(destination, FAKE_BODY)
            .await
            .map_err(|e| ProviderError::io(destination, e))?;
        Ok(FAKE_BODY.len() as u64)
    }
}

/// Records every callback; answers the confirmation with `answer`.
pub struct RecordingReporter {
    pub answer: bool,
    pub confirmations: Vec<u64>,
    pub pages: Vec<(u64, u64)>,
    pub positions: Vec<u64>,
    pub reported_ids: Vec<u64>,
    pub finished: Option<BatchReport>,
}

impl RecordingReporter {
    pub fn accepting() -> Self {
        Self::answering(true)
    }

    pub fn declining() -> Self {
        Self::answering(false)
    }

    fn answering(answer: bool) -> Self {
        Self {
            answer,
            confirmations: Vec::new(),
            pages: Vec::new(),
            positions: Vec::new(),
            reported_ids: Vec::new(),
            finished: None,
        }
    }
}

impl ProgressReporter for RecordingReporter {
    fn confirm(&mut self, total_count: u64) -> bool {
        self.confirmations.push(total_count);
        self.answer
    }

    fn page(&mut self, page_number: u64, page_count: u64) {
        self.pages.push((page_number, page_count));
    }

    fn report(&mut self, outcome: &DownloadOutcome, position: u64, _total: u64) {
        self.positions.push(position);
        self.reported_ids.push(outcome.asset_id);
    }

    fn finish(&mut self, report: &BatchReport) {
        self.finished = Some(report.clone());
    }
}
