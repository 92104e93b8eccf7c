//! Mock fetcher for testing.
//!
//! Allows scripting responses per URL and capturing fetched requests for
//! verification.

use super::{FetchError, FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock fetcher for testing.
///
/// Unscripted URLs answer 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    inner: Arc<Mutex<MockFetcherInner>>,
}

#[derive(Debug, Default)]
struct MockFetcherInner {
    requests: Vec<FetchRequest>,
    responses: HashMap<String, FetchResponse>,
    unreachable: HashSet<String>,
    offline: bool,
    delay: Option<Duration>,
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `url` with `response`.
    pub fn respond_with(&self, url: &str, response: FetchResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.unreachable.remove(url);
        inner.responses.insert(url.to_string(), response);
    }

    /// Fail requests for `url` with a network error.
    pub fn fail(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.unreachable.insert(url.to_string());
    }

    /// Fail every request with a network error.
    pub fn set_offline(&self, offline: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.offline = offline;
    }

    /// Wait this long before answering each request.
    pub fn set_delay(&self, delay: Option<Duration>) {
        let mut inner = self.inner.lock().unwrap();
        inner.delay = delay;
    }

    /// All requests received, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        let inner = self.inner.lock().unwrap();
        inner.requests.clone()
    }

    /// Number of requests received for `url`.
    pub fn requests_for(&self, url: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .requests
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.clear();
    }
}

impl Clone for MockFetcher {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(request.clone());
            inner.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.inner.lock().unwrap();
        let url = request.url.as_str();
        if inner.offline || inner.unreachable.contains(url) {
            return Err(FetchError::Network("connection refused".into()));
        }

        Ok(inner
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::new(404)))
    }
}
