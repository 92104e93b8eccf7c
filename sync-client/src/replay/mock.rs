//! Mock replayer for testing.
//!
//! Allows scripting responses per URL and capturing sent requests for
//! verification.

use super::{ReplayError, ReplayRequest, Replayer};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock replayer for testing.
///
/// Every URL answers 200 unless scripted otherwise.
#[derive(Debug, Default)]
pub struct MockReplayer {
    inner: Arc<Mutex<MockReplayerInner>>,
}

#[derive(Debug, Default)]
struct MockReplayerInner {
    sent_requests: Vec<ReplayRequest>,
    statuses: HashMap<String, u16>,
    unreachable: HashSet<String>,
    offline: bool,
    delay: Option<Duration>,
}

impl MockReplayer {
    /// Create a new mock replayer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to `url` with `status`.
    pub fn respond_with(&self, url: &str, status: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.statuses.insert(url.to_string(), status);
    }

    /// Fail every request to `url` at the transport level.
    pub fn fail_transport(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.unreachable.insert(url.to_string());
    }

    /// Fail every request at the transport level.
    pub fn set_offline(&self, offline: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.offline = offline;
    }

    /// Wait this long before answering each request.
    pub fn set_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.delay = Some(delay);
    }

    /// Get all requests that were sent, in order.
    pub fn sent_requests(&self) -> Vec<ReplayRequest> {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.clone()
    }

    /// Number of requests sent to `url`.
    pub fn sent_to(&self, url: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.iter().filter(|r| r.url == url).count()
    }

    /// Clear all state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockReplayerInner::default();
    }
}

impl Clone for MockReplayer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Replayer for MockReplayer {
    async fn execute(&self, request: &ReplayRequest) -> Result<u16, ReplayError> {
        let delay = self.inner.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.sent_requests.push(request.clone());

        if inner.offline || inner.unreachable.contains(&request.url) {
            return Err(ReplayError::Transport("connection refused".into()));
        }

        Ok(inner.statuses.get(&request.url).copied().unwrap_or(200))
    }
}
