//! Network fetch abstraction for the worker.
//!
//! The worker sees every request as a [`FetchRequest`] and answers with a
//! [`FetchResponse`], whether it came from the network or from a cache
//! bucket. Network access goes through the [`Fetcher`] trait (reqwest, mock
//! for testing).

mod http;
mod mock;

pub use http::{is_hop_by_hop, HttpFetcher};
pub use mock::MockFetcher;

use async_trait::async_trait;
use offline_sync_types::HttpMethod;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No response was received.
    #[error("network failure: {0}")]
    Network(String),
}

/// An outgoing request seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: Url,
    /// Request headers, names lowercased.
    pub headers: BTreeMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl FetchRequest {
    /// A bare GET.
    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// A request with no headers or body.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the `Accept` header, if any.
    pub fn accept(&self) -> Option<&str> {
        self.headers.get("accept").map(String::as_str)
    }
}

/// A response, live or cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// A response with the given status and nothing else.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// A 200 with a body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200).with_body(body)
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Check if the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        offline_sync_core::is_ok_status(self.status)
    }
}

/// Trait for network access.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request against the network.
    ///
    /// Any received response is `Ok`, whatever its status.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}
