//! Replay transport for queued actions.
//!
//! This module provides a pluggable layer that turns a [`QueuedAction`]
//! back into exactly one outbound HTTP request (reqwest, mock for testing).
//!
//! # Design
//!
//! A replayer only executes the request and reports the status it got back.
//! Deciding what counts as success is the coordinator's job: any 2xx is a
//! success, every other status and every transport failure is retried on the
//! next drain.

mod http;
mod mock;

pub use http::HttpReplayer;
pub use mock::MockReplayer;

use async_trait::async_trait;
use offline_sync_types::{HttpMethod, QueuedAction};
use std::collections::BTreeMap;
use thiserror::Error;

/// Replay errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-ok status.
    #[error("server answered {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The queued URL could not be resolved.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl {
        /// The queued URL.
        url: String,
        /// Parse failure.
        reason: String,
    },
}

/// One outbound request reconstructed from a queued action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// URL as queued (absolute or relative to the backend base URL).
    pub url: String,
    /// Headers, including the default content type.
    pub headers: BTreeMap<String, String>,
    /// Encoded body.
    pub body: Vec<u8>,
}

impl ReplayRequest {
    /// Reconstruct the request a queued action stands for.
    pub fn from_action(action: &QueuedAction) -> Self {
        Self {
            method: action.method,
            url: action.url.clone(),
            headers: action.effective_headers(),
            body: action.body.clone(),
        }
    }
}

/// Trait for executing replayed requests.
#[async_trait]
pub trait Replayer: Send + Sync {
    /// Send the request once and return the response status.
    async fn execute(&self, request: &ReplayRequest) -> Result<u16, ReplayError>;
}
