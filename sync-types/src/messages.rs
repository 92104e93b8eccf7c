//! Worker ↔ page message protocol.
//!
//! Messages are JSON objects tagged by a `type` discriminator. Every kind is
//! a variant of the closed [`WorkerMessage`] enum, so receivers dispatch with
//! an exhaustive `match`.

use serde::{Deserialize, Serialize};

use crate::SyncError;

/// All messages exchanged between the background worker and pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Page → worker: activate the waiting worker version now.
    SkipWaiting,
    /// Page → worker: pre-fetch one resource into the current cache bucket.
    CacheUrl {
        /// Resource to fetch.
        url: String,
    },
    /// Worker → page: a background sync fired, run a drain.
    SyncRequested {
        /// Tag of the background-sync registration that fired.
        tag: String,
    },
}

impl WorkerMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json).map_err(SyncError::Deserialization)
    }

    /// Whether the message is addressed to pages (as opposed to the worker).
    pub fn is_for_page(&self) -> bool {
        match self {
            Self::SyncRequested { .. } => true,
            Self::SkipWaiting | Self::CacheUrl { .. } => false,
        }
    }
}
