//! Persistent queue store.
//!
//! Durable FIFO table of actions captured while offline.
//!
//! # Design
//!
//! The store trait is async and operation-oriented:
//! - `open()` lazily creates the table and indexes (idempotent)
//! - `append()` stamps and persists one action, returning its id
//! - `list()` returns every resident action in insertion order
//! - `remove()` deletes one action by id
//!
//! Each operation is atomic on its own. There is no transaction spanning a
//! `list()` and the `remove()` calls that follow it, so an interrupted drain
//! may replay an action twice (at-least-once delivery).

mod memory;
mod sqlite;

pub use memory::MemoryQueueStore;
pub use sqlite::{SqliteQueueStore, SCHEMA_VERSION};

use async_trait::async_trait;
use offline_sync_types::{ActionId, NewAction, QueuedAction};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Durable storage could not be opened.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the store could not be opened.
        reason: String,
    },

    /// Database error after the store was opened.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded.
    #[error("corrupt queued action {id}: {reason}")]
    Corrupt {
        /// Row id.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },
}

impl StoreError {
    /// Check if this is the storage-denied condition.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Trait for durable action queues.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Open the store, creating the schema if needed.
    ///
    /// Idempotent. Every other operation opens implicitly.
    async fn open(&self) -> Result<(), StoreError>;

    /// Persist a new action and return its store-assigned id.
    async fn append(&self, action: NewAction) -> Result<ActionId, StoreError>;

    /// All resident actions ordered by id ascending.
    async fn list(&self) -> Result<Vec<QueuedAction>, StoreError>;

    /// Delete an action.
    ///
    /// Returns `Ok(false)` if no action had this id; removing an absent id is
    /// not an error.
    async fn remove(&self, id: ActionId) -> Result<bool, StoreError>;

    /// Number of resident actions.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Current time in unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
