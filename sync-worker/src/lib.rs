//! # sync-worker
//!
//! Caching background worker for offline-sync.
//!
//! This crate implements a local proxy that:
//! - Precaches a fixed manifest into a versioned cache bucket
//! - Serves pages and assets cache-first, API calls network-first
//! - Deletes stale buckets when a new version activates
//! - Tells open pages to drain their offline queues on background sync
//!
//! ## Architecture
//!
//! ```text
//! Page ──HTTP──┐                       ┌──► Network
//!              │                       │
//!          ┌───┴───────────────────────┴───┐
//!          │          sync-worker          │
//!          │  ┌─────────────────────────┐  │
//!          │  │ SQLite (cache buckets)  │  │
//!          │  └─────────────────────────┘  │
//!          └───────────────────────────────┘
//! ```
//!
//! ## Messages
//!
//! Pages post JSON messages to `/__worker/message`:
//! - `SKIP_WAITING` activates a waiting version
//! - `CACHE_URL` caches one more resource
//!
//! The worker broadcasts `SYNC_REQUESTED` to pages when the platform fires
//! the configured background-sync tag. Pages in other processes subscribe
//! to the broadcast as server-sent events at `/__worker/events`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod manager;
pub mod storage;

pub use config::{ConfigError, WorkerConfig};
pub use error::{CacheStoreError, WorkerError};
pub use fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, HttpFetcher, MockFetcher};
pub use manager::{CacheManager, WorkerStatus};
pub use storage::{CacheStorage, SqliteCacheStorage};
