//! # sync-client
//!
//! Page-side library for offline-sync.
//!
//! This is the library a page embeds so that user actions survive a lost
//! connection.
//!
//! ## Features
//!
//! - **Durable Queue**: SQLite-backed FIFO of pending requests
//! - **Connectivity Monitor**: Observable online/offline cell driven by sync-core
//! - **Drain Coordinator**: Replays queued requests in order, at-least-once
//! - **Form Interception**: Offline submissions are queued instead of lost
//! - **Replay Abstraction**: Pluggable replay layer (reqwest, mock)
//! - **Worker Channel**: Server-sent worker events and page→worker messages
//!
//! ## Example
//!
//! ```ignore
//! use offline_sync_client::{ClientConfig, PageRuntime, Submission, TracingPresenter};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::from_file("client.toml".as_ref())?;
//! let runtime = PageRuntime::from_config(&config, Arc::new(TracingPresenter))?;
//! let page = runtime.start().await?;
//!
//! // Offline: queued. Online: handed back for a normal submit.
//! let outcome = runtime
//!     .interceptor()
//!     .submit("record_payment", Submission::post("/payments/record").field("amount", "20"))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod interceptor;
pub mod monitor;
pub mod notify;
pub mod replay;
pub mod runtime;
pub mod store;
pub mod worker;

pub use config::{ClientConfig, ConfigError};
pub use coordinator::{ClientError, PageEvent, SyncCoordinator, SAVED_OFFLINE};
pub use interceptor::{FormInterceptor, Interception, Submission};
pub use monitor::ConnectivityMonitor;
pub use notify::{
    Notification, NotificationPresenter, RecordingPresenter, Severity, TracingPresenter,
};
pub use replay::{HttpReplayer, MockReplayer, ReplayError, ReplayRequest, Replayer};
pub use runtime::{forward_worker_messages, spawn_event_loop, PageRuntime, RunningPage};
pub use store::{MemoryQueueStore, QueueStore, SqliteQueueStore, StoreError, SCHEMA_VERSION};
pub use worker::{ChannelError, SseDecoder, WorkerChannel};
