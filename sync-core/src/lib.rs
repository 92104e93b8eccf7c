//! # sync-core
//!
//! Pure logic for offline-sync (no I/O, instant tests).
//!
//! This crate implements the state machines and policies for the offline
//! queue and the caching worker without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (durable store, replay, cache) is performed by
//! `sync-client` and `sync-worker`, which interpret the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucket;
pub mod connectivity;
pub mod drain;
pub mod form;
pub mod lifecycle;
pub mod policy;

pub use bucket::{bucket_name, request_key, stale_buckets};
pub use connectivity::{Action, Connectivity, ConnectivityState, Event};
pub use drain::{is_ok_status, DrainReport};
pub use form::{FormEncoding, FormError};
pub use lifecycle::{LifecycleAction, LifecycleEvent, WorkerState};
pub use policy::{Route, ScopePolicy};
