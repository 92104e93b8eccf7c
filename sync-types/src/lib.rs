//! # sync-types
//!
//! Shared types for the offline-sync subsystem.
//!
//! This crate provides the foundational types used across all offline-sync crates:
//! - [`ActionId`], [`ActionType`] - Identity and tagging of queued actions
//! - [`NewAction`], [`QueuedAction`], [`HttpMethod`] - The durable queue record
//! - [`WorkerMessage`] - Worker ↔ page message protocol
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod action;
mod error;
mod ids;
mod messages;

pub use action::{HttpMethod, NewAction, QueuedAction, FORM_URLENCODED, JSON};
pub use error::SyncError;
pub use ids::{ActionId, ActionType};
pub use messages::WorkerMessage;
