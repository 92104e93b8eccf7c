//! CLI command implementations.

pub mod drain;
pub mod enqueue;
pub mod list;
pub mod status;
