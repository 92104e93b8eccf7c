//! Health check endpoint.

use crate::manager::CacheManager;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Worker version.
    pub version: String,
    /// Lifecycle state.
    pub state: String,
    /// Current cache bucket.
    pub bucket: String,
    /// Entries in the current bucket.
    pub entries: u64,
    /// Bucket answering intercepted requests, if any.
    pub serving_bucket: Option<String>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(
    Extension(manager): Extension<Arc<CacheManager>>,
) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);
    let worker = manager.status().await;

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        state: worker.state.to_string(),
        bucket: worker.bucket,
        entries: worker.entries,
        serving_bucket: worker.serving,
        uptime_seconds: uptime,
    })
}
