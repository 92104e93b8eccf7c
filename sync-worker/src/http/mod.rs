//! HTTP endpoints for sync-worker.
//!
//! Provides health checks, the page message channel, the page event stream
//! (server-sent events), the background-sync trigger, and the interception
//! proxy as the fallback route.

pub mod health;
pub mod proxy;

use crate::manager::CacheManager;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use futures_util::stream::{self, Stream};
use offline_sync_types::WorkerMessage;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(manager: Arc<CacheManager>) -> Router {
    Router::new()
        .route("/__worker/health", get(health::health_handler))
        .route("/__worker/message", post(message_handler))
        .route("/__worker/events", get(events_handler))
        .route("/__worker/sync/:tag", post(sync_handler))
        .fallback(proxy::proxy_handler)
        .layer(Extension(manager))
}

/// Page → worker message endpoint.
async fn message_handler(
    Extension(manager): Extension<Arc<CacheManager>>,
    Json(message): Json<WorkerMessage>,
) -> impl IntoResponse {
    match manager.handle_message(message).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "state": manager.state().name() })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "message failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// Worker → page message stream.
///
/// Each worker message is one `worker` event whose data is the JSON message.
/// The stream ends when the worker shuts down.
async fn events_handler(
    Extension(manager): Extension<Arc<CacheManager>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let receiver = manager.subscribe_pages();
    tracing::debug!(pages = manager.page_count(), "page subscribed");

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    let event = Event::default().event("worker").json_data(&message);
                    return Some((event, receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "page lagged behind worker messages");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Platform background-sync signal.
async fn sync_handler(
    Extension(manager): Extension<Arc<CacheManager>>,
    Path(tag): Path<String>,
) -> Json<serde_json::Value> {
    let pages = manager.on_background_sync(&tag);
    Json(json!({ "tag": tag, "pages": pages }))
}
