//! SyncCoordinator - queues actions and drains them when connectivity allows.
//!
//! # Architecture
//!
//! The coordinator interprets the actions produced by the pure connectivity
//! machine (from sync-core) and performs the actual I/O through the
//! [`QueueStore`] and [`Replayer`] traits.
//!
//! ```text
//! platform signal → ConnectivityMonitor → [Action] → SyncCoordinator
//!                                                     ↓           ↓
//!                                                QueueStore   Replayer → backend
//! ```
//!
//! # Delivery
//!
//! A drain takes one snapshot of the queue and replays it in id order. An
//! action is removed only after a 2xx reply; everything else stays queued and
//! is retried on the next drain. There is no backoff and no attempt limit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use offline_sync_core::{is_ok_status, Action, Connectivity, DrainReport, Event, FormError};
use offline_sync_types::{ActionId, NewAction, WorkerMessage};

use crate::config::ConfigError;
use crate::monitor::ConnectivityMonitor;
use crate::notify::{Notification, NotificationPresenter, Severity};
use crate::replay::{ReplayError, ReplayRequest, Replayer};
use crate::store::{QueueStore, StoreError};

/// Message shown when an action is queued instead of sent.
pub const SAVED_OFFLINE: &str = "Action saved offline. It will sync when you're back online.";

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Queue store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Durable storage was unavailable at startup; nothing can be queued.
    #[error("offline queueing is disabled for this session")]
    QueueDisabled,

    /// Form fields could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] FormError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Events delivered to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The platform reported a connectivity change.
    Connectivity(Connectivity),
    /// The background worker posted a message.
    Worker(WorkerMessage),
}

/// Queues actions while offline and replays them later.
pub struct SyncCoordinator<S, R> {
    store: S,
    replayer: R,
    monitor: Arc<ConnectivityMonitor>,
    presenter: Arc<dyn NotificationPresenter>,
    queue_enabled: AtomicBool,
    drain_guard: Mutex<()>,
}

impl<S, R> SyncCoordinator<S, R>
where
    S: QueueStore,
    R: Replayer,
{
    /// Create a coordinator.
    pub fn new(
        store: S,
        replayer: R,
        monitor: Arc<ConnectivityMonitor>,
        presenter: Arc<dyn NotificationPresenter>,
    ) -> Self {
        Self {
            store,
            replayer,
            monitor,
            presenter,
            queue_enabled: AtomicBool::new(true),
            drain_guard: Mutex::new(()),
        }
    }

    /// The queue store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The replayer.
    pub fn replayer(&self) -> &R {
        &self.replayer
    }

    /// The connectivity monitor.
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Check if actions can be queued this session.
    pub fn is_queue_enabled(&self) -> bool {
        self.queue_enabled.load(Ordering::SeqCst)
    }

    /// Open the store and drain anything left from a previous session.
    ///
    /// An unavailable store is not an error here: queueing is disabled for
    /// the session and a diagnostic is logged.
    pub async fn start(&self) -> Result<Option<DrainReport>, ClientError> {
        match self.store.open().await {
            Ok(()) => {}
            Err(StoreError::Unavailable { reason }) => {
                tracing::warn!(%reason, "offline queue unavailable, queueing disabled");
                self.queue_enabled.store(false, Ordering::SeqCst);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(online = self.monitor.is_online(), "offline queue ready");
        let actions = self.monitor.apply(Event::StoreReady);
        self.execute(actions).await
    }

    /// Persist an action for later replay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::QueueDisabled`] if the store could not be
    /// opened at startup, or the store error if the write fails.
    pub async fn queue_action(&self, action: NewAction) -> Result<ActionId, ClientError> {
        if !self.is_queue_enabled() {
            return Err(ClientError::QueueDisabled);
        }

        let action_type = action.action_type.clone();
        let id = self.store.append(action).await?;

        tracing::info!(%id, %action_type, "action queued offline");
        self.presenter
            .present(Notification::new(Severity::Info, SAVED_OFFLINE));

        Ok(id)
    }

    /// Replay every queued action once.
    ///
    /// Returns a skipped report if another drain is already running.
    pub async fn drain(&self) -> Result<DrainReport, ClientError> {
        let _guard = match self.drain_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("drain already in flight, skipping");
                return Ok(DrainReport::skipped());
            }
        };

        if !self.is_queue_enabled() {
            return Ok(DrainReport::new(0));
        }

        let snapshot = self.store.list().await?;
        let mut report = DrainReport::new(snapshot.len());
        if snapshot.is_empty() {
            return Ok(report);
        }

        tracing::debug!(count = snapshot.len(), "draining offline queue");

        for action in &snapshot {
            let request = ReplayRequest::from_action(action);
            let outcome = match self.replayer.execute(&request).await {
                Ok(status) if is_ok_status(status) => Ok(status),
                Ok(status) => Err(ReplayError::Status { status }),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(status) => match self.store.remove(action.id).await {
                    Ok(_) => {
                        tracing::debug!(id = %action.id, status, "action synced");
                        report.record_synced(action.id);
                    }
                    Err(e) => {
                        // Delivered but still queued; it will be replayed again.
                        tracing::warn!(id = %action.id, error = %e, "failed to remove synced action");
                        report.record_failed(action.id);
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        id = %action.id,
                        action_type = %action.action_type,
                        error = %e,
                        "replay failed, will retry"
                    );
                    report.record_failed(action.id);
                }
            }
        }

        if let Some(summary) = report.summary() {
            tracing::info!(
                synced = report.synced_count(),
                remaining = report.failed.len(),
                "drain complete"
            );
            self.presenter
                .present(Notification::new(Severity::Success, summary));
        }

        Ok(report)
    }

    /// Interpret actions from the connectivity machine.
    ///
    /// Returns the drain report if a drain ran.
    pub async fn execute(&self, actions: Vec<Action>) -> Result<Option<DrainReport>, ClientError> {
        let mut report = None;
        for action in actions {
            match action {
                Action::UpdateIndicator(connectivity) => {
                    self.presenter.connectivity_changed(connectivity);
                }
                Action::TriggerDrain => {
                    report = Some(self.drain().await?);
                }
            }
        }
        Ok(report)
    }

    /// Handle a platform connectivity signal.
    pub async fn handle_connectivity(
        &self,
        connectivity: Connectivity,
    ) -> Result<Option<DrainReport>, ClientError> {
        let actions = self.monitor.signal(connectivity);
        self.execute(actions).await
    }

    /// Handle a message from the background worker.
    pub async fn handle_worker_message(
        &self,
        message: WorkerMessage,
    ) -> Result<Option<DrainReport>, ClientError> {
        match message {
            WorkerMessage::SyncRequested { tag } => {
                tracing::debug!(%tag, "worker requested sync");
                let actions = self.monitor.apply(Event::SyncRequested);
                self.execute(actions).await
            }
            WorkerMessage::SkipWaiting | WorkerMessage::CacheUrl { .. } => {
                tracing::debug!(?message, "ignoring worker-bound message");
                Ok(None)
            }
        }
    }

    /// Dispatch one page event.
    pub async fn handle_event(&self, event: PageEvent) -> Result<Option<DrainReport>, ClientError> {
        match event {
            PageEvent::Connectivity(connectivity) => self.handle_connectivity(connectivity).await,
            PageEvent::Worker(message) => self.handle_worker_message(message).await,
        }
    }
}

impl<S, R> std::fmt::Debug for SyncCoordinator<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("monitor", &self.monitor)
            .field("queue_enabled", &self.queue_enabled)
            .finish_non_exhaustive()
    }
}
