//! Page runtime - the composition root for the page side.
//!
//! [`PageRuntime`] wires the durable store, the HTTP replayer, the
//! connectivity monitor and a presenter into one [`SyncCoordinator`], then
//! runs an event loop that feeds it connectivity signals and worker messages.
//! When a worker is configured, its event stream is subscribed for the life
//! of the page.

use std::sync::Arc;
use std::time::Duration;

use offline_sync_core::Connectivity;
use offline_sync_types::WorkerMessage;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::coordinator::{ClientError, PageEvent, SyncCoordinator};
use crate::interceptor::FormInterceptor;
use crate::monitor::ConnectivityMonitor;
use crate::notify::NotificationPresenter;
use crate::replay::{HttpReplayer, Replayer};
use crate::store::{QueueStore, SqliteQueueStore};
use crate::worker::WorkerChannel;

/// Capacity of the page event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Spawn a task that dispatches every page event to the coordinator.
///
/// The task ends when every sender has been dropped. Failures are logged
/// and do not stop the loop.
pub fn spawn_event_loop<S, R>(
    coordinator: Arc<SyncCoordinator<S, R>>,
    mut events: mpsc::Receiver<PageEvent>,
) -> JoinHandle<()>
where
    S: QueueStore + 'static,
    R: Replayer + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = coordinator.handle_event(event).await {
                tracing::warn!(error = %e, "page event failed");
            }
        }
        tracing::debug!("page event loop stopped");
    })
}

/// Spawn a task that forwards worker broadcasts into the page event channel.
///
/// For a worker running in the same process; a worker in another process
/// is reached through [`WorkerChannel`].
pub fn forward_worker_messages(
    mut messages: broadcast::Receiver<WorkerMessage>,
    events: mpsc::Sender<PageEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match messages.recv().await {
                Ok(message) => {
                    if events.send(PageEvent::Worker(message)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "page lagged behind worker messages");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Handle to a running page runtime.
#[derive(Debug)]
pub struct RunningPage {
    /// Sender for connectivity signals and worker messages.
    pub events: mpsc::Sender<PageEvent>,
    /// The event loop task.
    pub task: JoinHandle<()>,
    /// The worker event subscription, if a worker is attached.
    pub worker: Option<JoinHandle<()>>,
}

impl RunningPage {
    /// Report a platform connectivity change.
    pub async fn report_connectivity(&self, connectivity: Connectivity) -> bool {
        self.events
            .send(PageEvent::Connectivity(connectivity))
            .await
            .is_ok()
    }

    /// Stop the worker subscription and wait for queued events to finish.
    pub async fn shutdown(self) {
        if let Some(worker) = self.worker {
            worker.abort();
            // Aborted tasks drop their event sender.
            let _ = worker.await;
        }
        drop(self.events);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "page event loop panicked");
        }
    }
}

/// Composition root for the page side.
pub struct PageRuntime<S = SqliteQueueStore, R = HttpReplayer> {
    coordinator: Arc<SyncCoordinator<S, R>>,
    worker: Option<WorkerChannel>,
}

impl PageRuntime {
    /// Build a runtime from configuration.
    pub fn from_config(
        config: &ClientConfig,
        presenter: Arc<dyn NotificationPresenter>,
    ) -> Result<Self, ClientError> {
        let base_url = config.base_url()?;
        let initial = Connectivity::from_online(config.connectivity.assume_online);

        let coordinator = SyncCoordinator::new(
            SqliteQueueStore::new(&config.store.database),
            HttpReplayer::new(base_url),
            Arc::new(ConnectivityMonitor::new(initial)),
            presenter,
        );

        let mut runtime = Self::new(coordinator);
        if let Some(url) = config.worker_url()? {
            let delay = Duration::from_secs(config.worker.reconnect_secs);
            runtime = runtime.with_worker(WorkerChannel::new(url).with_reconnect_delay(delay));
        }
        Ok(runtime)
    }
}

impl<S, R> PageRuntime<S, R>
where
    S: QueueStore + 'static,
    R: Replayer + 'static,
{
    /// Wrap an already-built coordinator.
    pub fn new(coordinator: SyncCoordinator<S, R>) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            worker: None,
        }
    }

    /// Attach the background worker reached through `channel`.
    pub fn with_worker(mut self, channel: WorkerChannel) -> Self {
        self.worker = Some(channel);
        self
    }

    /// The attached worker, for posting page→worker messages.
    pub fn worker(&self) -> Option<&WorkerChannel> {
        self.worker.as_ref()
    }

    /// The coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator<S, R>> {
        &self.coordinator
    }

    /// A form interceptor bound to this runtime.
    pub fn interceptor(&self) -> FormInterceptor<S, R> {
        FormInterceptor::new(Arc::clone(&self.coordinator))
    }

    /// Open the store, drain leftovers and start the event loop.
    pub async fn start(&self) -> Result<RunningPage, ClientError> {
        self.coordinator.start().await?;

        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let task = spawn_event_loop(Arc::clone(&self.coordinator), receiver);
        let worker = self
            .worker
            .as_ref()
            .map(|channel| channel.spawn_listener(events.clone()));

        tracing::info!(
            queue_enabled = self.coordinator.is_queue_enabled(),
            worker = worker.is_some(),
            "page runtime started"
        );
        Ok(RunningPage {
            events,
            task,
            worker,
        })
    }
}

impl<S, R> std::fmt::Debug for PageRuntime<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRuntime")
            .field("coordinator", &self.coordinator)
            .field("worker", &self.worker)
            .finish()
    }
}
