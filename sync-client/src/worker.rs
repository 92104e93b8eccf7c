//! Page side of the worker message channel.
//!
//! The background worker runs as its own process. Pages post page→worker
//! messages to `/__worker/message` and receive worker→page messages from the
//! server-sent event stream at `/__worker/events`.

use std::time::Duration;

use offline_sync_types::WorkerMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::coordinator::PageEvent;

/// Path of the worker's message endpoint.
pub const MESSAGE_PATH: &str = "__worker/message";

/// Path of the worker's event stream.
pub const EVENTS_PATH: &str = "__worker/events";

/// Default pause between event stream reconnects.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Worker channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The worker could not be reached.
    #[error("worker unreachable: {0}")]
    Transport(String),

    /// The worker answered with a non-2xx status.
    #[error("worker returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// An endpoint URL could not be built.
    #[error("invalid worker url: {0}")]
    InvalidUrl(String),
}

/// HTTP connection to the background worker.
#[derive(Debug, Clone)]
pub struct WorkerChannel {
    client: reqwest::Client,
    base_url: Url,
    reconnect_delay: Duration,
}

impl WorkerChannel {
    /// Connect to the worker listening at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Set the pause between event stream reconnects.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// The worker base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChannelError> {
        self.base_url
            .join(path)
            .map_err(|e| ChannelError::InvalidUrl(e.to_string()))
    }

    /// Post a message to the worker.
    pub async fn post(&self, message: &WorkerMessage) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(self.endpoint(MESSAGE_PATH)?)
            .json(message)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Ask a waiting worker to take control.
    pub async fn skip_waiting(&self) -> Result<(), ChannelError> {
        self.post(&WorkerMessage::SkipWaiting).await
    }

    /// Ask the worker to cache one more URL.
    pub async fn cache_url(&self, url: &str) -> Result<(), ChannelError> {
        self.post(&WorkerMessage::CacheUrl {
            url: url.to_string(),
        })
        .await
    }

    /// Subscribe once and forward every worker message as a page event.
    ///
    /// Returns `Ok(())` when the worker closes the stream or the page event
    /// channel is gone.
    pub async fn listen(&self, events: &mpsc::Sender<PageEvent>) -> Result<(), ChannelError> {
        let mut response = self
            .client
            .get(self.endpoint(EVENTS_PATH)?)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status {
                status: status.as_u16(),
            });
        }
        tracing::info!(worker = %self.base_url, "subscribed to worker events");

        let mut decoder = SseDecoder::default();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?
        {
            for data in decoder.push(&chunk) {
                let message = match serde_json::from_str::<WorkerMessage>(&data) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring malformed worker message");
                        continue;
                    }
                };
                if events.send(PageEvent::Worker(message)).await.is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Keep a subscription open for as long as the page event channel lives.
    ///
    /// An unreachable worker is expected while offline; the listener retries
    /// after the reconnect delay.
    pub fn spawn_listener(&self, events: mpsc::Sender<PageEvent>) -> JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move {
            loop {
                match channel.listen(&events).await {
                    Ok(()) => tracing::debug!("worker event stream ended"),
                    Err(e) => tracing::debug!(error = %e, "worker event stream unavailable"),
                }
                if events.is_closed() {
                    break;
                }
                tokio::time::sleep(channel.reconnect_delay).await;
            }
        })
    }
}

/// Incremental decoder for a `text/event-stream` body.
///
/// Yields the data of each complete event. Comments, event names and ids
/// are dropped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return the data of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut complete = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if !self.data.is_empty() {
                    complete.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (&*line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }
        complete
    }
}
