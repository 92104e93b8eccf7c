//! Form submission interception.
//!
//! While offline, a mutating form submission is turned into a queued action
//! instead of being sent. While online it passes through untouched.

use std::sync::Arc;

use offline_sync_core::FormEncoding;
use offline_sync_types::{ActionId, ActionType, HttpMethod, NewAction};

use crate::coordinator::{ClientError, SyncCoordinator};
use crate::replay::Replayer;
use crate::store::QueueStore;

/// A form submission as the page would send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Form method.
    pub method: HttpMethod,
    /// Form action URL.
    pub action: String,
    /// Body encoding.
    pub encoding: FormEncoding,
    /// Field name/value pairs in document order.
    pub fields: Vec<(String, String)>,
}

impl Submission {
    /// A URL-encoded POST to `action`.
    pub fn post(action: &str) -> Self {
        Self::new(HttpMethod::Post, action)
    }

    /// A submission with an explicit method.
    pub fn new(method: HttpMethod, action: &str) -> Self {
        Self {
            method,
            action: action.to_string(),
            encoding: FormEncoding::default(),
            fields: Vec::new(),
        }
    }

    /// Set the body encoding.
    pub fn with_encoding(mut self, encoding: FormEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Append a field.
    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    /// Build the action to queue for this submission.
    ///
    /// GET and HEAD carry their fields in the query string.
    pub fn to_action(&self, action_type: ActionType) -> Result<NewAction, ClientError> {
        match self.method {
            HttpMethod::Get | HttpMethod::Head => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(self.fields.iter())
                    .finish();
                let url = if query.is_empty() {
                    self.action.clone()
                } else if self.action.contains('?') {
                    format!("{}&{}", self.action, query)
                } else {
                    format!("{}?{}", self.action, query)
                };
                Ok(NewAction::new(action_type, self.method, &url))
            }
            _ => {
                let body = self.encoding.encode(&self.fields)?;
                Ok(NewAction::new(action_type, self.method, &self.action)
                    .with_header("Content-Type", self.encoding.content_type())
                    .with_body(body))
            }
        }
    }
}

/// Result of intercepting a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Offline: the submission was queued under this id.
    Queued(ActionId),
    /// Online: send the submission normally.
    PassThrough(Submission),
}

/// Queues form submissions while offline.
pub struct FormInterceptor<S, R> {
    coordinator: Arc<SyncCoordinator<S, R>>,
}

impl<S, R> FormInterceptor<S, R>
where
    S: QueueStore,
    R: Replayer,
{
    /// Create an interceptor that queues through `coordinator`.
    pub fn new(coordinator: Arc<SyncCoordinator<S, R>>) -> Self {
        Self { coordinator }
    }

    /// Intercept a submission tagged with `action_type`.
    ///
    /// # Errors
    ///
    /// Queueing failures propagate; the submission is never dropped silently.
    pub async fn submit(
        &self,
        action_type: impl Into<ActionType>,
        submission: Submission,
    ) -> Result<Interception, ClientError> {
        if self.coordinator.monitor().is_online() {
            return Ok(Interception::PassThrough(submission));
        }

        let action = submission.to_action(action_type.into())?;
        let id = self.coordinator.queue_action(action).await?;
        Ok(Interception::Queued(id))
    }
}

impl<S, R> Clone for FormInterceptor<S, R> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}
