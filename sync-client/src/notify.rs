//! User-facing notifications.

use offline_sync_core::Connectivity;
use std::sync::{Arc, Mutex};

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational, e.g. an action saved for later.
    Info,
    /// Queued work reached the backend.
    Success,
    /// Something the user should know went wrong.
    Warning,
}

/// A transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

impl Notification {
    /// Create a notification.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Presents notifications and the connectivity indicator to the user.
pub trait NotificationPresenter: Send + Sync {
    /// Show a transient notification.
    fn present(&self, notification: Notification);

    /// Update the online/offline indicator.
    fn connectivity_changed(&self, _connectivity: Connectivity) {}
}

/// Presenter that writes to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl NotificationPresenter for TracingPresenter {
    fn present(&self, notification: Notification) {
        match notification.severity {
            Severity::Warning => tracing::warn!(message = %notification.message, "notification"),
            _ => tracing::info!(
                severity = ?notification.severity,
                message = %notification.message,
                "notification"
            ),
        }
    }

    fn connectivity_changed(&self, connectivity: Connectivity) {
        tracing::info!(?connectivity, "connectivity indicator updated");
    }
}

/// Presenter that records everything it is given (for testing).
#[derive(Debug, Default, Clone)]
pub struct RecordingPresenter {
    inner: Arc<Mutex<RecordingInner>>,
}

#[derive(Debug, Default)]
struct RecordingInner {
    notifications: Vec<Notification>,
    indicator: Vec<Connectivity>,
}

impl RecordingPresenter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications presented so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().notifications.clone()
    }

    /// Notifications of one severity.
    pub fn with_severity(&self, severity: Severity) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.severity == severity)
            .collect()
    }

    /// Indicator updates so far.
    pub fn indicator_updates(&self) -> Vec<Connectivity> {
        self.inner.lock().unwrap().indicator.clone()
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn present(&self, notification: Notification) {
        self.inner.lock().unwrap().notifications.push(notification);
    }

    fn connectivity_changed(&self, connectivity: Connectivity) {
        self.inner.lock().unwrap().indicator.push(connectivity);
    }
}
