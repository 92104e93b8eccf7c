//! Drain bookkeeping.
//!
//! A drain visits one FIFO snapshot of the queue. Each action either
//! replays successfully (and is removed) or stays queued for the next
//! drain. There is no retry counter and no backoff.

use offline_sync_types::ActionId;

/// Check if an HTTP status counts as a successful replay.
pub fn is_ok_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Number of actions in the snapshot.
    pub attempted: usize,
    /// Actions replayed and removed, in snapshot order.
    pub synced: Vec<ActionId>,
    /// Actions that failed and remain queued, in snapshot order.
    pub failed: Vec<ActionId>,
    /// True when another drain was already in flight and this one did nothing.
    pub skipped: bool,
}

impl DrainReport {
    /// Start a report for a snapshot of `attempted` actions.
    pub fn new(attempted: usize) -> Self {
        Self {
            attempted,
            ..Self::default()
        }
    }

    /// Report for a drain that was not run.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Record a successful replay.
    pub fn record_synced(&mut self, id: ActionId) {
        self.synced.push(id);
    }

    /// Record a failed replay.
    pub fn record_failed(&mut self, id: ActionId) {
        self.failed.push(id);
    }

    /// Number of actions removed from the queue.
    pub fn synced_count(&self) -> usize {
        self.synced.len()
    }

    /// Check if every attempted action synced.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Aggregate user notification, if anything synced.
    pub fn summary(&self) -> Option<String> {
        match self.synced.len() {
            0 => None,
            1 => Some("1 action synced".to_string()),
            n => Some(format!("{} actions synced", n)),
        }
    }
}
