//! Background worker lifecycle state machine.
//!
//! `Installing → Waiting → Activating → Active`, with `Redundant` as the
//! terminal state of a version whose install failed. A failed install never
//! reaches `Waiting`, so a partially populated bucket can never become
//! current.

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Precaching the manifest into a new bucket.
    Installing,
    /// Installed, waiting to take control.
    Waiting,
    /// Purging stale buckets and claiming clients.
    Activating,
    /// Intercepting requests.
    Active,
    /// Install failed; this version never takes control.
    Redundant {
        /// Why the version was discarded.
        reason: String,
    },
}

impl WorkerState {
    /// Create a new state machine in the Installing state.
    pub fn new() -> Self {
        Self::Installing
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: LifecycleEvent) -> (Self, Vec<LifecycleAction>) {
        match (self, event) {
            // From Installing
            (Self::Installing, LifecycleEvent::InstallSucceeded) => (Self::Waiting, vec![]),
            (Self::Installing, LifecycleEvent::InstallFailed { error }) => (
                Self::Redundant {
                    reason: error,
                },
                vec![LifecycleAction::DiscardNewBucket],
            ),

            // From Waiting
            (Self::Waiting, LifecycleEvent::SkipWaiting) => (
                Self::Activating,
                vec![
                    LifecycleAction::PurgeStaleBuckets,
                    LifecycleAction::ClaimClients,
                ],
            ),

            // From Activating
            (Self::Activating, LifecycleEvent::ActivationComplete) => (Self::Active, vec![]),
            (Self::Activating, LifecycleEvent::ActivationFailed { .. }) => (Self::Waiting, vec![]),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if requests should be intercepted.
    pub fn intercepts(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this version is waiting to take control.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Short name for logs and health output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Waiting => "waiting",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant { .. } => "redundant",
        }
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events in a worker version's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Every manifest resource was fetched and stored.
    InstallSucceeded,
    /// A manifest resource failed to fetch or store.
    InstallFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Take control now (explicit message or automatic skip-waiting).
    SkipWaiting,
    /// Stale buckets purged and clients claimed.
    ActivationComplete,
    /// Activation could not finish; stay installed.
    ActivationFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Drop whatever the failed install wrote.
    DiscardNewBucket,
    /// Delete every bucket except the current one.
    PurgeStaleBuckets,
    /// Start intercepting requests from already-open pages.
    ClaimClients,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_installing() {
        assert_eq!(WorkerState::new(), WorkerState::Installing);
    }

    #[test]
    fn full_lifecycle() {
        let state = WorkerState::new();

        let (state, actions) = state.on_event(LifecycleEvent::InstallSucceeded);
        assert!(state.is_waiting());
        assert!(actions.is_empty());

        let (state, actions) = state.on_event(LifecycleEvent::SkipWaiting);
        assert_eq!(state, WorkerState::Activating);
        assert_eq!(
            actions,
            vec![
                LifecycleAction::PurgeStaleBuckets,
                LifecycleAction::ClaimClients
            ]
        );

        let (state, _) = state.on_event(LifecycleEvent::ActivationComplete);
        assert!(state.intercepts());
    }

    #[test]
    fn failed_install_is_redundant() {
        let (state, actions) = WorkerState::new().on_event(LifecycleEvent::InstallFailed {
            error: "404 for /static/app.css".into(),
        });

        assert!(matches!(state, WorkerState::Redundant { ref reason } if reason.contains("404")));
        assert_eq!(actions, vec![LifecycleAction::DiscardNewBucket]);
        assert!(!state.intercepts());
    }

    #[test]
    fn redundant_never_activates() {
        let state = WorkerState::Redundant {
            reason: "boom".into(),
        };
        let (state, actions) = state.on_event(LifecycleEvent::SkipWaiting);

        assert_eq!(state.name(), "redundant");
        assert!(actions.is_empty());
    }

    #[test]
    fn skip_waiting_while_installing_is_ignored() {
        let (state, actions) = WorkerState::new().on_event(LifecycleEvent::SkipWaiting);
        assert_eq!(state, WorkerState::Installing);
        assert!(actions.is_empty());
    }

    #[test]
    fn failed_activation_returns_to_waiting() {
        let (state, _) = WorkerState::Activating.on_event(LifecycleEvent::ActivationFailed {
            error: "database locked".into(),
        });
        assert!(state.is_waiting());
    }
}
