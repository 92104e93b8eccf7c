//! Connectivity state machine for offline-sync.
//!
//! This module provides a pure, side-effect-free state machine for tracking
//! online/offline transitions. The state machine takes platform signals as
//! input and produces a new state plus a list of actions to execute.
//!
//! Side effects (indicator updates, drains) are performed by sync-client,
//! not by this module. Actions are only produced on a transition, never on
//! a repeated signal for the current state.

/// Binary connectivity as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// Network reachable.
    Online,
    /// Network unreachable.
    Offline,
}

impl Connectivity {
    /// Build from a platform `on_line` flag.
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    /// Check if online.
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Connectivity state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    current: Connectivity,
}

impl ConnectivityState {
    /// Create a state machine seeded with the platform-reported state.
    pub fn new(initial: Connectivity) -> Self {
        Self { current: initial }
    }

    /// Current connectivity.
    pub fn current(&self) -> Connectivity {
        self.current
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self.current, event) {
            (Connectivity::Offline, Event::WentOnline) => (
                Self::new(Connectivity::Online),
                vec![
                    Action::UpdateIndicator(Connectivity::Online),
                    Action::TriggerDrain,
                ],
            ),
            (Connectivity::Online, Event::WentOffline) => (
                Self::new(Connectivity::Offline),
                vec![Action::UpdateIndicator(Connectivity::Offline)],
            ),

            // Worker-originated sync requests drain regardless of state.
            (_, Event::SyncRequested) => (self, vec![Action::TriggerDrain]),

            (Connectivity::Online, Event::StoreReady) => (self, vec![Action::TriggerDrain]),
            (Connectivity::Offline, Event::StoreReady) => (self, vec![]),

            // Steady state - no side effects
            (Connectivity::Online, Event::WentOnline)
            | (Connectivity::Offline, Event::WentOffline) => (self, vec![]),
        }
    }

    /// Feed a raw platform signal.
    pub fn on_signal(self, reported: Connectivity) -> (Self, Vec<Action>) {
        let event = match reported {
            Connectivity::Online => Event::WentOnline,
            Connectivity::Offline => Event::WentOffline,
        };
        self.on_event(event)
    }
}

/// Events that drive the connectivity machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Platform reported the network as reachable.
    WentOnline,
    /// Platform reported the network as unreachable.
    WentOffline,
    /// Background worker asked pages to drain.
    SyncRequested,
    /// The durable store finished opening at startup.
    StoreReady,
}

/// Actions to be executed by sync-client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Refresh the user-visible connectivity indicator.
    UpdateIndicator(Connectivity),
    /// Drain the offline queue.
    TriggerDrain,
}
