//! Observable connectivity cell.
//!
//! [`ConnectivityMonitor`] owns the pure [`ConnectivityState`] machine from
//! sync-core inside a `tokio::sync::watch` channel. Platform signals are fed
//! through [`ConnectivityMonitor::signal`], which is the only mutator;
//! subscribers are woken on transitions only.

use offline_sync_core::{Action, Connectivity, ConnectivityState, Event};
use tokio::sync::watch;

/// Tracks whether the page is online.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded with the platform-reported state.
    pub fn new(initial: Connectivity) -> Self {
        let (state, _) = watch::channel(ConnectivityState::new(initial));
        Self { state }
    }

    /// Current connectivity.
    pub fn current(&self) -> Connectivity {
        self.state.borrow().current()
    }

    /// Check if the page is online.
    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Feed a platform connectivity signal and return the actions it produced.
    pub fn signal(&self, reported: Connectivity) -> Vec<Action> {
        let event = match reported {
            Connectivity::Online => Event::WentOnline,
            Connectivity::Offline => Event::WentOffline,
        };
        self.apply(event)
    }

    /// Feed any machine event and return the actions it produced.
    pub fn apply(&self, event: Event) -> Vec<Action> {
        let mut actions = Vec::new();
        self.state.send_if_modified(|state| {
            let before = state.current();
            let (next, produced) = state.on_event(event);
            *state = next;
            actions = produced;
            before != next.current()
        });
        actions
    }

    /// Receive connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }
}
