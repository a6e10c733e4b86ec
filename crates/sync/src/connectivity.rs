//! Shared online/offline signal.
//!
//! Connectivity is a declared state, not a continuous probe. Callers (or the
//! replay engine's health probe) flip it; everything else only reads it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

/// Cheap-to-clone handle on the shared connectivity state.
///
/// All clones observe the same state. `subscribe` hands out a watch receiver
/// so long-lived tasks can react to transitions without polling.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl Connectivity {
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Start in the online state.
    pub fn online() -> Self {
        Self::new(ConnectivityState::Online)
    }

    /// Start in the offline state.
    pub fn offline() -> Self {
        Self::new(ConnectivityState::Offline)
    }

    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state() == ConnectivityState::Online
    }

    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    pub fn set_online(&self) {
        self.set(ConnectivityState::Online);
    }

    pub fn set_offline(&self) {
        self.set(ConnectivityState::Offline);
    }

    fn set(&self, next: ConnectivityState) {
        // Only wake subscribers on an actual transition.
        let changed = self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            tracing::debug!(state = ?next, "connectivity changed");
        }
    }

    /// Error out unless we are online.
    pub fn require_online(&self) -> Result<(), SyncError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(SyncError::Offline)
        }
    }

    /// Watch receiver for connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_requested_state() {
        assert!(Connectivity::online().is_online());
        assert!(Connectivity::offline().is_offline());
    }

    #[test]
    fn clones_share_state() {
        let conn = Connectivity::online();
        let other = conn.clone();
        conn.set_offline();
        assert!(other.is_offline());
        other.set_online();
        assert!(conn.is_online());
    }

    #[test]
    fn require_online_errors_when_offline() {
        let conn = Connectivity::offline();
        match conn.require_online() {
            Err(SyncError::Offline) => {}
            other => panic!("expected Offline, got {other:?}"),
        }
        conn.set_online();
        assert!(conn.require_online().is_ok());
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let conn = Connectivity::online();
        let mut rx = conn.subscribe();
        conn.set_offline();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectivityState::Offline);
    }

    #[tokio::test]
    async fn redundant_sets_do_not_wake_subscribers() {
        let conn = Connectivity::online();
        let mut rx = conn.subscribe();
        conn.set_online();
        assert!(!rx.has_changed().unwrap());
    }
}
