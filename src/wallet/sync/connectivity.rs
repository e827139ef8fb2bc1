//! Network reachability signal.
//!
//! The monitor is a cached flag fed by platform online/offline notifications. It does not poll.
//! Consumers read it with `is_online` or wait for transitions through `subscribe`.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shared online/offline flag
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record a platform connectivity signal. Returns whether the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                info!("Connectivity restored");
            } else {
                warn!("Connectivity lost, suspending wallet sync");
            }
        }
        changed
    }

    /// Receiver notified on every online/offline transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
