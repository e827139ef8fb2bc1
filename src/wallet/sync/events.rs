//! Event system for wallet synchronization.
//!
//! This module defines the events the engine emits, the handler trait external subsystems
//! implement, and the dispatcher that fans events out. Every event goes to a broadcast channel
//! (for UI and other observers that subscribe) and to each registered handler (for the alert
//! subsystem and similar collaborators that must see every event).
//!
//! The engine only signals that new activity was observed. Deciding whether that warrants an
//! alert, and how severe it is, belongs to the handlers.

use crate::wallet::{SyncStatus, WalletId, WalletSyncError};

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Why a sync cycle was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    /// Requested by a caller
    Manual,
    /// Fired by the auto-sync timer
    Scheduled,
}

/// Events that occur during wallet synchronization
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A wallet moved to a new sync status
    StatusChanged {
        wallet_id: WalletId,
        status: SyncStatus,
    },
    /// A successful attempt reported new transactions
    NewActivity {
        wallet_id: WalletId,
        transactions_found: u64,
        timestamp: DateTime<Utc>,
    },
    /// A sync cycle started over the given number of wallets
    CycleStarted {
        trigger: CycleTrigger,
        wallets: usize,
    },
    /// A sync cycle finished
    CycleCompleted {
        trigger: CycleTrigger,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
    /// The engine went online or offline
    ConnectivityChanged { online: bool },
}

/// Trait for handling sync events.
///
/// Implementors receive all sync events and can perform side effects such as raising alerts.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    ///
    /// Errors are logged by the dispatcher and never reach the sync that produced the event.
    async fn handle(&self, event: &SyncEvent) -> Result<(), WalletSyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages subscribers and handlers.
pub struct EventDispatcher {
    handlers: RwLock<Vec<Arc<dyn SyncEventHandler>>>,
    sender: broadcast::Sender<SyncEvent>,
}

impl EventDispatcher {
    /// Create a dispatcher whose broadcast channel buffers `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Register a new event handler.
    ///
    /// Handlers are called in the order they are registered.
    pub fn register_handler(&self, handler: Arc<dyn SyncEventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Subscribe to all future events. Slow subscribers lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Dispatch an event to subscribers and all registered handlers.
    ///
    /// Errors from handlers are logged, but do not stop other handlers from running.
    pub async fn dispatch(&self, event: SyncEvent) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for handler in handlers {
            if let Err(e) = handler.handle(&event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }

        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}
