//! Wallet Synchronization Module
//!
//! This module provides the engine that keeps every monitored wallet's balance and activity
//! snapshot fresh against its chain provider. It is composed of several submodules, each
//! responsible for a specific aspect of the sync process:
//!
//! - `engine`: The main entry point. Wires all services together and runs the auto-sync timer.
//! - `scheduler`: Fans sync requests out over the working set with bounded concurrency.
//! - `executor`: Performs a single provider call under a timeout and normalizes its outcome.
//! - `snapshot_store`: Holds the latest snapshot of every wallet and the per-wallet in-flight claim.
//! - `statistics`: Aggregates attempt outcomes into engine-wide counters.
//! - `connectivity`: Online/offline signal consulted before any work is accepted.
//! - `events`: Event types, the handler trait and the dispatcher used to notify observers.
//! - `registry`: Sources of the wallets to monitor.

/// Online/offline signal
pub mod connectivity;
/// Façade over all sync services
pub mod engine;
/// Event system for decoupled communication during sync
pub mod events;
/// Single-attempt provider calls
pub mod executor;
/// Wallet sources
pub mod registry;
/// Fan-out of sync requests and the auto-sync timer
pub mod scheduler;
/// Snapshot arena and in-flight claims
pub mod snapshot_store;
/// Engine-wide attempt statistics
pub mod statistics;

pub use connectivity::ConnectivityMonitor;
pub use engine::*;
pub use events::{CycleTrigger, EventDispatcher, SyncEvent, SyncEventHandler};
pub use registry::{FileWalletRegistry, WalletRegistry};
pub use scheduler::{AttemptReport, CycleReport};
pub use statistics::EngineStatistics;
