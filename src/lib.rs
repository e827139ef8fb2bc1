//! Background balance and activity synchronization for monitored crypto wallets.

pub mod config;
pub mod provider;
pub mod utils;
pub mod wallet;

pub use config::{EngineConfig, SyncConfig, SyncInterval};
pub use provider::{Chain, ChainProvider, HttpChainProvider, ProviderEndpoints};
pub use wallet::sync::{
	ConnectivityMonitor, CycleTrigger, EngineStatistics, FileWalletRegistry, SyncEvent,
	SyncEventHandler, WalletRegistry, WalletSyncEngine,
};
pub use wallet::{WalletDescriptor, WalletId, WalletSnapshot, WalletSyncError};
