use crate::wallet::{WalletDescriptor, WalletSyncError};

use std::path::PathBuf;
use tracing::{info, warn};

/// Source of the wallets the engine should monitor
#[async_trait::async_trait]
pub trait WalletRegistry: Send + Sync {
	async fn load_wallets(&self) -> Result<Vec<WalletDescriptor>, WalletSyncError>;
}

/// File-based implementation of WalletRegistry
///
/// Reads a JSON array of `{ "id", "address", "chain" }` objects.
pub struct FileWalletRegistry {
	path: PathBuf,
}

impl FileWalletRegistry {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}
}

#[async_trait::async_trait]
impl WalletRegistry for FileWalletRegistry {
	async fn load_wallets(&self) -> Result<Vec<WalletDescriptor>, WalletSyncError> {
		if !tokio::fs::try_exists(&self.path).await? {
			warn!("Wallet file {:?} does not exist, starting with no wallets", self.path);
			return Ok(Vec::new());
		}

		let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
			WalletSyncError::RegistryError(format!("Failed to read wallet file {:?}: {}", self.path, e))
		})?;
		let wallets: Vec<WalletDescriptor> = serde_json::from_str(&content).map_err(|e| {
			WalletSyncError::RegistryError(format!("Failed to parse wallet file {:?}: {}", self.path, e))
		})?;

		info!("Loaded {} wallets from {:?}", wallets.len(), self.path);
		Ok(wallets)
	}
}
