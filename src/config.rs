//! Engine configuration.
//!
//! `SyncConfig` is the mutable, process-wide auto-sync setting the engine exposes at runtime.
//! `EngineConfig` is the file-level configuration of the headless service, read from JSON.

use crate::provider::{Chain, ProviderEndpoints};
use crate::wallet::WalletSyncError;
use crate::wallet::sync::executor::DEFAULT_ATTEMPT_TIMEOUT;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Upper bound on concurrent provider calls, sized to the plan's wallet limit.
pub const DEFAULT_MAX_CONCURRENCY: usize = 25;

/// Supported auto-sync intervals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum SyncInterval {
	ThirtySeconds,
	#[default]
	OneMinute,
	TwoMinutes,
	FiveMinutes,
}

impl SyncInterval {
	pub const ALL: [SyncInterval; 4] = [
		SyncInterval::ThirtySeconds,
		SyncInterval::OneMinute,
		SyncInterval::TwoMinutes,
		SyncInterval::FiveMinutes,
	];

	pub fn as_secs(&self) -> u64 {
		match self {
			SyncInterval::ThirtySeconds => 30,
			SyncInterval::OneMinute => 60,
			SyncInterval::TwoMinutes => 120,
			SyncInterval::FiveMinutes => 300,
		}
	}

	pub fn as_duration(&self) -> Duration {
		Duration::from_secs(self.as_secs())
	}
}

impl TryFrom<u64> for SyncInterval {
	type Error = WalletSyncError;

	fn try_from(secs: u64) -> Result<Self, Self::Error> {
		SyncInterval::ALL
			.into_iter()
			.find(|interval| interval.as_secs() == secs)
			.ok_or_else(|| {
				WalletSyncError::ConfigError(format!(
					"unsupported sync interval {}s, expected one of 30, 60, 120, 300",
					secs
				))
			})
	}
}

impl From<SyncInterval> for u64 {
	fn from(interval: SyncInterval) -> Self {
		interval.as_secs()
	}
}

/// Auto-sync settings, changeable while the engine runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
	pub auto_sync_enabled: bool,
	pub interval: SyncInterval,
	/// Chains covered by scheduled cycles; `None` means all wallets.
	pub chain_filter: Option<Vec<Chain>>,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			auto_sync_enabled: true,
			interval: SyncInterval::default(),
			chain_filter: None,
		}
	}
}

/// Configuration file of the headless service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	pub auto_sync_enabled: bool,
	pub interval_seconds: u64,
	pub chain_filter: Option<Vec<Chain>>,
	pub max_concurrency: usize,
	pub provider_timeout_secs: u64,
	pub providers: ProviderEndpoints,
	/// JSON file listing the wallets to monitor.
	pub wallets_file: Option<PathBuf>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			auto_sync_enabled: true,
			interval_seconds: SyncInterval::default().as_secs(),
			chain_filter: None,
			max_concurrency: DEFAULT_MAX_CONCURRENCY,
			provider_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
			providers: ProviderEndpoints::default(),
			wallets_file: None,
		}
	}
}

impl EngineConfig {
	/// Load the configuration from a JSON file. A missing path yields the defaults.
	pub fn load(path: Option<&Path>) -> Result<Self, WalletSyncError> {
		let config = match path {
			Some(path) => {
				let content = std::fs::read_to_string(path)?;
				info!("Loaded engine configuration from {:?}", path);
				serde_json::from_str::<EngineConfig>(&content)?
			}
			None => EngineConfig::default(),
		};
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), WalletSyncError> {
		SyncInterval::try_from(self.interval_seconds)?;
		if self.max_concurrency == 0 {
			return Err(WalletSyncError::ConfigError(
				"max_concurrency must be greater than zero".to_string(),
			));
		}
		if self.provider_timeout_secs == 0 {
			return Err(WalletSyncError::ConfigError(
				"provider_timeout_secs must be greater than zero".to_string(),
			));
		}
		Ok(())
	}

	pub fn sync_config(&self) -> Result<SyncConfig, WalletSyncError> {
		Ok(SyncConfig {
			auto_sync_enabled: self.auto_sync_enabled,
			interval: SyncInterval::try_from(self.interval_seconds)?,
			chain_filter: self.chain_filter.clone(),
		})
	}

	pub fn attempt_timeout(&self) -> Duration {
		Duration::from_secs(self.provider_timeout_secs)
	}
}
