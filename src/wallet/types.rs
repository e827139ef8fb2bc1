use crate::provider::{Chain, SyncErrorKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque wallet identifier owned by the wallet registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for WalletId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for WalletId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for WalletId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// A monitored wallet as handed over by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDescriptor {
	pub id: WalletId,
	pub address: String,
	pub chain: Chain,
}

impl WalletDescriptor {
	pub fn new(id: impl Into<WalletId>, address: impl Into<String>, chain: Chain) -> Self {
		Self {
			id: id.into(),
			address: address.into(),
			chain,
		}
	}
}

/// Sync status of a single wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
	Idle,
	Syncing,
	Success,
	Error,
}

/// Result payload of the last sync attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
	pub transactions_found: u64,
	pub balance: String,
	pub transaction_count: u64,
	pub risk_score: Option<u8>,
	pub sync_duration_ms: u64,
}

/// Outcome of one sync attempt, as produced by the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
	Success {
		transactions_found: u64,
		balance: String,
		transaction_count: u64,
		risk_score: Option<u8>,
		duration_ms: u64,
	},
	Failure {
		duration_ms: u64,
		error_kind: SyncErrorKind,
	},
}

impl SyncOutcome {
	pub fn duration_ms(&self) -> u64 {
		match self {
			SyncOutcome::Success { duration_ms, .. } | SyncOutcome::Failure { duration_ms, .. } => {
				*duration_ms
			}
		}
	}

	pub fn is_success(&self) -> bool {
		matches!(self, SyncOutcome::Success { .. })
	}

	/// New transactions reported by a successful attempt, zero otherwise.
	pub fn transactions_found(&self) -> u64 {
		match self {
			SyncOutcome::Success {
				transactions_found, ..
			} => *transactions_found,
			SyncOutcome::Failure { .. } => 0,
		}
	}
}

/// Latest known state of a monitored wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
	pub wallet_id: WalletId,
	pub address: String,
	pub chain: Chain,
	pub status: SyncStatus,
	/// Completion time of the last attempt, successful or not.
	pub last_sync_at: Option<DateTime<Utc>>,
	pub last_result: Option<SyncResult>,
	/// Failure kind of the last attempt, cleared by the next success.
	pub last_error: Option<SyncErrorKind>,
}

impl WalletSnapshot {
	/// A fresh, never synced snapshot for the wallet.
	pub fn new(wallet: &WalletDescriptor) -> Self {
		Self {
			wallet_id: wallet.id.clone(),
			address: wallet.address.clone(),
			chain: wallet.chain,
			status: SyncStatus::Idle,
			last_sync_at: None,
			last_result: None,
			last_error: None,
		}
	}

	pub fn descriptor(&self) -> WalletDescriptor {
		WalletDescriptor {
			id: self.wallet_id.clone(),
			address: self.address.clone(),
			chain: self.chain,
		}
	}

	pub fn is_syncing(&self) -> bool {
		self.status == SyncStatus::Syncing
	}

	/// Fold a completed attempt into the snapshot.
	///
	/// A failure only touches the status, the timestamp, the error and the duration; the
	/// balance and counts of the last good result stay visible.
	pub fn apply_outcome(&mut self, outcome: &SyncOutcome, completed_at: DateTime<Utc>) {
		self.last_sync_at = Some(completed_at);
		match outcome {
			SyncOutcome::Success {
				transactions_found,
				balance,
				transaction_count,
				risk_score,
				duration_ms,
			} => {
				self.status = SyncStatus::Success;
				self.last_error = None;
				self.last_result = Some(SyncResult {
					transactions_found: *transactions_found,
					balance: balance.clone(),
					transaction_count: *transaction_count,
					risk_score: *risk_score,
					sync_duration_ms: *duration_ms,
				});
			}
			SyncOutcome::Failure {
				duration_ms,
				error_kind,
			} => {
				self.status = SyncStatus::Error;
				self.last_error = Some(*error_kind);
				if let Some(result) = self.last_result.as_mut() {
					result.sync_duration_ms = *duration_ms;
				}
			}
		}
	}
}

/// Errors returned by the engine when a request cannot be accepted
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Engine is offline")]
	Offline,

	#[error("Wallet not found: {0}")]
	WalletNotFound(WalletId),

	#[error("Wallet already syncing: {0}")]
	AlreadySyncing(WalletId),

	#[error("Wallet already registered: {0}")]
	DuplicateWallet(WalletId),

	#[error("A sync cycle is already in progress")]
	CycleInProgress,

	#[error("Configuration error: {0}")]
	ConfigError(String),

	#[error("Registry error: {0}")]
	RegistryError(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),
}
