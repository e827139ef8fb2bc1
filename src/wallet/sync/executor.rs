use crate::provider::{ChainProvider, ProviderRequest, SyncErrorKind};
use crate::wallet::{SyncOutcome, WalletDescriptor};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Default bound on a single provider call
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs single sync attempts against the provider
pub struct SyncExecutor {
	provider: Arc<dyn ChainProvider>,
	timeout: Duration,
}

impl SyncExecutor {
	pub fn new(provider: Arc<dyn ChainProvider>, timeout: Duration) -> Self {
		Self { provider, timeout }
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Perform exactly one provider call for the wallet.
	///
	/// Never fails: provider errors, timeouts and panics inside the provider all come back as
	/// `SyncOutcome::Failure`.
	pub async fn execute(&self, wallet: &WalletDescriptor) -> SyncOutcome {
		let request = ProviderRequest {
			address: wallet.address.clone(),
			chain: wallet.chain,
		};
		let provider = Arc::clone(&self.provider);

		debug!(
			"Syncing wallet {} ({} on {}) via {}",
			wallet.id,
			wallet.address,
			wallet.chain,
			self.provider.name()
		);

		let started = Instant::now();
		// Runs on its own task so a panicking provider cannot unwind into the scheduler
		let mut call = tokio::spawn(async move { provider.fetch(&request).await });
		let result = tokio::time::timeout(self.timeout, &mut call).await;
		let duration_ms = started.elapsed().as_millis() as u64;

		match result {
			Ok(Ok(Ok(report))) => {
				let risk_score = match report.risk_score {
					Some(score) if score <= 100 => Some(score as u8),
					Some(score) => {
						warn!(
							"Discarding out of range risk score {} for wallet {}",
							score, wallet.id
						);
						None
					}
					None => None,
				};
				SyncOutcome::Success {
					transactions_found: report.transactions_found,
					balance: report.balance,
					transaction_count: report.transaction_count,
					risk_score,
					duration_ms,
				}
			}
			Ok(Ok(Err(e))) => {
				warn!("Sync of wallet {} failed after {}ms: {}", wallet.id, duration_ms, e);
				SyncOutcome::Failure {
					duration_ms,
					error_kind: e.kind(),
				}
			}
			Ok(Err(join_error)) => {
				error!(
					"Provider {} aborted while syncing wallet {}: {}",
					self.provider.name(),
					wallet.id,
					join_error
				);
				SyncOutcome::Failure {
					duration_ms,
					error_kind: SyncErrorKind::Unknown,
				}
			}
			Err(_) => {
				call.abort();
				warn!(
					"Sync of wallet {} timed out after {}s",
					wallet.id,
					self.timeout.as_secs()
				);
				SyncOutcome::Failure {
					duration_ms,
					error_kind: SyncErrorKind::ProviderTimeout,
				}
			}
		}
	}
}
