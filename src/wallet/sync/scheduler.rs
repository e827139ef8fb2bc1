use crate::config::SyncConfig;
use crate::provider::Chain;
use crate::wallet::sync::{
	connectivity::ConnectivityMonitor,
	events::{CycleTrigger, EventDispatcher, SyncEvent},
	executor::SyncExecutor,
	snapshot_store::{SyncTicket, WalletSnapshotStore},
	statistics::StatisticsAggregator,
};
use crate::wallet::{SyncOutcome, SyncStatus, WalletId, WalletSyncError};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Result of one wallet attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
	pub wallet_id: WalletId,
	pub outcome: SyncOutcome,
	/// False when the wallet left the working set before the attempt finished.
	pub applied: bool,
}

/// Result of one sync cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
	pub trigger: CycleTrigger,
	pub started_at: DateTime<Utc>,
	pub finished_at: DateTime<Utc>,
	pub attempts: Vec<AttemptReport>,
	/// Members that already had an attempt in flight when the cycle started.
	pub skipped: Vec<WalletId>,
}

impl CycleReport {
	pub fn succeeded(&self) -> usize {
		self.attempts.iter().filter(|a| a.outcome.is_success()).count()
	}

	pub fn failed(&self) -> usize {
		self.attempts.len() - self.succeeded()
	}

	pub fn transactions_found(&self) -> u64 {
		self.attempts.iter().map(|a| a.outcome.transactions_found()).sum()
	}
}

/// Holds the single sync-all slot until dropped
#[derive(Debug)]
pub struct CycleGuard {
	running: Arc<AtomicBool>,
}

impl Drop for CycleGuard {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
	}
}

/// Fans sync requests out over the working set with bounded concurrency
pub struct FanOutScheduler {
	store: Arc<WalletSnapshotStore>,
	executor: SyncExecutor,
	statistics: Arc<StatisticsAggregator>,
	connectivity: ConnectivityMonitor,
	events: Arc<EventDispatcher>,
	permits: Semaphore,
	cycle_running: Arc<AtomicBool>,
}

impl FanOutScheduler {
	pub fn new(
		store: Arc<WalletSnapshotStore>,
		executor: SyncExecutor,
		statistics: Arc<StatisticsAggregator>,
		connectivity: ConnectivityMonitor,
		events: Arc<EventDispatcher>,
		max_concurrency: usize,
	) -> Self {
		Self {
			store,
			executor,
			statistics,
			connectivity,
			events,
			permits: Semaphore::new(max_concurrency.max(1)),
			cycle_running: Arc::new(AtomicBool::new(false)),
		}
	}

	fn ensure_online(&self) -> Result<(), WalletSyncError> {
		if self.connectivity.is_online() {
			Ok(())
		} else {
			Err(WalletSyncError::Offline)
		}
	}

	/// Claim a wallet for one attempt. Rejected while offline or while the wallet is syncing.
	pub fn begin_attempt(&self, id: &WalletId) -> Result<SyncTicket, WalletSyncError> {
		self.ensure_online()?;
		self.store.try_begin_sync(id)
	}

	/// Run a claimed attempt to completion and fold its outcome into the store and statistics.
	pub async fn run_attempt(&self, ticket: SyncTicket) -> AttemptReport {
		let wallet = ticket.wallet().clone();
		self.events
			.dispatch(SyncEvent::StatusChanged {
				wallet_id: wallet.id.clone(),
				status: SyncStatus::Syncing,
			})
			.await;

		let outcome = {
			// The semaphore is never closed, so acquire only fails if that changes
			let _permit = self.permits.acquire().await.ok();
			self.executor.execute(&wallet).await
		};

		let completed_at = Utc::now();
		let updated = self.store.complete_sync(ticket, &outcome, completed_at);
		self.statistics.record(&outcome, completed_at);

		match &updated {
			Some(snapshot) => {
				self.events
					.dispatch(SyncEvent::StatusChanged {
						wallet_id: wallet.id.clone(),
						status: snapshot.status,
					})
					.await;
				let found = outcome.transactions_found();
				if found > 0 {
					self.events
						.dispatch(SyncEvent::NewActivity {
							wallet_id: wallet.id.clone(),
							transactions_found: found,
							timestamp: completed_at,
						})
						.await;
				}
			}
			None => {
				debug!(
					"Wallet {} left the working set during sync, discarding result",
					wallet.id
				);
			}
		}

		AttemptReport {
			wallet_id: wallet.id,
			outcome,
			applied: updated.is_some(),
		}
	}

	/// Sync a single wallet and wait for the outcome.
	pub async fn sync_one(&self, id: &WalletId) -> Result<AttemptReport, WalletSyncError> {
		let ticket = self.begin_attempt(id)?;
		Ok(self.run_attempt(ticket).await)
	}

	/// Take the sync-all slot. Rejected while offline or while another cycle runs.
	pub fn try_begin_cycle(&self) -> Result<CycleGuard, WalletSyncError> {
		self.ensure_online()?;
		self.cycle_running
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.map_err(|_| WalletSyncError::CycleInProgress)?;
		Ok(CycleGuard {
			running: Arc::clone(&self.cycle_running),
		})
	}

	pub fn is_cycle_running(&self) -> bool {
		self.cycle_running.load(Ordering::Acquire)
	}

	/// Sync every wallet of the working set concurrently and wait for all of them.
	pub async fn run_cycle(
		&self,
		guard: CycleGuard,
		trigger: CycleTrigger,
		chain_filter: Option<Vec<Chain>>,
	) -> CycleReport {
		let started_at = Utc::now();
		let mut tickets = Vec::new();
		let mut skipped = Vec::new();

		for id in self.store.working_set(chain_filter.as_deref()) {
			match self.store.try_begin_sync(&id) {
				Ok(ticket) => tickets.push(ticket),
				Err(e) => {
					debug!("Skipping wallet {} in {:?} cycle: {}", id, trigger, e);
					skipped.push(id);
				}
			}
		}

		info!(
			"Starting {:?} sync cycle over {} wallets ({} skipped)",
			trigger,
			tickets.len(),
			skipped.len()
		);
		self.events
			.dispatch(SyncEvent::CycleStarted {
				trigger,
				wallets: tickets.len(),
			})
			.await;

		let attempts = join_all(tickets.into_iter().map(|ticket| self.run_attempt(ticket))).await;

		let report = CycleReport {
			trigger,
			started_at,
			finished_at: Utc::now(),
			attempts,
			skipped,
		};
		drop(guard);

		info!(
			"Sync cycle completed: {} succeeded, {} failed, {} skipped, {} new transactions",
			report.succeeded(),
			report.failed(),
			report.skipped.len(),
			report.transactions_found()
		);
		self.events
			.dispatch(SyncEvent::CycleCompleted {
				trigger,
				succeeded: report.succeeded(),
				failed: report.failed(),
				skipped: report.skipped.len(),
			})
			.await;

		report
	}

	/// Take the sync-all slot and run a full cycle.
	pub async fn sync_all(
		&self,
		trigger: CycleTrigger,
		chain_filter: Option<Vec<Chain>>,
	) -> Result<CycleReport, WalletSyncError> {
		let guard = self.try_begin_cycle()?;
		Ok(self.run_cycle(guard, trigger, chain_filter).await)
	}

	pub(crate) fn events(&self) -> &EventDispatcher {
		&self.events
	}
}

/// Auto-sync timer loop.
///
/// Fires a scheduled cycle every configured interval while auto-sync is enabled and the engine
/// is online. Going offline or disabling auto-sync disarms the timer; re-arming starts a full
/// interval, so missed ticks are never replayed. An interval change is measured from the last
/// fire. A tick landing while a cycle is still running is skipped.
///
/// Every online/offline transition observed since `last_online` (the state when `online_rx` was
/// subscribed) is published as a `ConnectivityChanged` event.
pub(crate) async fn run_auto_sync(
	scheduler: Arc<FanOutScheduler>,
	mut config_rx: watch::Receiver<SyncConfig>,
	mut online_rx: watch::Receiver<bool>,
	mut last_online: bool,
	mut shutdown: watch::Receiver<bool>,
) {
	let mut anchor: Option<Instant> = None;

	loop {
		let config = config_rx.borrow_and_update().clone();
		let online = *online_rx.borrow_and_update();
		if online != last_online {
			last_online = online;
			scheduler
				.events()
				.dispatch(SyncEvent::ConnectivityChanged { online })
				.await;
		}
		let armed = config.auto_sync_enabled && online;

		let deadline = if armed {
			*anchor.get_or_insert_with(Instant::now) + config.interval.as_duration()
		} else {
			anchor = None;
			Instant::now()
		};

		tokio::select! {
			biased;
			changed = shutdown.changed() => {
				if changed.is_err() || *shutdown.borrow() {
					break;
				}
			}
			changed = config_rx.changed() => {
				if changed.is_err() {
					break;
				}
			}
			changed = online_rx.changed() => {
				if changed.is_err() {
					break;
				}
			}
			_ = time::sleep_until(deadline), if armed => {
				anchor = Some(Instant::now());
				match scheduler.try_begin_cycle() {
					Ok(guard) => {
						let worker = Arc::clone(&scheduler);
						let chain_filter = config.chain_filter.clone();
						tokio::spawn(async move {
							worker.run_cycle(guard, CycleTrigger::Scheduled, chain_filter).await;
						});
					}
					Err(e) => {
						debug!("Skipping scheduled sync cycle: {}", e);
					}
				}
			}
		}
	}

	debug!("Auto-sync timer stopped");
}
