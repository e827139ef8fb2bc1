//! Wallet sync engine and integration point for all sync services.
//!
//! This module defines the `WalletSyncEngine`, the façade the rest of the application talks to.
//! It owns the snapshot store, the statistics aggregator, the connectivity monitor and the event
//! dispatcher, wires them into a `FanOutScheduler`, and runs the auto-sync timer as a background
//! task.
//!
//! The engine is responsible for:
//! - Managing the working set of monitored wallets
//! - Validating sync requests synchronously and running the accepted work on spawned tasks
//! - Driving the auto-sync timer from the current `SyncConfig` and connectivity
//! - Exposing snapshots, statistics and the event stream to consumers
//!
//! No façade method waits on a provider. `sync_one` and `sync_all` return a join handle as soon as
//! the request has been accepted.

use crate::config::{DEFAULT_MAX_CONCURRENCY, SyncConfig, SyncInterval};
use crate::provider::{Chain, ChainProvider, ProviderRequest};
use crate::wallet::sync::{
    connectivity::ConnectivityMonitor,
    events::{CycleTrigger, EventDispatcher, SyncEvent, SyncEventHandler},
    executor::{DEFAULT_ATTEMPT_TIMEOUT, SyncExecutor},
    registry::WalletRegistry,
    scheduler::{AttemptReport, CycleReport, FanOutScheduler, run_auto_sync},
    snapshot_store::WalletSnapshotStore,
    statistics::{EngineStatistics, StatisticsAggregator},
};
use crate::wallet::{WalletDescriptor, WalletId, WalletSnapshot, WalletSyncError};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Builder for `WalletSyncEngine`
pub struct WalletSyncEngineBuilder {
    provider: Arc<dyn ChainProvider>,
    sync_config: SyncConfig,
    max_concurrency: usize,
    attempt_timeout: Duration,
    connectivity: Option<ConnectivityMonitor>,
    event_capacity: usize,
}

impl WalletSyncEngineBuilder {
    pub fn with_sync_config(mut self, sync_config: SyncConfig) -> Self {
        self.sync_config = sync_config;
        self
    }

    /// Upper bound on provider calls running at the same time.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Share an existing connectivity monitor, e.g. one fed by the platform.
    pub fn with_connectivity(mut self, connectivity: ConnectivityMonitor) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    /// Build the engine and start its auto-sync timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<WalletSyncEngine, WalletSyncError> {
        if self.max_concurrency == 0 {
            return Err(WalletSyncError::ConfigError(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(WalletSyncError::ConfigError(
                "attempt timeout must be greater than zero".to_string(),
            ));
        }

        let store = Arc::new(WalletSnapshotStore::new());
        let statistics = Arc::new(StatisticsAggregator::new());
        let connectivity = self.connectivity.unwrap_or_default();
        let events = Arc::new(EventDispatcher::new(self.event_capacity));
        let scheduler = Arc::new(FanOutScheduler::new(
            Arc::clone(&store),
            SyncExecutor::new(Arc::clone(&self.provider), self.attempt_timeout),
            Arc::clone(&statistics),
            connectivity.clone(),
            Arc::clone(&events),
            self.max_concurrency,
        ));

        let (config_tx, config_rx) = watch::channel(self.sync_config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let online_rx = connectivity.subscribe();
        let online = *online_rx.borrow();
        let worker = tokio::spawn(run_auto_sync(
            Arc::clone(&scheduler),
            config_rx,
            online_rx,
            online,
            shutdown_rx,
        ));

        info!(
            "Wallet sync engine started (max concurrency {}, attempt timeout {}s)",
            self.max_concurrency,
            self.attempt_timeout.as_secs()
        );

        Ok(WalletSyncEngine {
            provider: self.provider,
            store,
            statistics,
            connectivity,
            events,
            scheduler,
            config_tx,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
        })
    }
}

/// Wallet sync engine that coordinates all sync components.
pub struct WalletSyncEngine {
    provider: Arc<dyn ChainProvider>,
    store: Arc<WalletSnapshotStore>,
    statistics: Arc<StatisticsAggregator>,
    connectivity: ConnectivityMonitor,
    events: Arc<EventDispatcher>,
    scheduler: Arc<FanOutScheduler>,
    config_tx: watch::Sender<SyncConfig>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WalletSyncEngine {
    /// Start building an engine backed by the given provider.
    pub fn builder(provider: Arc<dyn ChainProvider>) -> WalletSyncEngineBuilder {
        WalletSyncEngineBuilder {
            provider,
            sync_config: SyncConfig::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            connectivity: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Add a wallet to the working set. It is picked up by the next cycle.
    pub fn add_wallet(&self, wallet: WalletDescriptor) -> Result<WalletSnapshot, WalletSyncError> {
        let snapshot = self.store.insert(&wallet)?;
        debug!("Added wallet {} ({} on {})", wallet.id, wallet.address, wallet.chain);
        Ok(snapshot)
    }

    /// Remove a wallet. An attempt already in flight for it finishes, but its result is dropped.
    ///
    /// The provider is told to drop its state for the address once no remaining wallet uses it.
    pub fn remove_wallet(&self, id: &WalletId) -> Result<WalletSnapshot, WalletSyncError> {
        let snapshot = self.store.remove(id)?;
        let still_monitored = self
            .store
            .list(Some(&[snapshot.chain]))
            .iter()
            .any(|other| other.address == snapshot.address);
        if !still_monitored {
            self.provider.forget(&ProviderRequest {
                address: snapshot.address.clone(),
                chain: snapshot.chain,
            });
        }
        debug!("Removed wallet {}", id);
        Ok(snapshot)
    }

    /// Start one sync attempt for a wallet.
    ///
    /// # Arguments
    ///
    /// * `id` - The wallet to sync
    ///
    /// # Returns
    ///
    /// A handle resolving to the attempt's report, or an error when the engine is offline, the
    /// wallet is unknown or an attempt for it is already in flight.
    pub fn sync_one(&self, id: &WalletId) -> Result<JoinHandle<AttemptReport>, WalletSyncError> {
        let ticket = self.scheduler.begin_attempt(id)?;
        let scheduler = Arc::clone(&self.scheduler);
        Ok(tokio::spawn(async move { scheduler.run_attempt(ticket).await }))
    }

    /// Start a manual cycle over all wallets, or only those on the given chains.
    ///
    /// Rejected when the engine is offline or another cycle is running.
    pub fn sync_all(
        &self,
        chain_filter: Option<Vec<Chain>>,
    ) -> Result<JoinHandle<CycleReport>, WalletSyncError> {
        let guard = self.scheduler.try_begin_cycle()?;
        let scheduler = Arc::clone(&self.scheduler);
        Ok(tokio::spawn(async move {
            scheduler
                .run_cycle(guard, CycleTrigger::Manual, chain_filter)
                .await
        }))
    }

    /// Enable or disable auto-sync, optionally changing the interval.
    ///
    /// A running cycle is never restarted. A shorter interval counts from the last scheduled fire.
    pub fn set_auto_sync(&self, enabled: bool, interval: Option<SyncInterval>) {
        self.config_tx.send_modify(|config| {
            config.auto_sync_enabled = enabled;
            if let Some(interval) = interval {
                config.interval = interval;
            }
        });
        info!(
            "Auto-sync {} (every {}s)",
            if enabled { "enabled" } else { "disabled" },
            self.config_tx.borrow().interval.as_secs()
        );
    }

    /// Restrict scheduled cycles to some chains. `None` covers every wallet.
    pub fn set_chain_filter(&self, chain_filter: Option<Vec<Chain>>) {
        self.config_tx.send_modify(|config| config.chain_filter = chain_filter);
    }

    pub fn config(&self) -> SyncConfig {
        self.config_tx.borrow().clone()
    }

    pub fn list_snapshots(&self, chain_filter: Option<&[Chain]>) -> Vec<WalletSnapshot> {
        self.store.list(chain_filter)
    }

    pub fn snapshot(&self, id: &WalletId) -> Result<WalletSnapshot, WalletSyncError> {
        self.store.get(id)
    }

    pub fn statistics(&self) -> EngineStatistics {
        self.statistics.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Register a handler that sees every event, e.g. the alert subsystem.
    pub fn register_handler(&self, handler: Arc<dyn SyncEventHandler>) {
        info!("Registering sync event handler {}", handler.name());
        self.events.register_handler(handler);
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Seed the working set from a registry. Wallets already present are left untouched.
    ///
    /// Returns the number of wallets added.
    pub async fn load_from_registry(
        &self,
        registry: &dyn WalletRegistry,
    ) -> Result<usize, WalletSyncError> {
        let mut added = 0;
        for wallet in registry.load_wallets().await? {
            match self.store.insert(&wallet) {
                Ok(_) => added += 1,
                Err(WalletSyncError::DuplicateWallet(id)) => {
                    warn!("Wallet {} is listed twice, keeping the first entry", id);
                }
                Err(e) => return Err(e),
            }
        }
        info!("Working set now holds {} wallets", self.store.len());
        Ok(added)
    }

    /// Stop the auto-sync timer and wait for it to exit.
    ///
    /// Attempts already spawned keep running to completion.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Auto-sync timer ended abnormally: {}", e);
            }
        }
        info!("Wallet sync engine stopped");
    }
}

impl Drop for WalletSyncEngine {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SyncErrorKind;
    use crate::provider::mock::{MockBehavior, MockProvider};
    use crate::wallet::SyncStatus;
    use tokio::time::{Instant, sleep};

    fn manual_only() -> SyncConfig {
        SyncConfig {
            auto_sync_enabled: false,
            ..SyncConfig::default()
        }
    }

    fn engine_with(provider: &Arc<MockProvider>, sync_config: SyncConfig) -> WalletSyncEngine {
        let engine = WalletSyncEngine::builder(provider.clone())
            .with_sync_config(sync_config)
            .build()
            .unwrap();
        for (id, chain) in [("x", Chain::Bitcoin), ("y", Chain::Ethereum), ("z", Chain::Polygon)] {
            engine
                .add_wallet(WalletDescriptor::new(id, id, chain))
                .unwrap();
        }
        engine
    }

    fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn sync_all_collects_every_member() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 2, Duration::from_millis(100));
        provider.succeed("y", 0, Duration::from_millis(300));
        provider.succeed("z", 5, Duration::from_millis(200));
        let engine = engine_with(&provider, manual_only());

        let report = engine.sync_all(None).unwrap().await.unwrap();

        assert_eq!(report.attempts.len(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.transactions_found(), 7);
        assert!(report.skipped.is_empty());
        assert!(
            engine
                .list_snapshots(None)
                .iter()
                .all(|s| s.status == SyncStatus::Success)
        );

        let stats = engine.statistics();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.successful_attempts, 3);
        assert_eq!(stats.total_transactions_found, 7);
        assert!((stats.average_duration_ms - 200.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_for_a_syncing_wallet_is_rejected() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 1, Duration::from_secs(5));
        let engine = engine_with(&provider, manual_only());

        let handle = engine.sync_one(&"x".into()).unwrap();
        assert_eq!(engine.snapshot(&"x".into()).unwrap().status, SyncStatus::Syncing);
        assert!(matches!(
            engine.sync_one(&"x".into()),
            Err(WalletSyncError::AlreadySyncing(_))
        ));

        let report = handle.await.unwrap();
        assert!(report.applied);
        assert_eq!(provider.calls("x"), 1);
        assert_eq!(engine.statistics().total_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_one_wallet_only() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 1, Duration::from_secs(1));
        provider.succeed("y", 1, Duration::from_secs(120));
        let engine = engine_with(&provider, manual_only());

        let report = engine.sync_all(None).unwrap().await.unwrap();
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);

        let y = engine.snapshot(&"y".into()).unwrap();
        assert_eq!(y.status, SyncStatus::Error);
        assert_eq!(y.last_error, Some(SyncErrorKind::ProviderTimeout));
        assert_eq!(y.last_result, None);
        assert_eq!(engine.snapshot(&"x".into()).unwrap().status, SyncStatus::Success);
        assert_eq!(engine.statistics().failed_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_last_known_good_result() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 3, Duration::from_millis(100));
        let engine = engine_with(&provider, manual_only());
        engine.sync_one(&"x".into()).unwrap().await.unwrap();

        provider.script(
            "x",
            MockBehavior::Fail(SyncErrorKind::ProviderUnavailable),
            Duration::from_millis(40),
        );
        engine.sync_one(&"x".into()).unwrap().await.unwrap();

        let x = engine.snapshot(&"x".into()).unwrap();
        assert_eq!(x.status, SyncStatus::Error);
        assert_eq!(x.last_error, Some(SyncErrorKind::ProviderUnavailable));
        let result = x.last_result.unwrap();
        assert_eq!(result.balance, "1.50000000");
        assert_eq!(result.transactions_found, 3);
        assert_eq!(result.sync_duration_ms, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sync_all_is_rejected_and_busy_wallets_are_skipped() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 0, Duration::from_secs(5));
        provider.succeed("y", 0, Duration::from_secs(5));
        let engine = engine_with(&provider, manual_only());

        let single = engine.sync_one(&"x".into()).unwrap();
        let cycle = engine.sync_all(None).unwrap();
        assert!(matches!(
            engine.sync_all(None),
            Err(WalletSyncError::CycleInProgress)
        ));

        let report = cycle.await.unwrap();
        single.await.unwrap();
        assert_eq!(report.skipped, vec![WalletId::from("x")]);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(provider.calls("x"), 1);

        assert!(engine.sync_all(None).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let provider = Arc::new(MockProvider::new());
        let engine = WalletSyncEngine::builder(provider.clone())
            .with_sync_config(manual_only())
            .with_max_concurrency(2)
            .build()
            .unwrap();
        for id in ["a", "b", "c", "d"] {
            provider.succeed(id, 0, Duration::from_secs(10));
            engine
                .add_wallet(WalletDescriptor::new(id, id, Chain::Bitcoin))
                .unwrap();
        }

        let started = Instant::now();
        let report = engine.sync_all(None).unwrap().await.unwrap();

        assert_eq!(report.succeeded(), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
        // Waiting for a permit does not count against the attempt
        assert!(report.attempts.iter().all(|a| a.outcome.duration_ms() == 10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn chain_filter_and_empty_working_set() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, manual_only());

        let report = engine
            .sync_all(Some(vec![Chain::Ethereum]))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].wallet_id, WalletId::from("y"));

        let report = engine
            .sync_all(Some(vec![Chain::Solana]))
            .unwrap()
            .await
            .unwrap();
        assert!(report.attempts.is_empty());
        assert_eq!(provider.total_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_engine_refuses_work() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, manual_only());

        engine.connectivity().set_online(false);
        assert!(matches!(
            engine.sync_one(&"x".into()),
            Err(WalletSyncError::Offline)
        ));
        assert!(matches!(engine.sync_all(None), Err(WalletSyncError::Offline)));
        assert!(
            engine
                .list_snapshots(None)
                .iter()
                .all(|s| s.status == SyncStatus::Idle)
        );

        engine.connectivity().set_online(true);
        assert!(engine.sync_one(&"x".into()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_during_flight_discards_result() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 4, Duration::from_secs(5));
        let engine = engine_with(&provider, manual_only());
        let mut rx = engine.subscribe();

        let handle = engine.sync_one(&"x".into()).unwrap();
        engine.remove_wallet(&"x".into()).unwrap();

        let report = handle.await.unwrap();
        assert!(!report.applied);
        assert!(matches!(
            engine.snapshot(&"x".into()),
            Err(WalletSyncError::WalletNotFound(_))
        ));
        assert_eq!(engine.statistics().total_attempts, 1);
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|e| matches!(e, SyncEvent::NewActivity { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn new_activity_only_for_found_transactions() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 2, Duration::ZERO);
        provider.succeed("y", 0, Duration::ZERO);
        provider.script(
            "z",
            MockBehavior::Fail(SyncErrorKind::InvalidWallet),
            Duration::ZERO,
        );
        let engine = engine_with(&provider, manual_only());
        let mut rx = engine.subscribe();

        engine.sync_all(None).unwrap().await.unwrap();

        let events = drain(&mut rx);
        let activity: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::NewActivity {
                    wallet_id,
                    transactions_found,
                    ..
                } => Some((wallet_id.clone(), *transactions_found)),
                _ => None,
            })
            .collect();
        assert_eq!(activity, vec![(WalletId::from("x"), 2)]);
        assert!(matches!(
            events.first(),
            Some(SyncEvent::CycleStarted {
                trigger: CycleTrigger::Manual,
                wallets: 3
            })
        ));
        assert_eq!(
            events.last(),
            Some(&SyncEvent::CycleCompleted {
                trigger: CycleTrigger::Manual,
                succeeded: 2,
                failed: 1,
                skipped: 0,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auto_sync_fires_every_interval() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, SyncConfig::default());

        sleep(Duration::from_secs(59)).await;
        assert_eq!(provider.total_calls(), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.total_calls(), 3);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(provider.total_calls(), 6);

        engine.set_auto_sync(false, None);
        sleep(Duration::from_secs(300)).await;
        assert_eq!(provider.total_calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnection_waits_a_full_interval() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, SyncConfig::default());
        engine.connectivity().set_online(false);

        sleep(Duration::from_secs(300)).await;
        assert_eq!(provider.total_calls(), 0);

        engine.connectivity().set_online(true);
        sleep(Duration::from_secs(59)).await;
        assert_eq!(provider.total_calls(), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.total_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_interval_fires_once() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, SyncConfig::default());

        sleep(Duration::from_secs(50)).await;
        assert_eq!(provider.total_calls(), 0);

        engine.set_auto_sync(true, Some(SyncInterval::ThirtySeconds));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(provider.total_calls(), 3);
        sleep(Duration::from_secs(28)).await;
        assert_eq!(provider.total_calls(), 3);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.total_calls(), 6);
        assert_eq!(engine.config().interval, SyncInterval::ThirtySeconds);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_timer() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, SyncConfig::default());

        engine.shutdown().await;
        sleep(Duration::from_secs(600)).await;
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_transitions_are_published() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, SyncConfig::default());
        let mut rx = engine.subscribe();

        engine.connectivity().set_online(false);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(
            drain(&mut rx),
            vec![SyncEvent::ConnectivityChanged { online: false }]
        );

        engine.connectivity().set_online(true);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(
            drain(&mut rx),
            vec![SyncEvent::ConnectivityChanged { online: true }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tick_during_running_cycle_is_skipped() {
        let provider = Arc::new(MockProvider::new());
        provider.succeed("x", 0, Duration::from_secs(45));
        let engine = WalletSyncEngine::builder(provider.clone())
            .with_sync_config(SyncConfig {
                interval: SyncInterval::ThirtySeconds,
                ..SyncConfig::default()
            })
            .with_attempt_timeout(Duration::from_secs(300))
            .build()
            .unwrap();
        engine
            .add_wallet(WalletDescriptor::new("x", "x", Chain::Bitcoin))
            .unwrap();

        // Fires at 30s; the 60s tick lands while that cycle runs until 75s
        sleep(Duration::from_secs(89)).await;
        assert_eq!(provider.calls("x"), 1);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.calls("x"), 2);
    }

    #[tokio::test]
    async fn removal_forgets_address_once_unused() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, manual_only());
        engine
            .add_wallet(WalletDescriptor::new("x-copy", "x", Chain::Bitcoin))
            .unwrap();

        engine.remove_wallet(&"x".into()).unwrap();
        assert!(provider.forgotten().is_empty());

        engine.remove_wallet(&"x-copy".into()).unwrap();
        engine.remove_wallet(&"y".into()).unwrap();
        assert_eq!(provider.forgotten(), vec!["x".to_string(), "y".to_string()]);
    }

    struct StaticRegistry(Vec<WalletDescriptor>);

    #[async_trait::async_trait]
    impl WalletRegistry for StaticRegistry {
        async fn load_wallets(&self) -> Result<Vec<WalletDescriptor>, WalletSyncError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn registry_seeding_skips_duplicates() {
        let provider = Arc::new(MockProvider::new());
        let engine = engine_with(&provider, manual_only());
        let registry = StaticRegistry(vec![
            WalletDescriptor::new("x", "x", Chain::Bitcoin),
            WalletDescriptor::new("w", "0xw", Chain::Arbitrum),
            WalletDescriptor::new("w", "0xw", Chain::Arbitrum),
        ]);

        assert_eq!(engine.load_from_registry(&registry).await.unwrap(), 1);
        assert_eq!(engine.list_snapshots(None).len(), 4);
    }

    #[tokio::test]
    async fn builder_rejects_invalid_limits() {
        let provider = Arc::new(MockProvider::new());
        assert!(matches!(
            WalletSyncEngine::builder(provider.clone())
                .with_max_concurrency(0)
                .build(),
            Err(WalletSyncError::ConfigError(_))
        ));
        assert!(matches!(
            WalletSyncEngine::builder(provider)
                .with_attempt_timeout(Duration::ZERO)
                .build(),
            Err(WalletSyncError::ConfigError(_))
        ));
    }
}
