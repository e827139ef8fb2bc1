use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use wallet_sync_engine::{
	EngineConfig, FileWalletRegistry, HttpChainProvider, SyncEvent, SyncEventHandler, SyncInterval,
	WalletSyncEngine, WalletSyncError,
};

#[derive(Parser)]
#[command(name = "wallet-sync-engine", about = "Background balance and activity sync for monitored wallets")]
struct Cli {
	/// JSON configuration file. Built-in defaults are used when omitted.
	#[arg(long, env = "WALLET_SYNC_CONFIG")]
	config: Option<PathBuf>,

	/// JSON file listing the wallets to monitor. Overrides `wallets_file` from the config.
	#[arg(long, env = "WALLET_SYNC_WALLETS")]
	wallets: Option<PathBuf>,

	/// Auto-sync interval in seconds: 30, 60, 120 or 300.
	#[arg(long, env = "WALLET_SYNC_INTERVAL")]
	interval: Option<u64>,

	/// Disable the auto-sync timer.
	#[arg(long, env = "WALLET_SYNC_NO_AUTO_SYNC")]
	no_auto_sync: bool,

	/// Run a single sync cycle and exit.
	#[arg(long)]
	once: bool,

	/// Etherscan API key, shared by the Etherscan and Polygonscan endpoints.
	#[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
	etherscan_api_key: Option<String>,
}

/// Logs every sync event. Stands in for the alert subsystem when running headless.
struct LoggingEventHandler;

#[async_trait::async_trait]
impl SyncEventHandler for LoggingEventHandler {
	async fn handle(&self, event: &SyncEvent) -> Result<(), WalletSyncError> {
		match event {
			SyncEvent::StatusChanged { wallet_id, status } => {
				debug!("Wallet {} is now {:?}", wallet_id, status);
			}
			SyncEvent::NewActivity {
				wallet_id,
				transactions_found,
				timestamp,
			} => {
				info!(
					"New activity on wallet {}: {} transaction(s) at {}",
					wallet_id, transactions_found, timestamp
				);
			}
			SyncEvent::CycleStarted { trigger, wallets } => {
				debug!("{:?} cycle started over {} wallets", trigger, wallets);
			}
			SyncEvent::CycleCompleted { .. } => {}
			SyncEvent::ConnectivityChanged { online } => {
				if *online {
					info!("Back online, auto-sync resumes after one interval");
				} else {
					warn!("Offline, auto-sync suspended");
				}
			}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"LoggingEventHandler"
	}
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let cli = Cli::parse();
	if let Err(e) = run(cli).await {
		error!("Wallet sync engine failed: {}", e);
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<(), WalletSyncError> {
	info!("Starting wallet sync engine");

	let mut config = EngineConfig::load(cli.config.as_deref())?;
	if let Some(interval) = cli.interval {
		config.interval_seconds = SyncInterval::try_from(interval)?.as_secs();
	}
	if cli.no_auto_sync || cli.once {
		config.auto_sync_enabled = false;
	}
	if cli.etherscan_api_key.is_some() {
		config.providers.etherscan_api_key = cli.etherscan_api_key;
	}
	if config.providers.etherscan_api_key.is_none() {
		warn!("No Etherscan API key configured, EVM requests will be heavily rate limited");
	}

	let provider = HttpChainProvider::new(config.providers.clone(), config.attempt_timeout())
		.map_err(|e| WalletSyncError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

	let engine = WalletSyncEngine::builder(Arc::new(provider))
		.with_sync_config(config.sync_config()?)
		.with_max_concurrency(config.max_concurrency)
		.with_attempt_timeout(config.attempt_timeout())
		.build()?;
	engine.register_handler(Arc::new(LoggingEventHandler));

	match cli.wallets.or(config.wallets_file.clone()) {
		Some(path) => {
			let added = engine.load_from_registry(&FileWalletRegistry::new(path)).await?;
			info!("Monitoring {} wallets", added);
		}
		None => warn!("No wallet file configured, nothing to monitor"),
	}

	if cli.once {
		match engine.sync_all(config.chain_filter.clone())?.await {
			Ok(report) => info!(
				"Sync finished in {}ms: {} succeeded, {} failed",
				(report.finished_at - report.started_at).num_milliseconds(),
				report.succeeded(),
				report.failed()
			),
			Err(e) => error!("Sync cycle aborted: {}", e),
		}
	} else {
		let sync = engine.config();
		info!(
			"Auto-sync {}, every {}s. Press Ctrl-C to stop",
			if sync.auto_sync_enabled { "enabled" } else { "disabled" },
			sync.interval.as_secs()
		);
		tokio::signal::ctrl_c().await?;
		info!("Shutdown requested");
	}

	engine.shutdown().await;
	info!("Statistics: {}", engine.statistics().summary());
	for snapshot in engine.list_snapshots(None) {
		let balance = snapshot
			.last_result
			.as_ref()
			.map(|result| result.balance.as_str())
			.unwrap_or("-");
		info!(
			"   - {} ({}): {:?}, balance {}",
			snapshot.wallet_id, snapshot.chain, snapshot.status, balance
		);
	}
	Ok(())
}
