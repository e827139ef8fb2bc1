//! Types shared between the sync engine and blockchain data providers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Blockchains a monitored wallet can live on.
///
/// Serialized with the same upper-case identifiers the wallet registry stores
/// (`BITCOIN`, `BNB_CHAIN`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Chain {
    Bitcoin,
    Ethereum,
    Solana,
    Cardano,
    Polkadot,
    Avalanche,
    Cosmos,
    Algorand,
    Tezos,
    Near,
    Aptos,
    Sui,
    Hedera,
    Tron,
    Ripple,
    Stellar,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    BnbChain,
    Fantom,
    Cronos,
    Moonbeam,
    Celo,
}

impl Chain {
    /// Registry identifier of the chain
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "BITCOIN",
            Chain::Ethereum => "ETHEREUM",
            Chain::Solana => "SOLANA",
            Chain::Cardano => "CARDANO",
            Chain::Polkadot => "POLKADOT",
            Chain::Avalanche => "AVALANCHE",
            Chain::Cosmos => "COSMOS",
            Chain::Algorand => "ALGORAND",
            Chain::Tezos => "TEZOS",
            Chain::Near => "NEAR",
            Chain::Aptos => "APTOS",
            Chain::Sui => "SUI",
            Chain::Hedera => "HEDERA",
            Chain::Tron => "TRON",
            Chain::Ripple => "RIPPLE",
            Chain::Stellar => "STELLAR",
            Chain::Polygon => "POLYGON",
            Chain::Arbitrum => "ARBITRUM",
            Chain::Optimism => "OPTIMISM",
            Chain::Base => "BASE",
            Chain::BnbChain => "BNB_CHAIN",
            Chain::Fantom => "FANTOM",
            Chain::Cronos => "CRONOS",
            Chain::Moonbeam => "MOONBEAM",
            Chain::Celo => "CELO",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    /// The wallet address as registered.
    pub address: String,
    /// The chain the address belongs to.
    pub chain: Chain,
}

/// Successful answer of a provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReport {
    /// Current balance as a decimal string in the chain's native unit.
    pub balance: String,
    /// Total number of transactions the provider knows for the address.
    pub transaction_count: u64,
    /// Transactions not reported by any earlier call for this address.
    pub transactions_found: u64,
    /// Risk score, when the provider supplies one. Expected to be 0-100.
    pub risk_score: Option<u32>,
}

/// Normalized failure categories of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    ProviderTimeout,
    ProviderRateLimited,
    ProviderUnavailable,
    InvalidWallet,
    Unknown,
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncErrorKind::ProviderTimeout => "provider timeout",
            SyncErrorKind::ProviderRateLimited => "provider rate limited",
            SyncErrorKind::ProviderUnavailable => "provider unavailable",
            SyncErrorKind::InvalidWallet => "invalid wallet",
            SyncErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Error types for provider calls
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Chain not supported: {0}")]
    UnsupportedChain(Chain),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ProviderError {
    /// Map the error onto the engine's failure taxonomy.
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            ProviderError::Timeout => SyncErrorKind::ProviderTimeout,
            ProviderError::RateLimited(_) => SyncErrorKind::ProviderRateLimited,
            ProviderError::InvalidAddress(_) => SyncErrorKind::InvalidWallet,
            ProviderError::Unavailable(_) | ProviderError::UnsupportedChain(_) => {
                SyncErrorKind::ProviderUnavailable
            }
            ProviderError::Malformed(_) | ProviderError::JsonError(_) => SyncErrorKind::Unknown,
            ProviderError::HttpError(e) => {
                if e.is_timeout() {
                    SyncErrorKind::ProviderTimeout
                } else if e.is_connect() {
                    SyncErrorKind::ProviderUnavailable
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        429 => SyncErrorKind::ProviderRateLimited,
                        400 | 404 | 422 => SyncErrorKind::InvalidWallet,
                        500..=599 => SyncErrorKind::ProviderUnavailable,
                        _ => SyncErrorKind::Unknown,
                    }
                } else {
                    SyncErrorKind::Unknown
                }
            }
        }
    }
}

/// A blockchain data provider.
///
/// Implementations perform exactly one remote lookup per call. They may be slow
/// or fail; the engine bounds them with its own timeout.
#[async_trait::async_trait]
pub trait ChainProvider: Send + Sync {
    /// Resolve the address to its current balance and activity.
    async fn fetch(&self, request: &ProviderRequest) -> Result<ProviderReport, ProviderError>;

    /// Drop any per-address state kept between calls. Called once no monitored wallet
    /// uses the address any more.
    fn forget(&self, _request: &ProviderRequest) {}

    /// Get the name of this provider for logging and diagnostics.
    fn name(&self) -> &'static str;
}
