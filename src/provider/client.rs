//!
//! HTTP client for public blockchain explorer APIs.
//!
//! Bitcoin addresses are resolved through a Blockstream-compatible REST API, Ethereum and
//! Polygon addresses through Etherscan-compatible APIs. The client remembers which
//! transaction hashes it has already reported per address, so each call can tell how many
//! transactions are new since the previous one.

use super::types::*;
use crate::utils::format_token_amount;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

const BITCOIN_DECIMALS: u32 = 8;
const EVM_DECIMALS: u32 = 18;

/// Base URLs and credentials for the explorer APIs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
	/// Blockstream-compatible REST API.
	pub bitcoin_api_url: String,
	/// Etherscan API for Ethereum mainnet.
	pub etherscan_api_url: String,
	/// Etherscan-compatible API for Polygon.
	pub polygonscan_api_url: String,
	/// API key sent to the Etherscan-style endpoints.
	pub etherscan_api_key: Option<String>,
}

impl Default for ProviderEndpoints {
	fn default() -> Self {
		Self {
			bitcoin_api_url: "https://blockstream.info/api".to_string(),
			etherscan_api_url: "https://api.etherscan.io/api".to_string(),
			polygonscan_api_url: "https://api.polygonscan.com/api".to_string(),
			etherscan_api_key: None,
		}
	}
}

#[derive(Debug, Deserialize)]
struct BlockstreamAddress {
	chain_stats: BlockstreamStats,
}

#[derive(Debug, Deserialize)]
struct BlockstreamStats {
	funded_txo_sum: u64,
	spent_txo_sum: u64,
	tx_count: u64,
}

#[derive(Debug, Deserialize)]
struct BlockstreamTx {
	txid: String,
}

#[derive(Debug, Deserialize)]
struct EtherscanEnvelope {
	status: String,
	message: String,
	result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EtherscanTx {
	hash: String,
}

/// Explorer-backed blockchain data provider
pub struct HttpChainProvider {
	/// The underlying HTTP client.
	http_client: Client,
	/// Explorer endpoints.
	endpoints: ProviderEndpoints,
	/// Transaction hashes already reported, per chain and address.
	seen: Mutex<HashMap<(Chain, String), HashSet<String>>>,
}

impl HttpChainProvider {
	/// Create a new explorer client.
	///
	/// # Arguments
	/// * `endpoints` - The explorer base URLs and API key.
	/// * `request_timeout` - Timeout applied to every HTTP request.
	///
	/// # Returns
	/// A new `HttpChainProvider`, or a `ProviderError` if the HTTP client cannot be built.
	pub fn new(endpoints: ProviderEndpoints, request_timeout: Duration) -> Result<Self, ProviderError> {
		let http_client = Client::builder().timeout(request_timeout).build()?;

		Ok(Self {
			http_client,
			endpoints,
			seen: Mutex::new(HashMap::new()),
		})
	}

	async fn get_text(&self, request: reqwest::RequestBuilder) -> Result<String, ProviderError> {
		let response = request.send().await?;
		let status = response.status();
		let body = response.text().await?;
		if let Some(err) = classify_status(status, &body) {
			return Err(err);
		}
		Ok(body)
	}

	async fn fetch_bitcoin(&self, address: &str) -> Result<(String, u64, Vec<String>), ProviderError> {
		let base = self.endpoints.bitcoin_api_url.trim_end_matches('/');

		let body = self
			.get_text(self.http_client.get(format!("{}/address/{}", base, address)))
			.await?;
		let summary: BlockstreamAddress = serde_json::from_str(&body)?;

		let body = self
			.get_text(self.http_client.get(format!("{}/address/{}/txs", base, address)))
			.await?;
		let txs: Vec<BlockstreamTx> = serde_json::from_str(&body)?;

		let stats = summary.chain_stats;
		let satoshis = stats.funded_txo_sum.saturating_sub(stats.spent_txo_sum);
		debug!(
			"Blockstream reported {} sats over {} transactions for {}",
			satoshis, stats.tx_count, address
		);

		Ok((
			format_token_amount(satoshis as u128, BITCOIN_DECIMALS),
			stats.tx_count,
			txs.into_iter().map(|tx| tx.txid).collect(),
		))
	}

	async fn fetch_etherscan(
		&self,
		api_url: &str,
		address: &str,
	) -> Result<(String, u64, Vec<String>), ProviderError> {
		let api_key = self.endpoints.etherscan_api_key.clone().unwrap_or_default();

		let body = self
			.get_text(self.http_client.get(api_url).query(&[
				("module", "account"),
				("action", "balance"),
				("address", address),
				("tag", "latest"),
				("apikey", api_key.as_str()),
			]))
			.await?;
		let balance = parse_etherscan_result(serde_json::from_str(&body)?)?;
		let wei = balance
			.as_str()
			.and_then(|s| s.parse::<u128>().ok())
			.ok_or_else(|| ProviderError::Malformed(format!("unexpected balance: {}", balance)))?;

		let body = self
			.get_text(self.http_client.get(api_url).query(&[
				("module", "account"),
				("action", "txlist"),
				("address", address),
				("startblock", "0"),
				("endblock", "99999999"),
				("sort", "desc"),
				("apikey", api_key.as_str()),
			]))
			.await?;
		let txs: Vec<EtherscanTx> = serde_json::from_value(parse_etherscan_result(serde_json::from_str(&body)?)?)?;

		Ok((
			format_token_amount(wei, EVM_DECIMALS),
			txs.len() as u64,
			txs.into_iter().map(|tx| tx.hash).collect(),
		))
	}

	/// Remember the given hashes for the address and return how many were not seen before.
	fn record_seen(&self, chain: Chain, address: &str, hashes: Vec<String>) -> u64 {
		let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
		let known = seen.entry((chain, address.to_string())).or_default();
		hashes.into_iter().filter(|hash| known.insert(hash.clone())).count() as u64
	}
}

#[async_trait::async_trait]
impl ChainProvider for HttpChainProvider {
	async fn fetch(&self, request: &ProviderRequest) -> Result<ProviderReport, ProviderError> {
		let (balance, transaction_count, hashes) = match request.chain {
			Chain::Bitcoin => self.fetch_bitcoin(&request.address).await?,
			Chain::Ethereum => {
				let url = self.endpoints.etherscan_api_url.clone();
				self.fetch_etherscan(&url, &request.address).await?
			}
			Chain::Polygon => {
				let url = self.endpoints.polygonscan_api_url.clone();
				self.fetch_etherscan(&url, &request.address).await?
			}
			other => return Err(ProviderError::UnsupportedChain(other)),
		};

		let transactions_found = self.record_seen(request.chain, &request.address, hashes);
		if transactions_found > 0 {
			info!(
				"{} new transactions for {} on {}",
				transactions_found, request.address, request.chain
			);
		}

		Ok(ProviderReport {
			balance,
			transaction_count,
			transactions_found,
			risk_score: None,
		})
	}

	fn forget(&self, request: &ProviderRequest) {
		let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
		if seen.remove(&(request.chain, request.address.clone())).is_some() {
			debug!("Dropped seen transactions for {} on {}", request.address, request.chain);
		}
	}

	fn name(&self) -> &'static str {
		"HttpChainProvider"
	}
}

/// Turn a non-success HTTP status into the matching provider error.
fn classify_status(status: StatusCode, body: &str) -> Option<ProviderError> {
	if status.is_success() {
		return None;
	}
	let detail = format!("{}: {}", status, body.trim());
	Some(match status.as_u16() {
		429 => ProviderError::RateLimited(detail),
		400 | 404 | 422 => ProviderError::InvalidAddress(detail),
		408 | 504 => ProviderError::Timeout,
		_ => ProviderError::Unavailable(detail),
	})
}

/// Unwrap the `result` of an Etherscan-style envelope.
///
/// Etherscan answers HTTP 200 for most failures and signals them with `status: "0"`.
fn parse_etherscan_result(envelope: EtherscanEnvelope) -> Result<serde_json::Value, ProviderError> {
	if envelope.status == "1" {
		return Ok(envelope.result);
	}
	if envelope.message.eq_ignore_ascii_case("No transactions found") {
		return Ok(serde_json::Value::Array(Vec::new()));
	}

	let detail = envelope
		.result
		.as_str()
		.map(str::to_string)
		.unwrap_or_else(|| envelope.message.clone());
	let lowered = detail.to_ascii_lowercase();
	if lowered.contains("rate limit") {
		Err(ProviderError::RateLimited(detail))
	} else if lowered.contains("invalid address") {
		Err(ProviderError::InvalidAddress(detail))
	} else {
		Err(ProviderError::Unavailable(detail))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn envelope(json: &str) -> EtherscanEnvelope {
		serde_json::from_str(json).unwrap()
	}

	#[test]
	fn status_codes_are_classified() {
		assert!(classify_status(StatusCode::OK, "").is_none());
		assert_eq!(
			classify_status(StatusCode::TOO_MANY_REQUESTS, "").unwrap().kind(),
			SyncErrorKind::ProviderRateLimited
		);
		assert_eq!(
			classify_status(StatusCode::BAD_REQUEST, "Invalid Bitcoin address").unwrap().kind(),
			SyncErrorKind::InvalidWallet
		);
		assert_eq!(
			classify_status(StatusCode::BAD_GATEWAY, "").unwrap().kind(),
			SyncErrorKind::ProviderUnavailable
		);
		assert_eq!(
			classify_status(StatusCode::GATEWAY_TIMEOUT, "").unwrap().kind(),
			SyncErrorKind::ProviderTimeout
		);
	}

	#[test]
	fn etherscan_envelopes_are_unwrapped() {
		let ok = parse_etherscan_result(envelope(
			r#"{"status":"1","message":"OK","result":"1000000000000000000"}"#,
		))
		.unwrap();
		assert_eq!(ok.as_str(), Some("1000000000000000000"));

		let empty = parse_etherscan_result(envelope(
			r#"{"status":"0","message":"No transactions found","result":[]}"#,
		))
		.unwrap();
		assert_eq!(empty, serde_json::Value::Array(Vec::new()));

		let limited = parse_etherscan_result(envelope(
			r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#,
		))
		.unwrap_err();
		assert_eq!(limited.kind(), SyncErrorKind::ProviderRateLimited);

		let invalid = parse_etherscan_result(envelope(
			r#"{"status":"0","message":"NOTOK","result":"Error! Invalid address format"}"#,
		))
		.unwrap_err();
		assert_eq!(invalid.kind(), SyncErrorKind::InvalidWallet);
	}

	#[test]
	fn only_unseen_hashes_count_as_new() {
		let provider = HttpChainProvider::new(ProviderEndpoints::default(), Duration::from_secs(5)).unwrap();
		let first = provider.record_seen(Chain::Bitcoin, "bc1q", vec!["a".into(), "b".into()]);
		let second = provider.record_seen(Chain::Bitcoin, "bc1q", vec!["c".into(), "b".into(), "a".into()]);
		let other_chain = provider.record_seen(Chain::Ethereum, "bc1q", vec!["a".into()]);
		assert_eq!(first, 2);
		assert_eq!(second, 1);
		assert_eq!(other_chain, 1);
	}

	#[test]
	fn forgotten_address_starts_over() {
		let provider = HttpChainProvider::new(ProviderEndpoints::default(), Duration::from_secs(5)).unwrap();
		provider.record_seen(Chain::Bitcoin, "bc1q", vec!["a".into(), "b".into()]);
		provider.record_seen(Chain::Ethereum, "0xabc", vec!["c".into()]);

		provider.forget(&ProviderRequest {
			address: "bc1q".into(),
			chain: Chain::Bitcoin,
		});

		assert_eq!(provider.record_seen(Chain::Bitcoin, "bc1q", vec!["a".into(), "b".into()]), 2);
		assert_eq!(provider.record_seen(Chain::Ethereum, "0xabc", vec!["c".into()]), 0);
	}
}
