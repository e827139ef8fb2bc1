//! Scripted provider used by the engine tests.

use super::types::*;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// What the mock answers for one address.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed(ProviderReport),
    Fail(SyncErrorKind),
    Panic,
}

#[derive(Debug, Clone)]
struct Script {
    behavior: MockBehavior,
    delay: Duration,
    calls: usize,
}

/// Provider answering from a per-address script and counting calls.
#[derive(Debug, Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<String, Script>>,
    forgotten: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the behavior for an address, keeping its call count.
    pub fn script(&self, address: &str, behavior: MockBehavior, delay: Duration) {
        let mut scripts = self.scripts.lock().unwrap();
        let calls = scripts.get(address).map(|s| s.calls).unwrap_or(0);
        scripts.insert(
            address.to_string(),
            Script {
                behavior,
                delay,
                calls,
            },
        );
    }

    /// Shorthand for a successful answer.
    pub fn succeed(&self, address: &str, transactions_found: u64, delay: Duration) {
        self.script(
            address,
            MockBehavior::Succeed(report(transactions_found)),
            delay,
        );
    }

    pub fn calls(&self, address: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .get(address)
            .map(|s| s.calls)
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.scripts.lock().unwrap().values().map(|s| s.calls).sum()
    }

    /// Addresses the engine asked to forget, in order.
    pub fn forgotten(&self) -> Vec<String> {
        self.forgotten.lock().unwrap().clone()
    }
}

/// A report with a fixed balance and the given number of new transactions.
pub fn report(transactions_found: u64) -> ProviderReport {
    ProviderReport {
        balance: "1.50000000".to_string(),
        transaction_count: 10 + transactions_found,
        transactions_found,
        risk_score: Some(12),
    }
}

fn failure(kind: SyncErrorKind) -> ProviderError {
    match kind {
        SyncErrorKind::ProviderTimeout => ProviderError::Timeout,
        SyncErrorKind::ProviderRateLimited => ProviderError::RateLimited("scripted".into()),
        SyncErrorKind::ProviderUnavailable => ProviderError::Unavailable("scripted".into()),
        SyncErrorKind::InvalidWallet => ProviderError::InvalidAddress("scripted".into()),
        SyncErrorKind::Unknown => ProviderError::Malformed("scripted".into()),
    }
}

#[async_trait::async_trait]
impl ChainProvider for MockProvider {
    async fn fetch(&self, request: &ProviderRequest) -> Result<ProviderReport, ProviderError> {
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts
                .entry(request.address.clone())
                .or_insert_with(|| Script {
                    behavior: MockBehavior::Succeed(report(0)),
                    delay: Duration::ZERO,
                    calls: 0,
                });
            script.calls += 1;
            script.clone()
        };

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        match script.behavior {
            MockBehavior::Succeed(report) => Ok(report),
            MockBehavior::Fail(kind) => Err(failure(kind)),
            MockBehavior::Panic => panic!("scripted provider panic for {}", request.address),
        }
    }

    fn forget(&self, request: &ProviderRequest) {
        self.forgotten.lock().unwrap().push(request.address.clone());
    }

    fn name(&self) -> &'static str {
        "MockProvider"
    }
}
