//! Running statistics over all sync attempts.
//!
//! This module provides the `StatisticsAggregator`, which folds every completed attempt into a
//! single `EngineStatistics` value. Each update is O(1): counters are incremented and the mean
//! duration is adjusted incrementally, never recomputed from history. Updates and reads share
//! one internal lock, so concurrent completions are never lost and a read never observes half
//! of an update.

use crate::wallet::SyncOutcome;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Aggregate statistics across all wallets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStatistics {
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,
    /// Sum of `transactions_found` over successful attempts
    pub total_transactions_found: u64,
    /// Mean duration over successes and failures alike
    pub average_duration_ms: f64,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl EngineStatistics {
    /// Share of successful attempts, 0.0 before the first attempt.
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.successful_attempts as f64 / self.total_attempts as f64
        }
    }

    /// Get a human-readable summary of the statistics
    pub fn summary(&self) -> String {
        format!(
            "{} attempts ({} ok, {} failed, {:.1}% success), {} transactions found, avg {:.0}ms",
            self.total_attempts,
            self.successful_attempts,
            self.failed_attempts,
            self.success_rate() * 100.0,
            self.total_transactions_found,
            self.average_duration_ms
        )
    }
}

/// Service accumulating attempt outcomes
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    inner: Mutex<EngineStatistics>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineStatistics> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one completed attempt.
    pub fn record(&self, outcome: &SyncOutcome, completed_at: DateTime<Utc>) {
        let mut stats = self.lock();
        stats.total_attempts += 1;
        match outcome {
            SyncOutcome::Success {
                transactions_found, ..
            } => {
                stats.successful_attempts += 1;
                stats.total_transactions_found = stats
                    .total_transactions_found
                    .saturating_add(*transactions_found);
            }
            SyncOutcome::Failure { .. } => {
                stats.failed_attempts += 1;
            }
        }
        let delta = outcome.duration_ms() as f64 - stats.average_duration_ms;
        stats.average_duration_ms += delta / stats.total_attempts as f64;
        stats.last_attempt_at = Some(completed_at);
    }

    /// Consistent copy of the current statistics.
    pub fn snapshot(&self) -> EngineStatistics {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SyncErrorKind;
    use std::sync::Arc;

    fn success(found: u64, duration_ms: u64) -> SyncOutcome {
        SyncOutcome::Success {
            transactions_found: found,
            balance: "0".into(),
            transaction_count: 0,
            risk_score: None,
            duration_ms,
        }
    }

    fn failure(duration_ms: u64) -> SyncOutcome {
        SyncOutcome::Failure {
            duration_ms,
            error_kind: SyncErrorKind::ProviderUnavailable,
        }
    }

    #[test]
    fn empty_statistics() {
        let stats = StatisticsAggregator::new().snapshot();
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.last_attempt_at, None);
    }

    #[test]
    fn counts_and_running_mean() {
        let aggregator = StatisticsAggregator::new();
        let now = Utc::now();
        aggregator.record(&success(2, 100), now);
        aggregator.record(&failure(400), now);
        aggregator.record(&success(5, 100), now);

        let stats = aggregator.snapshot();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.successful_attempts, 2);
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.total_transactions_found, 7);
        assert!((stats.average_duration_ms - 200.0).abs() < 1e-9);
        assert!((stats.success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.last_attempt_at, Some(now));
        assert!(stats.summary().starts_with("3 attempts (2 ok, 1 failed"));
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let aggregator = Arc::new(StatisticsAggregator::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let aggregator = Arc::clone(&aggregator);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        if i % 2 == 0 {
                            aggregator.record(&success(1, 10), Utc::now());
                        } else {
                            aggregator.record(&failure(10), Utc::now());
                        }
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let stats = aggregator.snapshot();
        assert_eq!(stats.total_attempts, 2000);
        assert_eq!(
            stats.total_attempts,
            stats.successful_attempts + stats.failed_attempts
        );
        assert_eq!(stats.total_transactions_found, 1000);
        assert!((stats.average_duration_ms - 10.0).abs() < 1e-9);
    }
}
