//! Shared metrics aggregation for a run.
//!
//! Every completed invocation is recorded here from whichever worker task
//! finished it; the aggregator is the only mutable state workers share.
//! Recording is a short critical section behind a mutex. Derived statistics
//! (percentiles, rps, error rate) are computed on demand in [`Metrics::snapshot`],
//! which sorts the sample vector — O(n log n), fine at the snapshot cadence
//! of a few seconds. If sample volume ever makes that too slow, a streaming
//! quantile estimator is the drop-in alternative.

use super::classify;
use super::invoker::Outcome;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// How many recent failures a snapshot carries for display.
const RECENT_FAILURES: usize = 5;

/// One recorded failure, kept in a bounded ring for progress display and the
/// final report's `topErrors`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureSample {
    pub path: String,
    /// Status code as text, or the transport reason ("timeout", "connect").
    pub detail: String,
    pub latency_ms: u64,
}

#[derive(Default)]
struct Counters {
    total: u64,
    success: u64,
    failed: u64,
    expected_errors: u64,
    status_counts: BTreeMap<u16, u64>,
    latencies_ms: Vec<u64>,
    recent_failures: VecDeque<FailureSample>,
}

pub struct Metrics {
    inner: Mutex<Counters>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters::default()),
        }
    }

    /// Record one completed invocation. 2xx/3xx counts as success; a non-2xx
    /// the classifier recognizes as an intended negative outcome counts as
    /// success and is tallied under `expected_errors`; everything else is a
    /// real failure.
    pub fn record(&self, path: &str, outcome: &Outcome) {
        let latency_ms = outcome.latency.as_millis() as u64;
        let mut inner = self.inner.lock();

        inner.total += 1;
        inner.latencies_ms.push(latency_ms);
        *inner.status_counts.entry(outcome.status).or_insert(0) += 1;

        let ok = outcome.status >= 200 && outcome.status < 400;
        let expected = !outcome.is_transport_failure()
            && !ok
            && classify::is_expected(path, outcome.status);

        if ok {
            inner.success += 1;
        } else if expected {
            inner.success += 1;
            inner.expected_errors += 1;
        } else {
            inner.failed += 1;
            let detail = match outcome.failure {
                Some(reason) => reason.to_string(),
                None => outcome.status.to_string(),
            };
            if inner.recent_failures.len() == RECENT_FAILURES {
                inner.recent_failures.pop_front();
            }
            inner.recent_failures.push_back(FailureSample {
                path: path.to_string(),
                detail,
                latency_ms,
            });
        }
    }

    /// Derive the current statistics. `elapsed` is the run's wall-clock age,
    /// owned by the caller so a frozen final snapshot and a live progress
    /// snapshot use the same code path.
    pub fn snapshot(&self, elapsed: Duration) -> Snapshot {
        let inner = self.inner.lock();

        let mut sorted = inner.latencies_ms.clone();
        sorted.sort_unstable();
        let percentile = |q: f64| -> u64 {
            if sorted.is_empty() {
                return 0;
            }
            let idx = ((sorted.len() as f64) * q) as usize;
            sorted[idx.min(sorted.len() - 1)]
        };

        let elapsed_secs = elapsed.as_secs_f64();
        let avg_latency_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
        };

        Snapshot {
            total: inner.total,
            success: inner.success,
            failed: inner.failed,
            expected_errors: inner.expected_errors,
            error_rate: if inner.total == 0 {
                0.0
            } else {
                inner.failed as f64 / inner.total as f64
            },
            rps: if elapsed_secs > 0.0 {
                inner.total as f64 / elapsed_secs
            } else {
                0.0
            },
            elapsed_ms: elapsed.as_millis() as u64,
            avg_latency_ms,
            p50_ms: percentile(0.50),
            p95_ms: percentile(0.95),
            p99_ms: percentile(0.99),
            min_ms: sorted.first().copied().unwrap_or(0),
            max_ms: sorted.last().copied().unwrap_or(0),
            status_counts: inner.status_counts.clone(),
            recent_failures: inner.recent_failures.iter().cloned().collect(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a run's statistics, pushed to progress consumers and
/// frozen into the final report.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub expected_errors: u64,
    pub error_rate: f64,
    pub rps: f64,
    pub elapsed_ms: u64,
    pub avg_latency_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub recent_failures: Vec<FailureSample>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn outcome(status: u16, latency_ms: u64) -> Outcome {
        Outcome {
            status,
            latency: Duration::from_millis(latency_ms),
            failure: None,
        }
    }

    fn transport_failure(latency_ms: u64) -> Outcome {
        Outcome {
            status: 0,
            latency: Duration::from_millis(latency_ms),
            failure: Some("timeout"),
        }
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        let metrics = Metrics::new();
        let snap = metrics.snapshot(Duration::from_secs(1));
        assert_eq!(snap.total, 0);
        assert_eq!(snap.error_rate, 0.0);
        assert_eq!(snap.rps, 0.0);
        assert_eq!(snap.p99_ms, 0);
    }

    #[test]
    fn success_failure_and_expected_tallies() {
        let metrics = Metrics::new();
        metrics.record("/api/health", &outcome(200, 10));
        metrics.record("/api/health", &outcome(500, 20));
        metrics.record("/api/dramabox/search?query=x", &outcome(503, 30));
        metrics.record("/api/vip/status", &outcome(401, 5));
        metrics.record("/api/health", &transport_failure(30_000));

        let snap = metrics.snapshot(Duration::from_secs(10));
        assert_eq!(snap.total, 5);
        assert_eq!(snap.success, 3);
        assert_eq!(snap.failed, 2);
        assert_eq!(snap.expected_errors, 2);
        assert_eq!(snap.total, snap.success + snap.failed);
        assert!(snap.expected_errors <= snap.success);
        assert_eq!(snap.status_counts[&0], 1);
        assert_eq!(snap.status_counts[&503], 1);
        assert_eq!(snap.error_rate, 2.0 / 5.0);
        assert_eq!(snap.rps, 0.5);
        // both real failures are in the ring, transport reason included
        assert_eq!(snap.recent_failures.len(), 2);
        assert_eq!(snap.recent_failures[1].detail, "timeout");
    }

    #[test]
    fn recent_failures_ring_is_bounded() {
        let metrics = Metrics::new();
        for i in 0..20 {
            metrics.record(&format!("/api/broken/{i}"), &outcome(500, i));
        }
        let snap = metrics.snapshot(Duration::from_secs(1));
        assert_eq!(snap.recent_failures.len(), RECENT_FAILURES);
        assert_eq!(snap.recent_failures[0].path, "/api/broken/15");
        assert_eq!(snap.recent_failures[4].path, "/api/broken/19");
    }

    #[test]
    fn percentiles_on_a_known_distribution() {
        let metrics = Metrics::new();
        for ms in 1..=100 {
            metrics.record("/api/health", &outcome(200, ms));
        }
        let snap = metrics.snapshot(Duration::from_secs(1));
        assert_eq!(snap.min_ms, 1);
        assert_eq!(snap.max_ms, 100);
        assert_eq!(snap.p50_ms, 51);
        assert_eq!(snap.p95_ms, 96);
        assert_eq!(snap.p99_ms, 100);
        assert_eq!(snap.avg_latency_ms, 50.5);
    }

    proptest! {
        #[test]
        fn percentile_ordering_holds(latencies in proptest::collection::vec(0u64..60_000, 1..500)) {
            let metrics = Metrics::new();
            for ms in &latencies {
                metrics.record("/api/health", &outcome(200, *ms));
            }
            let snap = metrics.snapshot(Duration::from_secs(1));
            prop_assert_eq!(snap.total as usize, latencies.len());
            prop_assert!(snap.min_ms <= snap.p50_ms);
            prop_assert!(snap.p50_ms <= snap.p95_ms);
            prop_assert!(snap.p95_ms <= snap.p99_ms);
            prop_assert!(snap.p99_ms <= snap.max_ms);
        }
    }
}
