//! Gateway outcome counters.
//!
//! Plain relaxed atomics; the orchestrator polls a snapshot to decide when
//! to degrade (e.g. switch to a canned fallback reply while a breaker is
//! open).

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for every gateway outcome.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    successes: AtomicU64,
    failures: AtomicU64,
    fast_failed: AtomicU64,
    rate_limited: AtomicU64,
    cache_hits: AtomicU64,
    retries: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A call rejected without I/O because the breaker was open.
    pub fn record_fast_fail(&self) {
        self.fast_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            fast_failed: self.fast_failed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub fast_failed: u64,
    pub rate_limited: u64,
    pub cache_hits: u64,
    pub retries: u64,
}
