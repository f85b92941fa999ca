//! Per-caller request rate limiting.
//!
//! Fixed-window counters keyed by caller identity. The first call after a
//! window expires resets the count to 1; within the window, the call past
//! the ceiling is rejected with the time left until the window resets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::time::Clock;

/// Configuration for the per-caller window.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Calls allowed per caller per window.
    pub max_calls_per_window: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls_per_window: 30,
            window: Duration::from_secs(60),
        }
    }
}

/// Per-caller window state.
#[derive(Debug, Clone)]
struct RateWindow {
    count: u32,
    window_reset_at: Instant,
}

/// Accepted/rejected counters for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Fixed-window rate limiter keyed by caller id.
///
/// Check-and-increment happens under one lock, so two concurrent requests
/// for the same caller cannot both sneak under the ceiling.
pub struct WindowRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, RateWindow>>,
    clock: Arc<dyn Clock>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl WindowRateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            clock,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Record one call for `caller`.
    ///
    /// Returns `Err(retry_after)` if the caller has exhausted its window;
    /// `retry_after` is always positive on rejection.
    pub fn check(&self, caller: &str) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap();

        let window = windows
            .entry(caller.to_string())
            .or_insert_with(|| RateWindow {
                count: 0,
                window_reset_at: now + self.config.window,
            });

        if now > window.window_reset_at {
            window.count = 1;
            window.window_reset_at = now + self.config.window;
            self.accepted.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        if window.count >= self.config.max_calls_per_window {
            let retry_after = window
                .window_reset_at
                .saturating_duration_since(now)
                .max(Duration::from_millis(1));
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                caller = %caller,
                count = window.count,
                retry_after_ms = retry_after.as_millis() as u64,
                "caller rate limited"
            );
            return Err(retry_after);
        }

        window.count += 1;
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drop windows that expired longer than `idle_for` ago. Called by the
    /// background sweeper so one-off callers do not accumulate forever.
    pub fn prune(&self, idle_for: Duration) {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap();
        windows.retain(|_, w| now < w.window_reset_at + idle_for);
    }

    pub fn tracked_callers(&self) -> usize {
        self.windows.lock().unwrap().len()
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
