//! Injectable time source.
//!
//! TTLs, rate windows, breaker cooldowns and call deadlines all compare
//! against the same clock instance, so concurrent evaluations cannot drift
//! apart. Tests use [`ManualClock`] to simulate elapsed time instead of
//! sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic time source shared by every time-based component.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock that only moves when advanced.
///
/// Starts at an arbitrary fixed origin; `advance` shifts the reported time
/// forward by the given duration.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += by;
    }

    /// Elapsed time since the clock's origin.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let t0 = clock.now();

        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now() - t0, Duration::from_secs(30));

        clock.advance(Duration::from_secs(45));
        assert_eq!(clock.now() - t0, Duration::from_secs(75));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();

        clock.advance(Duration::from_secs(10));
        assert_eq!(other.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
