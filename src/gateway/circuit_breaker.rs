//! Per-service circuit breaker.
//!
//! One state machine per logical service name, created lazily on first use.
//! A failing dependency trips only its own breaker; other services keep
//! their Closed state.
//!
//! State transitions:
//! - Closed -> Open after `failure_threshold` consecutive failures
//! - Open -> HalfOpen once the cooldown has elapsed (checked lazily on the
//!   next allow-check; rejections while Open do not count as failures)
//! - HalfOpen -> Closed after `success_threshold` consecutive successes
//! - HalfOpen -> Open on any single failure

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::time::Clock;

/// Breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
    /// How long an open circuit rejects calls before probing again.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// Builder method for the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Builder method for the cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Per-service breaker internals.
#[derive(Debug)]
struct Breaker {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    config: BreakerConfig,
}

impl Breaker {
    fn new(config: BreakerConfig) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            config,
        }
    }

    /// Whether a call may proceed. Transitions Open -> HalfOpen when the
    /// cooldown has elapsed.
    fn should_allow(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => match self.opened_at {
                Some(opened_at) if now.duration_since(opened_at) >= self.config.cooldown => {
                    self.state = BreakerState::HalfOpen;
                    self.consecutive_successes = 0;
                    true
                }
                Some(_) => false,
                // Open without a timestamp only happens via a manual trip;
                // stay open until reset.
                None => false,
            },
        }
    }

    fn record_success(&mut self) {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;

        if self.state == BreakerState::HalfOpen
            && self.consecutive_successes >= self.config.success_threshold
        {
            self.state = BreakerState::Closed;
            self.consecutive_successes = 0;
            self.opened_at = None;
        }
    }

    fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;

        match self.state {
            BreakerState::Closed => {
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.state = BreakerState::Open;
                    self.opened_at = Some(now);
                }
            }
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open;
                self.opened_at = Some(now);
            }
            BreakerState::Open => {}
        }
    }
}

/// Point-in-time view of one breaker, for dashboards and logs.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub service: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

/// Owns one breaker per service name.
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, Breaker>>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Check whether a call to `service` may proceed right now.
    pub fn allow(&self, service: &str) -> bool {
        let now = self.clock.now();
        let mut breakers = self.breakers.lock().unwrap();
        let breaker = breakers
            .entry(service.to_string())
            .or_insert_with(|| Breaker::new(self.config.clone()));

        let allowed = breaker.should_allow(now);
        if !allowed {
            debug!(service = %service, "circuit open, fast-failing");
        }
        allowed
    }

    pub fn record_success(&self, service: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        if let Some(breaker) = breakers.get_mut(service) {
            let was = breaker.state;
            breaker.record_success();
            if was != breaker.state {
                debug!(service = %service, from = %was, to = %breaker.state, "circuit transition");
            }
        }
    }

    pub fn record_failure(&self, service: &str) {
        let now = self.clock.now();
        let mut breakers = self.breakers.lock().unwrap();
        let breaker = breakers
            .entry(service.to_string())
            .or_insert_with(|| Breaker::new(self.config.clone()));

        let was = breaker.state;
        breaker.record_failure(now);
        if was != breaker.state {
            warn!(
                service = %service,
                consecutive_failures = breaker.consecutive_failures,
                from = %was,
                to = %breaker.state,
                "circuit transition"
            );
        }
    }

    /// Current state of the breaker for `service` (Closed if never used).
    pub fn state(&self, service: &str) -> BreakerState {
        self.breakers
            .lock()
            .unwrap()
            .get(service)
            .map(|b| b.state)
            .unwrap_or(BreakerState::Closed)
    }

    /// Force a breaker open (external signal, e.g. a planned outage).
    pub fn trip(&self, service: &str) {
        let now = self.clock.now();
        let mut breakers = self.breakers.lock().unwrap();
        let breaker = breakers
            .entry(service.to_string())
            .or_insert_with(|| Breaker::new(self.config.clone()));
        breaker.state = BreakerState::Open;
        breaker.opened_at = Some(now);
        warn!(service = %service, "circuit manually tripped");
    }

    /// Reset a breaker to Closed with clean counters.
    pub fn reset(&self, service: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        if let Some(breaker) = breakers.get_mut(service) {
            breaker.state = BreakerState::Closed;
            breaker.consecutive_failures = 0;
            breaker.consecutive_successes = 0;
            breaker.opened_at = None;
        }
    }

    /// Snapshot of every tracked breaker.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        self.breakers
            .lock()
            .unwrap()
            .iter()
            .map(|(service, b)| BreakerSnapshot {
                service: service.clone(),
                state: b.state,
                consecutive_failures: b.consecutive_failures,
                consecutive_successes: b.consecutive_successes,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    fn registry(failures: u32, successes: u32, cooldown_secs: u64) -> (BreakerRegistry, ManualClock) {
        let clock = ManualClock::new();
        let registry = BreakerRegistry::new(
            BreakerConfig {
                failure_threshold: failures,
                success_threshold: successes,
                cooldown: Duration::from_secs(cooldown_secs),
            },
            Arc::new(clock.clone()),
        );
        (registry, clock)
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let (registry, _clock) = registry(3, 2, 30);

        registry.record_failure("stations");
        registry.record_failure("stations");
        assert_eq!(registry.state("stations"), BreakerState::Closed);

        registry.record_failure("stations");
        assert_eq!(registry.state("stations"), BreakerState::Open);
        assert!(!registry.allow("stations"));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let (registry, _clock) = registry(3, 2, 30);

        registry.record_failure("stations");
        registry.record_failure("stations");
        registry.record_success("stations");
        registry.record_failure("stations");
        registry.record_failure("stations");
        // Streak was broken; still two failures since the success.
        assert_eq!(registry.state("stations"), BreakerState::Closed);
    }

    #[test]
    fn test_cooldown_elapses_to_half_open() {
        let (registry, clock) = registry(1, 2, 30);

        registry.record_failure("stations");
        assert!(!registry.allow("stations"));

        clock.advance(Duration::from_secs(29));
        assert!(!registry.allow("stations"));

        clock.advance(Duration::from_secs(1));
        assert!(registry.allow("stations"));
        assert_eq!(registry.state("stations"), BreakerState::HalfOpen);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (registry, clock) = registry(1, 2, 30);

        registry.record_failure("stations");
        clock.advance(Duration::from_secs(30));
        assert!(registry.allow("stations"));

        registry.record_failure("stations");
        assert_eq!(registry.state("stations"), BreakerState::Open);
        // Cooldown restarts from the half-open failure.
        clock.advance(Duration::from_secs(29));
        assert!(!registry.allow("stations"));
        clock.advance(Duration::from_secs(1));
        assert!(registry.allow("stations"));
    }

    #[test]
    fn test_half_open_closes_after_success_threshold() {
        let (registry, clock) = registry(1, 2, 30);

        registry.record_failure("stations");
        clock.advance(Duration::from_secs(30));
        assert!(registry.allow("stations"));

        registry.record_success("stations");
        assert_eq!(registry.state("stations"), BreakerState::HalfOpen);

        registry.record_success("stations");
        assert_eq!(registry.state("stations"), BreakerState::Closed);
    }

    #[test]
    fn test_services_are_independent() {
        let (registry, _clock) = registry(1, 2, 30);

        registry.record_failure("stations");
        assert_eq!(registry.state("stations"), BreakerState::Open);
        assert_eq!(registry.state("billing"), BreakerState::Closed);
        assert!(registry.allow("billing"));
    }

    #[test]
    fn test_rejections_while_open_do_not_count_as_failures() {
        let (registry, clock) = registry(1, 1, 30);

        registry.record_failure("stations");
        for _ in 0..10 {
            assert!(!registry.allow("stations"));
        }

        // A single success after cooldown still closes the circuit, which
        // would be impossible if rejections had piled onto the counters.
        clock.advance(Duration::from_secs(30));
        assert!(registry.allow("stations"));
        registry.record_success("stations");
        assert_eq!(registry.state("stations"), BreakerState::Closed);
    }

    #[test]
    fn test_manual_trip_and_reset() {
        let (registry, _clock) = registry(5, 2, 30);

        registry.trip("stations");
        assert!(!registry.allow("stations"));

        registry.reset("stations");
        assert_eq!(registry.state("stations"), BreakerState::Closed);
        assert!(registry.allow("stations"));
    }

    #[test]
    fn test_snapshot_lists_tracked_breakers() {
        let (registry, _clock) = registry(2, 2, 30);

        registry.record_failure("stations");
        registry.record_failure("billing");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|s| s.consecutive_failures == 1));
    }
}
