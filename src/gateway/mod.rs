//! Resilient gateway to external services.
//!
//! Wraps every outbound call with, in order:
//! 1. circuit-breaker fast-fail (no I/O while a service's circuit is open)
//! 2. response cache for idempotent reads
//! 3. per-caller rate limiting
//! 4. retry with backoff for transient failures, honoring upstream
//!    retry-after hints and an optional overall deadline
//!
//! Stores are owned by the gateway instance and injected at construction,
//! so tests and multi-tenant deployments get isolated state.

mod cache;
mod circuit_breaker;
mod metrics;
pub mod mock;
mod rate_limit;
mod transport;

pub use cache::{CacheStats, TtlCache};
pub use circuit_breaker::{
    BreakerConfig, BreakerRegistry, BreakerSnapshot, BreakerState,
};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use rate_limit::{RateLimitConfig, RateLimitStats, WindowRateLimiter};
pub use transport::{
    classify_status, Classification, RequestKind, ServiceRequest, ServiceResponse,
    ServiceTransport, TransportError,
};

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::GatewayError;
use crate::time::Clock;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Retries after the initial attempt (4 attempts total by default).
    pub max_retries: u32,
    /// Backoff before retry `n` is `backoff_base * n`.
    pub backoff_base: Duration,
    /// Wait before retrying a 429 that carries no retry-after hint.
    pub default_retry_after: Duration,
    /// TTL applied to cached read responses.
    pub cache_ttl: Duration,
    pub rate_limit: RateLimitConfig,
    pub breaker: BreakerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
            default_retry_after: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(60),
            rate_limit: RateLimitConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Overall budget for the whole attempt sequence, including backoff
    /// sleeps. When the next backoff would overrun it, the gateway gives up
    /// early instead of outliving the conversational turn that asked.
    pub deadline: Option<Duration>,
}

impl CallOptions {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }
}

/// Resilient front door for all outbound dependency calls.
pub struct ResilientGateway {
    transport: Arc<dyn ServiceTransport>,
    cache: TtlCache,
    limiter: WindowRateLimiter,
    breakers: BreakerRegistry,
    metrics: GatewayMetrics,
    config: GatewayConfig,
    clock: Arc<dyn Clock>,
}

impl ResilientGateway {
    pub fn new(
        transport: Arc<dyn ServiceTransport>,
        config: GatewayConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            cache: TtlCache::new(Arc::clone(&clock)),
            limiter: WindowRateLimiter::new(config.rate_limit.clone(), Arc::clone(&clock)),
            breakers: BreakerRegistry::new(config.breaker.clone(), Arc::clone(&clock)),
            metrics: GatewayMetrics::new(),
            config,
            clock,
        }
    }

    /// Issue a call with default options.
    pub async fn call(&self, request: &ServiceRequest) -> Result<Value, GatewayError> {
        self.call_with(request, CallOptions::default()).await
    }

    /// Issue a call with an optional overall deadline.
    pub async fn call_with(
        &self,
        request: &ServiceRequest,
        opts: CallOptions,
    ) -> Result<Value, GatewayError> {
        // 1. Fast-fail while the circuit is open; the rejection itself is
        //    not a breaker failure.
        if !self.breakers.allow(&request.service) {
            self.metrics.record_fast_fail();
            return Err(GatewayError::ServiceUnavailable {
                service: request.service.clone(),
            });
        }

        // 2. Idempotent reads may be served from cache without touching the
        //    breaker counters or the caller's rate window.
        let cache_key = request.cache_key();
        if request.kind == RequestKind::Read {
            if let Some(value) = self.cache.get(&cache_key) {
                self.metrics.record_cache_hit();
                debug!(service = %request.service, endpoint = %request.endpoint, "cache hit");
                return Ok(value);
            }
        }

        // 3. Per-caller rate window.
        if let Err(retry_after) = self.limiter.check(&request.caller) {
            self.metrics.record_rate_limited();
            return Err(GatewayError::RateLimited { retry_after });
        }

        // 4. Attempt with retries.
        self.attempt_with_retries(request, &cache_key, opts).await
    }

    async fn attempt_with_retries(
        &self,
        request: &ServiceRequest,
        cache_key: &str,
        opts: CallOptions,
    ) -> Result<Value, GatewayError> {
        let deadline = opts.deadline.map(|d| self.clock.now() + d);
        let max_attempts = self.config.max_retries + 1;
        let mut last_err = GatewayError::Transport("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            let delay = match self.transport.send(request).await {
                Ok(response) => match classify_status(response.status) {
                    Classification::Success => {
                        self.breakers.record_success(&request.service);
                        self.metrics.record_success();
                        if request.kind == RequestKind::Read {
                            self.cache.insert(
                                cache_key.to_string(),
                                response.body.clone(),
                                self.config.cache_ttl,
                            );
                        }
                        return Ok(response.body);
                    }
                    Classification::TerminalClient => {
                        // Client errors are not retried; they still count
                        // against the breaker.
                        self.breakers.record_failure(&request.service);
                        self.metrics.record_failure();
                        return Err(GatewayError::ClientError {
                            status: response.status,
                            message: error_message(&response.body),
                        });
                    }
                    Classification::UpstreamRateLimit => {
                        let retry_after = response
                            .retry_after
                            .unwrap_or(self.config.default_retry_after);
                        last_err = GatewayError::RateLimited { retry_after };
                        retry_after
                    }
                    Classification::TransientServer => {
                        last_err = GatewayError::ServerError {
                            status: response.status,
                            message: error_message(&response.body),
                        };
                        self.config.backoff_base * attempt
                    }
                },
                Err(err) => {
                    last_err = GatewayError::Transport(err.to_string());
                    self.config.backoff_base * attempt
                }
            };

            if attempt == max_attempts {
                break;
            }

            if let Some(deadline) = deadline {
                if self.clock.now() + delay >= deadline {
                    debug!(
                        service = %request.service,
                        attempt,
                        "deadline would be exceeded, abandoning retries"
                    );
                    self.breakers.record_failure(&request.service);
                    self.metrics.record_failure();
                    return Err(GatewayError::exhausted(attempt, last_err));
                }
            }

            warn!(
                service = %request.service,
                endpoint = %request.endpoint,
                attempt,
                max_attempts,
                backoff_ms = delay.as_millis() as u64,
                error = %last_err,
                "transient failure, backing off"
            );
            self.metrics.record_retry();
            tokio::time::sleep(delay).await;
        }

        // One breaker failure for the whole exhausted sequence, not one per
        // attempt.
        self.breakers.record_failure(&request.service);
        self.metrics.record_failure();
        Err(GatewayError::exhausted(max_attempts, last_err))
    }

    /// Spawn the periodic maintenance task: cache sweep + stale rate-window
    /// pruning. Runs until the returned handle is aborted or dropped into
    /// the runtime's shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                gateway.cache.sweep();
                gateway.limiter.prune(gateway.config.rate_limit.window);
            }
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn rate_limit_stats(&self) -> RateLimitStats {
        self.limiter.stats()
    }

    pub fn breaker_state(&self, service: &str) -> BreakerState {
        self.breakers.state(service)
    }

    pub fn breaker_snapshot(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshot()
    }

    /// Force a service's circuit open (planned outage, upstream advisory).
    pub fn trip_breaker(&self, service: &str) {
        self.breakers.trip(service);
    }

    /// Reset a service's circuit to closed.
    pub fn reset_breaker(&self, service: &str) {
        self.breakers.reset(service);
    }
}

/// Pull a human-readable message out of an error payload.
fn error_message(body: &Value) -> String {
    body.get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}
