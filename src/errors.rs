use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the resilient gateway.
///
/// Transient conditions (5xx, network, upstream rate limits) are retried
/// internally and only appear here once retries are exhausted. Everything
/// else is surfaced immediately so the caller can pick a degraded path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The caller exceeded its request window. Retry after the given delay.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The circuit breaker for this service is open; no I/O was attempted.
    #[error("service '{service}' unavailable (circuit open)")]
    ServiceUnavailable { service: String },

    /// Terminal client error (4xx other than 429). Never retried.
    #[error("client error: status {status}: {message}")]
    ClientError { status: u16, message: String },

    /// Server-side error (5xx). Only surfaced once retries exhaust.
    #[error("server error: status {status}: {message}")]
    ServerError { status: u16, message: String },

    /// All attempts failed; `last` preserves the final underlying cause.
    #[error("exhausted {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<GatewayError>,
    },

    /// Transport-level failure (connection refused, timeout, DNS).
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Wrap a final cause in an `Exhausted` error.
    pub fn exhausted(attempts: u32, last: GatewayError) -> Self {
        GatewayError::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Whether this error would have been retried inside the gateway.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ServerError { .. } | GatewayError::Transport(_)
        )
    }
}

/// Malformed input to the risk engine. Programming-error class: the
/// orchestrator assembled an invalid snapshot, not a retryable condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskInputError {
    #[error("session id is empty")]
    MissingSessionId,

    #[error("evaluation time {evaluated_at} precedes session start {started_at}")]
    NegativeDuration {
        started_at: chrono::DateTime<chrono::Utc>,
        evaluated_at: chrono::DateTime<chrono::Utc>,
    },
}

/// Malformed input to the context manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("token budget must be positive, got {0}")]
    InvalidBudget(usize),
}
