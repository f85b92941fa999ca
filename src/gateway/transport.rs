//! Outbound transport seam.
//!
//! The gateway never owns a concrete HTTP client; the orchestrator injects
//! whatever transport it uses behind [`ServiceTransport`]. The gateway only
//! cares about the status-code classification of what comes back.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Whether a request is an idempotent read (cacheable) or a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Idempotent read; responses are cached.
    Read,
    /// Mutating call; never cached.
    Write,
}

/// One outbound request to an external dependency.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    /// Logical service name; each name gets its own circuit breaker.
    pub service: String,
    /// Rate-limit identity (conversation or user id, chosen by the caller).
    pub caller: String,
    pub kind: RequestKind,
    pub endpoint: String,
    pub body: Value,
}

impl ServiceRequest {
    pub fn read(service: impl Into<String>, caller: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            caller: caller.into(),
            kind: RequestKind::Read,
            endpoint: endpoint.into(),
            body: Value::Null,
        }
    }

    pub fn write(
        service: impl Into<String>,
        caller: impl Into<String>,
        endpoint: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            service: service.into(),
            caller: caller.into(),
            kind: RequestKind::Write,
            endpoint: endpoint.into(),
            body,
        }
    }

    /// Deterministic cache key over everything that identifies a read.
    pub fn cache_key(&self) -> String {
        // serde_json renders maps in a stable order for identical Values,
        // which is all the determinism the cache needs.
        format!(
            "{}:{:?}:{}:{}",
            self.service, self.kind, self.endpoint, self.body
        )
    }
}

/// Raw response handed back by the transport.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Value,
    /// Retry-after advertised by the dependency on 429 responses.
    pub retry_after: Option<Duration>,
}

impl ServiceResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            retry_after: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
            retry_after: None,
        }
    }

    /// Builder-style method to attach an advertised retry-after.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Transport-level failure. Always treated as transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
}

/// How the gateway should treat a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx: record breaker success, cache reads.
    Success,
    /// 429: honor the advertised retry-after, then retry.
    UpstreamRateLimit,
    /// Other 4xx: terminal, never retried.
    TerminalClient,
    /// 5xx (and anything unrecognized): transient, retried with backoff.
    TransientServer,
}

/// Classify a response status the way the retry loop consumes it.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Success,
        429 => Classification::UpstreamRateLimit,
        400..=499 => Classification::TerminalClient,
        _ => Classification::TransientServer,
    }
}

/// Outbound call seam implemented by the orchestrator.
#[async_trait]
pub trait ServiceTransport: Send + Sync {
    async fn send(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError>;
}
