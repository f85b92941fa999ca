//! Scripted transport double for tests and simulation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::transport::{ServiceRequest, ServiceResponse, ServiceTransport, TransportError};

/// Transport that replays a scripted sequence of outcomes.
///
/// Each `send` pops the next outcome; the final one repeats forever so a
/// script of one success behaves like a healthy dependency.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<ServiceResponse, TransportError>>>,
    calls: AtomicU32,
}

impl MockTransport {
    pub fn new(script: Vec<Result<ServiceResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// A transport that always succeeds with the given body.
    pub fn always_ok(body: serde_json::Value) -> Self {
        Self::new(vec![Ok(ServiceResponse::ok(body))])
    }

    /// How many times `send` was invoked (i.e. real I/O attempts).
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ServiceTransport for MockTransport {
    async fn send(&self, _request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut script = self.script.lock().unwrap();
        match script.len() {
            0 => Ok(ServiceResponse::ok(json!(null))),
            1 => script
                .front()
                .cloned()
                .unwrap_or(Err(TransportError::Timeout)),
            _ => script.pop_front().unwrap_or(Err(TransportError::Timeout)),
        }
    }
}
