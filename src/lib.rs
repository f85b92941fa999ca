#![deny(unreachable_pub)]

//! Resilience and risk engine for an EV-charging support agent.
//!
//! Three cooperating subsystems keep the conversational agent useful when
//! upstream services misbehave:
//!
//! - [`gateway::ResilientGateway`] wraps every outbound dependency call
//!   with caching, per-caller rate limiting, retries and a per-service
//!   circuit breaker.
//! - [`risk::RiskEngine`] estimates how likely a live session is to end in
//!   escalation, unresolved failure or fraud, and screens for behavioral
//!   anomalies.
//! - [`context::ContextManager`] keeps conversation history inside the
//!   language model's token budget.
//!
//! The crate owns no wire format and spawns nothing except its own
//! maintenance task; the orchestrator supplies transports, snapshots and
//! profiles, and consumes plain structs back.

pub mod context;
mod errors;
pub mod gateway;
pub mod risk;
mod time;
mod types;

pub use context::{estimate_sequence_tokens, estimate_tokens, ContextManager};
pub use errors::{ContextError, GatewayError, RiskInputError};
pub use gateway::{
    BreakerConfig, BreakerSnapshot, BreakerState, CallOptions, GatewayConfig, MetricsSnapshot,
    RateLimitConfig, RequestKind, ResilientGateway, ServiceRequest, ServiceResponse,
    ServiceTransport, TransportError,
};
pub use risk::{
    AnomalyFinding, AnomalySeverity, RiskConfig, RiskEngine, RiskFactor, RiskPrediction,
};
pub use time::{Clock, ManualClock, SystemClock};
pub use types::{
    ChatMessage, ChatRole, SessionSnapshot, Sentiment, UserBehaviorProfile,
};

#[cfg(test)]
mod tests;
