//! Risk scoring over live conversation signals.
//!
//! ```text
//! +-------------------+     +--------------------+
//! |  SessionSnapshot  | --> |     RiskEngine     | --> RiskPrediction
//! +-------------------+     |  predict()         |
//! | UserBehaviorProfile| -> |  detect_anomalies()| --> [AnomalyFinding]
//! +-------------------+     +--------------------+
//! ```
//!
//! The engine is pure: both entry points are deterministic functions of the
//! snapshot and profile, with every threshold owned by [`RiskConfig`].

mod anomaly;
mod config;
mod engine;
mod factors;

pub use anomaly::{
    AnomalyDetector, AnomalyFinding, AnomalyScreen, AnomalySeverity, FrequencyAnomalyDetector,
    PaymentAnomalyDetector, VolumeAnomalyDetector,
};
pub use config::{
    AnomalyConfig, ConfidenceConfig, EscalationConfig, FactorConfig, FailureConfig, FraudConfig,
    RiskConfig,
};
pub use engine::{RiskEngine, RiskPrediction};
pub use factors::{RiskFactor, URGENT_ESCALATION_RECOMMENDATION};
