//! Behavioral anomaly detection.
//!
//! Each detector evaluates one deviation pattern against the user's
//! history and is skipped when that history is too thin to mean anything.
//! Detectors are independent: all of them run on every evaluation, and one
//! firing never suppresses another.

use serde::{Deserialize, Serialize};

use crate::risk::config::AnomalyConfig;
use crate::types::{SessionSnapshot, UserBehaviorProfile};

/// Severity of an anomaly finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One detected deviation from the user's historical behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyFinding {
    /// Stable tag naming the detector that fired.
    pub kind: String,
    pub severity: AnomalySeverity,
    pub description: String,
    /// Unbounded positive score; higher means more unusual.
    pub deviation_score: f64,
    pub recommended_action: String,
}

/// One deviation pattern. Stateless; thresholds are captured at
/// construction from [`AnomalyConfig`].
pub trait AnomalyDetector: Send + Sync {
    /// Detector name, used as the finding's `kind` tag.
    fn name(&self) -> &'static str;

    /// Evaluate the session; `None` when the pattern is absent or history
    /// is insufficient.
    fn evaluate(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> Option<AnomalyFinding>;
}

/// Session far shorter than this user's established rhythm.
pub struct FrequencyAnomalyDetector {
    min_sessions: u64,
    duration_ratio: f64,
    max_messages: usize,
}

impl FrequencyAnomalyDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            min_sessions: config.frequency_min_sessions,
            duration_ratio: config.frequency_duration_ratio,
            max_messages: config.frequency_max_messages,
        }
    }
}

impl AnomalyDetector for FrequencyAnomalyDetector {
    fn name(&self) -> &'static str {
        "session_frequency"
    }

    fn evaluate(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> Option<AnomalyFinding> {
        let profile = profile?;
        if profile.total_sessions < self.min_sessions
            || profile.avg_session_duration_minutes <= 0.0
        {
            return None;
        }

        let current = session.duration_minutes();
        let avg = profile.avg_session_duration_minutes;
        if current < avg * self.duration_ratio && session.messages.len() < self.max_messages {
            let deviation = (avg - current) / avg * 100.0;
            return Some(AnomalyFinding {
                kind: self.name().to_string(),
                severity: AnomalySeverity::Medium,
                description: format!(
                    "session lasted {current:.1} min against a {avg:.1} min historical average with almost no conversation"
                ),
                deviation_score: deviation,
                recommended_action: "Verify the user's intent before account or payment changes"
                    .to_string(),
            });
        }
        None
    }
}

/// Message volume far above this user's established rhythm.
pub struct VolumeAnomalyDetector {
    multiplier: f64,
    min_messages: usize,
}

impl VolumeAnomalyDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            multiplier: config.volume_multiplier,
            min_messages: config.volume_min_messages,
        }
    }
}

impl AnomalyDetector for VolumeAnomalyDetector {
    fn name(&self) -> &'static str {
        "message_volume"
    }

    fn evaluate(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> Option<AnomalyFinding> {
        let profile = profile?;
        if profile.avg_message_count <= 0.0 {
            return None;
        }

        let count = session.messages.len();
        let avg = profile.avg_message_count;
        if count as f64 > avg * self.multiplier && count > self.min_messages {
            let deviation = (count as f64 - avg) / avg * 100.0;
            return Some(AnomalyFinding {
                kind: self.name().to_string(),
                severity: AnomalySeverity::Medium,
                description: format!(
                    "{count} messages against a {avg:.1} message historical average"
                ),
                deviation_score: deviation,
                recommended_action:
                    "Summarize the thread and check whether the conversation is looping"
                        .to_string(),
            });
        }
        None
    }
}

/// Heavy payment/refund talk from an account with almost no history.
pub struct PaymentAnomalyDetector {
    min_hits: usize,
    max_sessions: u64,
    keywords: Vec<String>,
}

impl PaymentAnomalyDetector {
    pub fn new(config: &AnomalyConfig, keywords: Vec<String>) -> Self {
        Self {
            min_hits: config.payment_min_hits,
            max_sessions: config.payment_max_sessions,
            keywords,
        }
    }
}

impl AnomalyDetector for PaymentAnomalyDetector {
    fn name(&self) -> &'static str {
        "payment_focus"
    }

    fn evaluate(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> Option<AnomalyFinding> {
        // A missing profile is a brand-new account: zero prior sessions.
        let prior_sessions = profile.map(|p| p.total_sessions).unwrap_or(0);
        if prior_sessions >= self.max_sessions {
            return None;
        }

        let hits = session.keyword_hits(&self.keywords);
        if hits >= self.min_hits && !session.messages.is_empty() {
            let deviation = hits as f64 / session.messages.len() as f64 * 100.0;
            return Some(AnomalyFinding {
                kind: self.name().to_string(),
                severity: AnomalySeverity::High,
                description: format!(
                    "{hits} payment-related keyword hits from an account with {prior_sessions} prior sessions"
                ),
                deviation_score: deviation,
                recommended_action:
                    "Route to payment-fraud review before processing any refund".to_string(),
            });
        }
        None
    }
}

/// Run every registered detector; findings come back in detector order.
pub struct AnomalyScreen {
    detectors: Vec<Box<dyn AnomalyDetector>>,
}

impl AnomalyScreen {
    /// The standard detector set.
    pub fn new(config: &AnomalyConfig, payment_keywords: Vec<String>) -> Self {
        Self {
            detectors: vec![
                Box::new(FrequencyAnomalyDetector::new(config)),
                Box::new(VolumeAnomalyDetector::new(config)),
                Box::new(PaymentAnomalyDetector::new(config, payment_keywords)),
            ],
        }
    }

    /// Add a custom detector.
    pub fn with_detector(mut self, detector: Box<dyn AnomalyDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Evaluate all detectors. None of them can short-circuit the rest.
    pub fn evaluate(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> Vec<AnomalyFinding> {
        self.detectors
            .iter()
            .filter_map(|d| d.evaluate(session, profile))
            .collect()
    }
}
