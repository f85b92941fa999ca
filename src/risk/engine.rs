//! Multi-factor risk prediction.
//!
//! `predict` is a pure function of the session snapshot and the user's
//! historical profile; identical inputs always produce identical output.
//! Each probability is the unweighted mean of the signals that apply, so
//! the denominator varies when a conditional signal joins. That is the
//! documented scoring contract, not an accident.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::RiskInputError;
use crate::risk::anomaly::{AnomalyFinding, AnomalyScreen};
use crate::risk::config::RiskConfig;
use crate::risk::factors::{RiskFactor, URGENT_ESCALATION_RECOMMENDATION};
use crate::types::{SessionSnapshot, UserBehaviorProfile};

/// Output of one risk evaluation. Upserted by session id in the prediction
/// store; a later evaluation replaces this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub session_id: String,
    pub escalation_probability: f64,
    pub failure_probability: f64,
    pub fraud_probability: f64,
    pub predicted_escalation: bool,
    pub predicted_failure: bool,
    pub predicted_fraud: bool,
    /// Named conditions met, in evaluation order.
    pub risk_factors: Vec<RiskFactor>,
    /// How much history backs this prediction, in [0,1].
    pub confidence: f64,
    /// Recommended actions; duplicates across factors are preserved.
    pub recommended_actions: Vec<String>,
}

/// Stateless scoring engine. Cheap to construct and share.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Score a session snapshot against the user's history.
    pub fn predict(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> Result<RiskPrediction, RiskInputError> {
        validate(session)?;

        let escalation = self.escalation_probability(session, profile);
        let failure = self.failure_probability(session, profile);
        let fraud = self.fraud_probability(session, profile);
        let confidence = self.confidence(session, profile);
        let factors = self.risk_factors(session, profile, escalation, fraud);
        let recommendations = self.recommendations(&factors, escalation);

        debug!(
            session_id = %session.session_id,
            escalation = format!("{escalation:.3}"),
            failure = format!("{failure:.3}"),
            fraud = format!("{fraud:.3}"),
            factors = factors.len(),
            "risk evaluation"
        );

        Ok(RiskPrediction {
            session_id: session.session_id.clone(),
            escalation_probability: escalation,
            failure_probability: failure,
            fraud_probability: fraud,
            predicted_escalation: escalation >= self.config.escalation.predict_threshold,
            predicted_failure: failure >= self.config.failure.predict_threshold,
            predicted_fraud: fraud >= self.config.fraud.predict_threshold,
            risk_factors: factors,
            confidence,
            recommended_actions: recommendations,
        })
    }

    /// Screen the session with the standard anomaly detectors.
    ///
    /// Returns zero or more findings; detectors are independent and all of
    /// them run on every call.
    pub fn detect_anomalies(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> Vec<AnomalyFinding> {
        let screen = AnomalyScreen::new(
            &self.config.anomaly,
            self.config.fraud.payment_keywords.clone(),
        );
        screen.evaluate(session, profile)
    }

    fn escalation_probability(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> f64 {
        let cfg = &self.config.escalation;
        let mut signals = Vec::with_capacity(6);

        signals.push(
            profile
                .map(|p| p.escalation_rate)
                .unwrap_or(cfg.default_history_rate),
        );

        let messages = session.messages.len();
        signals.push(if messages >= cfg.messages_heavy_at {
            cfg.messages_heavy_weight
        } else if messages >= cfg.messages_busy_at {
            cfg.messages_busy_weight
        } else if messages >= cfg.messages_active_at {
            cfg.messages_active_weight
        } else {
            cfg.messages_quiet_weight
        });

        let minutes = session.duration_minutes();
        signals.push(if minutes >= cfg.duration_long_minutes {
            cfg.duration_long_weight
        } else if minutes >= cfg.duration_medium_minutes {
            cfg.duration_medium_weight
        } else {
            cfg.duration_short_weight
        });

        let negative = session.negative_message_count();
        signals.push(if negative >= cfg.negative_severe_at {
            cfg.negative_severe_weight
        } else if negative >= cfg.negative_elevated_at {
            cfg.negative_elevated_weight
        } else if negative >= cfg.negative_present_at {
            cfg.negative_present_weight
        } else {
            cfg.negative_none_weight
        });

        let errors = session.distinct_error_count();
        signals.push(if errors >= cfg.errors_many_at {
            cfg.errors_many_weight
        } else if errors >= cfg.errors_some_at {
            cfg.errors_some_weight
        } else if errors >= cfg.errors_single_at {
            cfg.errors_single_weight
        } else {
            cfg.errors_none_weight
        });

        // Conditional signal: joins the mean (and grows the denominator)
        // only for users with a known repeat-issue habit.
        if let Some(p) = profile {
            if p.repeat_issue_frequency >= cfg.repeat_issue_min_frequency {
                signals.push(cfg.repeat_issue_weight);
            }
        }

        mean(&signals)
    }

    fn failure_probability(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> f64 {
        let cfg = &self.config.failure;
        let mut signals = Vec::with_capacity(4);

        signals.push(
            profile
                .map(|p| 1.0 - p.resolution_rate)
                .unwrap_or(cfg.default_unresolved_rate),
        );

        let complexity = session.distinct_error_count() + session.distinct_station_count();
        signals.push(if complexity >= cfg.complexity_high_at {
            cfg.complexity_high_weight
        } else if complexity >= cfg.complexity_medium_at {
            cfg.complexity_medium_weight
        } else {
            cfg.complexity_low_weight
        });

        signals.push(match progress_ratio(session) {
            Some(ratio) if ratio < cfg.stall_severe_below => cfg.stall_severe_weight,
            Some(ratio) if ratio < cfg.stall_moderate_below => cfg.stall_moderate_weight,
            _ => cfg.stall_none_weight,
        });

        let tools = session.tools_invoked.len();
        let messages = session.messages.len();
        signals.push(if tools == 0 && messages > cfg.no_tools_messages_over {
            cfg.no_tools_weight
        } else if tools < cfg.few_tools_below && messages > cfg.few_tools_messages_over {
            cfg.few_tools_weight
        } else {
            cfg.tools_ok_weight
        });

        mean(&signals)
    }

    fn fraud_probability(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
    ) -> f64 {
        let cfg = &self.config.fraud;
        let mut signals = Vec::with_capacity(4);

        signals.push(
            profile
                .map(|p| (p.fraud_risk_score / 100.0).clamp(0.0, 1.0))
                .unwrap_or(cfg.default_score_signal),
        );

        let short_session = profile.is_some_and(|p| {
            p.total_sessions > cfg.short_session_min_history
                && p.avg_session_duration_minutes > 0.0
                && session.duration_minutes()
                    < p.avg_session_duration_minutes * cfg.short_session_duration_ratio
        });
        signals.push(if short_session {
            cfg.short_session_weight
        } else {
            cfg.short_session_base_weight
        });

        let rapid = session.actions.len() > cfg.rapid_actions_over
            && session.messages.len() < cfg.rapid_max_messages;
        signals.push(if rapid {
            cfg.rapid_weight
        } else {
            cfg.rapid_base_weight
        });

        let hits = session.keyword_hits(&cfg.payment_keywords);
        let prior_sessions = profile.map(|p| p.total_sessions).unwrap_or(0);
        let new_account_payment =
            hits >= cfg.payment_min_hits && prior_sessions < cfg.payment_new_account_below;
        signals.push(if new_account_payment {
            cfg.payment_weight
        } else {
            cfg.payment_base_weight
        });

        mean(&signals)
    }

    fn confidence(&self, session: &SessionSnapshot, profile: Option<&UserBehaviorProfile>) -> f64 {
        let cfg = &self.config.confidence;
        let mut confidence = cfg.base;

        if session.messages.len() >= cfg.messages_bonus_at {
            confidence += cfg.messages_bonus;
        }
        if let Some(p) = profile {
            if p.total_sessions >= cfg.sessions_bonus_at {
                confidence += cfg.sessions_bonus;
            }
            if let Some(last) = p.last_session_at {
                let since = session.evaluated_at - last;
                let window = ChronoDuration::from_std(cfg.recent_session_within)
                    .unwrap_or(ChronoDuration::days(7));
                if since >= ChronoDuration::zero() && since <= window {
                    confidence += cfg.recent_session_bonus;
                }
            }
        }

        confidence.min(cfg.cap)
    }

    fn risk_factors(
        &self,
        session: &SessionSnapshot,
        profile: Option<&UserBehaviorProfile>,
        escalation: f64,
        fraud: f64,
    ) -> Vec<RiskFactor> {
        let cfg = &self.config;
        let mut factors = Vec::new();

        if session.messages.len() >= cfg.factors.long_conversation_at {
            factors.push(RiskFactor::LongConversation);
        }
        if escalation >= cfg.escalation.predict_threshold {
            factors.push(RiskFactor::HighEscalationRisk);
        }
        if session.distinct_error_count() >= cfg.factors.multiple_errors_at {
            factors.push(RiskFactor::MultipleErrors);
        }
        if session.negative_message_count() >= cfg.factors.negative_sentiment_at {
            factors.push(RiskFactor::NegativeSentiment);
        }
        if profile.is_some_and(|p| {
            p.repeat_issue_frequency >= cfg.escalation.repeat_issue_min_frequency
        }) {
            factors.push(RiskFactor::RepeatCustomerIssue);
        }
        if session.tools_invoked.is_empty()
            && session.messages.len() > cfg.failure.no_tools_messages_over
        {
            factors.push(RiskFactor::NoToolsUsed);
        }
        if progress_ratio(session).is_some_and(|r| r < cfg.failure.stall_severe_below) {
            factors.push(RiskFactor::LackOfProgress);
        }
        if fraud >= cfg.fraud.predict_threshold {
            factors.push(RiskFactor::PotentialFraud);
        }

        factors
    }

    fn recommendations(&self, factors: &[RiskFactor], escalation: f64) -> Vec<String> {
        let mut actions = Vec::new();

        if escalation >= self.config.escalation.urgent_threshold {
            actions.push(URGENT_ESCALATION_RECOMMENDATION.to_string());
        }
        for factor in factors {
            actions.extend(factor.recommendations().iter().map(|s| s.to_string()));
        }

        actions
    }
}

/// Actions-per-message ratio; `None` for an empty session.
fn progress_ratio(session: &SessionSnapshot) -> Option<f64> {
    if session.messages.is_empty() {
        return None;
    }
    Some(session.actions.len() as f64 / session.messages.len() as f64)
}

fn mean(signals: &[f64]) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    signals.iter().sum::<f64>() / signals.len() as f64
}

fn validate(session: &SessionSnapshot) -> Result<(), RiskInputError> {
    if session.session_id.is_empty() {
        return Err(RiskInputError::MissingSessionId);
    }
    if session.evaluated_at < session.started_at {
        return Err(RiskInputError::NegativeDuration {
            started_at: session.started_at,
            evaluated_at: session.evaluated_at,
        });
    }
    Ok(())
}
