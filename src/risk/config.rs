//! Scoring configuration.
//!
//! Every tier boundary, weight, and decision threshold used by the risk
//! engine lives here under a name. The defaults reproduce the tuned values
//! the support team runs in production; the math in the engine deliberately
//! stays an unweighted mean of whichever signals apply, so changing a
//! boundary here changes behavior without touching engine code.

use std::time::Duration;

// ============================================================================
// Escalation
// ============================================================================

/// Signal weights for the escalation probability.
#[derive(Debug, Clone)]
pub struct EscalationConfig {
    /// Historical escalation rate assumed for unknown users.
    pub default_history_rate: f64,

    /// Message-count tier boundaries and weights.
    pub messages_heavy_at: usize,
    pub messages_heavy_weight: f64,
    pub messages_busy_at: usize,
    pub messages_busy_weight: f64,
    pub messages_active_at: usize,
    pub messages_active_weight: f64,
    pub messages_quiet_weight: f64,

    /// Session-duration tier boundaries (minutes) and weights.
    pub duration_long_minutes: f64,
    pub duration_long_weight: f64,
    pub duration_medium_minutes: f64,
    pub duration_medium_weight: f64,
    pub duration_short_weight: f64,

    /// Negative/frustrated-message tier boundaries and weights.
    pub negative_severe_at: usize,
    pub negative_severe_weight: f64,
    pub negative_elevated_at: usize,
    pub negative_elevated_weight: f64,
    pub negative_present_at: usize,
    pub negative_present_weight: f64,
    pub negative_none_weight: f64,

    /// Distinct-error tier boundaries and weights.
    pub errors_many_at: usize,
    pub errors_many_weight: f64,
    pub errors_some_at: usize,
    pub errors_some_weight: f64,
    pub errors_single_at: usize,
    pub errors_single_weight: f64,
    pub errors_none_weight: f64,

    /// The repeat-issue signal only joins the average when the user's
    /// repeat-issue frequency reaches this floor. The denominator grows
    /// with it; that quirk is load-bearing for score compatibility.
    pub repeat_issue_min_frequency: f64,
    pub repeat_issue_weight: f64,

    /// Probability at which escalation is predicted.
    pub predict_threshold: f64,
    /// Probability at which the immediate-handoff recommendation fires.
    pub urgent_threshold: f64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            default_history_rate: 0.2,
            messages_heavy_at: 15,
            messages_heavy_weight: 0.8,
            messages_busy_at: 10,
            messages_busy_weight: 0.5,
            messages_active_at: 7,
            messages_active_weight: 0.3,
            messages_quiet_weight: 0.1,
            duration_long_minutes: 15.0,
            duration_long_weight: 0.7,
            duration_medium_minutes: 10.0,
            duration_medium_weight: 0.4,
            duration_short_weight: 0.1,
            negative_severe_at: 3,
            negative_severe_weight: 0.9,
            negative_elevated_at: 2,
            negative_elevated_weight: 0.6,
            negative_present_at: 1,
            negative_present_weight: 0.3,
            negative_none_weight: 0.1,
            errors_many_at: 3,
            errors_many_weight: 0.8,
            errors_some_at: 2,
            errors_some_weight: 0.5,
            errors_single_at: 1,
            errors_single_weight: 0.2,
            errors_none_weight: 0.0,
            repeat_issue_min_frequency: 0.3,
            repeat_issue_weight: 0.7,
            predict_threshold: 0.6,
            urgent_threshold: 0.8,
        }
    }
}

// ============================================================================
// Unresolved failure
// ============================================================================

/// Signal weights for the unresolved-failure probability.
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// `1 - resolution_rate` assumed for unknown users.
    pub default_unresolved_rate: f64,

    /// Issue complexity = distinct errors + distinct stations touched.
    pub complexity_high_at: usize,
    pub complexity_high_weight: f64,
    pub complexity_medium_at: usize,
    pub complexity_medium_weight: f64,
    pub complexity_low_weight: f64,

    /// Progress stall from the actions/messages ratio. An empty session
    /// carries no stall evidence and scores the none tier.
    pub stall_severe_below: f64,
    pub stall_severe_weight: f64,
    pub stall_moderate_below: f64,
    pub stall_moderate_weight: f64,
    pub stall_none_weight: f64,

    /// Tool underuse.
    pub no_tools_messages_over: usize,
    pub no_tools_weight: f64,
    pub few_tools_below: usize,
    pub few_tools_messages_over: usize,
    pub few_tools_weight: f64,
    pub tools_ok_weight: f64,

    /// Probability at which unresolved failure is predicted.
    pub predict_threshold: f64,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            default_unresolved_rate: 0.3,
            complexity_high_at: 5,
            complexity_high_weight: 0.8,
            complexity_medium_at: 3,
            complexity_medium_weight: 0.5,
            complexity_low_weight: 0.2,
            stall_severe_below: 0.1,
            stall_severe_weight: 0.7,
            stall_moderate_below: 0.2,
            stall_moderate_weight: 0.4,
            stall_none_weight: 0.1,
            no_tools_messages_over: 5,
            no_tools_weight: 0.6,
            few_tools_below: 2,
            few_tools_messages_over: 8,
            few_tools_weight: 0.4,
            tools_ok_weight: 0.1,
            predict_threshold: 0.5,
        }
    }
}

// ============================================================================
// Fraud
// ============================================================================

/// Signal weights for the fraud probability.
#[derive(Debug, Clone)]
pub struct FraudConfig {
    /// Signal assumed for users with no stored fraud score.
    pub default_score_signal: f64,

    /// Unusually short session for an established user.
    pub short_session_min_history: u64,
    pub short_session_duration_ratio: f64,
    pub short_session_weight: f64,
    pub short_session_base_weight: f64,

    /// Many discrete actions with almost no conversation.
    pub rapid_actions_over: usize,
    pub rapid_max_messages: usize,
    pub rapid_weight: f64,
    pub rapid_base_weight: f64,

    /// Payment/refund keywords from a near-new account.
    pub payment_min_hits: usize,
    pub payment_new_account_below: u64,
    pub payment_weight: f64,
    pub payment_base_weight: f64,

    /// Probability at which fraud is predicted.
    pub predict_threshold: f64,

    /// Keyword list for payment/refund talk. "charge" is deliberately
    /// absent: charging a vehicle is what this product is for.
    pub payment_keywords: Vec<String>,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            default_score_signal: 0.1,
            short_session_min_history: 20,
            short_session_duration_ratio: 0.2,
            short_session_weight: 0.8,
            short_session_base_weight: 0.1,
            rapid_actions_over: 5,
            rapid_max_messages: 3,
            rapid_weight: 0.9,
            rapid_base_weight: 0.1,
            payment_min_hits: 2,
            payment_new_account_below: 3,
            payment_weight: 0.7,
            payment_base_weight: 0.1,
            predict_threshold: 0.7,
            payment_keywords: [
                "refund",
                "payment",
                "billing",
                "card",
                "transaction",
                "money",
                "chargeback",
                "reimburse",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

// ============================================================================
// Confidence and factor gates
// ============================================================================

/// Confidence accrual for a prediction.
#[derive(Debug, Clone)]
pub struct ConfidenceConfig {
    pub base: f64,
    pub messages_bonus_at: usize,
    pub messages_bonus: f64,
    pub sessions_bonus_at: u64,
    pub sessions_bonus: f64,
    pub recent_session_within: Duration,
    pub recent_session_bonus: f64,
    pub cap: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            base: 0.5,
            messages_bonus_at: 8,
            messages_bonus: 0.2,
            sessions_bonus_at: 5,
            sessions_bonus: 0.2,
            recent_session_within: Duration::from_secs(7 * 24 * 3600),
            recent_session_bonus: 0.1,
            cap: 1.0,
        }
    }
}

/// Gates for the named risk-factor tags that are not already covered by a
/// probability threshold.
#[derive(Debug, Clone)]
pub struct FactorConfig {
    pub long_conversation_at: usize,
    pub multiple_errors_at: usize,
    pub negative_sentiment_at: usize,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            long_conversation_at: 12,
            multiple_errors_at: 2,
            negative_sentiment_at: 2,
        }
    }
}

// ============================================================================
// Anomaly detection
// ============================================================================

/// Gates for the anomaly detectors.
#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    /// Frequency detector: minimum prior sessions before it may fire.
    pub frequency_min_sessions: u64,
    pub frequency_duration_ratio: f64,
    pub frequency_max_messages: usize,

    /// Volume detector.
    pub volume_multiplier: f64,
    pub volume_min_messages: usize,

    /// Payment detector.
    pub payment_min_hits: usize,
    pub payment_max_sessions: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            frequency_min_sessions: 3,
            frequency_duration_ratio: 0.2,
            frequency_max_messages: 3,
            volume_multiplier: 2.0,
            volume_min_messages: 15,
            payment_min_hits: 3,
            payment_max_sessions: 2,
        }
    }
}

/// Complete risk-engine configuration.
#[derive(Debug, Clone, Default)]
pub struct RiskConfig {
    pub escalation: EscalationConfig,
    pub failure: FailureConfig,
    pub fraud: FraudConfig,
    pub confidence: ConfidenceConfig,
    pub factors: FactorConfig,
    pub anomaly: AnomalyConfig,
}
