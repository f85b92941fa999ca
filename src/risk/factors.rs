//! Named risk factors and their recommended actions.

use serde::{Deserialize, Serialize};

/// A named condition a session has met. Factors accrue in evaluation
/// order and are reported unsorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    LongConversation,
    HighEscalationRisk,
    MultipleErrors,
    NegativeSentiment,
    RepeatCustomerIssue,
    NoToolsUsed,
    LackOfProgress,
    PotentialFraud,
}

impl RiskFactor {
    /// Stable string tag used in stored predictions and dashboards.
    pub fn tag(&self) -> &'static str {
        match self {
            RiskFactor::LongConversation => "long_conversation",
            RiskFactor::HighEscalationRisk => "high_escalation_risk",
            RiskFactor::MultipleErrors => "multiple_errors",
            RiskFactor::NegativeSentiment => "negative_sentiment",
            RiskFactor::RepeatCustomerIssue => "repeat_customer_issue",
            RiskFactor::NoToolsUsed => "no_tools_used",
            RiskFactor::LackOfProgress => "lack_of_progress",
            RiskFactor::PotentialFraud => "potential_fraud",
        }
    }

    /// Fixed recommendations for this factor. Several factors mapping to
    /// the same advice yield duplicates on purpose; consumers weight
    /// repeated advice higher.
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            RiskFactor::LongConversation => {
                &["Summarize the conversation so far and confirm the outstanding issue"]
            }
            RiskFactor::HighEscalationRisk => {
                &["Prepare a warm handoff to a human support agent"]
            }
            RiskFactor::MultipleErrors => {
                &["Check station health and recent error history before the next suggestion"]
            }
            RiskFactor::NegativeSentiment => {
                &["Acknowledge the customer's frustration and avoid canned phrasing"]
            }
            RiskFactor::RepeatCustomerIssue => {
                &["Review previous sessions for this user and reference the earlier resolution attempt"]
            }
            RiskFactor::NoToolsUsed => {
                &["Run the station diagnostics tools before proposing another fix"]
            }
            RiskFactor::LackOfProgress => {
                &["Offer a concrete next step, such as an alternative nearby station"]
            }
            RiskFactor::PotentialFraud => &[
                "Flag the session for the fraud review queue",
                "Do not process refunds automatically in this session",
            ],
        }
    }
}

impl std::fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Recommendation emitted when escalation probability crosses the urgent
/// threshold, independent of which factors accrued.
pub const URGENT_ESCALATION_RECOMMENDATION: &str =
    "Escalate to a human agent now; do not continue automated troubleshooting";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_snake_case() {
        assert_eq!(RiskFactor::LongConversation.tag(), "long_conversation");
        assert_eq!(RiskFactor::PotentialFraud.tag(), "potential_fraud");
        assert_eq!(RiskFactor::HighEscalationRisk.to_string(), "high_escalation_risk");
    }

    #[test]
    fn test_every_factor_has_a_recommendation() {
        let all = [
            RiskFactor::LongConversation,
            RiskFactor::HighEscalationRisk,
            RiskFactor::MultipleErrors,
            RiskFactor::NegativeSentiment,
            RiskFactor::RepeatCustomerIssue,
            RiskFactor::NoToolsUsed,
            RiskFactor::LackOfProgress,
            RiskFactor::PotentialFraud,
        ];
        for factor in all {
            assert!(!factor.recommendations().is_empty(), "{factor} has none");
        }
    }

    #[test]
    fn test_serde_tag_round_trip() {
        let json = serde_json::to_string(&RiskFactor::NoToolsUsed).unwrap();
        assert_eq!(json, "\"no_tools_used\"");
        let back: RiskFactor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RiskFactor::NoToolsUsed);
    }
}
