//! Shared data model for session snapshots and user history.
//!
//! These are plain serde-derived structs assembled by the orchestrator and
//! the storage layer; the engine never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Pinned instruction message; always kept by the context manager.
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    /// System messages are pinned; everything else rolls.
    pub fn is_pinned(&self) -> bool {
        matches!(self, ChatRole::System)
    }
}

/// Sentiment label attached to a message by the upstream classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Frustrated,
}

impl Sentiment {
    /// Negative and frustrated messages both count toward escalation.
    pub fn is_negative(&self) -> bool {
        matches!(self, Sentiment::Negative | Sentiment::Frustrated)
    }
}

/// One conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            sentiment: None,
        }
    }

    /// Builder-style method to attach a sentiment label.
    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }
}

/// Aggregated facts about one in-progress conversation.
///
/// Immutable per evaluation call; the orchestrator assembles a fresh
/// snapshot for every risk evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    /// Ordered messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Tool names invoked during the session.
    pub tools_invoked: Vec<String>,
    /// Error codes encountered (may contain duplicates).
    pub error_codes: Vec<String>,
    /// Station / resource identifiers touched.
    pub stations_touched: Vec<String>,
    /// Discrete actions performed (start charge, stop charge, refund, ...).
    pub actions: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub evaluated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Session duration in whole-second-resolution minutes.
    pub fn duration_minutes(&self) -> f64 {
        let secs = (self.evaluated_at - self.started_at).num_seconds().max(0);
        secs as f64 / 60.0
    }

    /// Number of messages carrying a negative or frustrated label.
    pub fn negative_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sentiment.map(|s| s.is_negative()).unwrap_or(false))
            .count()
    }

    /// Distinct error codes encountered.
    pub fn distinct_error_count(&self) -> usize {
        self.error_codes.iter().collect::<HashSet<_>>().len()
    }

    /// Distinct stations touched.
    pub fn distinct_station_count(&self) -> usize {
        self.stations_touched.iter().collect::<HashSet<_>>().len()
    }

    /// Case-insensitive keyword hits across all message contents.
    pub fn keyword_hits(&self, keywords: &[String]) -> usize {
        self.messages
            .iter()
            .map(|m| {
                let content = m.content.to_lowercase();
                keywords
                    .iter()
                    .filter(|k| content.contains(k.as_str()))
                    .count()
            })
            .sum()
    }
}

/// Aggregated historical statistics for one user, supplied read-only by the
/// storage layer. Absent entirely for first-contact users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBehaviorProfile {
    pub user_id: String,
    /// Fraction of past sessions that escalated, in [0,1].
    pub escalation_rate: f64,
    /// Fraction of past sessions resolved without escalation, in [0,1].
    pub resolution_rate: f64,
    /// Average past session duration in minutes.
    pub avg_session_duration_minutes: f64,
    /// Average past message count per session.
    pub avg_message_count: f64,
    /// Fraud risk score on the storage layer's 0-100 scale.
    pub fraud_risk_score: f64,
    /// How often the user returns with the same issue, in [0,1].
    pub repeat_issue_frequency: f64,
    pub total_sessions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session_at: Option<DateTime<Utc>>,
}
