//! Bounded conversation context.
//!
//! Keeps the message sequence handed to the language model under a fixed
//! token budget. Token cost is estimated as `ceil(chars / 4)` per message;
//! a deliberate approximation, not a tokenizer, chosen so trimming needs no
//! model-specific vocabulary.
//!
//! System messages are pinned and survive in full. Rolling messages are
//! kept newest-first until the budget runs out, then returned in
//! chronological order.

use tracing::debug;

use crate::errors::ContextError;
use crate::types::ChatMessage;

/// Estimated token cost of one message: `ceil(chars / 4)`.
pub fn estimate_tokens(message: &ChatMessage) -> usize {
    message.content.chars().count().div_ceil(4)
}

/// Estimated token cost of a whole sequence.
pub fn estimate_sequence_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(estimate_tokens).sum()
}

/// Trims conversation history to a token budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextManager;

impl ContextManager {
    pub fn new() -> Self {
        Self
    }

    /// Return the most recent messages that fit within `max_tokens`.
    ///
    /// Pinned (system) messages always survive in full. If the pinned set
    /// alone meets or exceeds the budget, only the single most recent
    /// pinned message is returned and all rolling messages drop. Otherwise
    /// rolling messages are taken newest-to-oldest while they fit, and the
    /// result is reassembled chronologically with pinned messages first.
    pub fn trim(
        &self,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<Vec<ChatMessage>, ContextError> {
        if max_tokens == 0 {
            return Err(ContextError::InvalidBudget(max_tokens));
        }

        let (pinned, rolling): (Vec<&ChatMessage>, Vec<&ChatMessage>) =
            messages.iter().partition(|m| m.role.is_pinned());

        let pinned_cost: usize = pinned.iter().map(|m| estimate_tokens(m)).sum();
        if pinned_cost >= max_tokens {
            // The instructions alone blow the budget; keep only the newest
            // instruction and nothing else.
            let survivor = pinned.last().map(|m| (*m).clone());
            debug!(
                pinned_cost,
                max_tokens,
                "pinned messages exceed budget, dropping to most recent instruction"
            );
            return Ok(survivor.into_iter().collect());
        }

        let budget = max_tokens - pinned_cost;
        let mut kept_reversed: Vec<&ChatMessage> = Vec::new();
        let mut used = 0usize;

        for message in rolling.iter().rev() {
            let cost = estimate_tokens(message);
            if used + cost > budget {
                break;
            }
            used += cost;
            kept_reversed.push(*message);
        }

        let dropped = rolling.len() - kept_reversed.len();
        if dropped > 0 {
            debug!(
                dropped,
                kept = kept_reversed.len(),
                used,
                budget,
                "trimmed rolling history"
            );
        }

        let mut result: Vec<ChatMessage> = pinned.into_iter().cloned().collect();
        result.extend(kept_reversed.into_iter().rev().cloned());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatRole;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(role: ChatRole, chars: usize, at: i64) -> ChatMessage {
        ChatMessage::new(role, "x".repeat(chars), ts(at))
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(&msg(ChatRole::User, 4, 0)), 1);
        assert_eq!(estimate_tokens(&msg(ChatRole::User, 5, 0)), 2);
        assert_eq!(estimate_tokens(&msg(ChatRole::User, 0, 0)), 0);
    }

    #[test]
    fn test_zero_budget_is_an_input_error() {
        let result = ContextManager::new().trim(&[], 0);
        assert_eq!(result.unwrap_err(), ContextError::InvalidBudget(0));
    }

    #[test]
    fn test_everything_fits_unchanged() {
        let messages = vec![
            msg(ChatRole::System, 40, 0),
            msg(ChatRole::User, 40, 1),
            msg(ChatRole::Assistant, 40, 2),
        ];
        let kept = ContextManager::new().trim(&messages, 100).unwrap();
        assert_eq!(kept.len(), 3);
        assert!(estimate_sequence_tokens(&kept) <= 100);
    }

    #[test]
    fn test_oldest_rolling_messages_drop_first() {
        let messages = vec![
            msg(ChatRole::System, 40, 0),  // 10 tokens
            msg(ChatRole::User, 80, 1),    // 20 tokens, oldest rolling
            msg(ChatRole::Assistant, 80, 2), // 20 tokens
            msg(ChatRole::User, 80, 3),    // 20 tokens, newest
        ];
        // Budget 55: pinned 10, rolling budget 45 fits two of the three.
        let kept = ContextManager::new().trim(&messages, 55).unwrap();

        assert_eq!(kept.len(), 3);
        assert!(kept[0].role.is_pinned());
        assert_eq!(kept[1].timestamp, ts(2));
        assert_eq!(kept[2].timestamp, ts(3));
        assert!(estimate_sequence_tokens(&kept) <= 55);
    }

    #[test]
    fn test_newest_rolling_message_survives_when_budget_allows() {
        let messages = vec![
            msg(ChatRole::User, 400, 1), // 100 tokens each
            msg(ChatRole::User, 400, 2),
            msg(ChatRole::User, 400, 3),
        ];
        let kept = ContextManager::new().trim(&messages, 100).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, ts(3));
    }

    #[test]
    fn test_overweight_pinned_set_collapses_to_newest_instruction() {
        let messages = vec![
            msg(ChatRole::System, 400, 0),
            msg(ChatRole::System, 400, 1),
            msg(ChatRole::User, 4, 2),
        ];
        // Pinned cost 200 >= budget 150.
        let kept = ContextManager::new().trim(&messages, 150).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].role.is_pinned());
        assert_eq!(kept[0].timestamp, ts(1));
    }

    #[test]
    fn test_result_is_chronological_with_pinned_first() {
        let messages = vec![
            msg(ChatRole::User, 8, 1),
            msg(ChatRole::System, 8, 2),
            msg(ChatRole::Assistant, 8, 3),
            msg(ChatRole::User, 8, 4),
        ];
        let kept = ContextManager::new().trim(&messages, 1000).unwrap();

        assert!(kept[0].role.is_pinned());
        let rolling: Vec<_> = kept[1..].iter().map(|m| m.timestamp).collect();
        assert_eq!(rolling, vec![ts(1), ts(3), ts(4)]);
    }

    #[test]
    fn test_never_exceeds_budget() {
        // Mixed sizes; every budget from tight to roomy must hold.
        let messages: Vec<ChatMessage> = (0..12)
            .map(|i| msg(ChatRole::User, (i % 5 + 1) * 13, i as i64))
            .collect();

        let manager = ContextManager::new();
        for budget in [1usize, 3, 7, 20, 50, 1000] {
            let kept = manager.trim(&messages, budget).unwrap();
            assert!(
                estimate_sequence_tokens(&kept) <= budget,
                "budget {budget} exceeded"
            );
        }
    }

    #[test]
    fn test_boundary_exact_fit_is_kept() {
        let messages = vec![
            msg(ChatRole::User, 40, 1), // 10 tokens
            msg(ChatRole::User, 40, 2), // 10 tokens
        ];
        let kept = ContextManager::new().trim(&messages, 20).unwrap();
        assert_eq!(kept.len(), 2);
    }
}
