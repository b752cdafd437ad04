//! Message-list token estimation.

use stagehand_types::llm::Message;

/// Estimates the total token count for a list of messages.
pub trait TokenCounter: Send + Sync {
    fn count(&self, msgs: &[Message]) -> usize;
}

/// Character-ratio estimator: ~4 characters per token plus a small
/// per-message overhead for role framing. Never fails; an exact count would
/// require a tokenizer.
pub struct HeuristicCounter {
    chars_per_token: usize,
    per_message_overhead: usize,
}

impl HeuristicCounter {
    pub fn new() -> Self {
        Self {
            chars_per_token: 4,
            per_message_overhead: 4,
        }
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, msgs: &[Message]) -> usize {
        msgs.iter()
            .map(|m| m.content.chars().count() / self.chars_per_token + self.per_message_overhead)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_empty() {
        let counter = HeuristicCounter::new();
        assert_eq!(counter.count(&[]), 0);
    }

    #[test]
    fn test_count_scales_with_content() {
        let counter = HeuristicCounter::new();
        let short = vec![Message::user("x".repeat(40))];
        let long = vec![Message::user("x".repeat(4000))];
        assert_eq!(counter.count(&short), 14);
        assert_eq!(counter.count(&long), 1004);
    }

    #[test]
    fn test_count_multibyte_uses_chars_not_bytes() {
        let counter = HeuristicCounter::new();
        // 8 CJK chars = 24 bytes; char-based estimate stays small
        let msgs = vec![Message::user("设计大纲设计大纲")];
        assert_eq!(counter.count(&msgs), 8 / 4 + 4);
    }
}
