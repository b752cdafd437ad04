//! Cumulative token usage monitor.
//!
//! Tracks per-turn usage records and cumulative totals across a run. The
//! monitor also implements [`TokenObserver`] so context compression can
//! subtract the saved tokens from the running totals and flag a pending
//! stats push.

use std::sync::RwLock;

use stagehand_types::token::{TokenStats, TokenUsage};

/// Bounded usage history cap; oldest records are trimmed beyond this.
pub const MAX_USAGE_HISTORY: usize = 1000;

const WARNING_THRESHOLD: f64 = 0.8;
const CRITICAL_THRESHOLD: f64 = 0.95;

/// Notified when token-related events occur (e.g. compression).
pub trait TokenObserver: Send + Sync {
    fn on_compression(&self, before_tokens: usize, after_tokens: usize);
}

#[derive(Default)]
struct MonitorInner {
    total_prompt_tokens: usize,
    total_completion_tokens: usize,
    total_tokens: usize,
    turn_count: usize,
    usage_history: Vec<TokenUsage>,
    pending_update: bool,
}

/// Tracks cumulative token usage across workflow steps.
pub struct Monitor {
    max_tokens: i64,
    inner: RwLock<MonitorInner>,
}

impl Monitor {
    /// Creates a monitor for the given context-window size. A zero or
    /// negative max disables the warning/critical thresholds.
    pub fn new(max_tokens: i64) -> Self {
        Self {
            max_tokens,
            inner: RwLock::new(MonitorInner::default()),
        }
    }

    /// Appends a single-turn usage record, assigning it the next turn number
    /// and enforcing the history cap.
    pub fn record_usage(&self, mut usage: TokenUsage) {
        let mut inner = self.inner.write().expect("monitor lock poisoned");

        inner.total_prompt_tokens += usage.prompt_tokens;
        inner.total_completion_tokens += usage.completion_tokens;
        inner.total_tokens += usage.total_tokens;
        inner.turn_count += 1;
        usage.turn_number = inner.turn_count;
        inner.usage_history.push(usage);

        if inner.usage_history.len() > MAX_USAGE_HISTORY {
            let excess = inner.usage_history.len() - MAX_USAGE_HISTORY;
            inner.usage_history.drain(..excess);
        }
    }

    /// Returns a by-value snapshot of cumulative statistics.
    pub fn stats(&self) -> TokenStats {
        let inner = self.inner.read().expect("monitor lock poisoned");

        let remaining = self.max_tokens - inner.total_tokens as i64;
        let usage_percent = if self.max_tokens > 0 {
            inner.total_tokens as f64 / self.max_tokens as f64 * 100.0
        } else {
            0.0
        };

        let mut stats = TokenStats {
            max_tokens: self.max_tokens,
            total_prompt_tokens: inner.total_prompt_tokens,
            total_completion_tokens: inner.total_completion_tokens,
            total_tokens: inner.total_tokens,
            remaining_tokens: remaining,
            usage_percent,
            turn_count: inner.turn_count,
            ..Default::default()
        };

        if inner.turn_count > 0 {
            stats.avg_prompt_tokens = Some(inner.total_prompt_tokens / inner.turn_count);
            stats.avg_completion_tokens = Some(inner.total_completion_tokens / inner.turn_count);
            let avg_total = inner.total_tokens / inner.turn_count;
            stats.avg_total_tokens = Some(avg_total);
            if avg_total > 0 {
                stats.estimated_remaining_turns = Some(remaining / avg_total as i64);
            }
        }

        stats
    }

    /// The most recent usage records (up to the history cap), oldest first.
    pub fn usage_history(&self) -> Vec<TokenUsage> {
        self.inner
            .read()
            .expect("monitor lock poisoned")
            .usage_history
            .clone()
    }

    /// True when usage is at or beyond 80% of the configured max.
    pub fn is_warning(&self) -> bool {
        self.ratio_at_least(WARNING_THRESHOLD)
    }

    /// True when usage is at or beyond 95% of the configured max.
    pub fn is_critical(&self) -> bool {
        self.ratio_at_least(CRITICAL_THRESHOLD)
    }

    fn ratio_at_least(&self, threshold: f64) -> bool {
        if self.max_tokens <= 0 {
            return false;
        }
        let inner = self.inner.read().expect("monitor lock poisoned");
        inner.total_tokens as f64 / self.max_tokens as f64 >= threshold
    }

    /// Atomically returns and clears the pending-update flag set by
    /// compression, so an external push loop can emit refreshed stats.
    pub fn drain_pending_update(&self) -> bool {
        let mut inner = self.inner.write().expect("monitor lock poisoned");
        std::mem::take(&mut inner.pending_update)
    }

    /// Clears all tracked data.
    pub fn reset(&self) {
        let mut inner = self.inner.write().expect("monitor lock poisoned");
        *inner = MonitorInner::default();
    }
}

impl TokenObserver for Monitor {
    /// Adjusts cumulative counts to reflect the compressed context size and
    /// marks a pending update.
    fn on_compression(&self, before_tokens: usize, after_tokens: usize) {
        if after_tokens >= before_tokens {
            return;
        }
        let saved = before_tokens - after_tokens;

        let mut inner = self.inner.write().expect("monitor lock poisoned");
        inner.total_prompt_tokens = inner.total_prompt_tokens.saturating_sub(saved);
        inner.total_tokens = inner.total_tokens.saturating_sub(saved);
        inner.pending_update = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn usage(prompt: usize, completion: usize) -> TokenUsage {
        TokenUsage {
            turn_number: 0,
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            model: "test".to_string(),
            timestamp: Utc::now(),
            duration_ms: None,
        }
    }

    // -----------------------------------------------------------------------
    // Cumulative identity
    // -----------------------------------------------------------------------

    #[test]
    fn test_cumulative_identity() {
        let monitor = Monitor::new(100_000);
        monitor.record_usage(usage(100, 50));
        monitor.record_usage(usage(200, 80));

        let stats = monitor.stats();
        assert_eq!(stats.total_prompt_tokens, 300);
        assert_eq!(stats.total_completion_tokens, 130);
        assert_eq!(
            stats.total_tokens,
            stats.total_prompt_tokens + stats.total_completion_tokens
        );
        assert_eq!(stats.turn_count, 2);
    }

    #[test]
    fn test_turn_numbers_monotonic() {
        let monitor = Monitor::new(0);
        monitor.record_usage(usage(1, 1));
        monitor.record_usage(usage(1, 1));
        monitor.record_usage(usage(1, 1));
        let history = monitor.usage_history();
        let turns: Vec<usize> = history.iter().map(|u| u.turn_number).collect();
        assert_eq!(turns, vec![1, 2, 3]);
    }

    #[test]
    fn test_history_cap_trims_oldest() {
        let monitor = Monitor::new(0);
        for _ in 0..(MAX_USAGE_HISTORY + 10) {
            monitor.record_usage(usage(1, 1));
        }
        let history = monitor.usage_history();
        assert_eq!(history.len(), MAX_USAGE_HISTORY);
        assert_eq!(history[0].turn_number, 11);
    }

    // -----------------------------------------------------------------------
    // Stats derivations
    // -----------------------------------------------------------------------

    #[test]
    fn test_stats_averages_and_remaining_turns() {
        let monitor = Monitor::new(10_000);
        monitor.record_usage(usage(800, 200)); // total 1000
        monitor.record_usage(usage(600, 400)); // total 1000

        let stats = monitor.stats();
        assert_eq!(stats.avg_prompt_tokens, Some(700));
        assert_eq!(stats.avg_completion_tokens, Some(300));
        assert_eq!(stats.avg_total_tokens, Some(1000));
        assert_eq!(stats.remaining_tokens, 8_000);
        assert_eq!(stats.estimated_remaining_turns, Some(8));
        assert!((stats.usage_percent - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_no_turns_no_averages() {
        let monitor = Monitor::new(10_000);
        let stats = monitor.stats();
        assert!(stats.avg_total_tokens.is_none());
        assert!(stats.estimated_remaining_turns.is_none());
    }

    // -----------------------------------------------------------------------
    // Thresholds
    // -----------------------------------------------------------------------

    #[test]
    fn test_warning_and_critical_thresholds() {
        let monitor = Monitor::new(1_000);
        monitor.record_usage(usage(700, 50)); // 750 total
        assert!(!monitor.is_warning());
        monitor.record_usage(usage(50, 0)); // 800
        assert!(monitor.is_warning());
        assert!(!monitor.is_critical());
        monitor.record_usage(usage(150, 0)); // 950
        assert!(monitor.is_critical());
    }

    #[test]
    fn test_thresholds_disabled_without_max() {
        let monitor = Monitor::new(0);
        monitor.record_usage(usage(1_000_000, 0));
        assert!(!monitor.is_warning());
        assert!(!monitor.is_critical());
    }

    // -----------------------------------------------------------------------
    // Compression adjustment
    // -----------------------------------------------------------------------

    #[test]
    fn test_on_compression_subtracts_saved() {
        let monitor = Monitor::new(10_000);
        monitor.record_usage(usage(5_000, 1_000));

        monitor.on_compression(5_000, 2_000);
        let stats = monitor.stats();
        assert_eq!(stats.total_prompt_tokens, 2_000);
        assert_eq!(stats.total_tokens, 3_000);
        assert!(monitor.drain_pending_update());
        assert!(!monitor.drain_pending_update());
    }

    #[test]
    fn test_on_compression_clamps_at_zero() {
        let monitor = Monitor::new(10_000);
        monitor.record_usage(usage(100, 50));

        monitor.on_compression(10_000, 0);
        let stats = monitor.stats();
        assert_eq!(stats.total_prompt_tokens, 0);
        assert_eq!(stats.total_tokens, 0);
    }

    #[test]
    fn test_on_compression_ignores_non_savings() {
        let monitor = Monitor::new(10_000);
        monitor.record_usage(usage(100, 50));

        monitor.on_compression(1_000, 1_000);
        assert!(!monitor.drain_pending_update());
        assert_eq!(monitor.stats().total_tokens, 150);
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    #[test]
    fn test_reset_clears_everything() {
        let monitor = Monitor::new(10_000);
        monitor.record_usage(usage(100, 50));
        monitor.reset();
        let stats = monitor.stats();
        assert_eq!(stats.total_tokens, 0);
        assert_eq!(stats.turn_count, 0);
        assert!(monitor.usage_history().is_empty());
    }
}
