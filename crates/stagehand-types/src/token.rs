//! Token usage records and monitor statistics.
//!
//! Field names keep the camelCase wire form consumed by frontends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token usage for a single LLM invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// 1-based turn number, assigned by the monitor on record.
    pub turn_number: usize,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the call in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// By-value snapshot of cumulative monitor statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStats {
    pub max_tokens: i64,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    pub total_tokens: usize,
    pub remaining_tokens: i64,
    pub usage_percent: f64,
    pub turn_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_prompt_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_completion_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_total_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_turns: Option<i64>,
}
