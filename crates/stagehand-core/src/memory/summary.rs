//! Compression summary message helpers.

use stagehand_types::llm::Message;

/// Prefix used for compression summary messages.
pub const SUMMARY_PREFIX: &str = "[上下文摘要 — 以下是之前对话的压缩总结]\n";

/// Whether a system message is a compression summary.
pub fn is_summary_message(content: &str) -> bool {
    content.starts_with("[上下文摘要")
}

/// Wraps a summary string into a system message.
pub fn format_summary_message(summary: &str) -> Message {
    Message::system(format!("{SUMMARY_PREFIX}{summary}"))
}
