//! Threshold-driven, layer-aware message history compression.
//!
//! When token usage approaches the context window limit, older conversation
//! messages are replaced by an LLM-generated summary while system messages
//! (Layer 1+2) and the most recent turns stay intact.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use stagehand_types::llm::{
    CompletionRequest, GenerationConfig, LlmError, Message, MessageRole, StreamEvent,
};

use crate::llm::BoxLlmProvider;

use super::summary::{format_summary_message, is_summary_message};

const SUMMARIZE_PROMPT: &str = "请将以下对话历史压缩为一段简洁的摘要，保留所有关键信息、决策、结论和产出物路径。\n摘要应该让后续对话能够无缝继续，不丢失重要上下文。\n使用中文输出。不要添加任何前缀或标题，直接输出摘要内容。\n\n对话历史：\n";

const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(60);
const MESSAGE_TRUNCATE_CHARS: usize = 2000;

/// Compresses message history when token usage approaches the window limit.
///
/// Never errors outward: any failure returns the original list with
/// `did_compress = false`.
pub trait Compressor: Send + Sync {
    fn compress_if_needed<'a>(
        &'a self,
        msgs: &'a [Message],
        current_tokens: usize,
    ) -> BoxFuture<'a, (Vec<Message>, bool)>;
}

/// LLM-backed [`Compressor`].
pub struct LlmCompressor {
    provider: Arc<BoxLlmProvider>,
    context_window: usize,
    threshold: f64,
    keep_recent_turns: usize,
}

impl LlmCompressor {
    /// Threshold inputs outside `(0, 1)` are coerced to 0.7;
    /// `keep_recent_turns == 0` is coerced to 3.
    pub fn new(
        provider: Arc<BoxLlmProvider>,
        context_window: usize,
        threshold: f64,
        keep_recent_turns: usize,
    ) -> Self {
        let threshold = if threshold <= 0.0 || threshold >= 1.0 {
            0.7
        } else {
            threshold
        };
        let keep_recent_turns = if keep_recent_turns == 0 {
            3
        } else {
            keep_recent_turns
        };
        Self {
            provider,
            context_window,
            threshold,
            keep_recent_turns,
        }
    }

    /// Performs the actual compression. Returns `None` when there are not
    /// enough conversation messages to compress.
    async fn compress(&self, msgs: &[Message]) -> Result<Option<Vec<Message>>, LlmError> {
        if msgs.len() <= 1 {
            return Ok(None);
        }

        let (system_msgs, conversation): (Vec<&Message>, Vec<&Message>) =
            msgs.iter().partition(|m| m.role == MessageRole::System);

        let keep_count = self.keep_recent_turns * 2;
        if keep_count >= conversation.len() {
            return Ok(None);
        }

        let split = conversation.len() - keep_count;
        let to_compress = &conversation[..split];
        let to_keep = &conversation[split..];

        let mut conv_text = String::new();
        for msg in to_compress {
            conv_text.push_str(&format!(
                "[{}]: {}\n",
                msg.role,
                truncate_chars(&msg.content, MESSAGE_TRUNCATE_CHARS)
            ));
        }

        let summary = self.call_summarize(&conv_text).await?;

        let mut result: Vec<Message> = system_msgs
            .iter()
            .filter(|m| !is_summary_message(&m.content))
            .map(|m| (*m).clone())
            .collect();
        result.push(format_summary_message(&summary));
        result.extend(to_keep.iter().map(|m| (*m).clone()));

        tracing::info!(
            system = system_msgs.len(),
            compressed = to_compress.len(),
            kept = to_keep.len(),
            "context compressed"
        );

        Ok(Some(result))
    }

    /// Invokes the LLM to summarise the conversation, draining the response
    /// stream under the 60-second deadline. Early closure is success with
    /// whatever has been received.
    async fn call_summarize(&self, conversation_text: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages: vec![Message::user(format!("{SUMMARIZE_PROMPT}{conversation_text}"))],
            system: None,
            generation: GenerationConfig::default(),
        };

        let drain = async {
            let mut stream = self.provider.stream(request);
            let mut result = String::new();
            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::TextDelta { text } => result.push_str(&text),
                    StreamEvent::Done { .. } => break,
                    _ => {}
                }
            }
            Ok::<String, LlmError>(result)
        };

        let result = tokio::time::timeout(SUMMARIZE_TIMEOUT, drain)
            .await
            .map_err(|_| LlmError::Timeout)??;

        let summary = result.trim().to_string();
        if summary.is_empty() {
            return Err(LlmError::Stream("summarize returned empty result".to_string()));
        }
        Ok(summary)
    }
}

impl Compressor for LlmCompressor {
    fn compress_if_needed<'a>(
        &'a self,
        msgs: &'a [Message],
        current_tokens: usize,
    ) -> BoxFuture<'a, (Vec<Message>, bool)> {
        Box::pin(async move {
            if self.context_window == 0 || current_tokens == 0 {
                return (msgs.to_vec(), false);
            }

            let ratio = current_tokens as f64 / self.context_window as f64;
            if ratio < self.threshold {
                return (msgs.to_vec(), false);
            }

            tracing::info!(
                ratio = %format_args!("{:.1}%", ratio * 100.0),
                threshold = %format_args!("{:.0}%", self.threshold * 100.0),
                "context compression triggered"
            );

            match self.compress(msgs).await {
                Ok(Some(compressed)) => (compressed, true),
                Ok(None) => (msgs.to_vec(), false),
                Err(err) => {
                    tracing::warn!(error = %err, "compression failed, using original messages");
                    (msgs.to_vec(), false)
                }
            }
        })
    }
}

fn truncate_chars(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{truncated}...(截断)")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{EventStream, LlmProvider};
    use stagehand_types::llm::{CompletionResponse, StopReason, Usage};

    /// Provider that streams a fixed summary text.
    struct ScriptedProvider {
        summary: String,
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.summary.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }

        fn stream(&self, _request: CompletionRequest) -> EventStream {
            let events = vec![
                Ok(StreamEvent::TextDelta {
                    text: self.summary.clone(),
                }),
                Ok(StreamEvent::Done {
                    stop_reason: StopReason::EndTurn,
                }),
            ];
            Box::pin(futures_util::stream::iter(events))
        }
    }

    /// Provider whose stream fails immediately.
    struct FailingProvider;

    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Provider("down".to_string()))
        }

        fn stream(&self, _request: CompletionRequest) -> EventStream {
            Box::pin(futures_util::stream::iter(vec![Err(LlmError::Provider(
                "down".to_string(),
            ))]))
        }
    }

    fn scripted(summary: &str) -> Arc<BoxLlmProvider> {
        Arc::new(BoxLlmProvider::new(ScriptedProvider {
            summary: summary.to_string(),
        }))
    }

    fn conversation(n: usize) -> Vec<Message> {
        let mut msgs = vec![Message::system("<system_core_prompt>core</system_core_prompt>")];
        for i in 0..n {
            if i % 2 == 0 {
                msgs.push(Message::user(format!("question {i}")));
            } else {
                msgs.push(Message::assistant(format!("answer {i}")));
            }
        }
        msgs
    }

    // -----------------------------------------------------------------------
    // Trigger policy
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_below_threshold_no_compress() {
        let compressor = LlmCompressor::new(scripted("摘要"), 10_000, 0.7, 1);
        let msgs = conversation(8);
        let (out, did) = compressor.compress_if_needed(&msgs, 1_000).await;
        assert!(!did);
        assert_eq!(out.len(), msgs.len());
    }

    #[tokio::test]
    async fn test_zero_window_no_compress() {
        let compressor = LlmCompressor::new(scripted("摘要"), 0, 0.7, 1);
        let msgs = conversation(8);
        let (_, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(!did);
    }

    #[tokio::test]
    async fn test_zero_tokens_no_compress() {
        let compressor = LlmCompressor::new(scripted("摘要"), 10_000, 0.7, 1);
        let msgs = conversation(8);
        let (_, did) = compressor.compress_if_needed(&msgs, 0).await;
        assert!(!did);
    }

    // -----------------------------------------------------------------------
    // Compression shape
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_compression_keeps_recent_and_system() {
        let compressor = LlmCompressor::new(scripted("这是摘要"), 10_000, 0.7, 1);
        let msgs = conversation(8); // 1 system + 8 conversation
        let (out, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(did);
        // system + summary + last 2 conversation messages
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].role, MessageRole::System);
        assert!(is_summary_message(&out[1].content));
        assert_eq!(out[2].content, "question 6");
        assert_eq!(out[3].content, "answer 7");
    }

    #[tokio::test]
    async fn test_previous_summary_dropped() {
        let compressor = LlmCompressor::new(scripted("新摘要"), 10_000, 0.7, 1);
        let mut msgs = vec![
            Message::system("<system_core_prompt>core</system_core_prompt>"),
            format_summary_message("旧摘要"),
        ];
        for i in 0..6 {
            msgs.push(Message::user(format!("m{i}")));
        }
        let (out, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(did);
        let summaries: Vec<&Message> = out
            .iter()
            .filter(|m| is_summary_message(&m.content))
            .collect();
        assert_eq!(summaries.len(), 1, "old summary must not accumulate");
        assert!(summaries[0].content.contains("新摘要"));
    }

    #[tokio::test]
    async fn test_too_few_messages_returns_original() {
        let compressor = LlmCompressor::new(scripted("摘要"), 10_000, 0.7, 3);
        let msgs = conversation(4); // keep 6 >= 4 conversation messages
        let (out, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(!did);
        assert_eq!(out.len(), msgs.len());
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_llm_failure_returns_original() {
        let provider = Arc::new(BoxLlmProvider::new(FailingProvider));
        let compressor = LlmCompressor::new(provider, 10_000, 0.7, 1);
        let msgs = conversation(8);
        let (out, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(!did);
        assert_eq!(out.len(), msgs.len());
    }

    #[tokio::test]
    async fn test_empty_summary_returns_original() {
        let compressor = LlmCompressor::new(scripted("   "), 10_000, 0.7, 1);
        let msgs = conversation(8);
        let (_, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(!did);
    }

    // -----------------------------------------------------------------------
    // Parameter coercion
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_threshold_coerced_into_range() {
        // threshold 1.5 coerces to 0.7, so 8000/10000 triggers
        let compressor = LlmCompressor::new(scripted("摘要"), 10_000, 1.5, 1);
        let msgs = conversation(8);
        let (_, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(did);
    }

    #[tokio::test]
    async fn test_keep_recent_turns_coerced() {
        // keep 0 coerces to 3 -> keep 6 messages, compress the rest
        let compressor = LlmCompressor::new(scripted("摘要"), 10_000, 0.7, 0);
        let msgs = conversation(10);
        let (out, did) = compressor.compress_if_needed(&msgs, 8_000).await;
        assert!(did);
        // system + summary + 6 kept
        assert_eq!(out.len(), 8);
    }

    // -----------------------------------------------------------------------
    // Truncation
    // -----------------------------------------------------------------------

    #[test]
    fn test_truncate_chars_multibyte_safe() {
        let content = "设".repeat(2500);
        let out = truncate_chars(&content, 2000);
        assert!(out.ends_with("...(截断)"));
        assert_eq!(out.chars().count(), 2000 + "...(截断)".chars().count());
    }

    #[test]
    fn test_truncate_chars_short_unchanged() {
        assert_eq!(truncate_chars("short", 2000), "short");
    }
}
