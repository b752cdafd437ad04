//! Input file summarisation for the workflow snapshot.
//!
//! Summarisers never fail outward: unreadable paths yield a localised
//! sentinel, and LLM failures fall back to the first-lines rule.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use stagehand_types::llm::{CompletionRequest, GenerationConfig, Message, StreamEvent};

use crate::filesystem::FileSystem;
use crate::llm::BoxLlmProvider;

const READ_FAILED: &str = "(读取失败)";
const MAX_INPUT_CHARS: usize = 4000;
const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_LINES: usize = 5;

/// Generates a concise summary for an input file.
pub trait InputSummarizer: Send + Sync {
    fn summarize<'a>(&'a self, path: &'a str) -> BoxFuture<'a, String>;
}

// ---------------------------------------------------------------------------
// LLM-backed summarizer
// ---------------------------------------------------------------------------

/// [`InputSummarizer`] that asks an LLM for a 2-3 line summary. Results are
/// cached by path for the lifetime of the summarizer. Concurrent first
/// misses of the same path may duplicate work; the result is idempotent.
pub struct LlmSummarizer {
    provider: Option<Arc<BoxLlmProvider>>,
    fs: Arc<dyn FileSystem>,
    cache: DashMap<String, String>,
}

impl LlmSummarizer {
    pub fn new(provider: Option<Arc<BoxLlmProvider>>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            provider,
            fs,
            cache: DashMap::new(),
        }
    }

    async fn llm_summarize(&self, filename: &str, content: &str) -> String {
        let Some(provider) = &self.provider else {
            return fallback_summary(content);
        };

        let prompt = format!(
            "请用2-3行中文概括以下文件({filename})的核心内容，保留关键数据点和技术指标。只输出摘要，不要任何前缀。\n\n{content}"
        );

        let request = CompletionRequest {
            messages: vec![Message::user(prompt)],
            system: None,
            generation: GenerationConfig::default(),
        };

        let drain = async {
            let mut stream = provider.stream(request);
            let mut result = String::new();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(StreamEvent::TextDelta { text }) => result.push_str(&text),
                    Ok(StreamEvent::Done { .. }) => break,
                    Ok(_) => {}
                    Err(err) => return Err(err),
                }
            }
            Ok(result)
        };

        match tokio::time::timeout(SUMMARIZE_TIMEOUT, drain).await {
            Ok(Ok(result)) => {
                let trimmed = result.trim();
                if trimmed.is_empty() {
                    fallback_summary(content)
                } else {
                    trimmed.to_string()
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(file = filename, error = %err, "LLM summary failed");
                fallback_summary(content)
            }
            Err(_) => {
                tracing::warn!(file = filename, "LLM summary timed out");
                fallback_summary(content)
            }
        }
    }
}

impl InputSummarizer for LlmSummarizer {
    fn summarize<'a>(&'a self, path: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move {
            if let Some(cached) = self.cache.get(path) {
                return cached.value().clone();
            }

            let Ok(content) = self.fs.read_file(path) else {
                return READ_FAILED.to_string();
            };

            let mut text = String::from_utf8_lossy(&content).into_owned();
            if text.chars().count() > MAX_INPUT_CHARS {
                text = text.chars().take(MAX_INPUT_CHARS).collect();
                text.push_str("\n...(已截断)");
            }

            let summary = self.llm_summarize(path, &text).await;
            self.cache.insert(path.to_string(), summary.clone());
            summary
        })
    }
}

// ---------------------------------------------------------------------------
// Fallback summarizer
// ---------------------------------------------------------------------------

/// [`InputSummarizer`] without an LLM: the first 5 lines of the file.
pub struct FallbackSummarizer {
    fs: Arc<dyn FileSystem>,
}

impl FallbackSummarizer {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl InputSummarizer for FallbackSummarizer {
    fn summarize<'a>(&'a self, path: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move {
            match self.fs.read_file(path) {
                Ok(content) => fallback_summary(&String::from_utf8_lossy(&content)),
                Err(_) => READ_FAILED.to_string(),
            }
        })
    }
}

/// First few lines of the content.
fn fallback_summary(content: &str) -> String {
    content
        .lines()
        .take(FALLBACK_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
