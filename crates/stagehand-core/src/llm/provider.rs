//! LlmProvider trait definition.
//!
//! Uses native async fn in traits (RPITIT) for `complete`, and
//! `Pin<Box<dyn Stream>>` for `stream` (streams need to be object-safe for
//! the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use stagehand_types::llm::{CompletionRequest, CompletionResponse, LlmError, StreamEvent};

/// A streaming sequence of LLM response events. The caller must drain the
/// stream to terminate the call; early closure is treated as success with
/// whatever has been received.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for LLM backends.
///
/// Implementations live outside this crate; tests use scripted providers.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider/model name.
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    fn stream(&self, request: CompletionRequest) -> EventStream;
}
