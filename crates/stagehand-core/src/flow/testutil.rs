//! Shared fixtures for flow-builder tests.

use std::sync::Arc;

use stagehand_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, Usage,
};
use stagehand_types::step::{AdvanceMode, Frontmatter, OutputField, StepDefinition};

use crate::llm::{BoxLlmProvider, EventStream, LlmProvider};

/// Provider that returns an empty response; builders never invoke it.
struct NullProvider;

impl LlmProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: String::new(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }

    fn stream(&self, _request: CompletionRequest) -> EventStream {
        Box::pin(futures_util::stream::empty())
    }
}

pub fn null_model() -> Arc<BoxLlmProvider> {
    Arc::new(BoxLlmProvider::new(NullProvider))
}

pub fn step(
    id: &str,
    title: &str,
    output: &str,
    next: &str,
    advance: AdvanceMode,
) -> StepDefinition {
    StepDefinition {
        path: format!("{id}.md"),
        frontmatter: Frontmatter {
            step: id.to_string(),
            title: title.to_string(),
            output: OutputField(vec![output.to_string()]),
            next: next.to_string(),
            advance,
            ..Default::default()
        },
        body: format!("Step {id} body"),
    }
}

pub fn step_with(
    id: &str,
    title: &str,
    output: &str,
    next: &str,
    advance: AdvanceMode,
    customize: impl FnOnce(&mut Frontmatter),
) -> StepDefinition {
    let mut def = step(id, title, output, next, advance);
    customize(&mut def.frontmatter);
    def
}
