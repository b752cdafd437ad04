//! Flow builders: executable graphs from step definitions.
//!
//! Three topologies over the same step set:
//!
//! - [`GraphBuilder`] -- state machine with next/fallback conditional routing
//! - [`ChainBuilder`] -- linear chain ignoring routing fields
//! - [`AgentBuilder`] -- single LLM node that selects stages dynamically

pub mod agent;
pub mod chain;
pub mod graph;
pub mod helpers;
pub mod middleware;

#[cfg(test)]
pub(crate) mod testutil;

use std::collections::HashMap;
use std::sync::Arc;

use stagehand_types::step::StepDefinition;
use thiserror::Error;

use crate::graph::{CompiledGraph, GraphError};
use crate::llm::BoxLlmProvider;
use crate::prompt::{PromptAssembler, PromptError};
use crate::tool::ToolSet;

use middleware::Middleware;

pub use agent::AgentBuilder;
pub use chain::ChainBuilder;
pub use graph::GraphBuilder;

/// Flow construction failure.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("no steps to build flow")]
    NoSteps,

    #[error("step {0} missing step ID")]
    MissingStepId(String),

    #[error("duplicate step {0}")]
    DuplicateStep(String),

    #[error("toolset not found: {0}")]
    ToolSetNotFound(String),

    #[error("build instruction for {step}: {source}")]
    Instruction {
        step: String,
        #[source]
        source: PromptError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Configuration shared by every flow builder.
pub struct FlowOptions {
    /// Model driving every LLM node.
    pub model: Arc<BoxLlmProvider>,
    /// Tool sets available by name.
    pub tool_sets: HashMap<String, Arc<dyn ToolSet>>,
    /// Skip (rather than fail on) tool-set names with no registration.
    pub allow_missing: bool,
    /// Flow-wide generation cap; per-step `max_output_tokens` overrides it.
    pub max_output_tokens: Option<u32>,
    /// Middlewares wrapped around each LLM invocation.
    pub middlewares: Vec<Arc<dyn Middleware>>,
    /// Optional Layer 1+2 instruction builder.
    pub assembler: Option<Arc<dyn PromptAssembler>>,
    /// Template variables passed to the assembler.
    pub base_vars: HashMap<String, String>,
}

impl FlowOptions {
    pub fn new(model: Arc<BoxLlmProvider>) -> Self {
        Self {
            model,
            tool_sets: HashMap::new(),
            allow_missing: false,
            max_output_tokens: None,
            middlewares: Vec::new(),
            assembler: None,
            base_vars: HashMap::new(),
        }
    }
}

/// Constructs an executable graph from step definitions.
pub trait FlowBuilder {
    fn build(&self, steps: &[StepDefinition], opts: &FlowOptions)
        -> Result<CompiledGraph, FlowError>;
}
