//! Single-node agent-router flow builder.
//!
//! One LLM node receives a catalogue of every stage and decides which stage
//! tools to invoke. Suitable for exploratory, non-linear tasks.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use stagehand_types::llm::GenerationConfig;
use stagehand_types::step::StepDefinition;

use crate::graph::{self, CompiledGraph, NodeOptions, StateGraph, END};

use super::helpers::resolve_tool_sets;
use super::middleware::{Middleware, MiddlewareChain};
use super::{FlowBuilder, FlowError, FlowOptions};

const AGENT_NODE_ID: &str = "agent";

/// Builds a single-LLM agent that dynamically selects stages.
pub struct AgentBuilder;

impl AgentBuilder {
    pub fn new() -> Self {
        Self
    }

    /// A catalogue instruction describing every available stage, sorted by
    /// step id for deterministic output.
    fn build_combined_instruction(&self, steps: &[StepDefinition]) -> String {
        let mut sorted: Vec<&StepDefinition> = steps.iter().collect();
        sorted.sort_by(|a, b| a.frontmatter.step.cmp(&b.frontmatter.step));

        let mut out =
            String::from("你是一个工作流助手。以下是可用的阶段，请根据用户需求选择合适的阶段执行：\n\n");
        for step in sorted {
            let _ = writeln!(out, "## 阶段 {}: {}", step.frontmatter.step, step.frontmatter.title);
            if !step.frontmatter.description.is_empty() {
                out.push_str(&step.frontmatter.description);
                out.push('\n');
            }
            if !step.frontmatter.output.is_empty() {
                let _ = writeln!(out, "输出: {}", step.frontmatter.primary_output());
            }
            out.push('\n');
        }
        out
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowBuilder for AgentBuilder {
    fn build(
        &self,
        steps: &[StepDefinition],
        opts: &FlowOptions,
    ) -> Result<CompiledGraph, FlowError> {
        if steps.is_empty() {
            return Err(FlowError::NoSteps);
        }

        let mut sg = StateGraph::new();

        let instruction = self.build_combined_instruction(steps);

        let mut node_opts = NodeOptions::default()
            .with_name("agent-router")
            .with_description("Dynamic agent that selects workflow stages");

        if let Some(max_tokens) = opts.max_output_tokens {
            node_opts = node_opts.with_generation(GenerationConfig {
                stream: true,
                max_tokens: Some(max_tokens),
                temperature: None,
            });
        }

        // Union of every step's tool sets, sorted for determinism
        let combined: BTreeSet<&String> = steps
            .iter()
            .flat_map(|s| s.frontmatter.effective_tools().iter())
            .collect();
        let combined: Vec<String> = combined.into_iter().cloned().collect();
        let tool_sets = resolve_tool_sets(&combined, &opts.tool_sets, opts.allow_missing)?;

        // The agent has one node; the first step stands in for middleware wiring
        let chain = MiddlewareChain::new(opts.middlewares.clone());
        if let Some(pre) = chain.wrap_pre_node(AGENT_NODE_ID, &steps[0]) {
            node_opts = node_opts.with_pre_hook(pre);
        }

        sg.add_llm_node(
            AGENT_NODE_ID,
            opts.model.clone(),
            instruction,
            tool_sets.clone(),
            node_opts,
        );

        if !tool_sets.is_empty() {
            let tid = format!("{AGENT_NODE_ID}:tools");
            sg.add_tools_node(
                &tid,
                graph::node::tools_node(tool_sets),
                NodeOptions::default().with_name(&tid),
            );
            sg.add_tools_conditional_edges(AGENT_NODE_ID, &tid, END);
            sg.add_edge(&tid, AGENT_NODE_ID);
        } else {
            sg.add_edge(AGENT_NODE_ID, END);
        }

        sg.set_entry_point(AGENT_NODE_ID);

        Ok(sg.compile()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
