//! State-machine flow builder with next/fallback conditional routing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stagehand_types::llm::GenerationConfig;
use stagehand_types::step::StepDefinition;

use crate::graph::{self, CompiledGraph, NodeOptions, StateGraph};
use crate::tool::ToolSet;

use super::helpers::{
    clear_error_code_hook, confirm_node_id, make_confirm_node, make_fallback_router, next_step_id,
    resolve_tool_sets, tools_node_id, wrap_tools_node, LABEL_SUCCESS,
};
use super::middleware::{Middleware, MiddlewareChain};
use super::{FlowBuilder, FlowError, FlowOptions};

/// Builds a state-machine graph: per step an LLM node, a confirm node, and
/// (when tool sets are configured) a tools node, wired by next/fallback
/// routing.
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Constructs the instruction and node options for a step's LLM node.
    fn build_llm_node_options(
        &self,
        step: &StepDefinition,
        step_id: &str,
        opts: &FlowOptions,
        chain: &MiddlewareChain,
    ) -> Result<(String, NodeOptions), FlowError> {
        let instruction = match &opts.assembler {
            Some(assembler) => assembler
                .build_static(step, &opts.base_vars)
                .map_err(|source| FlowError::Instruction {
                    step: step_id.to_string(),
                    source,
                })?,
            None => step.body.clone(),
        };

        let mut node_opts = NodeOptions::default();
        if !step.frontmatter.title.is_empty() {
            node_opts = node_opts
                .with_name(&step.frontmatter.title)
                .with_description(&step.frontmatter.title);
        }

        // Per-step cap from frontmatter, fallback to the flow-wide default
        if let Some(max_tokens) = step.frontmatter.max_output_tokens.or(opts.max_output_tokens) {
            node_opts = node_opts.with_generation(GenerationConfig {
                stream: true,
                max_tokens: Some(max_tokens),
                temperature: None,
            });
        }

        if let Some(pre) = chain.wrap_pre_node(step_id, step) {
            node_opts = node_opts.with_pre_hook(pre);
        }
        node_opts = node_opts.with_post_hook(clear_error_code_hook());

        Ok((instruction, node_opts))
    }

    fn add_confirm_node(
        &self,
        sg: &mut StateGraph,
        step: &StepDefinition,
        step_id: &str,
        chain: &MiddlewareChain,
    ) {
        let cid = confirm_node_id(step_id);
        let mut confirm_opts = NodeOptions::default().with_name(&cid);
        if let Some(post) = chain.wrap_post_node(step_id, step) {
            confirm_opts = confirm_opts.with_post_hook(post);
        }
        sg.add_node(cid, make_confirm_node(step_id, step.frontmatter.advance), confirm_opts);
    }

    fn add_edges(
        &self,
        sg: &mut StateGraph,
        step: &StepDefinition,
        step_id: &str,
        tool_sets: &[Arc<dyn ToolSet>],
    ) {
        let advance_target = confirm_node_id(step_id);
        sg.add_edge(&advance_target, next_step_id(&step.frontmatter.next));

        if !tool_sets.is_empty() {
            let tid = tools_node_id(step_id);
            sg.add_tools_conditional_edges(step_id, &tid, &advance_target);

            let mut targets = HashMap::from([(LABEL_SUCCESS.to_string(), step_id.to_string())]);
            for (code, target) in &step.frontmatter.fallback {
                if target.is_empty() {
                    continue;
                }
                targets.insert(code.clone(), target.clone());
            }
            let router = make_fallback_router(step.frontmatter.fallback.clone());
            sg.add_conditional_edges(tid, router, targets);
            return;
        }

        if !step.frontmatter.fallback.is_empty() {
            let mut targets =
                HashMap::from([(LABEL_SUCCESS.to_string(), advance_target.clone())]);
            for (code, target) in &step.frontmatter.fallback {
                if target.is_empty() {
                    continue;
                }
                targets.insert(code.clone(), target.clone());
            }
            let router = make_fallback_router(step.frontmatter.fallback.clone());
            sg.add_conditional_edges(step_id, router, targets);
        } else {
            sg.add_edge(step_id, advance_target);
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowBuilder for GraphBuilder {
    fn build(
        &self,
        steps: &[StepDefinition],
        opts: &FlowOptions,
    ) -> Result<CompiledGraph, FlowError> {
        if steps.is_empty() {
            return Err(FlowError::NoSteps);
        }

        let mut sg = StateGraph::new();
        let chain = MiddlewareChain::new(opts.middlewares.clone());

        let mut step_ids = HashSet::new();
        let mut step_tools: HashMap<String, Vec<Arc<dyn ToolSet>>> = HashMap::new();

        // Phase 1: create all nodes
        for step in steps {
            let step_id = step.frontmatter.step.trim().to_string();
            if step_id.is_empty() {
                return Err(FlowError::MissingStepId(step.path.clone()));
            }
            if !step_ids.insert(step_id.clone()) {
                return Err(FlowError::DuplicateStep(step_id));
            }

            let (instruction, node_opts) =
                self.build_llm_node_options(step, &step_id, opts, &chain)?;

            let tool_sets = resolve_tool_sets(
                step.frontmatter.effective_tools(),
                &opts.tool_sets,
                opts.allow_missing,
            )?;
            step_tools.insert(step_id.clone(), tool_sets.clone());

            sg.add_llm_node(
                &step_id,
                opts.model.clone(),
                instruction,
                tool_sets.clone(),
                node_opts,
            );

            self.add_confirm_node(&mut sg, step, &step_id, &chain);

            if !tool_sets.is_empty() {
                let tid = tools_node_id(&step_id);
                let node = wrap_tools_node(graph::node::tools_node(tool_sets));
                sg.add_tools_node(&tid, node, NodeOptions::default().with_name(&tid));
            }
        }

        // Phase 2: connect all edges
        for step in steps {
            let step_id = step.frontmatter.step.trim();
            self.add_edges(&mut sg, step, step_id, &step_tools[step_id]);
        }

        // Phase 3: entry and finish points
        let entry = steps
            .iter()
            .map(|s| s.frontmatter.step.trim())
            .find(|id| !id.is_empty())
            .unwrap_or_else(|| steps[0].frontmatter.step.trim());
        sg.set_entry_point(entry);

        let last = steps[steps.len() - 1].frontmatter.step.trim();
        sg.set_finish_point(confirm_node_id(last));

        Ok(sg.compile()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
