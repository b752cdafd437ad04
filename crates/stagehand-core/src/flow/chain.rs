//! Linear flow builder: step1 -> confirm1 -> step2 -> confirm2 -> ... -> END.

use std::collections::HashMap;

use stagehand_types::llm::GenerationConfig;
use stagehand_types::step::StepDefinition;

use crate::graph::{self, CompiledGraph, NodeOptions, StateGraph};

use super::helpers::{
    confirm_node_id, make_confirm_node, make_fallback_router, resolve_tool_sets, tools_node_id,
    wrap_tools_node, LABEL_SUCCESS,
};
use super::middleware::{Middleware, MiddlewareChain};
use super::{FlowBuilder, FlowError, FlowOptions};

/// Builds a linear chain. All `next` and `fallback` fields are ignored;
/// steps execute in the given (sorted) order, and tool errors retry the
/// same step in place.
pub struct ChainBuilder;

impl ChainBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowBuilder for ChainBuilder {
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

        // Phase 1: create all nodes
        for step in steps {
            let step_id = step.frontmatter.step.trim().to_string();
            if step_id.is_empty() {
                return Err(FlowError::MissingStepId(step.path.clone()));
            }

            let mut node_opts = NodeOptions::default();
            if !step.frontmatter.title.is_empty() {
                node_opts = node_opts
                    .with_name(&step.frontmatter.title)
                    .with_description(&step.frontmatter.title);
            }

            if let Some(max_tokens) =
                step.frontmatter.max_output_tokens.or(opts.max_output_tokens)
            {
                node_opts = node_opts.with_generation(GenerationConfig {
                    stream: true,
                    max_tokens: Some(max_tokens),
                    temperature: None,
                });
            }

            if let Some(pre) = chain.wrap_pre_node(&step_id, step) {
                node_opts = node_opts.with_pre_hook(pre);
            }

            let tool_sets = resolve_tool_sets(
                step.frontmatter.effective_tools(),
                &opts.tool_sets,
                opts.allow_missing,
            )?;

            sg.add_llm_node(
                &step_id,
                opts.model.clone(),
                step.body.clone(),
                tool_sets.clone(),
                node_opts,
            );

            // Confirm node
            let cid = confirm_node_id(&step_id);
            let mut confirm_opts = NodeOptions::default().with_name(&cid);
            if let Some(post) = chain.wrap_post_node(&step_id, step) {
                confirm_opts = confirm_opts.with_post_hook(post);
            }
            sg.add_node(
                &cid,
                make_confirm_node(&step_id, step.frontmatter.advance),
                confirm_opts,
            );

            // Tools node (if needed)
            if !tool_sets.is_empty() {
                let tid = tools_node_id(&step_id);
                let node = wrap_tools_node(graph::node::tools_node(tool_sets));
                sg.add_tools_node(&tid, node, NodeOptions::default().with_name(&tid));
            }
        }

        // Phase 2: linear edges, ignoring next/fallback
        for (i, step) in steps.iter().enumerate() {
            let step_id = step.frontmatter.step.trim();
            let cid = confirm_node_id(step_id);

            let tool_sets = resolve_tool_sets(
                step.frontmatter.effective_tools(),
                &opts.tool_sets,
                opts.allow_missing,
            )?;
            if !tool_sets.is_empty() {
                let tid = tools_node_id(step_id);
                sg.add_tools_conditional_edges(step_id, &tid, &cid);
                // Tool errors in a chain just retry the same step
                sg.add_conditional_edges(
                    tid,
                    make_fallback_router(Default::default()),
                    HashMap::from([(LABEL_SUCCESS.to_string(), step_id.to_string())]),
                );
            } else {
                sg.add_edge(step_id, &cid);
            }

            if i < steps.len() - 1 {
                sg.add_edge(&cid, steps[i + 1].frontmatter.step.trim());
            }
        }

        // Phase 3: entry and finish
        sg.set_entry_point(steps[0].frontmatter.step.trim());
        sg.set_finish_point(confirm_node_id(steps[steps.len() - 1].frontmatter.step.trim()));

        Ok(sg.compile()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::testutil::{null_model, step, step_with};
    use crate::graph::State;
    use crate::tool::StaticToolSet;
    use std::sync::Arc;
    use stagehand_types::step::AdvanceMode;

    #[test]
    fn test_chain_connects_consecutive_confirms() {
        let steps = vec![
            step("1.1", "a", "docs/a.md", "ignored", AdvanceMode::Auto),
            step("1.2", "b", "docs/b.md", "", AdvanceMode::Auto),
            step("2.1", "c", "docs/c.md", "", AdvanceMode::Auto),
        ];
        let opts = FlowOptions::new(null_model());
        let g = ChainBuilder::new().build(&steps, &opts).unwrap();

        assert_eq!(g.entry_point(), "1.1");
        assert_eq!(g.finish_point(), Some("2.1:confirm"));
        assert!(g.has_edge("1.1", "1.1:confirm"));
        assert!(g.has_edge("1.1:confirm", "1.2"));
        assert!(g.has_edge("1.2", "1.2:confirm"));
        assert!(g.has_edge("1.2:confirm", "2.1"));
        assert!(g.has_edge("2.1", "2.1:confirm"));
    }

    #[test]
    fn test_chain_ignores_next_and_fallback() {
        let steps = vec![
            step_with("1.1", "a", "docs/a.md", "9.9", AdvanceMode::Auto, |fm| {
                fm.fallback.insert("default".to_string(), "8.8".to_string());
            }),
            step("1.2", "b", "docs/b.md", "", AdvanceMode::Auto),
        ];
        let opts = FlowOptions::new(null_model());
        // Dangling next/fallback targets would fail a GraphBuilder compile;
        // the chain never wires them.
        let g = ChainBuilder::new().build(&steps, &opts).unwrap();
        assert!(g.has_edge("1.1:confirm", "1.2"));
    }

    #[test]
    fn test_chain_tools_errors_retry_in_place() {
        let steps = vec![step_with("3.1", "sim", "docs/s.md", "", AdvanceMode::Auto, |fm| {
            fm.tools = vec!["eda".to_string()];
        })];
        let mut opts = FlowOptions::new(null_model());
        opts.tool_sets
            .insert("eda".to_string(), Arc::new(StaticToolSet::new("eda")));

        let g = ChainBuilder::new().build(&steps, &opts).unwrap();
        // Any state routes back to the step: the router only knows "success"
        let mut state = State::default();
        assert_eq!(g.conditional_route("3.1:tools", &state).unwrap(), "3.1");
        state.error_code = Some(stagehand_types::error::ErrorCode::Timeout);
        assert_eq!(g.conditional_route("3.1:tools", &state).unwrap(), "3.1");
    }

    #[test]
    fn test_chain_empty_steps_fails() {
        let opts = FlowOptions::new(null_model());
        assert!(matches!(
            ChainBuilder::new().build(&[], &opts).unwrap_err(),
            FlowError::NoSteps
        ));
    }
}
