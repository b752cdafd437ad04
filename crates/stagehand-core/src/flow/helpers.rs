//! Shared flow-builder plumbing: tool-set resolution, routers, confirm and
//! tools nodes, hook adapters.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use stagehand_types::error::classify_tool_error;
use stagehand_types::step::AdvanceMode;

use crate::graph::{
    shared_error, NodeFn, NodeOutcome, PostNodeHook, RouterFn, State, StatePatch, SuspendPayload,
    END,
};
use crate::tool::ToolSet;

use super::FlowError;

/// Router label for the no-error path.
pub const LABEL_SUCCESS: &str = "success";
/// Fallback key matching any unclassified error.
pub const LABEL_DEFAULT: &str = "default";

pub fn confirm_node_id(step_id: &str) -> String {
    format!("{step_id}:confirm")
}

pub fn tools_node_id(step_id: &str) -> String {
    format!("{step_id}:tools")
}

pub fn next_step_id(next: &str) -> String {
    if next.is_empty() {
        END.to_string()
    } else {
        next.to_string()
    }
}

/// Looks up the named tool sets, skipping unknown names when `allow_missing`.
pub fn resolve_tool_sets(
    names: &[String],
    available: &HashMap<String, Arc<dyn ToolSet>>,
    allow_missing: bool,
) -> Result<Vec<Arc<dyn ToolSet>>, FlowError> {
    let mut result = Vec::new();
    for name in names {
        match available.get(name) {
            Some(set) => result.push(set.clone()),
            None if allow_missing => continue,
            None => return Err(FlowError::ToolSetNotFound(name.clone())),
        }
    }
    Ok(result)
}

/// Router keyed by the current error classification: the concrete code when
/// the fallback map names it, `default` when present, else `success`.
pub fn make_fallback_router(fallback: BTreeMap<String, String>) -> RouterFn {
    Arc::new(move |state: &State| {
        if let Some(code) = state.error_code {
            if fallback.contains_key(code.as_str()) {
                return code.as_str().to_string();
            }
            if fallback.contains_key(LABEL_DEFAULT) {
                return LABEL_DEFAULT.to_string();
            }
        }
        LABEL_SUCCESS.to_string()
    })
}

/// Maps a raised tool error to its classification in `pipeline_error_code`
/// while suppressing the error, so routing decides what happens. Explicitly
/// clears the code on success.
pub fn wrap_tools_node(base: NodeFn) -> NodeFn {
    Arc::new(move |state: State| {
        let base = base.clone();
        Box::pin(async move {
            match base(state).await {
                Err(err) => {
                    let code = classify_tool_error(&*err);
                    Ok(NodeOutcome::Patch(StatePatch::with_error(code)))
                }
                Ok(NodeOutcome::Patch(patch)) => {
                    Ok(NodeOutcome::Patch(patch.merge(StatePatch::clear_error())))
                }
                Ok(other) => Ok(other),
            }
        })
    })
}

/// Post hook installed on LLM nodes: propagates a node error, clears the
/// error code on success.
pub fn clear_error_code_hook() -> PostNodeHook {
    Arc::new(|_ctx, _state, result, node_err| {
        Box::pin(async move {
            if let Some(err) = node_err {
                return Err(shared_error(err));
            }
            let patch = match result {
                Some(patch) => patch.merge(StatePatch::clear_error()),
                None => StatePatch::clear_error(),
            };
            Ok(Some(patch))
        })
    })
}

/// Confirm node for a step. `auto` clears the error code and continues;
/// `confirm` and `block` suspend the run with a localized prompt.
pub fn make_confirm_node(step_id: &str, mode: AdvanceMode) -> NodeFn {
    let prompt = match mode {
        AdvanceMode::Block => format!("阶段 {step_id} 已完成，等待手动继续"),
        AdvanceMode::Confirm => format!("确认进入下一阶段? ({step_id})"),
        AdvanceMode::Auto => format!("阶段 {step_id} 已完成，等待用户输入"),
    };
    let step_id = step_id.to_string();

    Arc::new(move |_state: State| {
        let prompt = prompt.clone();
        let step_id = step_id.clone();
        Box::pin(async move {
            if mode == AdvanceMode::Auto {
                return Ok(NodeOutcome::Patch(StatePatch::clear_error()));
            }
            Ok(NodeOutcome::Suspend(SuspendPayload {
                message: prompt,
                stage: step_id,
                advance: mode,
            }))
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{BoxError, StaticToolSet};
    use stagehand_types::error::{ErrorCode, ToolError};

    fn fallback_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn state_with_error(code: ErrorCode) -> State {
        State {
            error_code: Some(code),
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Node ids
    // -----------------------------------------------------------------------

    #[test]
    fn test_node_id_helpers() {
        assert_eq!(confirm_node_id("1.1"), "1.1:confirm");
        assert_eq!(tools_node_id("1.1"), "1.1:tools");
        assert_eq!(next_step_id(""), END);
        assert_eq!(next_step_id("2.1"), "2.1");
    }

    // -----------------------------------------------------------------------
    // Tool-set resolution
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolve_tool_sets_missing_strict() {
        let available = HashMap::new();
        let err = resolve_tool_sets(&["eda".to_string()], &available, false).unwrap_err();
        assert!(matches!(err, FlowError::ToolSetNotFound(name) if name == "eda"));
    }

    #[test]
    fn test_resolve_tool_sets_missing_allowed() {
        let mut available: HashMap<String, Arc<dyn ToolSet>> = HashMap::new();
        available.insert("eda".to_string(), Arc::new(StaticToolSet::new("eda")));
        let sets = resolve_tool_sets(
            &["eda".to_string(), "ghost".to_string()],
            &available,
            true,
        )
        .unwrap();
        assert_eq!(sets.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Fallback router
    // -----------------------------------------------------------------------

    #[test]
    fn test_router_no_error_is_success() {
        let router = make_fallback_router(fallback_map(&[("default", "1.1")]));
        assert_eq!(router(&State::default()), "success");
    }

    #[test]
    fn test_router_concrete_code() {
        let router =
            make_fallback_router(fallback_map(&[("compile_error", "2.1"), ("default", "1.1")]));
        assert_eq!(router(&state_with_error(ErrorCode::CompileError)), "compile_error");
    }

    #[test]
    fn test_router_default_fallback() {
        let router = make_fallback_router(fallback_map(&[("default", "1.1")]));
        assert_eq!(router(&state_with_error(ErrorCode::Timeout)), "default");
    }

    #[test]
    fn test_router_unmapped_code_is_success() {
        let router = make_fallback_router(fallback_map(&[("lint_error", "1.1")]));
        assert_eq!(router(&state_with_error(ErrorCode::Timeout)), "success");
    }

    // -----------------------------------------------------------------------
    // Tools node wrapper
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_wrap_tools_node_classifies_and_suppresses() {
        let failing: NodeFn = Arc::new(|_state| {
            Box::pin(async {
                Err(Box::new(ToolError::message("syntax error near 'end'")) as BoxError)
            })
        });
        let wrapped = wrap_tools_node(failing);
        let outcome = wrapped(State::default()).await.unwrap();
        let NodeOutcome::Patch(patch) = outcome else {
            panic!("expected patch");
        };
        assert_eq!(patch.error_code, Some(Some(ErrorCode::CompileError)));
    }

    #[tokio::test]
    async fn test_wrap_tools_node_clears_on_success() {
        let ok: NodeFn =
            Arc::new(|_state| Box::pin(async { Ok(NodeOutcome::Patch(StatePatch::new())) }));
        let wrapped = wrap_tools_node(ok);
        let outcome = wrapped(State::default()).await.unwrap();
        let NodeOutcome::Patch(patch) = outcome else {
            panic!("expected patch");
        };
        assert_eq!(patch.error_code, Some(None));
    }

    // -----------------------------------------------------------------------
    // Confirm node
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_confirm_node_auto_clears_error() {
        let node = make_confirm_node("1.1", AdvanceMode::Auto);
        let outcome = node(State::default()).await.unwrap();
        let NodeOutcome::Patch(patch) = outcome else {
            panic!("expected patch");
        };
        assert_eq!(patch.error_code, Some(None));
    }

    #[tokio::test]
    async fn test_confirm_node_confirm_suspends() {
        let node = make_confirm_node("7.1", AdvanceMode::Confirm);
        let outcome = node(State::default()).await.unwrap();
        let NodeOutcome::Suspend(payload) = outcome else {
            panic!("expected suspension");
        };
        assert_eq!(payload.stage, "7.1");
        assert_eq!(payload.advance, AdvanceMode::Confirm);
        assert_eq!(payload.message, "确认进入下一阶段? (7.1)");
    }

    #[tokio::test]
    async fn test_confirm_node_block_suspends() {
        let node = make_confirm_node("5.2", AdvanceMode::Block);
        let outcome = node(State::default()).await.unwrap();
        let NodeOutcome::Suspend(payload) = outcome else {
            panic!("expected suspension");
        };
        assert_eq!(payload.message, "阶段 5.2 已完成，等待手动继续");
        assert_eq!(payload.advance, AdvanceMode::Block);
    }

    // -----------------------------------------------------------------------
    // Clear-error hook
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_clear_error_hook_on_success() {
        let hook = clear_error_code_hook();
        let ctx = crate::graph::NodeContext {
            node_id: "1.1".to_string(),
            step_id: "1.1".to_string(),
        };
        let patch = hook(ctx, State::default(), None, None).await.unwrap();
        assert_eq!(patch.unwrap().error_code, Some(None));
    }

    #[tokio::test]
    async fn test_clear_error_hook_propagates_node_error() {
        let hook = clear_error_code_hook();
        let ctx = crate::graph::NodeContext {
            node_id: "1.1".to_string(),
            step_id: "1.1".to_string(),
        };
        let err: crate::graph::NodeErrRef = Arc::new(ToolError::message("boom"));
        let result = hook(ctx, State::default(), None, Some(err)).await;
        assert!(result.is_err());
    }
}
