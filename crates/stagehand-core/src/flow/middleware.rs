//! Middleware: composable pre/post hooks around each LLM invocation.
//!
//! A middleware contributes an optional pre-node hook (before the LLM turn)
//! and an optional post-node hook (attached to the step's confirm node).
//! [`MiddlewareChain`] composes several middlewares into single hooks and
//! returns `None` when no member contributes, letting the graph engine skip
//! hook installation entirely.

use std::collections::HashMap;
use std::sync::Arc;

use stagehand_types::llm::{Message, MessageRole};
use stagehand_types::step::StepDefinition;

use crate::graph::{MessageOp, NodeContext, PostNodeHook, PreNodeHook, StatePatch};
use crate::memory::compressor::Compressor;
use crate::memory::tracker::ArtifactTracker;
use crate::prompt::PromptAssembler;
use crate::token::counter::TokenCounter;
use crate::token::monitor::TokenObserver;

/// Wraps LLM node callbacks for cross-cutting concerns.
pub trait Middleware: Send + Sync {
    /// Pre-node hook for the step's LLM node, or `None` to contribute nothing.
    fn wrap_pre_node(&self, step_id: &str, step: &StepDefinition) -> Option<PreNodeHook>;

    /// Post-node hook for the step's confirm node, or `None`.
    fn wrap_post_node(&self, step_id: &str, step: &StepDefinition) -> Option<PostNodeHook>;
}

// ---------------------------------------------------------------------------
// MiddlewareChain
// ---------------------------------------------------------------------------

/// Ordered composition of middlewares.
///
/// Pre hooks run in insertion order; their patches merge left-to-right with
/// last-write-wins per slot, and message updates are forwarded into the
/// state the next hook sees. Post hooks run in insertion order; a `Some`
/// return replaces the running result, and a hook error short-circuits the
/// rest.
pub struct MiddlewareChain {
    items: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(items: Vec<Arc<dyn Middleware>>) -> Self {
        Self { items }
    }
}

impl Middleware for MiddlewareChain {
    fn wrap_pre_node(&self, step_id: &str, step: &StepDefinition) -> Option<PreNodeHook> {
        let hooks: Vec<PreNodeHook> = self
            .items
            .iter()
            .filter_map(|m| m.wrap_pre_node(step_id, step))
            .collect();
        if hooks.is_empty() {
            return None;
        }

        Some(Arc::new(move |ctx: NodeContext, state| {
            let hooks = hooks.clone();
            Box::pin(async move {
                let mut working = state;
                let mut merged: Option<StatePatch> = None;

                for hook in &hooks {
                    let Some(patch) = hook(ctx.clone(), working.clone()).await? else {
                        continue;
                    };
                    if patch.messages.is_some() {
                        working.apply(&StatePatch {
                            messages: patch.messages.clone(),
                            ..Default::default()
                        });
                    }
                    merged = Some(match merged {
                        None => patch,
                        Some(acc) => acc.merge(patch),
                    });
                }

                Ok(merged)
            })
        }))
    }

    fn wrap_post_node(&self, step_id: &str, step: &StepDefinition) -> Option<PostNodeHook> {
        let hooks: Vec<PostNodeHook> = self
            .items
            .iter()
            .filter_map(|m| m.wrap_post_node(step_id, step))
            .collect();
        if hooks.is_empty() {
            return None;
        }

        Some(Arc::new(move |ctx: NodeContext, state, result, node_err| {
            let hooks = hooks.clone();
            Box::pin(async move {
                let mut running = result;
                for hook in &hooks {
                    let replaced =
                        hook(ctx.clone(), state.clone(), running.clone(), node_err.clone())
                            .await?;
                    if replaced.is_some() {
                        running = replaced;
                    }
                }
                Ok(running)
            })
        }))
    }
}

// ---------------------------------------------------------------------------
// CompressionMiddleware
// ---------------------------------------------------------------------------

/// Checks token usage before each LLM node and compresses the message
/// history when needed, notifying the observer with before/after counts.
pub struct CompressionMiddleware {
    compressor: Arc<dyn Compressor>,
    counter: Arc<dyn TokenCounter>,
    observer: Option<Arc<dyn TokenObserver>>,
}

impl CompressionMiddleware {
    pub fn new(
        compressor: Arc<dyn Compressor>,
        counter: Arc<dyn TokenCounter>,
        observer: Option<Arc<dyn TokenObserver>>,
    ) -> Self {
        Self {
            compressor,
            counter,
            observer,
        }
    }
}

impl Middleware for CompressionMiddleware {
    fn wrap_pre_node(&self, _step_id: &str, _step: &StepDefinition) -> Option<PreNodeHook> {
        let compressor = self.compressor.clone();
        let counter = self.counter.clone();
        let observer = self.observer.clone();

        Some(Arc::new(move |_ctx, state| {
            let compressor = compressor.clone();
            let counter = counter.clone();
            let observer = observer.clone();
            Box::pin(async move {
                if state.messages.len() <= 1 {
                    return Ok(None);
                }

                let estimated = counter.count(&state.messages);
                let (compressed, did_compress) =
                    compressor.compress_if_needed(&state.messages, estimated).await;
                if !did_compress {
                    return Ok(None);
                }

                if let Some(observer) = &observer {
                    let after = counter.count(&compressed);
                    observer.on_compression(estimated, after);
                }

                Ok(Some(StatePatch::message_ops(vec![
                    MessageOp::RemoveAll,
                    MessageOp::Append(compressed),
                ])))
            })
        }))
    }

    fn wrap_post_node(&self, _step_id: &str, _step: &StepDefinition) -> Option<PostNodeHook> {
        None
    }
}

// ---------------------------------------------------------------------------
// PromptInjectionMiddleware
// ---------------------------------------------------------------------------

/// Rebuilds the Layer 1+2 system message at runtime with dynamic context.
pub struct PromptInjectionMiddleware {
    assembler: Arc<dyn PromptAssembler>,
    base_vars: HashMap<String, String>,
}

impl PromptInjectionMiddleware {
    pub fn new(assembler: Arc<dyn PromptAssembler>, base_vars: HashMap<String, String>) -> Self {
        Self {
            assembler,
            base_vars,
        }
    }
}

impl Middleware for PromptInjectionMiddleware {
    fn wrap_pre_node(&self, _step_id: &str, step: &StepDefinition) -> Option<PreNodeHook> {
        if !self.assembler.has_dynamic_content() {
            return None;
        }

        let assembler = self.assembler.clone();
        let base_vars = self.base_vars.clone();
        let step = step.clone();

        Some(Arc::new(move |_ctx, state| {
            let assembler = assembler.clone();
            let base_vars = base_vars.clone();
            let step = step.clone();
            Box::pin(async move {
                if state.messages.is_empty() || state.messages[0].role != MessageRole::System {
                    return Ok(None);
                }

                // An LLM failure inside the hook never aborts the turn.
                let Ok(instruction) = assembler.build_dynamic(&step, &base_vars).await else {
                    return Ok(None);
                };

                let mut msgs = state.messages.clone();
                msgs[0] = Message::system(instruction);
                Ok(Some(StatePatch::replace_messages(msgs)))
            })
        }))
    }

    fn wrap_post_node(&self, _step_id: &str, _step: &StepDefinition) -> Option<PostNodeHook> {
        None
    }
}

// ---------------------------------------------------------------------------
// ArtifactRecordMiddleware
// ---------------------------------------------------------------------------

/// Records step output artifacts after the confirm node completes. One hook
/// per step iterates over all declared outputs.
pub struct ArtifactRecordMiddleware {
    tracker: Arc<dyn ArtifactTracker>,
}

impl ArtifactRecordMiddleware {
    pub fn new(tracker: Arc<dyn ArtifactTracker>) -> Self {
        Self { tracker }
    }
}

impl Middleware for ArtifactRecordMiddleware {
    fn wrap_pre_node(&self, _step_id: &str, _step: &StepDefinition) -> Option<PreNodeHook> {
        None
    }

    fn wrap_post_node(&self, step_id: &str, step: &StepDefinition) -> Option<PostNodeHook> {
        if step.frontmatter.output.is_empty() {
            return None;
        }

        let tracker = self.tracker.clone();
        let step_id = step_id.to_string();
        let title = step.frontmatter.title.clone();
        let outputs: Vec<String> = step.frontmatter.output.iter().cloned().collect();

        Some(Arc::new(move |_ctx, _state, _result, node_err| {
            let tracker = tracker.clone();
            let step_id = step_id.clone();
            let title = title.clone();
            let outputs = outputs.clone();
            Box::pin(async move {
                if let Some(err) = node_err {
                    return Err(crate::graph::shared_error(err));
                }
                for output in &outputs {
                    tracker.record_completed(&step_id, &title, output);
                }
                Ok(None)
            })
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemFs;
    use crate::graph::State;
    use crate::memory::tracker::FileTracker;
    use futures_util::future::BoxFuture;
    use stagehand_types::step::{Frontmatter, OutputField};

    fn ctx() -> NodeContext {
        NodeContext {
            node_id: "1.1".to_string(),
            step_id: "1.1".to_string(),
        }
    }

    fn step_with_outputs(outputs: &[&str]) -> StepDefinition {
        StepDefinition {
            path: "1.1.md".to_string(),
            frontmatter: Frontmatter {
                step: "1.1".to_string(),
                title: "标题".to_string(),
                output: OutputField(outputs.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            },
            body: String::new(),
        }
    }

    /// Middleware whose pre hook returns a fixed patch.
    struct FixedPatch(StatePatch);

    impl Middleware for FixedPatch {
        fn wrap_pre_node(&self, _: &str, _: &StepDefinition) -> Option<PreNodeHook> {
            let patch = self.0.clone();
            Some(Arc::new(move |_ctx, _state| {
                let patch = patch.clone();
                Box::pin(async move { Ok(Some(patch)) })
            }))
        }

        fn wrap_post_node(&self, _: &str, _: &StepDefinition) -> Option<PostNodeHook> {
            None
        }
    }

    /// Middleware that records the message count its pre hook observed.
    struct ObservesMessages {
        seen: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    impl Middleware for ObservesMessages {
        fn wrap_pre_node(&self, _: &str, _: &StepDefinition) -> Option<PreNodeHook> {
            let seen = self.seen.clone();
            Some(Arc::new(move |_ctx, state: State| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.lock().unwrap().push(state.messages.len());
                    Ok(None)
                })
            }))
        }

        fn wrap_post_node(&self, _: &str, _: &StepDefinition) -> Option<PostNodeHook> {
            None
        }
    }

    struct NoopMiddleware;

    impl Middleware for NoopMiddleware {
        fn wrap_pre_node(&self, _: &str, _: &StepDefinition) -> Option<PreNodeHook> {
            None
        }
        fn wrap_post_node(&self, _: &str, _: &StepDefinition) -> Option<PostNodeHook> {
            None
        }
    }

    // -----------------------------------------------------------------------
    // Chain semantics
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_chain_returns_no_hooks() {
        let chain = MiddlewareChain::new(vec![]);
        let step = step_with_outputs(&[]);
        assert!(chain.wrap_pre_node("1.1", &step).is_none());
        assert!(chain.wrap_post_node("1.1", &step).is_none());
    }

    #[test]
    fn test_all_noop_members_return_no_hooks() {
        let chain = MiddlewareChain::new(vec![Arc::new(NoopMiddleware), Arc::new(NoopMiddleware)]);
        let step = step_with_outputs(&[]);
        assert!(chain.wrap_pre_node("1.1", &step).is_none());
        assert!(chain.wrap_post_node("1.1", &step).is_none());
    }

    #[tokio::test]
    async fn test_pre_hooks_merge_last_write_wins() {
        let chain = MiddlewareChain::new(vec![
            Arc::new(FixedPatch(StatePatch::with_error(
                stagehand_types::error::ErrorCode::Timeout,
            ))),
            Arc::new(FixedPatch(StatePatch::clear_error())),
        ]);
        let step = step_with_outputs(&[]);
        let hook = chain.wrap_pre_node("1.1", &step).unwrap();
        let merged = hook(ctx(), State::default()).await.unwrap().unwrap();
        assert_eq!(merged.error_code, Some(None));
    }

    #[tokio::test]
    async fn test_pre_hooks_forward_message_updates() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new(vec![
            Arc::new(FixedPatch(StatePatch::replace_messages(vec![
                Message::system("s"),
                Message::user("u"),
                Message::assistant("a"),
            ]))),
            Arc::new(ObservesMessages { seen: seen.clone() }),
        ]);
        let step = step_with_outputs(&[]);
        let hook = chain.wrap_pre_node("1.1", &step).unwrap();
        hook(ctx(), State::default()).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![3], "second hook sees updated messages");
    }

    // -----------------------------------------------------------------------
    // ArtifactRecordMiddleware
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_artifact_record_all_outputs() {
        let fs = Arc::new(
            MemFs::new()
                .with_file("docs/a.md", "x\n")
                .with_file("docs/b.md", "y\n"),
        );
        let tracker = Arc::new(FileTracker::new(fs));
        let mw = ArtifactRecordMiddleware::new(tracker.clone());
        let step = step_with_outputs(&["docs/a.md", "docs/b.md"]);

        let hook = mw.wrap_post_node("1.1", &step).unwrap();
        hook(ctx(), State::default(), None, None).await.unwrap();

        // Last-write-wins per step id: the second output overwrites the first.
        let artifact = tracker.get_artifact("1.1").unwrap();
        assert_eq!(artifact.file_path, "docs/b.md");
    }

    #[test]
    fn test_artifact_record_no_outputs_no_hook() {
        let tracker = Arc::new(FileTracker::new(Arc::new(MemFs::new())));
        let mw = ArtifactRecordMiddleware::new(tracker);
        let step = step_with_outputs(&[]);
        assert!(mw.wrap_post_node("1.1", &step).is_none());
    }

    #[tokio::test]
    async fn test_artifact_record_propagates_node_error() {
        let tracker = Arc::new(FileTracker::new(Arc::new(MemFs::new())));
        let mw = ArtifactRecordMiddleware::new(tracker.clone());
        let step = step_with_outputs(&["docs/a.md"]);
        let hook = mw.wrap_post_node("1.1", &step).unwrap();

        let err: crate::graph::NodeErrRef =
            Arc::new(stagehand_types::error::ToolError::message("boom"));
        let result = hook(ctx(), State::default(), None, Some(err)).await;
        assert!(result.is_err());
        assert!(tracker.get_artifact("1.1").is_none());
    }

    // -----------------------------------------------------------------------
    // PromptInjectionMiddleware
    // -----------------------------------------------------------------------

    struct StaticAssembler {
        dynamic: bool,
    }

    impl PromptAssembler for StaticAssembler {
        fn build_static(
            &self,
            _step: &StepDefinition,
            _vars: &HashMap<String, String>,
        ) -> Result<String, crate::prompt::PromptError> {
            Ok("static".to_string())
        }

        fn build_dynamic<'a>(
            &'a self,
            step: &'a StepDefinition,
            _vars: &'a HashMap<String, String>,
        ) -> BoxFuture<'a, Result<String, crate::prompt::PromptError>> {
            Box::pin(async move { Ok(format!("dynamic for {}", step.frontmatter.step)) })
        }

        fn has_dynamic_content(&self) -> bool {
            self.dynamic
        }
    }

    #[test]
    fn test_prompt_injection_static_assembler_no_hook() {
        let mw = PromptInjectionMiddleware::new(
            Arc::new(StaticAssembler { dynamic: false }),
            HashMap::new(),
        );
        let step = step_with_outputs(&[]);
        assert!(mw.wrap_pre_node("1.1", &step).is_none());
    }

    #[tokio::test]
    async fn test_prompt_injection_rebuilds_first_system_message() {
        let mw = PromptInjectionMiddleware::new(
            Arc::new(StaticAssembler { dynamic: true }),
            HashMap::new(),
        );
        let step = step_with_outputs(&[]);
        let hook = mw.wrap_pre_node("1.1", &step).unwrap();

        let state = State {
            messages: vec![Message::system("old"), Message::user("q")],
            ..Default::default()
        };
        let patch = hook(ctx(), state).await.unwrap().unwrap();
        let Some(crate::graph::MessagesUpdate::Replace(msgs)) = patch.messages else {
            panic!("expected replacement");
        };
        assert_eq!(msgs[0].content, "dynamic for 1.1");
        assert_eq!(msgs[1].content, "q");
    }

    #[tokio::test]
    async fn test_prompt_injection_skips_without_leading_system() {
        let mw = PromptInjectionMiddleware::new(
            Arc::new(StaticAssembler { dynamic: true }),
            HashMap::new(),
        );
        let step = step_with_outputs(&[]);
        let hook = mw.wrap_pre_node("1.1", &step).unwrap();

        let state = State {
            messages: vec![Message::user("q")],
            ..Default::default()
        };
        assert!(hook(ctx(), state).await.unwrap().is_none());
    }
}
