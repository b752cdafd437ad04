//! Node registration types: kinds, hooks, and the stock tools node.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use stagehand_types::error::{ErrorCode, ToolError};
use stagehand_types::llm::{GenerationConfig, Message};

use crate::llm::BoxLlmProvider;
use crate::tool::{BoxError, ToolSet};

use super::state::{MessageOp, NodeOutcome, State, StatePatch};

/// Async function node: consumes the current state, yields an outcome.
pub type NodeFn = Arc<dyn Fn(State) -> BoxFuture<'static, Result<NodeOutcome, BoxError>> + Send + Sync>;

/// Identifies the node a hook is firing for.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub node_id: String,
    pub step_id: String,
}

/// Shared node error handed to post hooks (the engine keeps ownership of the
/// original).
pub type NodeErrRef = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Pre-node hook: may return a state patch applied before the node runs.
pub type PreNodeHook = Arc<
    dyn Fn(NodeContext, State) -> BoxFuture<'static, Result<Option<StatePatch>, BoxError>>
        + Send
        + Sync,
>;

/// Post-node hook: receives the node's result patch (if any) and error (if
/// any); a `Some` return replaces the running result.
pub type PostNodeHook = Arc<
    dyn Fn(
            NodeContext,
            State,
            Option<StatePatch>,
            Option<NodeErrRef>,
        ) -> BoxFuture<'static, Result<Option<StatePatch>, BoxError>>
        + Send
        + Sync,
>;

/// Re-boxes a shared node error so a hook can propagate it.
pub fn shared_error(err: NodeErrRef) -> BoxError {
    #[derive(Debug)]
    struct Shared(NodeErrRef);

    impl fmt::Display for Shared {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.fmt(f)
        }
    }

    impl std::error::Error for Shared {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(self.0.as_ref())
        }
    }

    Box::new(Shared(err))
}

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// What a registered node is.
pub enum NodeKind {
    /// An LLM turn: the engine sends `instruction` as the system message and
    /// runs the model with the step's tool sets attached.
    Llm {
        model: Arc<BoxLlmProvider>,
        instruction: String,
        generation: GenerationConfig,
        tool_sets: Vec<Arc<dyn ToolSet>>,
    },
    /// A plain function node (confirm nodes).
    Func(NodeFn),
    /// A tool-executing node.
    Tools(NodeFn),
}

/// A registered graph node.
pub struct Node {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: NodeKind,
    pub pre_hook: Option<PreNodeHook>,
    pub post_hook: Option<PostNodeHook>,
}

impl Node {
    pub fn is_llm(&self) -> bool {
        matches!(self.kind, NodeKind::Llm { .. })
    }

    pub fn is_tools(&self) -> bool {
        matches!(self.kind, NodeKind::Tools(_))
    }

    /// The function backing this node, when it is not an LLM node.
    pub fn func(&self) -> Option<&NodeFn> {
        match &self.kind {
            NodeKind::Func(f) | NodeKind::Tools(f) => Some(f),
            NodeKind::Llm { .. } => None,
        }
    }

    /// The instruction of an LLM node.
    pub fn instruction(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Llm { instruction, .. } => Some(instruction),
            _ => None,
        }
    }

    /// The generation config of an LLM node.
    pub fn generation(&self) -> Option<&GenerationConfig> {
        match &self.kind {
            NodeKind::Llm { generation, .. } => Some(generation),
            _ => None,
        }
    }
}

/// Registration options for a node.
#[derive(Default, Clone)]
pub struct NodeOptions {
    pub name: String,
    pub description: String,
    pub generation: GenerationConfig,
    pub pre_hook: Option<PreNodeHook>,
    pub post_hook: Option<PostNodeHook>,
}

impl NodeOptions {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_pre_hook(mut self, hook: PreNodeHook) -> Self {
        self.pre_hook = Some(hook);
        self
    }

    pub fn with_post_hook(mut self, hook: PostNodeHook) -> Self {
        self.post_hook = Some(hook);
        self
    }
}

// ---------------------------------------------------------------------------
// Stock tools node
// ---------------------------------------------------------------------------

/// The engine's stock tools node: executes every pending tool call against
/// the given tool sets, appends one tool message per result, and clears the
/// pending calls. A failed call aborts with the tool's error so a wrapper
/// can classify it.
pub fn tools_node(tool_sets: Vec<Arc<dyn ToolSet>>) -> NodeFn {
    Arc::new(move |state: State| {
        let tool_sets = tool_sets.clone();
        Box::pin(async move {
            let mut results: Vec<Message> = Vec::new();
            for call in &state.pending_tool_calls {
                let set = tool_sets
                    .iter()
                    .find(|s| s.declarations().iter().any(|d| d.name == call.name));
                let Some(set) = set else {
                    return Err(Box::new(ToolError::new(
                        ErrorCode::ToolUnavailable,
                        format!("tool '{}' not found", call.name),
                    )) as BoxError);
                };
                let value = set.call(&call.name, call.arguments.clone()).await?;
                results.push(Message::tool(value.to_string()));
            }

            let mut patch = StatePatch::message_ops(vec![MessageOp::Append(results)]);
            patch.pending_tool_calls = Some(Vec::new());
            Ok(NodeOutcome::Patch(patch))
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
