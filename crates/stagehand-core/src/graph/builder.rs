//! State graph construction and compilation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use thiserror::Error;

use crate::llm::BoxLlmProvider;
use crate::tool::{BoxError, ToolSet};

use super::node::{Node, NodeFn, NodeKind, NodeOptions};
use super::state::{NodeOutcome, State};

/// Sentinel edge target marking the end of the flow.
pub const END: &str = "__end__";

/// Routing predicate for conditional edges: returns the label looked up in
/// the edge's target map.
pub type RouterFn = Arc<dyn Fn(&State) -> String + Send + Sync>;

/// An edge between registered nodes.
#[derive(Clone)]
pub enum Edge {
    /// Unconditional transition.
    Direct { from: String, to: String },
    /// Router-labelled transition: the router's label is resolved through
    /// `targets`.
    Conditional {
        from: String,
        router: RouterFn,
        targets: HashMap<String, String>,
    },
    /// Engine-provided predicate: to `when_tool_calls` when the LLM
    /// requested tool calls, to `otherwise` when it did not.
    ToolsConditional {
        from: String,
        when_tool_calls: String,
        otherwise: String,
    },
}

impl Edge {
    fn from_id(&self) -> &str {
        match self {
            Edge::Direct { from, .. }
            | Edge::Conditional { from, .. }
            | Edge::ToolsConditional { from, .. } => from,
        }
    }

    fn target_ids(&self) -> Vec<&str> {
        match self {
            Edge::Direct { to, .. } => vec![to],
            Edge::Conditional { targets, .. } => targets.values().map(String::as_str).collect(),
            Edge::ToolsConditional {
                when_tool_calls,
                otherwise,
                ..
            } => vec![when_tool_calls, otherwise],
        }
    }
}

/// Graph construction failure.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),

    #[error("edge from unknown node '{0}'")]
    UnknownEdgeSource(String),

    #[error("edge from '{from}' to unknown node '{to}'")]
    UnknownEdgeTarget { from: String, to: String },

    #[error("entry point not set")]
    MissingEntryPoint,

    #[error("entry point '{0}' is not a registered node")]
    UnknownEntryPoint(String),

    #[error("finish point '{0}' is not a registered node")]
    UnknownFinishPoint(String),

    #[error("node '{0}' is not invokable (LLM nodes are executed by the engine)")]
    NotInvokable(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),
}

// ---------------------------------------------------------------------------
// StateGraph (builder)
// ---------------------------------------------------------------------------

/// Mutable graph under construction. `compile` validates the structure and
/// produces a [`CompiledGraph`].
#[derive(Default)]
pub struct StateGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    entry: Option<String>,
    finish: Option<String>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an LLM node.
    pub fn add_llm_node(
        &mut self,
        id: impl Into<String>,
        model: Arc<BoxLlmProvider>,
        instruction: impl Into<String>,
        tool_sets: Vec<Arc<dyn ToolSet>>,
        opts: NodeOptions,
    ) {
        let id = id.into();
        self.nodes.push(Node {
            id: id.clone(),
            name: if opts.name.is_empty() { id } else { opts.name },
            description: opts.description,
            kind: NodeKind::Llm {
                model,
                instruction: instruction.into(),
                generation: opts.generation,
                tool_sets,
            },
            pre_hook: opts.pre_hook,
            post_hook: opts.post_hook,
        });
    }

    /// Registers a function node.
    pub fn add_node(&mut self, id: impl Into<String>, func: NodeFn, opts: NodeOptions) {
        let id = id.into();
        self.nodes.push(Node {
            id: id.clone(),
            name: if opts.name.is_empty() { id } else { opts.name },
            description: opts.description,
            kind: NodeKind::Func(func),
            pre_hook: opts.pre_hook,
            post_hook: opts.post_hook,
        });
    }

    /// Registers a tool-executing node.
    pub fn add_tools_node(&mut self, id: impl Into<String>, func: NodeFn, opts: NodeOptions) {
        let id = id.into();
        self.nodes.push(Node {
            id: id.clone(),
            name: if opts.name.is_empty() { id } else { opts.name },
            description: opts.description,
            kind: NodeKind::Tools(func),
            pre_hook: opts.pre_hook,
            post_hook: opts.post_hook,
        });
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.push(Edge::Direct {
            from: from.into(),
            to: to.into(),
        });
    }

    pub fn add_conditional_edges(
        &mut self,
        from: impl Into<String>,
        router: RouterFn,
        targets: HashMap<String, String>,
    ) {
        self.edges.push(Edge::Conditional {
            from: from.into(),
            router,
            targets,
        });
    }

    /// The engine's tools predicate: route to `tools_target` when the LLM
    /// requested tool calls, else to `fallthrough`.
    pub fn add_tools_conditional_edges(
        &mut self,
        from: impl Into<String>,
        tools_target: impl Into<String>,
        fallthrough: impl Into<String>,
    ) {
        self.edges.push(Edge::ToolsConditional {
            from: from.into(),
            when_tool_calls: tools_target.into(),
            otherwise: fallthrough.into(),
        });
    }

    pub fn set_entry_point(&mut self, id: impl Into<String>) {
        self.entry = Some(id.into());
    }

    pub fn set_finish_point(&mut self, id: impl Into<String>) {
        self.finish = Some(id.into());
    }

    /// Validates structure (unique node ids, known edge endpoints, entry and
    /// finish registered) and produces the compiled graph. Nodes unreachable
    /// from the entry are logged, not rejected.
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let mut nodes: HashMap<String, Node> = HashMap::with_capacity(self.nodes.len());
        for node in self.nodes {
            if nodes.contains_key(&node.id) {
                return Err(GraphError::DuplicateNode(node.id));
            }
            nodes.insert(node.id.clone(), node);
        }

        for edge in &self.edges {
            let from = edge.from_id();
            if !nodes.contains_key(from) {
                return Err(GraphError::UnknownEdgeSource(from.to_string()));
            }
            for target in edge.target_ids() {
                if target != END && !nodes.contains_key(target) {
                    return Err(GraphError::UnknownEdgeTarget {
                        from: from.to_string(),
                        to: target.to_string(),
                    });
                }
            }
        }

        let entry = self.entry.ok_or(GraphError::MissingEntryPoint)?;
        if !nodes.contains_key(&entry) {
            return Err(GraphError::UnknownEntryPoint(entry));
        }
        if let Some(finish) = &self.finish {
            if !nodes.contains_key(finish) {
                return Err(GraphError::UnknownFinishPoint(finish.clone()));
            }
        }

        warn_unreachable(&nodes, &self.edges, &entry);

        Ok(CompiledGraph {
            nodes,
            edges: self.edges,
            entry,
            finish: self.finish,
        })
    }
}

/// Logs nodes that no edge path from the entry can reach.
fn warn_unreachable(nodes: &HashMap<String, Node>, edges: &[Edge], entry: &str) {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());
    for id in nodes.keys() {
        indices.insert(id.as_str(), graph.add_node(id.as_str()));
    }
    for edge in edges {
        let from = indices[edge.from_id()];
        for target in edge.target_ids() {
            if let Some(&to) = indices.get(target) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut reached = HashSet::new();
    let mut dfs = Dfs::new(&graph, indices[entry]);
    while let Some(idx) = dfs.next(&graph) {
        reached.insert(graph[idx]);
    }

    for id in nodes.keys() {
        if !reached.contains(id.as_str()) {
            tracing::warn!(node = %id, "node is unreachable from the entry point");
        }
    }
}

// ---------------------------------------------------------------------------
// CompiledGraph
// ---------------------------------------------------------------------------

/// Immutable, validated graph handed to the external engine.
pub struct CompiledGraph {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
    entry: String,
    finish: Option<String>,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges.len())
            .field("entry", &self.entry)
            .field("finish", &self.finish)
            .finish()
    }
}

impl CompiledGraph {
    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    pub fn finish_point(&self) -> Option<&str> {
        self.finish.as_deref()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Whether a direct edge `from -> to` exists.
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| {
            matches!(e, Edge::Direct { from: f, to: t } if f == from && t == to)
        })
    }

    /// The direct successor of a node, if one exists.
    pub fn direct_successor(&self, from: &str) -> Option<&str> {
        self.edges.iter().find_map(|e| match e {
            Edge::Direct { from: f, to } if f == from => Some(to.as_str()),
            _ => None,
        })
    }

    /// Resolves the conditional edge from `from` against the given state.
    pub fn conditional_route(&self, from: &str, state: &State) -> Option<String> {
        self.edges.iter().find_map(|e| match e {
            Edge::Conditional {
                from: f,
                router,
                targets,
            } if f == from => {
                let label = router(state);
                targets.get(&label).cloned()
            }
            _ => None,
        })
    }

    /// Resolves the tools-conditional edge from `from` against the state.
    pub fn tools_route(&self, from: &str, state: &State) -> Option<&str> {
        self.edges.iter().find_map(|e| match e {
            Edge::ToolsConditional {
                from: f,
                when_tool_calls,
                otherwise,
            } if f == from => {
                if state.pending_tool_calls.is_empty() {
                    Some(otherwise.as_str())
                } else {
                    Some(when_tool_calls.as_str())
                }
            }
            _ => None,
        })
    }

    /// Invokes a function or tools node. Hook orchestration and LLM turns
    /// belong to the engine.
    pub async fn invoke(&self, id: &str, state: State) -> Result<NodeOutcome, BoxError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        let func = node
            .func()
            .ok_or_else(|| GraphError::NotInvokable(id.to_string()))?;
        func(state).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
