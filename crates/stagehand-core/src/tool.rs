//! Tool-set seam.
//!
//! A tool set is a named collection of callable tools obtained from an
//! external server (MCP or otherwise). Connections and subprocess handles
//! are owned elsewhere; flows hold tool sets by name through the options
//! map and tools nodes invoke them through this trait.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boxed error used across node and tool boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Declaration of a single callable tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input_schema: Value,
}

/// A named collection of callable tools.
pub trait ToolSet: Send + Sync {
    /// Tool-set name as referenced from step frontmatter.
    fn name(&self) -> &str;

    /// Declarations of every tool in this set.
    fn declarations(&self) -> Vec<ToolDeclaration>;

    /// Invoke a tool by name with JSON arguments.
    fn call(&self, name: &str, arguments: Value) -> BoxFuture<'static, Result<Value, BoxError>>;
}

/// Convenience: the tool names in a set.
pub fn tool_names(set: &dyn ToolSet) -> Vec<String> {
    set.declarations().into_iter().map(|d| d.name).collect()
}

impl std::fmt::Debug for dyn ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet").field("name", &self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// StaticToolSet
// ---------------------------------------------------------------------------

type ToolHandler = Arc<dyn Fn(Value) -> Result<Value, BoxError> + Send + Sync>;

/// An in-memory tool set backed by synchronous closures. Useful for tests
/// and for embedding local tools without a server.
pub struct StaticToolSet {
    name: String,
    declarations: Vec<ToolDeclaration>,
    handlers: HashMap<String, ToolHandler>,
}

impl StaticToolSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a tool with a handler. Returns `self` for chaining.
    pub fn with_tool<F>(mut self, decl: ToolDeclaration, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.handlers.insert(decl.name.clone(), Arc::new(handler));
        self.declarations.push(decl);
        self
    }
}

impl ToolSet for StaticToolSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn declarations(&self) -> Vec<ToolDeclaration> {
        self.declarations.clone()
    }

    fn call(&self, name: &str, arguments: Value) -> BoxFuture<'static, Result<Value, BoxError>> {
        let handler = self.handlers.get(name).cloned();
        let tool = name.to_string();
        let set = self.name.clone();
        Box::pin(async move {
            match handler {
                Some(h) => h(arguments),
                None => Err(format!("tool '{tool}' not found in set '{set}'").into()),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
