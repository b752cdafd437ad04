//! Build-time contract of the external graph engine.
//!
//! The engine itself -- edge traversal, state threading, and the suspension
//! primitive's resume path -- lives outside this crate. What the flow
//! builders need from it is captured here: a per-run [`State`] with three
//! well-known slots (messages, user input, `pipeline_error_code`), state
//! patches with message operations, node registration with pre/post hooks,
//! direct and conditional edges, and a compiled graph whose structure can be
//! inspected and whose function nodes can be invoked.

pub mod builder;
pub mod node;
pub mod state;

pub use builder::{CompiledGraph, Edge, GraphError, RouterFn, StateGraph, END};
pub use node::{
    shared_error, Node, NodeContext, NodeErrRef, NodeFn, NodeKind, NodeOptions, PostNodeHook,
    PreNodeHook,
};
pub use state::{MessageOp, MessagesUpdate, NodeOutcome, State, StatePatch, SuspendPayload};
