//! Per-run graph state, patches, and node outcomes.

use serde::Serialize;
use stagehand_types::error::ErrorCode;
use stagehand_types::llm::{Message, ToolCall};
use stagehand_types::step::AdvanceMode;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The engine's per-run state as seen by this crate: the messages slot, the
/// user-input slot, the `pipeline_error_code` slot, and the tool calls the
/// LLM requested in its last turn.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub messages: Vec<Message>,
    pub user_input: String,
    /// Last tool error classification; `None` when clear.
    pub error_code: Option<ErrorCode>,
    /// Tool calls requested by the LLM, consumed by the tools node.
    pub pending_tool_calls: Vec<ToolCall>,
}

impl State {
    /// Applies a patch in place. The messages slot accepts remove-all and
    /// append operations; a plain replacement list normalises to those.
    pub fn apply(&mut self, patch: &StatePatch) {
        if let Some(update) = &patch.messages {
            for op in update.clone().into_ops() {
                match op {
                    MessageOp::RemoveAll => self.messages.clear(),
                    MessageOp::Append(msgs) => self.messages.extend(msgs),
                }
            }
        }
        if let Some(input) = &patch.user_input {
            self.user_input = input.clone();
        }
        if let Some(code) = patch.error_code {
            self.error_code = code;
        }
        if let Some(calls) = &patch.pending_tool_calls {
            self.pending_tool_calls = calls.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Message operations
// ---------------------------------------------------------------------------

/// Operation on the messages slot.
#[derive(Debug, Clone)]
pub enum MessageOp {
    RemoveAll,
    Append(Vec<Message>),
}

/// Update form for the messages slot. The op list is authoritative at the
/// engine seam; `Replace` is a convenience that normalises to
/// `[RemoveAll, Append]`.
#[derive(Debug, Clone)]
pub enum MessagesUpdate {
    Replace(Vec<Message>),
    Ops(Vec<MessageOp>),
}

impl MessagesUpdate {
    pub fn into_ops(self) -> Vec<MessageOp> {
        match self {
            MessagesUpdate::Replace(msgs) => vec![MessageOp::RemoveAll, MessageOp::Append(msgs)],
            MessagesUpdate::Ops(ops) => ops,
        }
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Partial state update returned by nodes and hooks. `None` slots are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub messages: Option<MessagesUpdate>,
    pub user_input: Option<String>,
    /// `Some(None)` clears the error code; `Some(Some(code))` sets it.
    pub error_code: Option<Option<ErrorCode>>,
    pub pending_tool_calls: Option<Vec<ToolCall>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A patch that clears the `pipeline_error_code` slot.
    pub fn clear_error() -> Self {
        Self {
            error_code: Some(None),
            ..Default::default()
        }
    }

    /// A patch that writes an error classification.
    pub fn with_error(code: ErrorCode) -> Self {
        Self {
            error_code: Some(Some(code)),
            ..Default::default()
        }
    }

    /// A patch that replaces the messages slot.
    pub fn replace_messages(msgs: Vec<Message>) -> Self {
        Self {
            messages: Some(MessagesUpdate::Replace(msgs)),
            ..Default::default()
        }
    }

    /// A patch carrying explicit message operations.
    pub fn message_ops(ops: Vec<MessageOp>) -> Self {
        Self {
            messages: Some(MessagesUpdate::Ops(ops)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_none()
            && self.user_input.is_none()
            && self.error_code.is_none()
            && self.pending_tool_calls.is_none()
    }

    /// Merges `other` onto `self`; `other` wins per slot.
    pub fn merge(mut self, other: StatePatch) -> StatePatch {
        if other.messages.is_some() {
            self.messages = other.messages;
        }
        if other.user_input.is_some() {
            self.user_input = other.user_input;
        }
        if other.error_code.is_some() {
            self.error_code = other.error_code;
        }
        if other.pending_tool_calls.is_some() {
            self.pending_tool_calls = other.pending_tool_calls;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Node outcomes
// ---------------------------------------------------------------------------

/// Payload handed to the engine when a node suspends the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuspendPayload {
    pub message: String,
    pub stage: String,
    pub advance: AdvanceMode,
}

/// Result of invoking a function node.
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    /// Apply this patch and continue along the edges.
    Patch(StatePatch),
    /// Freeze execution and hand the payload back to the caller.
    Suspend(SuspendPayload),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
