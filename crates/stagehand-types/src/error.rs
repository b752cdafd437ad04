//! Tool error taxonomy and classifier.
//!
//! Tool failures inside a flow are never propagated; they are classified into
//! a stable [`ErrorCode`] that conditional edges route on. The classifier
//! prefers an explicit code attached via [`ToolError`], then timeouts found
//! in the source chain, then a substring scan of the message.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Standardized tool error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    CompileError,
    LintError,
    AssertionFail,
    Timeout,
    ToolUnavailable,
    InputMissing,
    RuntimeError,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CompileError => "compile_error",
            ErrorCode::LintError => "lint_error",
            ErrorCode::AssertionFail => "assertion_fail",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ToolUnavailable => "tool_unavailable",
            ErrorCode::InputMissing => "input_missing",
            ErrorCode::RuntimeError => "runtime_error",
            ErrorCode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compile_error" => Ok(ErrorCode::CompileError),
            "lint_error" => Ok(ErrorCode::LintError),
            "assertion_fail" => Ok(ErrorCode::AssertionFail),
            "timeout" => Ok(ErrorCode::Timeout),
            "tool_unavailable" => Ok(ErrorCode::ToolUnavailable),
            "input_missing" => Ok(ErrorCode::InputMissing),
            "runtime_error" => Ok(ErrorCode::RuntimeError),
            "unknown" => Ok(ErrorCode::Unknown),
            other => Err(format!("invalid error code: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// A tool failure carrying an optional explicit classification.
///
/// When the classifier finds a `ToolError` with a code anywhere in an error's
/// source chain, that code wins over message scanning.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ToolError {
    pub code: Option<ErrorCode>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ToolError {
    /// A classified tool error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            source: None,
        }
    }

    /// An unclassified tool error; classification falls back to message scan.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Maps an error to a standardized [`ErrorCode`].
///
/// Precedence: explicit `ToolError` code, then `tokio` timeout anywhere in
/// the source chain, then a case-insensitive substring scan, then
/// `RuntimeError`.
pub fn classify_tool_error(err: &(dyn StdError + 'static)) -> ErrorCode {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(tool_err) = e.downcast_ref::<ToolError>() {
            if let Some(code) = tool_err.code {
                return code;
            }
        }
        if e.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            return ErrorCode::Timeout;
        }
        current = e.source();
    }

    let msg = err.to_string().to_lowercase();
    if msg.contains("assert") {
        ErrorCode::AssertionFail
    } else if msg.contains("lint") {
        ErrorCode::LintError
    } else if msg.contains("compile") || msg.contains("syntax") {
        ErrorCode::CompileError
    } else if msg.contains("timeout") || msg.contains("timed out") {
        ErrorCode::Timeout
    } else if msg.contains("tool") && msg.contains("not found") {
        ErrorCode::ToolUnavailable
    } else if msg.contains("unavailable") || msg.contains("connection refused") {
        ErrorCode::ToolUnavailable
    } else if msg.contains("not found") || msg.contains("missing") {
        ErrorCode::InputMissing
    } else {
        ErrorCode::RuntimeError
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
