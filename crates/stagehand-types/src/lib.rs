//! Shared domain types for stagehand.
//!
//! This crate defines the data shapes the rest of the workspace operates on:
//! the declarative step model parsed from prompt frontmatter, artifact and
//! token-usage records, the tool error taxonomy, and the LLM request/response
//! seam. It contains no IO -- behaviour lives in `stagehand-core`.

pub mod artifact;
pub mod error;
pub mod llm;
pub mod step;
pub mod token;
