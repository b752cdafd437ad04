//! LLM provider seam.
//!
//! Transports are out of scope for this crate; the compressor, summarizer,
//! and flow builders only depend on the trait defined here.

pub mod box_provider;
pub mod provider;

pub use box_provider::BoxLlmProvider;
pub use provider::{EventStream, LlmProvider};
