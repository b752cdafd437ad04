//! Prompt assembly: the three-layer system message, the runtime workflow
//! snapshot, and input summarisation.

pub mod assembler;
pub mod markers;
pub mod snapshot;
pub mod summarizer;

pub use assembler::{Assembler, PromptAssembler, PromptError};
pub use snapshot::{ContextSnapshot, Snapshot};
pub use summarizer::{FallbackSummarizer, InputSummarizer, LlmSummarizer};
