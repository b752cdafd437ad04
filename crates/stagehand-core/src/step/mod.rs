//! Step parsing, loading, and reference validation.
//!
//! - `parser` -- YAML-frontmatter + body extraction
//! - `loader` -- directory walker, prefix filter, composite merger, in-memory seed
//! - `validator` -- next/fallback reference integrity checks

pub mod loader;
pub mod parser;
pub mod validator;

use thiserror::Error;

/// Errors from step parsing and loading.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("frontmatter delimiter not found")]
    MissingDelimiter,

    #[error("frontmatter end delimiter not found")]
    MissingEndDelimiter,

    #[error("parse frontmatter: {0}")]
    Frontmatter(String),

    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no steps found in {0}")]
    NoSteps(String),

    #[error("no steps matching prefix '{0}'")]
    NoMatches(String),

    #[error("duplicate step ID '{0}'")]
    DuplicateStep(String),

    #[error("no steps configured")]
    EmptySeed,
}
