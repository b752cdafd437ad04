//! Token counting and cumulative usage monitoring.

pub mod counter;
pub mod monitor;

pub use counter::{HeuristicCounter, TokenCounter};
pub use monitor::{Monitor, TokenObserver, MAX_USAGE_HISTORY};
