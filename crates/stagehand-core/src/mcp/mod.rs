//! MCP (Model Context Protocol) server configuration and schema exports.
//!
//! This crate consumes the `mcp.json` shape; establishing connections and
//! owning transports is the job of an external component.

pub mod config;
pub mod export;

pub use config::{load_config, McpConfig, McpDefaults, McpError, McpServerConfig, Transport};
