//! `mcp.json` configuration model.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 2;

/// Configuration failure.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("read mcp config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse mcp config: {0}")]
    Parse(String),

    #[error("unsupported transport: {0}, supported: stdio, sse, streamable")]
    UnsupportedTransport(String),
}

/// Transport method for an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Sse,
    Streamable,
}

/// Root configuration structure matching `mcp.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    #[serde(default)]
    pub defaults: McpDefaults,
}

/// A single MCP server entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Explicit transport; defaulted from `serverUrl` presence when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,

    // stdio configuration
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    // streamable/sse configuration
    #[serde(rename = "serverUrl", default, skip_serializing_if = "String::is_empty")]
    pub server_url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    // common configuration
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Optional tool name filter; empty means all tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

impl McpServerConfig {
    /// Effective transport: explicit wins, then `serverUrl` implies
    /// streamable, else stdio.
    pub fn resolved_transport(&self) -> Transport {
        if let Some(t) = self.transport {
            return t;
        }
        if !self.server_url.is_empty() {
            Transport::Streamable
        } else {
            Transport::Stdio
        }
    }

    /// Per-server timeout, falling back to the defaults block.
    pub fn effective_timeout(&self, defaults: &McpDefaults) -> Duration {
        let secs = self.timeout.unwrap_or(0);
        if secs > 0 {
            return Duration::from_secs(secs);
        }
        if defaults.timeout > 0 {
            return Duration::from_secs(defaults.timeout);
        }
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }
}

/// Default settings applied to every server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpDefaults {
    /// Seconds.
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub retries: u32,
}

impl Default for McpDefaults {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
        }
    }
}

impl McpConfig {
    /// Servers eligible for connection and export: entries with the
    /// `disabled` flag set are skipped.
    pub fn active_servers(&self) -> impl Iterator<Item = (&String, &McpServerConfig)> {
        self.mcp_servers.iter().filter(|(_, cfg)| !cfg.disabled)
    }
}

/// Loads MCP configuration from a JSON file and interpolates `${env:NAME}`
/// placeholders from the process environment.
pub fn load_config(path: impl AsRef<Path>) -> Result<McpConfig, McpError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).map_err(|source| McpError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut config: McpConfig =
        serde_json::from_str(&data).map_err(|e| McpError::Parse(e.to_string()))?;
    interpolate_config(&mut config);
    Ok(config)
}

/// Replaces `${env:VAR}` placeholders across every server entry.
fn interpolate_config(config: &mut McpConfig) {
    for server in config.mcp_servers.values_mut() {
        server.command = interpolate_env(&server.command);
        for arg in &mut server.args {
            *arg = interpolate_env(arg);
        }
        server.server_url = interpolate_env(&server.server_url);
        for value in server.headers.values_mut() {
            *value = interpolate_env(value);
        }
        for value in server.env.values_mut() {
            *value = interpolate_env(value);
        }
    }
}

/// Replaces a whole-string `${env:VAR}` placeholder with the variable's
/// value; unset variables resolve to empty.
fn interpolate_env(value: &str) -> String {
    if let Some(name) = value
        .strip_prefix("${env:")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        return std::env::var(name).unwrap_or_default();
    }
    value.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
