//! Schema exports describing discovered tools.
//!
//! Three JSON side outputs: a raw declaration dump, an OpenAI
//! function-calling form, and a normalized config template listing the
//! discovered tool names per server.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::{ToolDeclaration, ToolSet};

use super::config::{McpConfig, McpDefaults, Transport};

/// Export failure.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Raw tool schema (A)
// ---------------------------------------------------------------------------

/// Top-level structure for the raw tool schema export.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolSchemaExport {
    pub exported_at: String,
    pub servers: BTreeMap<String, ServerToolsExport>,
}

/// One MCP server and its tool declarations.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerToolsExport {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
    pub tools: Vec<ToolDeclaration>,
}

/// Exports all discovered tool declarations to a JSON file.
pub fn export_tool_schema(
    config: &McpConfig,
    sets: &BTreeMap<String, Arc<dyn ToolSet>>,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let mut servers = BTreeMap::new();
    for (name, set) in sets {
        let server_cfg = config.mcp_servers.get(name);
        servers.insert(
            name.clone(),
            ServerToolsExport {
                url: server_cfg.map(|c| c.server_url.clone()).unwrap_or_default(),
                transport: server_cfg.map(|c| c.resolved_transport()),
                tools: set.declarations(),
            },
        );
    }

    let export = ToolSchemaExport {
        exported_at: Utc::now().to_rfc3339(),
        servers,
    };
    write_json(path, &export)
}

// ---------------------------------------------------------------------------
// OpenAI function-calling schema (C)
// ---------------------------------------------------------------------------

/// Top-level structure for the OpenAI function schema export.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiSchemaExport {
    pub exported_at: String,
    pub tools: Vec<OpenAiFunction>,
}

/// One tool in OpenAI function-calling format.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiFunction {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OpenAiFunctionDecl,
}

/// The function declaration inside [`OpenAiFunction`].
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiFunctionDecl {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub parameters: serde_json::Value,
}

/// Exports tool declarations in OpenAI function-calling format.
pub fn export_openai_schema(
    sets: &BTreeMap<String, Arc<dyn ToolSet>>,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let mut tools = Vec::new();
    for set in sets.values() {
        for decl in set.declarations() {
            tools.push(OpenAiFunction {
                kind: "function".to_string(),
                function: OpenAiFunctionDecl {
                    name: decl.name,
                    description: decl.description,
                    parameters: decl.input_schema,
                },
            });
        }
    }

    let export = OpenAiSchemaExport {
        exported_at: Utc::now().to_rfc3339(),
        tools,
    };
    write_json(path, &export)
}

// ---------------------------------------------------------------------------
// Config template (B)
// ---------------------------------------------------------------------------

/// Structure for the normalized `mcp.json` template export.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigTemplateExport {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, ConfigTemplateServer>,
    pub defaults: McpDefaults,
}

/// A single server entry in the config template.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigTemplateServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
    #[serde(rename = "serverUrl", default, skip_serializing_if = "String::is_empty")]
    pub server_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Discovered tool names, ready to prune into a filter list.
    pub tools: Vec<String>,
}

/// Generates an `mcp.json` template with the discovered tool names filled
/// into each server's filter list. Disabled servers are skipped; every
/// emitted entry starts active.
pub fn generate_config_template(
    config: &McpConfig,
    sets: &BTreeMap<String, Arc<dyn ToolSet>>,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let mut servers = BTreeMap::new();
    for (name, server_cfg) in config.active_servers() {
        let tools = sets
            .get(name)
            .map(|s| s.declarations().into_iter().map(|d| d.name).collect())
            .unwrap_or_default();
        servers.insert(
            name.clone(),
            ConfigTemplateServer {
                transport: Some(server_cfg.resolved_transport()),
                server_url: server_cfg.server_url.clone(),
                command: server_cfg.command.clone(),
                args: server_cfg.args.clone(),
                disabled: false,
                timeout: server_cfg.timeout,
                tools,
            },
        );
    }

    let export = ConfigTemplateExport {
        mcp_servers: servers,
        defaults: config.defaults.clone(),
    };
    write_json(path, &export)
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), ExportError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
