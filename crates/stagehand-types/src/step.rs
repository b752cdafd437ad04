//! Declarative step model.
//!
//! A step is one unit of work in a multi-stage workflow: an instruction body
//! plus routing metadata parsed from YAML frontmatter. Steps are immutable
//! after load; flow builders consume them to produce executable graphs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Advance mode
// ---------------------------------------------------------------------------

/// Controls what happens after a step's LLM turn completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceMode {
    /// Proceed to the next step without pausing.
    #[default]
    Auto,
    /// Suspend and wait for a yes/no confirmation.
    Confirm,
    /// Suspend indefinitely until manually resumed.
    Block,
}

impl fmt::Display for AdvanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvanceMode::Auto => write!(f, "auto"),
            AdvanceMode::Confirm => write!(f, "confirm"),
            AdvanceMode::Block => write!(f, "block"),
        }
    }
}

impl FromStr for AdvanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "" => Ok(AdvanceMode::Auto),
            "confirm" => Ok(AdvanceMode::Confirm),
            "block" => Ok(AdvanceMode::Block),
            other => Err(format!("invalid advance mode: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Output field (scalar-or-list YAML form)
// ---------------------------------------------------------------------------

/// Ordered list of output file paths. Accepts a single string in YAML as
/// shorthand for a one-element list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OutputField(pub Vec<String>);

impl OutputField {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<Vec<String>> for OutputField {
    fn from(paths: Vec<String>) -> Self {
        OutputField(paths)
    }
}

impl<'de> Deserialize<'de> for OutputField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OutputVisitor;

        impl<'de> Visitor<'de> for OutputVisitor {
            type Value = OutputField;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or a list of strings")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(OutputField(vec![value.to_string()]))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut paths = Vec::new();
                while let Some(path) = seq.next_element::<String>()? {
                    paths.push(path);
                }
                Ok(OutputField(paths))
            }
        }

        deserializer.deserialize_any(OutputVisitor)
    }
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Step metadata parsed from the YAML frontmatter block of a prompt file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontmatter {
    /// Unique step identifier, a dotted numeric string (e.g. "1.2").
    #[serde(default)]
    pub step: String,
    /// Human-readable label.
    #[serde(default)]
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Target file paths this step must produce (string shorthand accepted).
    #[serde(default, skip_serializing_if = "OutputField::is_empty")]
    pub output: OutputField,
    /// Optional path to a template rendered into the step's instruction.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_template: String,
    /// File or directory paths summarised into the workflow snapshot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<String>,
    /// Tool-set names authorised for this step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Legacy alias for `tools`; used when `tools` is absent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp: Vec<String>,
    /// Successor step id; empty means terminal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next: String,
    /// Error code -> target step id. The key "default" matches any
    /// unclassified error.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fallback: BTreeMap<String, String>,
    /// Post-step advancement policy.
    #[serde(default)]
    pub advance: AdvanceMode,
    /// Optional per-step model override.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Optional per-step generation cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Frontmatter {
    /// Returns `tools` if set, otherwise falls back to `mcp`.
    pub fn effective_tools(&self) -> &[String] {
        if !self.tools.is_empty() {
            &self.tools
        } else {
            &self.mcp
        }
    }

    /// Returns the first output path, or empty string.
    pub fn primary_output(&self) -> &str {
        self.output.0.first().map(String::as_str).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Step definition
// ---------------------------------------------------------------------------

/// A step definition: parsed frontmatter plus the instruction body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Source identifier, used in error messages only.
    pub path: String,
    /// Parsed frontmatter.
    pub frontmatter: Frontmatter,
    /// Post-frontmatter content used as the step's instruction template.
    pub body: String,
}

impl StepDefinition {
    /// Shorthand for the step id.
    pub fn id(&self) -> &str {
        &self.frontmatter.step
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
