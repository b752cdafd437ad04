//! Prompt file parsing: YAML frontmatter between `---` delimiters, body after.

use stagehand_types::step::{Frontmatter, StepDefinition};

use crate::filesystem::FileSystem;

use super::StepError;

/// Splits YAML frontmatter from the body content.
///
/// The content must begin with `---`; the frontmatter ends at the second
/// `---`. After decoding, `tools` inherits from `mcp` when empty. The body
/// keeps everything after the end delimiter with a single leading newline
/// (or CRLF) trimmed.
pub fn parse_step(content: &str) -> Result<(Frontmatter, String), StepError> {
    let Some(rest) = content.strip_prefix("---") else {
        return Err(StepError::MissingDelimiter);
    };

    let Some((frontmatter_text, body)) = rest.split_once("---") else {
        return Err(StepError::MissingEndDelimiter);
    };

    let mut frontmatter: Frontmatter = serde_yaml_ng::from_str(frontmatter_text)
        .map_err(|e| StepError::Frontmatter(e.to_string()))?;

    // Backward compat: mcp -> tools
    if frontmatter.tools.is_empty() && !frontmatter.mcp.is_empty() {
        frontmatter.tools = frontmatter.mcp.clone();
    }

    Ok((frontmatter, trim_leading_newline(body).to_string()))
}

/// Reads and parses a step definition through the filesystem abstraction.
pub fn load_step(fs: &dyn FileSystem, path: &str) -> Result<StepDefinition, StepError> {
    let content = fs.read_file(path).map_err(|source| StepError::Read {
        path: path.to_string(),
        source,
    })?;
    let content = String::from_utf8_lossy(&content);
    let (frontmatter, body) = parse_step(&content)?;

    Ok(StepDefinition {
        path: path.to_string(),
        frontmatter,
        body,
    })
}

fn trim_leading_newline(value: &str) -> &str {
    if let Some(stripped) = value.strip_prefix("\r\n") {
        stripped
    } else if let Some(stripped) = value.strip_prefix('\n') {
        stripped
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
