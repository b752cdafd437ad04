//! Artifact records for step outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion status of a recorded artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Completed,
    InProgress,
    #[default]
    Pending,
}

/// Metadata about a file produced by a step.
///
/// Created once per successful step completion; updates are last-write-wins
/// keyed by step id. Trackers hand out owned copies so callers cannot mutate
/// internal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Step that produced this artifact.
    pub step_id: String,
    /// Step title, denormalized for display.
    pub title: String,
    /// Relative path of the output file.
    pub file_path: String,
    /// Completion status.
    pub status: ArtifactStatus,
    /// LLM-generated summary, populated lazily.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// Number of lines in the output file.
    pub line_count: usize,
    /// File modification time at recording.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_status_serde() {
        let json = serde_json::to_string(&ArtifactStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let parsed: ArtifactStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, ArtifactStatus::InProgress);
    }

    #[test]
    fn test_artifact_info_json_roundtrip() {
        let info = ArtifactInfo {
            step_id: "1.1".to_string(),
            title: "设计大纲".to_string(),
            file_path: "docs/outline.md".to_string(),
            status: ArtifactStatus::Completed,
            summary: String::new(),
            line_count: 42,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&info).unwrap();
        let parsed: ArtifactInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.step_id, "1.1");
        assert_eq!(parsed.status, ArtifactStatus::Completed);
        assert_eq!(parsed.line_count, 42);
    }
}
