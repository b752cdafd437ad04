//! Artifact tracker: records produced output files across workflow steps.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stagehand_types::artifact::{ArtifactInfo, ArtifactStatus};

use crate::filesystem::FileSystem;

/// Tracks produced documents across workflow steps.
pub trait ArtifactTracker: Send + Sync {
    /// Checks whether the output file exists and records it. Returns true
    /// if the file was found and recorded.
    fn record_completed(&self, step_id: &str, title: &str, output_path: &str) -> bool;

    /// Returns a single artifact by step id.
    fn get_artifact(&self, step_id: &str) -> Option<ArtifactInfo>;

    /// Returns a snapshot of all recorded artifacts.
    fn get_all(&self) -> HashMap<String, ArtifactInfo>;
}

/// [`ArtifactTracker`] that verifies outputs through a [`FileSystem`].
pub struct FileTracker {
    fs: Arc<dyn FileSystem>,
    data: RwLock<HashMap<String, ArtifactInfo>>,
}

impl FileTracker {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Counts newline characters, with a +1 correction when the last byte is
    /// not a newline. Best-effort: unreadable files count as 0.
    fn count_lines(&self, path: &str) -> usize {
        let Ok(data) = self.fs.read_file(path) else {
            return 0;
        };
        let mut count = data.iter().filter(|&&b| b == b'\n').count();
        if let Some(&last) = data.last() {
            if last != b'\n' {
                count += 1;
            }
        }
        count
    }
}

impl ArtifactTracker for FileTracker {
    fn record_completed(&self, step_id: &str, title: &str, output_path: &str) -> bool {
        let Ok(stat) = self.fs.stat(output_path) else {
            return false;
        };
        if stat.is_dir {
            return false;
        }

        let line_count = self.count_lines(output_path);

        let mut data = self.data.write().expect("tracker lock poisoned");
        data.insert(
            step_id.to_string(),
            ArtifactInfo {
                step_id: step_id.to_string(),
                title: title.to_string(),
                file_path: output_path.to_string(),
                status: ArtifactStatus::Completed,
                summary: String::new(),
                line_count,
                created_at: stat.modified,
            },
        );
        tracing::info!(step = step_id, output = output_path, lines = line_count, "artifact recorded");
        true
    }

    fn get_artifact(&self, step_id: &str) -> Option<ArtifactInfo> {
        self.data
            .read()
            .expect("tracker lock poisoned")
            .get(step_id)
            .cloned()
    }

    fn get_all(&self) -> HashMap<String, ArtifactInfo> {
        self.data.read().expect("tracker lock poisoned").clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
