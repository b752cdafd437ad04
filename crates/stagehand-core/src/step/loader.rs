//! Step loaders: sources of ordered step definition sequences.

use std::collections::HashSet;
use std::sync::Arc;

use stagehand_types::step::StepDefinition;

use crate::filesystem::FileSystem;

use super::parser::load_step;
use super::StepError;

/// Loads step definitions from any source (filesystem, memory, ...).
pub trait StepLoader: Send + Sync {
    fn load(&self) -> Result<Vec<StepDefinition>, StepError>;
}

// ---------------------------------------------------------------------------
// DirectoryLoader
// ---------------------------------------------------------------------------

/// Loads `.md` step files from a directory tree, skipping `templates/` and
/// `system/` subdirectories and `_`-prefixed files. Results are sorted by
/// step id.
pub struct DirectoryLoader {
    fs: Arc<dyn FileSystem>,
    dir: String,
}

impl DirectoryLoader {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<String>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    fn walk(&self, dir: &str, steps: &mut Vec<StepDefinition>) -> Result<(), StepError> {
        let entries = self.fs.read_dir(dir).map_err(|source| StepError::Read {
            path: dir.to_string(),
            source,
        })?;

        for entry in entries {
            let full_path = format!("{}/{}", dir, entry.name);

            if entry.is_dir {
                if entry.name == "templates" || entry.name == "system" {
                    continue;
                }
                self.walk(&full_path, steps)?;
                continue;
            }

            if !entry.name.ends_with(".md") || entry.name.starts_with('_') {
                continue;
            }

            steps.push(load_step(self.fs.as_ref(), &full_path)?);
        }
        Ok(())
    }
}

impl StepLoader for DirectoryLoader {
    fn load(&self) -> Result<Vec<StepDefinition>, StepError> {
        let mut steps = Vec::new();
        self.walk(&self.dir, &mut steps)?;

        if steps.is_empty() {
            return Err(StepError::NoSteps(self.dir.clone()));
        }

        steps.sort_by(|a, b| a.frontmatter.step.cmp(&b.frontmatter.step));
        Ok(steps)
    }
}

// ---------------------------------------------------------------------------
// FilteredLoader
// ---------------------------------------------------------------------------

/// Wraps another loader and retains only steps whose id starts with a prefix.
pub struct FilteredLoader<L> {
    inner: L,
    prefix: String,
}

impl<L: StepLoader> FilteredLoader<L> {
    pub fn new(inner: L, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl<L: StepLoader> StepLoader for FilteredLoader<L> {
    fn load(&self) -> Result<Vec<StepDefinition>, StepError> {
        let filtered: Vec<StepDefinition> = self
            .inner
            .load()?
            .into_iter()
            .filter(|s| s.frontmatter.step.starts_with(&self.prefix))
            .collect();

        if filtered.is_empty() {
            return Err(StepError::NoMatches(self.prefix.clone()));
        }
        Ok(filtered)
    }
}

// ---------------------------------------------------------------------------
// CompositeLoader
// ---------------------------------------------------------------------------

/// Concatenates results from multiple loaders, rejecting duplicate step ids
/// across sources, then re-sorts by step id.
pub struct CompositeLoader {
    loaders: Vec<Box<dyn StepLoader>>,
}

impl CompositeLoader {
    pub fn new(loaders: Vec<Box<dyn StepLoader>>) -> Self {
        Self { loaders }
    }
}

impl StepLoader for CompositeLoader {
    fn load(&self) -> Result<Vec<StepDefinition>, StepError> {
        let mut seen = HashSet::new();
        let mut all = Vec::new();

        for loader in &self.loaders {
            for step in loader.load()? {
                if !seen.insert(step.frontmatter.step.clone()) {
                    return Err(StepError::DuplicateStep(step.frontmatter.step));
                }
                all.push(step);
            }
        }

        all.sort_by(|a, b| a.frontmatter.step.cmp(&b.frontmatter.step));
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// InMemoryLoader
// ---------------------------------------------------------------------------

/// Serves pre-built step definitions; useful for tests and embedding.
pub struct InMemoryLoader {
    steps: Vec<StepDefinition>,
}

impl InMemoryLoader {
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self { steps }
    }
}

impl StepLoader for InMemoryLoader {
    fn load(&self) -> Result<Vec<StepDefinition>, StepError> {
        if self.steps.is_empty() {
            return Err(StepError::EmptySeed);
        }
        Ok(self.steps.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
