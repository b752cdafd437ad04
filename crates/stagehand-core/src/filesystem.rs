//! Filesystem abstraction.
//!
//! File access goes through the [`FileSystem`] trait so implementations can
//! be swapped for testing without touching `std::fs` directly. `OsFs` reads
//! the real disk rooted at a base directory; `MemFs` serves an in-memory
//! tree.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Metadata for a single path.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub is_dir: bool,
    pub modified: DateTime<Utc>,
    pub len: u64,
}

/// One entry in a directory listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Uniform read access over a file tree.
pub trait FileSystem: Send + Sync {
    /// Read the full contents of a file.
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Return metadata for a path. Mirrors `std::fs::metadata` semantics.
    fn stat(&self, path: &str) -> io::Result<FileStat>;

    /// Return directory entries, sorted by name.
    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;
}

// ---------------------------------------------------------------------------
// Safe path resolution
// ---------------------------------------------------------------------------

/// Path resolution failure.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("path traversal denied: {0}")]
    TraversalDenied(String),
}

/// Resolves a relative path within `base_dir`, rejecting any path that would
/// escape it.
pub fn resolve_safe_path(base_dir: &Path, rel_path: &str) -> Result<PathBuf, PathError> {
    let mut resolved = base_dir.to_path_buf();
    for component in Path::new(rel_path).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(base_dir) {
                    return Err(PathError::TraversalDenied(rel_path.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::TraversalDenied(rel_path.to_string()));
            }
        }
    }
    if !resolved.starts_with(base_dir) {
        return Err(PathError::TraversalDenied(rel_path.to_string()));
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// OsFs
// ---------------------------------------------------------------------------

/// [`FileSystem`] over the real operating system, rooted at a base directory.
/// Absolute paths pass through unchanged.
pub struct OsFs {
    base_dir: PathBuf,
}

impl OsFs {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

impl FileSystem for OsFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn stat(&self, path: &str) -> io::Result<FileStat> {
        let meta = std::fs::metadata(self.resolve(path))?;
        let modified = meta.modified().map(DateTime::<Utc>::from)?;
        Ok(FileStat {
            is_dir: meta.is_dir(),
            modified,
            len: meta.len(),
        })
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// MemFs
// ---------------------------------------------------------------------------

/// In-memory [`FileSystem`] for tests. Directories are implied by file paths
/// (forward-slash separated).
#[derive(Default)]
pub struct MemFs {
    files: BTreeMap<String, MemFile>,
}

struct MemFile {
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with the current time as its mtime. Returns `self` for
    /// chaining.
    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content, Utc::now());
        self
    }

    /// Add a file with an explicit mtime.
    pub fn with_file_at(
        mut self,
        path: &str,
        content: impl Into<Vec<u8>>,
        modified: DateTime<Utc>,
    ) -> Self {
        self.insert(path, content, modified);
        self
    }

    fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>, modified: DateTime<Utc>) {
        self.files.insert(
            normalize(path),
            MemFile {
                content: content.into(),
                modified,
            },
        );
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{}/", normalize(path));
        self.files.keys().any(|k| k.starts_with(&prefix))
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").trim_matches('/').to_string()
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such path: {path}"))
}

impl FileSystem for MemFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(&normalize(path))
            .map(|f| f.content.clone())
            .ok_or_else(|| not_found(path))
    }

    fn stat(&self, path: &str) -> io::Result<FileStat> {
        let key = normalize(path);
        if let Some(file) = self.files.get(&key) {
            return Ok(FileStat {
                is_dir: false,
                modified: file.modified,
                len: file.content.len() as u64,
            });
        }
        if self.is_dir(&key) {
            return Ok(FileStat {
                is_dir: true,
                modified: Utc::now(),
                len: 0,
            });
        }
        Err(not_found(path))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let key = normalize(path);
        let prefix = if key.is_empty() {
            String::new()
        } else if self.is_dir(&key) {
            format!("{key}/")
        } else {
            return Err(not_found(path));
        };

        let mut seen = BTreeMap::new();
        for file_path in self.files.keys() {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    seen.insert(dir.to_string(), true);
                }
                None => {
                    seen.insert(rest.to_string(), false);
                }
            }
        }

        Ok(seen
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // MemFs
    // -----------------------------------------------------------------------

    #[test]
    fn test_memfs_read_file() {
        let fs = MemFs::new().with_file("docs/a.md", "hello");
        assert_eq!(fs.read_file("docs/a.md").unwrap(), b"hello");
        assert!(fs.read_file("docs/missing.md").is_err());
    }

    #[test]
    fn test_memfs_stat_file_and_dir() {
        let fs = MemFs::new().with_file("docs/a.md", "hello");
        let file_stat = fs.stat("docs/a.md").unwrap();
        assert!(!file_stat.is_dir);
        assert_eq!(file_stat.len, 5);

        let dir_stat = fs.stat("docs").unwrap();
        assert!(dir_stat.is_dir);
    }

    #[test]
    fn test_memfs_read_dir_one_level() {
        let fs = MemFs::new()
            .with_file("docs/a.md", "a")
            .with_file("docs/b.md", "b")
            .with_file("docs/sub/c.md", "c");
        let entries = fs.read_dir("docs").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.md", "sub"]);
        assert!(entries[2].is_dir);
    }

    // -----------------------------------------------------------------------
    // OsFs
    // -----------------------------------------------------------------------

    #[test]
    fn test_osfs_resolves_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "content").unwrap();

        let fs = OsFs::new(dir.path());
        assert_eq!(fs.read_file("x.txt").unwrap(), b"content");
        let stat = fs.stat("x.txt").unwrap();
        assert!(!stat.is_dir);
        assert_eq!(stat.len, 7);
    }

    #[test]
    fn test_osfs_read_dir_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let fs = OsFs::new(dir.path());
        let entries = fs.read_dir(".").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
    }

    // -----------------------------------------------------------------------
    // resolve_safe_path
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolve_safe_path_accepts_inner() {
        let base = Path::new("/work/project");
        let p = resolve_safe_path(base, "docs/a.md").unwrap();
        assert_eq!(p, PathBuf::from("/work/project/docs/a.md"));
    }

    #[test]
    fn test_resolve_safe_path_rejects_escape() {
        let base = Path::new("/work/project");
        assert!(resolve_safe_path(base, "../secrets").is_err());
        assert!(resolve_safe_path(base, "docs/../../etc/passwd").is_err());
        assert!(resolve_safe_path(base, "/etc/passwd").is_err());
    }

    #[test]
    fn test_resolve_safe_path_allows_dot_segments_inside() {
        let base = Path::new("/work/project");
        let p = resolve_safe_path(base, "docs/./sub/../a.md").unwrap();
        assert_eq!(p, PathBuf::from("/work/project/docs/a.md"));
    }
}
