//! Source Discovery
//!
//! Walks a project root, honors ignore files, filters to supported languages,
//! and emits [`FileDescriptor`]s with content hashes. The walk is lazy: callers
//! drive consumption via the returned iterator instead of collecting eagerly.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, warn};

use crate::hash::content_hash;
use crate::parser::SupportedLanguage;

/// Errors produced while discovering source files.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("project root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Directories skipped regardless of ignore-file contents.
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "build",
    "dist",
    "__pycache__",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
    ".claudemem",
];

/// A discovered source file, resolved to a supported language and hashed.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the project root, forward-slash normalized.
    pub relative_path: String,
    /// Detected language.
    pub language: SupportedLanguage,
    /// Size of the file content in bytes.
    pub byte_len: u64,
    /// Stable content hash (BLAKE3), used for change detection.
    pub content_hash: String,
}

/// Configuration for a discovery walk.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Additional directory names to exclude beyond the engine defaults.
    pub extra_exclude_dirs: Vec<String>,
    /// Whether to follow symlinks while walking.
    pub follow_links: bool,
    /// Name of the project-level ignore file, in addition to `.gitignore`.
    pub ignore_file_name: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extra_exclude_dirs: Vec::new(),
            follow_links: false,
            ignore_file_name: ".claudememignore".to_string(),
        }
    }
}

/// Walks a project root and discovers indexable source files.
pub struct SourceDiscovery {
    config: DiscoveryConfig,
}

impl Default for SourceDiscovery {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

impl SourceDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Discover all supported source files under `root`.
    ///
    /// Returns descriptors in a deterministic (path-sorted) order; the caller
    /// drives file reads one at a time rather than the walk holding them in memory.
    pub fn discover(&self, root: &Path) -> Result<Vec<FileDescriptor>> {
        let root = root
            .canonicalize()
            .map_err(|_| DiscoveryError::RootNotFound(root.to_path_buf()))?;

        let mut exclude_dirs: Vec<&str> = DEFAULT_EXCLUDE_DIRS.to_vec();
        let extra: Vec<&str> = self
            .config
            .extra_exclude_dirs
            .iter()
            .map(|s| s.as_str())
            .collect();
        exclude_dirs.extend(extra);

        let walker = WalkBuilder::new(&root)
            .follow_links(self.config.follow_links)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .add_custom_ignore_filename(&self.config.ignore_file_name)
            .filter_entry(move |entry| {
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    let name = entry.file_name().to_string_lossy();
                    return !exclude_dirs.contains(&name.as_ref());
                }
                true
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("error walking project tree: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let path = entry.path();
            let Some(language) = SupportedLanguage::from_path(path) else {
                continue;
            };

            match self.describe(&root, path, language) {
                Ok(descriptor) => files.push(descriptor),
                Err(e) => {
                    warn!("skipping unreadable file {:?}: {}", path, e);
                }
            }
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        debug!("discovered {} source file(s) under {:?}", files.len(), root);
        Ok(files)
    }

    fn describe(
        &self,
        root: &Path,
        path: &Path,
        language: SupportedLanguage,
    ) -> Result<FileDescriptor> {
        let content = fs::read(path).map_err(|source| DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        Ok(FileDescriptor {
            path: path.to_path_buf(),
            relative_path,
            language,
            byte_len: content.len() as u64,
            content_hash: content_hash(&content),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discovers_supported_languages_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.py"), "print(1)").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "hello").unwrap();

        let files = SourceDiscovery::default().discover(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].language, SupportedLanguage::Python);
    }

    #[test]
    fn skips_default_excluded_dirs() {
        let temp = TempDir::new().unwrap();
        let nm = temp.path().join("node_modules");
        std::fs::create_dir_all(&nm).unwrap();
        std::fs::write(nm.join("index.js"), "1").unwrap();
        std::fs::write(temp.path().join("app.js"), "1").unwrap();

        let files = SourceDiscovery::default().discover(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "app.js");
    }

    #[test]
    fn content_hash_changes_with_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.rs");
        std::fs::write(&path, "fn a() {}").unwrap();
        let first = SourceDiscovery::default().discover(temp.path()).unwrap();

        std::fs::write(&path, "fn a() { 1 }").unwrap();
        let second = SourceDiscovery::default().discover(temp.path()).unwrap();

        assert_ne!(first[0].content_hash, second[0].content_hash);
    }

    #[test]
    fn empty_project_discovers_nothing() {
        let temp = TempDir::new().unwrap();
        let files = SourceDiscovery::default().discover(temp.path()).unwrap();
        assert!(files.is_empty());
    }
}
