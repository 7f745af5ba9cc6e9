//! Change detection and lifecycle bookkeeping (spec.md §3 Lifecycle, §8 invariant 4).
//!
//! Compares the file descriptors from a fresh [`SourceDiscovery`](crate::discovery::SourceDiscovery)
//! walk against the hashes recorded in the store to classify each file as
//! added, modified, deleted, or unchanged, so the indexing pipeline only
//! reparses what changed.

use std::collections::{HashMap, HashSet};

use crate::discovery::FileDescriptor;

/// The result of comparing a new walk against previously recorded file hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.modified.is_empty() || !self.deleted.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Relative paths that need (re-)extraction: added and modified files.
    pub fn files_to_process(&self) -> Vec<String> {
        self.added.iter().chain(self.modified.iter()).cloned().collect()
    }
}

/// Compares a fresh discovery pass against the previously stored
/// `relative_path -> content_hash` map and classifies every file.
///
/// Unchanged files (same path, same hash) are omitted from the result
/// entirely; per spec.md's indexing-idempotence law, an unchanged tree
/// produces an empty change set.
pub fn detect_changes(
    previous_hashes: &HashMap<String, String>,
    current_files: &[FileDescriptor],
) -> ChangeSet {
    let mut changes = ChangeSet::default();
    let current_paths: HashSet<&str> = current_files.iter().map(|f| f.relative_path.as_str()).collect();

    for file in current_files {
        match previous_hashes.get(&file.relative_path) {
            None => changes.added.push(file.relative_path.clone()),
            Some(old_hash) if old_hash != &file.content_hash => {
                changes.modified.push(file.relative_path.clone())
            }
            Some(_) => {}
        }
    }

    for path in previous_hashes.keys() {
        if !current_paths.contains(path.as_str()) {
            changes.deleted.push(path.clone());
        }
    }

    changes.added.sort();
    changes.modified.sort();
    changes.deleted.sort();
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SupportedLanguage;
    use std::path::PathBuf;

    fn file(path: &str, hash: &str) -> FileDescriptor {
        FileDescriptor {
            path: PathBuf::from(path),
            relative_path: path.to_string(),
            language: SupportedLanguage::Python,
            byte_len: 10,
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn detects_added_file() {
        let previous = HashMap::new();
        let current = vec![file("a.py", "h1")];
        let changes = detect_changes(&previous, &current);
        assert_eq!(changes.added, vec!["a.py".to_string()]);
        assert!(changes.modified.is_empty());
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn detects_modified_file_by_hash_change() {
        let mut previous = HashMap::new();
        previous.insert("a.py".to_string(), "h1".to_string());
        let current = vec![file("a.py", "h2")];
        let changes = detect_changes(&previous, &current);
        assert_eq!(changes.modified, vec!["a.py".to_string()]);
    }

    #[test]
    fn detects_deleted_file() {
        let mut previous = HashMap::new();
        previous.insert("a.py".to_string(), "h1".to_string());
        let current = vec![];
        let changes = detect_changes(&previous, &current);
        assert_eq!(changes.deleted, vec!["a.py".to_string()]);
    }

    #[test]
    fn unchanged_tree_yields_empty_change_set() {
        let mut previous = HashMap::new();
        previous.insert("a.py".to_string(), "h1".to_string());
        let current = vec![file("a.py", "h1")];
        let changes = detect_changes(&previous, &current);
        assert!(!changes.has_changes());
    }

    #[test]
    fn other_files_untouched_by_single_file_change() {
        let mut previous = HashMap::new();
        previous.insert("a.py".to_string(), "h1".to_string());
        previous.insert("b.py".to_string(), "h2".to_string());
        let current = vec![file("a.py", "h1-changed"), file("b.py", "h2")];
        let changes = detect_changes(&previous, &current);
        assert_eq!(changes.modified, vec!["a.py".to_string()]);
        assert!(changes.added.is_empty());
        assert!(changes.deleted.is_empty());
    }
}
