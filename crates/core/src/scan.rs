//! Directory tree walking into point-in-time file records

use std::path::PathBuf;

use bytes::Bytes;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Metadata and contents for a single filesystem object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full path as walked (root-prefixed)
    pub path: PathBuf,
    /// Filesystem identity number; stable across renames on the same filesystem
    pub inode: u64,
    /// Whether this is a directory
    pub is_directory: bool,
    /// Full file contents; empty for directories
    pub contents: Bytes,
}

/// Scanner for directory trees
pub struct Scanner {
    root: PathBuf,
    /// Glob patterns invisible to the scan (and therefore never replicated)
    excludes: Vec<String>,
}

impl Scanner {
    /// Create a new scanner for the given root directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excludes: Vec::new(),
        }
    }

    /// Exclude a glob pattern from the scan
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Root directory this scanner walks
    #[must_use]
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Create a configured walk builder
    fn walk_builder(&self) -> Result<WalkBuilder> {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false) // Include hidden files
            .git_ignore(false) // A mirror replicates everything
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .follow_links(false);

        if !self.excludes.is_empty() {
            let mut overrides = OverrideBuilder::new(&self.root);
            for pattern in &self.excludes {
                // "!" inverts the override into an exclusion
                overrides.add(&format!("!{pattern}"))?;
            }
            builder.overrides(overrides.build()?);
        }

        Ok(builder)
    }

    /// Walk the tree and return one record per object strictly under the root.
    ///
    /// Per-entry failures (vanished files, permission errors, unavailable
    /// identity) are logged and skipped so mid-walk churn cannot abort a
    /// whole cycle; only an inaccessible root is an error.
    ///
    /// # Errors
    /// Returns an error if the root itself cannot be read.
    pub fn scan(&self) -> Result<Vec<FileRecord>> {
        let root_metadata = std::fs::metadata(&self.root)
            .map_err(|err| eyre!("source root {}: {err}", self.root.display()))?;
        if !root_metadata.is_dir() {
            return Err(eyre!(
                "source root {} is not a directory",
                self.root.display()
            ));
        }

        let mut records = Vec::new();

        for result in self.walk_builder()?.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable entry: {err}");
                    continue;
                }
            };

            // The root entry itself is not part of the snapshot
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path().to_path_buf();

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("skipping {}: {err}", path.display());
                    continue;
                }
            };

            let Some(inode) = file_identity(&metadata) else {
                warn!(
                    "skipping {}: no stable file identity on this platform",
                    path.display()
                );
                continue;
            };

            let is_directory = metadata.is_dir();
            let contents = if is_directory {
                Bytes::new()
            } else {
                match std::fs::read(&path) {
                    Ok(data) => Bytes::from(data),
                    Err(err) => {
                        warn!("skipping {}: {err}", path.display());
                        continue;
                    }
                }
            };

            records.push(FileRecord {
                path,
                inode,
                is_directory,
                contents,
            });
        }

        Ok(records)
    }
}

#[cfg(unix)]
fn file_identity(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt as _;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_identity(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_simple_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file1.txt"), "hello").unwrap();
        fs::write(dir.path().join("file2.txt"), "world").unwrap();

        let scanner = Scanner::new(dir.path());
        let records = scanner.scan().unwrap();

        assert_eq!(records.len(), 2);
        assert!(
            records
                .iter()
                .any(|r| r.path == dir.path().join("file1.txt"))
        );
        assert!(
            records
                .iter()
                .any(|r| r.path == dir.path().join("file2.txt"))
        );
    }

    #[test]
    fn test_scan_records_contents() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.bin"), b"payload").unwrap();

        let records = Scanner::new(dir.path()).scan().unwrap();
        let record = records
            .iter()
            .find(|r| r.path == dir.path().join("data.bin"))
            .unwrap();

        assert!(!record.is_directory);
        assert_eq!(record.contents.as_ref(), b"payload");
    }

    #[test]
    fn test_scan_includes_directories_with_empty_contents() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub/dir")).unwrap();
        fs::write(dir.path().join("sub/nested.txt"), "nested").unwrap();

        let records = Scanner::new(dir.path()).scan().unwrap();

        let sub = records
            .iter()
            .find(|r| r.path == dir.path().join("sub"))
            .unwrap();
        assert!(sub.is_directory);
        assert!(sub.contents.is_empty());

        assert_eq!(records.len(), 3); // sub, sub/dir, sub/nested.txt
    }

    #[test]
    fn test_scan_excludes_root_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("only.txt"), "x").unwrap();

        let records = Scanner::new(dir.path()).scan().unwrap();

        assert!(records.iter().all(|r| r.path != dir.path()));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");

        assert!(Scanner::new(&missing).scan().is_err());
    }

    #[test]
    fn test_scan_respects_excludes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.txt"), "keep").unwrap();
        fs::write(dir.path().join("skip.log"), "skip").unwrap();

        let records = Scanner::new(dir.path()).exclude("*.log").scan().unwrap();

        assert!(
            records
                .iter()
                .any(|r| r.path == dir.path().join("keep.txt"))
        );
        assert!(records.iter().all(|r| r.path != dir.path().join("skip.log")));
    }

    #[cfg(unix)]
    #[test]
    fn test_inode_stable_across_rename() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("before.txt"), "same").unwrap();

        let scanner = Scanner::new(dir.path());
        let before = scanner.scan().unwrap();
        let old_inode = before
            .iter()
            .find(|r| r.path == dir.path().join("before.txt"))
            .unwrap()
            .inode;

        fs::rename(dir.path().join("before.txt"), dir.path().join("after.txt")).unwrap();

        let after = scanner.scan().unwrap();
        let new_inode = after
            .iter()
            .find(|r| r.path == dir.path().join("after.txt"))
            .unwrap()
            .inode;

        assert_eq!(old_inode, new_inode);
    }
}
