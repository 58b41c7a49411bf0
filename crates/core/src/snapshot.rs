//! Snapshot: A point-in-time view of a directory tree, diffed by inode

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scan::FileRecord;

/// A snapshot of a directory tree at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// All objects in the snapshot, keyed by full walked path
    pub files: HashMap<PathBuf, FileRecord>,
}

impl Snapshot {
    /// Create a snapshot from scanned records
    #[must_use]
    pub fn from_records(records: Vec<FileRecord>) -> Self {
        let files = records.into_iter().map(|r| (r.path.clone(), r)).collect();
        Self { files }
    }

    /// Create an empty snapshot
    #[must_use]
    pub fn empty() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    /// Get the number of objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Get a record by path
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Compare this snapshot against its successor and return the events
    /// needed to bring a mirror of `self` to the state of `current`.
    ///
    /// Identity is the inode, so a moved file shows up as a single rename
    /// instead of a delete/create pair. A rename swallows any simultaneous
    /// content change; the mirror is expected to catch up on the next
    /// modification. Creates, renames and modifications are always emitted
    /// before deletions; order within a category follows map iteration and
    /// is unspecified.
    ///
    /// An inode the OS reuses for an unrelated file between two snapshots is
    /// misreported as a rename. Known limitation.
    #[must_use]
    pub fn diff(&self, current: &Self) -> Vec<FileEvent> {
        let previous_by_inode: HashMap<u64, &Path> = self
            .files
            .iter()
            .map(|(path, record)| (record.inode, path.as_path()))
            .collect();
        let current_inodes: HashSet<u64> =
            current.files.values().map(|record| record.inode).collect();

        let mut events = Vec::new();

        for (path, record) in &current.files {
            match previous_by_inode.get(&record.inode) {
                None => events.push(FileEvent::Created {
                    record: record.clone(),
                }),
                Some(old_path) if *old_path != path.as_path() => {
                    events.push(FileEvent::Renamed {
                        previous_path: old_path.to_path_buf(),
                        record: record.clone(),
                    });
                }
                Some(_) => {
                    if let Some(previous) = self.files.get(path) {
                        if previous.contents != record.contents {
                            events.push(FileEvent::Modified {
                                record: record.clone(),
                            });
                        }
                    }
                }
            }
        }

        for (path, record) in &self.files {
            if !current_inodes.contains(&record.inode) {
                events.push(FileEvent::Deleted { path: path.clone() });
            }
        }

        events
    }

    /// Every entry as a creation event, sorted by path so parent directories
    /// come before their children. Used to seed an empty destination.
    #[must_use]
    pub fn to_created_events(&self) -> Vec<FileEvent> {
        let mut events: Vec<FileEvent> = self
            .files
            .values()
            .map(|record| FileEvent::Created {
                record: record.clone(),
            })
            .collect();
        events.sort_by(|a, b| a.path().cmp(b.path()));
        events
    }
}

/// A detected filesystem change, the differ's output unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Object appeared under a previously unseen inode
    Created { record: FileRecord },
    /// Inode kept its identity but moved to a new path
    Renamed {
        previous_path: PathBuf,
        record: FileRecord,
    },
    /// Contents changed in place
    Modified { record: FileRecord },
    /// Inode disappeared from the tree
    Deleted { path: PathBuf },
}

impl FileEvent {
    /// Current path of the affected object
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Created { record } | Self::Renamed { record, .. } | Self::Modified { record } => {
                &record.path
            }
            Self::Deleted { path } => path,
        }
    }

    /// Lowercase operation name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Renamed { .. } => "renamed",
            Self::Modified { .. } => "modified",
            Self::Deleted { .. } => "deleted",
        }
    }
}
