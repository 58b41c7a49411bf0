//! Direct filesystem replication sink
//!
//! Writes operations straight into a destination tree. This is the agent's
//! write backend, and doubles as a same-host mirror when no HTTP hop is
//! wanted.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use color_eyre::Result;
use color_eyre::eyre::eyre;

use syncbox_core::ReplicationSink;

/// Replication sink rooted at a destination directory
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Create a sink writing under the given destination root
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Destination root this sink writes under
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a wire path under the root. `..` components are rejected so a
    /// request cannot write outside the destination tree.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(eyre!("path {path} escapes the destination root"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ReplicationSink for FsSink {
    async fn create(&self, path: &str, data: &[u8], is_directory: bool) -> Result<()> {
        let full_path = self.resolve(path)?;

        if is_directory {
            std::fs::create_dir_all(&full_path)?;
            return Ok(());
        }

        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full_path, data)?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        match std::fs::metadata(&full_path) {
            Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(&full_path)?,
            Ok(_) => std::fs::remove_file(&full_path)?,
            // Deleting a path that is already gone is a success
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    async fn rename(&self, previous_path: &str, path: &str) -> Result<()> {
        let from = self.resolve(previous_path)?;
        let to = self.resolve(path)?;
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&from, &to)?;
        Ok(())
    }

    async fn update(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path)?;
        std::fs::write(&full_path, data)?;
        Ok(())
    }
}
