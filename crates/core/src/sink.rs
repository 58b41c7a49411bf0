//! The replication capability a mirror destination must provide

use async_trait::async_trait;
use color_eyre::Result;

/// Destination-side file operations, one per event kind.
///
/// Paths are destination-root-relative with a leading slash, exactly as the
/// dispatcher produces them. Production implementations are the HTTP client
/// and the direct filesystem writer; tests use in-memory recorders.
#[async_trait]
pub trait ReplicationSink: Send + Sync {
    /// Create a file (with contents) or a directory at `path`
    async fn create(&self, path: &str, data: &[u8], is_directory: bool) -> Result<()>;

    /// Remove `path`, recursively for directories
    async fn delete(&self, path: &str) -> Result<()>;

    /// Move `previous_path` to `path`
    async fn rename(&self, previous_path: &str, path: &str) -> Result<()>;

    /// Replace the full contents of the file at `path`
    async fn update(&self, path: &str, data: &[u8]) -> Result<()>;
}
