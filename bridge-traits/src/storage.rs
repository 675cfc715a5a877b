//! Remote share used by the filing engine.
//!
//! Paths are relative to the backend's base directory and use `/`.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Entry returned by [`RemoteStorage::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Path relative to the storage base directory
    pub path: String,
    /// Final path segment
    pub name: String,
    /// Size in bytes, when the server reports it
    pub size: Option<u64>,
    /// Whether the entry is a collection
    pub is_folder: bool,
    /// Server-reported modification time, verbatim
    pub modified_at: Option<String>,
}

/// Remote file share the filing engine publishes to (WebDAV today).
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Verify the remote is reachable. Implementations may cache the answer.
    async fn check_connection(&self) -> Result<()>;

    /// Create `remote_dir` and every missing parent. Idempotent.
    async fn mkdir_all(&self, remote_dir: &str) -> Result<()>;

    /// Stream `local` to `remote_path`.
    async fn upload(&self, local: &Path, remote_path: &str) -> Result<()>;

    /// Stream `local` into `remote_dir` under its own basename.
    ///
    /// Returns the remote path that was written.
    async fn upload_to(&self, local: &Path, remote_dir: &str) -> Result<String>;

    /// Fetch `remote_path` into `local`.
    async fn download(&self, remote_path: &str, local: &Path) -> Result<()>;

    /// Remove `remote_path`.
    async fn delete(&self, remote_path: &str) -> Result<()>;

    /// List the direct children of `remote_dir`.
    async fn list(&self, remote_dir: &str) -> Result<Vec<RemoteFile>>;
}
