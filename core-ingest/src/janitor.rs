//! Removal of session directories left behind by crashed or kept ingests.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Sessions older than this are removed on startup.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Directory holding decryptor scratch sessions.
pub const DECRYPT_DIR: &str = "um";

/// Session directories under `temp_root`:
/// `{music,video}/<Platform>/<stamp>` and `um/<stamp>`.
fn session_dirs(temp_root: &Path) -> Vec<PathBuf> {
    let mut parents = vec![temp_root.join(DECRYPT_DIR)];
    for kind in ["music", "video"] {
        parents.extend(subdirs(&temp_root.join(kind)));
    }
    parents.iter().flat_map(|parent| subdirs(parent)).collect()
}

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot scan temp directory");
            Vec::new()
        }
    }
}

/// Remove session directories whose mtime is older than `max_age` at `now`.
/// Returns how many were removed. Never fails; problems are logged.
pub async fn sweep_stale_sessions(temp_root: &Path, max_age: Duration, now: SystemTime) -> usize {
    let root = temp_root.to_path_buf();
    let candidates = match tokio::task::spawn_blocking(move || session_dirs(&root)).await {
        Ok(dirs) => dirs,
        Err(e) => {
            warn!(error = %e, "Temp scan task failed");
            return 0;
        }
    };

    let mut removed = 0;
    for dir in candidates {
        let modified = match tokio::fs::metadata(&dir).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Skipping session without mtime");
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age < max_age {
            continue;
        }
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), age_secs = age.as_secs(), "Removed stale session");
                removed += 1;
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to remove stale session"),
        }
    }

    if removed > 0 {
        info!(removed, root = %temp_root.display(), "Stale sessions swept");
    }
    removed
}
