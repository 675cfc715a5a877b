//! Per-ingest scratch directories.
//!
//! Layout: `<temp_root>/<music|video>/<Platform>/<YYYYMMDDhhmmss>`. Two
//! sessions started within the same second get `-1`, `-2`, ... suffixes.

use bridge_traits::time::Clock;
use core_link::{LinkType, MediaKind};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Give up after this many suffixes in the same second.
const MAX_CLAIM_ATTEMPTS: usize = 1000;

/// Create a fresh directory `<parent>/<stamp>` (or `<stamp>-n`).
///
/// `create_dir` fails on an existing entry, so two concurrent callers never
/// receive the same directory.
pub fn claim_dir(parent: &Path, stamp: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(parent)?;

    for attempt in 0..MAX_CLAIM_ATTEMPTS {
        let name = if attempt == 0 {
            stamp.to_string()
        } else {
            format!("{}-{}", stamp, attempt)
        };
        let candidate = parent.join(name);
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free session directory under {}", parent.display()),
    ))
}

/// Scratch area owned by one ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    platform: LinkType,
    dir: PathBuf,
}

impl Session {
    /// Claim a new session directory for `platform`.
    pub fn create(temp_root: &Path, platform: LinkType, clock: &dyn Clock) -> io::Result<Self> {
        let kind = platform.media_kind().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no session for unknown links")
        })?;
        let parent = Self::platform_root(temp_root, kind, platform);
        let dir = claim_dir(&parent, &clock.compact_local_stamp())?;
        debug!(dir = %dir.display(), platform = %platform, "Session created");
        Ok(Self { platform, dir })
    }

    /// `<temp_root>/<music|video>/<Platform>`
    pub fn platform_root(temp_root: &Path, kind: MediaKind, platform: LinkType) -> PathBuf {
        temp_root.join(kind.as_dir()).join(platform.as_str())
    }

    pub fn platform(&self) -> LinkType {
        self.platform
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the session directory. Failures are logged only.
    pub async fn cleanup(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "Session removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "Failed to remove session"),
        }
    }
}
