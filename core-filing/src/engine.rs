//! Local and WebDAV filing.

use bridge_traits::storage::RemoteStorage;
use core_runtime::config::{AppConfig, TidyMode};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{FilingError, Result};
use crate::kinds::is_encrypted;
use crate::sanitize::sanitize;

/// Where filed artifacts end up.
#[derive(Clone)]
pub enum Destination {
    Local { dist_dir: PathBuf },
    WebDav {
        storage: Arc<dyn RemoteStorage>,
        remote_dir: String,
    },
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Local { dist_dir } => f
                .debug_struct("Local")
                .field("dist_dir", dist_dir)
                .finish(),
            Destination::WebDav { remote_dir, .. } => f
                .debug_struct("WebDav")
                .field("remote_dir", remote_dir)
                .finish_non_exhaustive(),
        }
    }
}

/// Final location of a filed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiledLocation {
    Local(PathBuf),
    /// Path relative to the WebDAV base directory
    Remote(String),
}

impl fmt::Display for FiledLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiledLocation::Local(path) => write!(f, "{}", path.display()),
            FiledLocation::Remote(path) => write!(f, "webdav:{}", path),
        }
    }
}

/// `/` prefixed, no trailing `/`, duplicate slashes collapsed. Root is `/`.
pub fn normalize_remote_dir(dir: &str) -> String {
    let segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

#[derive(Debug, Clone)]
pub struct FilingEngine {
    destination: Destination,
}

impl FilingEngine {
    pub fn local(dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            destination: Destination::Local {
                dist_dir: dist_dir.into(),
            },
        }
    }

    pub fn webdav(storage: Arc<dyn RemoteStorage>, remote_dir: &str) -> Self {
        Self {
            destination: Destination::WebDav {
                storage,
                remote_dir: normalize_remote_dir(remote_dir),
            },
        }
    }

    /// Build the engine selected by `tidy.mode`.
    ///
    /// WebDAV uploads land at the root of the storage's base directory.
    pub fn from_config(config: &AppConfig, storage: Option<Arc<dyn RemoteStorage>>) -> Result<Self> {
        let mode = config
            .tidy_mode()
            .map_err(|e| FilingError::Config(e.to_string()))?;

        match mode {
            TidyMode::Local => Ok(Self::local(&config.tidy.dist_dir)),
            TidyMode::WebDav => storage
                .map(|storage| Self::webdav(storage, "/"))
                .ok_or_else(|| {
                    FilingError::Config("tidy.mode is webdav but no WebDAV client".to_string())
                }),
        }
    }

    pub fn mode(&self) -> TidyMode {
        match self.destination {
            Destination::Local { .. } => TidyMode::Local,
            Destination::WebDav { .. } => TidyMode::WebDav,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// File `src` at the configured destination.
    ///
    /// Local filing moves the file. WebDAV filing uploads it and then removes
    /// the local copy unless it is an encrypted original. A failed upload
    /// leaves the local file untouched.
    #[instrument(skip(self), fields(src = %src.display(), mode = self.mode().as_str()))]
    pub async fn file(&self, src: &Path) -> Result<FiledLocation> {
        match &self.destination {
            Destination::Local { dist_dir } => {
                let dst = file_local(src, dist_dir).await?;
                info!(dst = %dst.display(), "Filed locally");
                Ok(FiledLocation::Local(dst))
            }
            Destination::WebDav {
                storage,
                remote_dir,
            } => {
                let remote = file_webdav(src, storage.as_ref(), remote_dir).await?;
                info!(remote = %remote, "Filed to WebDAV");
                Ok(FiledLocation::Remote(remote))
            }
        }
    }
}

async fn create_dist_dir(dir: &Path) -> io::Result<()> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(&dir)
    })
    .await
    .map_err(io::Error::other)?
}

fn crosses_devices(error: &io::Error) -> bool {
    error.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
}

/// Rename, or copy + unlink when source and target are on different devices.
pub async fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if crosses_devices(&e) => {
            debug!(src = %src.display(), dst = %dst.display(), "Cross-device move, copying");
            copy_then_remove(src, dst).await
        }
        Err(e) => Err(e),
    }
}

pub(crate) async fn copy_then_remove(src: &Path, dst: &Path) -> io::Result<()> {
    if let Err(e) = tokio::fs::copy(src, dst).await {
        let _ = tokio::fs::remove_file(dst).await;
        return Err(e);
    }
    tokio::fs::remove_file(src).await
}

async fn file_local(src: &Path, dist_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .map(|n| sanitize(&n.to_string_lossy()))
        .unwrap_or_else(|| sanitize(""));
    let dst = dist_dir.join(name);

    let fail = |cause: String| FilingError::Local {
        src: src.to_path_buf(),
        dst: dst.clone(),
        cause,
    };

    if !tokio::fs::try_exists(src).await.unwrap_or(false) {
        return Err(fail("source file does not exist".to_string()));
    }

    create_dist_dir(dist_dir)
        .await
        .map_err(|e| fail(format!("create {}: {}", dist_dir.display(), e)))?;
    move_file(src, &dst).await.map_err(|e| fail(e.to_string()))?;

    Ok(dst)
}

async fn file_webdav(src: &Path, storage: &dyn RemoteStorage, remote_dir: &str) -> Result<String> {
    let basename = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let remote_path = if remote_dir == "/" {
        format!("/{}", basename)
    } else {
        format!("{}/{}", remote_dir, basename)
    };

    let fail = |cause: String| FilingError::WebDav {
        remote_path: remote_path.clone(),
        cause,
    };

    if basename.is_empty() {
        return Err(fail(format!("{} has no file name", src.display())));
    }

    storage
        .check_connection()
        .await
        .map_err(|e| fail(e.to_string()))?;
    storage
        .mkdir_all(remote_dir)
        .await
        .map_err(|e| fail(e.to_string()))?;
    let uploaded = storage
        .upload_to(src, remote_dir)
        .await
        .map_err(|e| fail(e.to_string()))?;

    if is_encrypted(src) {
        debug!(src = %src.display(), "Keeping encrypted original after upload");
    } else if let Err(e) = tokio::fs::remove_file(src).await {
        warn!(src = %src.display(), error = %e, "Uploaded but could not remove local copy");
    }

    Ok(uploaded)
}
