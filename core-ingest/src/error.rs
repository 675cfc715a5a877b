use core_filing::FilingError;
use core_link::LinkType;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal states of an ingest.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No supported link found")]
    UnsupportedLink,

    #[error("{0} support is still in development")]
    PlatformDeveloping(LinkType),

    #[error("Download failed: {reason}")]
    DownloadFailed { reason: String, tail: String },

    #[error("Download timed out after {0}s")]
    DownloadTimeout(u64),

    #[error("Failed to read tags: {0}")]
    TagReadFailed(String),

    #[error("DRM removal failed: {0}")]
    DrmRemovalFailed(String),

    #[error("Failed to file {} into {}: {cause}", src.display(), dst.display())]
    FilingFailedLocal {
        src: PathBuf,
        dst: PathBuf,
        cause: String,
    },

    #[error("Failed to upload {remote_path}: {cause}")]
    FilingFailedWebDav { remote_path: String, cause: String },

    #[error("User {0} is not allowed to ingest")]
    Unauthorized(i64),

    #[error("Ingest cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn download(reason: impl Into<String>) -> Self {
        IngestError::DownloadFailed {
            reason: reason.into(),
            tail: String::new(),
        }
    }

    /// Short label used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::UnsupportedLink => "unsupported_link",
            IngestError::PlatformDeveloping(_) => "platform_developing",
            IngestError::DownloadFailed { .. } => "download_failed",
            IngestError::DownloadTimeout(_) => "download_timeout",
            IngestError::TagReadFailed(_) => "tag_read_failed",
            IngestError::DrmRemovalFailed(_) => "drm_removal_failed",
            IngestError::FilingFailedLocal { .. } => "filing_failed_local",
            IngestError::FilingFailedWebDav { .. } => "filing_failed_webdav",
            IngestError::Unauthorized(_) => "unauthorized",
            IngestError::Cancelled => "cancelled",
        }
    }

    /// Whether the session's temp directory should survive this failure so
    /// the artifact can be retried by hand.
    pub fn keeps_session(&self) -> bool {
        matches!(self, IngestError::FilingFailedWebDav { .. })
    }
}

impl From<FilingError> for IngestError {
    fn from(error: FilingError) -> Self {
        match error {
            FilingError::Local { src, dst, cause } => {
                IngestError::FilingFailedLocal { src, dst, cause }
            }
            FilingError::WebDav { remote_path, cause } => {
                IngestError::FilingFailedWebDav { remote_path, cause }
            }
            FilingError::Config(cause) => IngestError::FilingFailedLocal {
                src: PathBuf::new(),
                dst: PathBuf::new(),
                cause,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
