use std::fmt;
use thiserror::Error;

/// Step of a cookie sync that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetch,
    Decrypt,
    Convert,
    Write,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Fetch => "fetch",
            SyncStage::Decrypt => "decrypt",
            SyncStage::Convert => "convert",
            SyncStage::Write => "write",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CookieError {
    /// Empty bundle or non-200 response.
    #[error("CookieCloud unavailable: {0}")]
    CookieCloudUnavailable(String),

    #[error("Cookie sync failed at {stage}: {cause}")]
    SyncFailed { stage: SyncStage, cause: String },

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Malformed cookie file line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CookieError {
    pub fn sync(stage: SyncStage, cause: impl fmt::Display) -> Self {
        CookieError::SyncFailed {
            stage,
            cause: cause.to_string(),
        }
    }

    /// Stage to report, `Fetch` for an unavailable endpoint.
    pub fn stage(&self) -> SyncStage {
        match self {
            CookieError::SyncFailed { stage, .. } => *stage,
            CookieError::CookieCloudUnavailable(_) => SyncStage::Fetch,
            CookieError::Decrypt(_) => SyncStage::Decrypt,
            CookieError::Format { .. } => SyncStage::Convert,
            CookieError::Io(_) => SyncStage::Write,
        }
    }
}

pub type Result<T> = std::result::Result<T, CookieError>;
