use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read tags: {0}")]
    TagReadFailed(String),

    #[error("Failed to write tags: {0}")]
    TagWriteFailed(String),

    #[error("Tag read timed out after {0}s")]
    Timeout(u64),

    #[error("Cover fetch failed: {0}")]
    CoverFetchFailed(String),

    #[error("Invalid info.json: {0}")]
    InfoJson(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
