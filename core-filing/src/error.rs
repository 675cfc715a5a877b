use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilingError {
    #[error("Failed to file {} into {}: {cause}", src.display(), dst.display())]
    Local {
        src: PathBuf,
        dst: PathBuf,
        cause: String,
    },

    #[error("Failed to upload to WebDAV {remote_path}: {cause}")]
    WebDav { remote_path: String, cause: String },

    #[error("Filing destination not configured: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FilingError>;
