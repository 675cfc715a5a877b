use core_filing::FilingError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watcher for {} failed: {cause}", dir.display())]
    Watcher { dir: PathBuf, cause: String },

    #[error("Failed to decrypt {}: {cause}", path.display())]
    Decrypt { path: PathBuf, cause: String },

    #[error("Failed to read tags of {}: {cause}", path.display())]
    Tags { path: PathBuf, cause: String },

    #[error(transparent)]
    Filing(#[from] FilingError),

    #[error("Watch manager is shut down")]
    ShutDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    pub fn watcher(dir: impl Into<PathBuf>, cause: impl ToString) -> Self {
        WatchError::Watcher {
            dir: dir.into(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
