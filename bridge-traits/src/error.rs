use thiserror::Error;

/// Failure of a host capability (HTTP, tool process, remote share).
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{0}")]
    OperationFailed(String),

    /// Deadline hit; carries the limit in seconds
    #[error("timed out after {0}s")]
    TimedOut(u64),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
