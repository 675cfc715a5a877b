//! Error types for the WebDAV provider

use thiserror::Error;

/// WebDAV provider errors
#[derive(Error, Debug)]
pub enum WebDavError {
    /// Server answered with an unexpected status
    #[error("WebDAV {method} {path} failed with status {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },

    /// Request never got an answer
    #[error("WebDAV transport error: {0}")]
    Transport(String),

    #[error("Invalid WebDAV configuration: {0}")]
    InvalidConfig(String),

    /// Multistatus body could not be understood
    #[error("Failed to parse PROPFIND response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for WebDAV operations
pub type Result<T> = std::result::Result<T, WebDavError>;

impl From<WebDavError> for bridge_traits::error::BridgeError {
    fn from(error: WebDavError) -> Self {
        match error {
            WebDavError::Io(e) => bridge_traits::error::BridgeError::Io(e),
            other => bridge_traits::error::BridgeError::OperationFailed(other.to_string()),
        }
    }
}
