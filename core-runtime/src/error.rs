use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Unreadable, unparsable or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
