use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Filing error: {0}")]
    Filing(#[from] core_filing::FilingError),

    #[error("Watch error: {0}")]
    Watch(#[from] core_watch::WatchError),

    #[error("Cookie sync error: {0}")]
    Cookie(#[from] core_cookie::CookieError),

    #[error("Service {name} failed: {cause}")]
    Service { name: &'static str, cause: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
