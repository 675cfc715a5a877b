//! Host adapters for Linux and macOS servers.
//!
//! [`ReqwestHttpClient`] carries the configured proxy, retries idempotent
//! calls and streams uploads from disk. [`TokioCommandRunner`] spawns the
//! downloader and decryptor tools in their own process group so a timeout or
//! cancellation takes their children down too.

mod http;
mod process;

pub use http::{HttpClientOptions, ReqwestHttpClient};
pub use process::TokioCommandRunner;
