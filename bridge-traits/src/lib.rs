//! Capabilities the ingest core needs from its host.
//!
//! The pipeline crates only see these traits. `bridge-desktop` implements
//! them with `reqwest` and `tokio::process`; tests implement them with
//! `mockall`. Every trait is `Send + Sync` so one adapter behind an `Arc` is
//! shared by concurrent ingests and watcher workers.
//!
//! - [`HttpClient`]: CookieCloud, cover art and WebDAV traffic
//! - [`RemoteStorage`]: the share the filing engine uploads to
//! - [`CommandRunner`]: downloader and decryptor processes, with streamed
//!   output lines and process-group cancellation
//! - [`Clock`]: session names and stale-directory sweeps

pub mod error;
pub mod http;
pub mod process;
pub mod storage;
pub mod time;

pub use error::BridgeError;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use process::{CommandOutput, CommandRunner, CommandSpec, OutputTail};
pub use storage::{RemoteFile, RemoteStorage};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
