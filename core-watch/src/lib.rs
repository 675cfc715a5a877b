//! # Directory Watcher
//!
//! Picks up files dropped into monitored directories (typically encrypted
//! NetEase/QQ downloads), decrypts them when needed, repairs tags and files
//! them the same way the link pipeline does.
//!
//! - [`manager::WatchManager`] registers directories and runs the workers.
//! - [`queue`] is the bounded, drop-on-overflow hand-off.
//! - [`pipeline::DropPipeline`] is the per-file work.

pub mod error;
pub mod manager;
pub mod pipeline;
pub mod queue;

pub use error::{Result, WatchError};
pub use manager::{default_workers, WatchManager};
pub use pipeline::DropPipeline;
pub use queue::{Offer, QUEUE_CAPACITY};
