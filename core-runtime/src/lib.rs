//! Process-wide plumbing: the configuration document, `tracing` setup and
//! the event bus every pipeline publishes on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
