//! # Ingest Pipeline
//!
//! Turns a shared link into a filed media artifact.
//!
//! ## Overview
//!
//! - [`orchestrator::Orchestrator`] runs classify → dispatch → download →
//!   before-tidy → DRM removal → filing and reports progress through a
//!   [`progress::ProgressSink`].
//! - [`processor`] holds the per-platform strategies (`gamdl` for Apple Music,
//!   `yt-dlp` for video platforms, the decryptor for NetEase/QQ drops).
//! - [`session::Session`] is the per-ingest scratch directory.
//! - [`service::IngestService`] adds the chat allow-list and the final
//!   user-facing message from [`feedback`].
//! - [`janitor`] clears session directories left over from earlier runs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_ingest::{IngestService, NoopSink};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(service: IngestService) {
//! let report = service
//!     .ingest("https://music.apple.com/us/song/x/1", &NoopSink, CancellationToken::new())
//!     .await;
//! # }
//! ```

pub mod decrypt;
pub mod error;
pub mod feedback;
pub mod janitor;
pub mod orchestrator;
pub mod processor;
pub mod progress;
pub mod service;
pub mod session;

pub use decrypt::Decryptor;
pub use error::{IngestError, Result};
pub use orchestrator::{IngestReport, Orchestrator};
pub use processor::{
    Artifact, DefaultProcessorFactory, FiledArtifact, Processor, ProcessorContext,
    ProcessorFactory, ToolPaths,
};
pub use progress::{ChannelSink, NoopSink, ProgressSink};
pub use service::IngestService;
pub use session::{claim_dir, Session};
