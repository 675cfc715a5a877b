//! # Metadata
//!
//! Tag engine and per-artifact records for downloaded media.
//!
//! - [`tags::TagEngine`] reads tag blocks and audio properties with `lofty`,
//!   fills defaults, writes them back and embeds cover art.
//! - [`artwork::CoverFetcher`] downloads cover images over the bridge
//!   [`HttpClient`](bridge_traits::http::HttpClient).
//! - [`info_json`] turns a yt-dlp `.info.json` sidecar into a
//!   [`VideoRecord`](records::VideoRecord).

pub mod artwork;
pub mod error;
pub mod info_json;
pub mod records;
pub mod tags;

pub use error::{MetadataError, Result};
pub use records::{TrackRecord, VideoRecord, DEFAULT_LYRIC, DEFAULT_YEAR};
pub use tags::TagEngine;
