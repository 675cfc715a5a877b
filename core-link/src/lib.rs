//! # Link Classifier
//!
//! Pulls a single media URL out of free-form chat text, canonicalizes it and
//! labels it with the platform that can ingest it.
//!
//! ```rust
//! use core_link::{classify, LinkType};
//!
//! let link = classify("https://music.163.com/song?id=12345。");
//! assert_eq!(link.url, "https://music.163.com/song?id=12345");
//! assert_eq!(link.link_type, LinkType::NetEase);
//! ```
//!
//! Classification never fails: text without a supported link yields
//! [`ClassifiedLink::unknown`].

pub mod classifier;
pub mod matcher;
pub mod types;

pub use classifier::{canonicalize, classify, extract_url};
pub use types::{ClassifiedLink, LinkType, MediaKind};
