//! # WebDAV Provider
//!
//! Implements [`RemoteStorage`](bridge_traits::storage::RemoteStorage) on top
//! of the bridge [`HttpClient`](bridge_traits::http::HttpClient) using plain
//! WebDAV verbs (PROPFIND, MKCOL, PUT, GET, DELETE) with Basic auth.
//!
//! Every path is resolved against the configured base directory:
//! `base_dir + '/' + relative`, with duplicate slashes collapsed and each
//! segment percent-encoded on the wire.

pub mod client;
pub mod error;
pub mod path;
pub mod propfind;

pub use client::WebDavClient;
pub use error::{Result, WebDavError};
