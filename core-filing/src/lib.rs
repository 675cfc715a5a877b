//! # Filing Engine
//!
//! Routes a finished artifact to its library destination:
//!
//! - **Local**: rename into `dist_dir` under a sanitized file name, falling
//!   back to copy + unlink across devices.
//! - **WebDAV**: ensure the remote directory exists and stream the file up
//!   through a [`RemoteStorage`](bridge_traits::storage::RemoteStorage).
//!
//! ```
//! use core_filing::sanitize;
//!
//! assert_eq!(sanitize("AC/DC: Back in Black?.flac"), "ACDC Back in Black.flac");
//! ```

pub mod engine;
pub mod error;
pub mod kinds;
pub mod sanitize;

pub use engine::{Destination, FiledLocation, FilingEngine};
pub use error::{FilingError, Result};
pub use kinds::{is_encrypted, is_media};
pub use sanitize::sanitize;
