//! # Cookie Sync
//!
//! Keeps the Netscape cookie file consumed by the external downloaders fresh.
//!
//! 1. [`client::CookieCloudClient`] fetches the encrypted bundle.
//! 2. [`crypto`] decrypts it; every candidate key is tried concurrently and
//!    the first success cancels the rest.
//! 3. [`netscape`] converts the JSON payload to `cookies.txt` rows.
//! 4. [`sync::CookieSync`] writes the file atomically with mode 0600.
//!
//! A failed sync never touches the previous file.

pub mod client;
pub mod crypto;
pub mod error;
pub mod netscape;
pub mod sync;

pub use error::{CookieError, Result, SyncStage};
pub use sync::{CookieSync, SyncReport};
