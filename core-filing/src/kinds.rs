//! File-extension classification shared by the ingest and watch paths.

use std::path::Path;

/// Containers produced by the platform clients' DRM schemes.
///
/// Entries ending in `*` match any extension with that prefix
/// (`qmc0`, `qmcflac`, `mflac0`, ...).
pub const ENCRYPTED_EXTENSIONS: &[&str] = &[
    "ncm", "qmc*", "mflac*", "mgg*", "tkm", "bkc*", "kgm", "kgma", "vpr", "kwm", "tm0", "tm2",
    "tm3", "tm6", "x2m", "x3m", "xm", "mg3d",
];

/// Playable audio and video containers.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "m4a", "aac", "ogg", "opus", "wav", "ape", "wma", "alac", "mp4", "mkv",
    "webm", "mov", "flv",
];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn matches_any(ext: &str, table: &[&str]) -> bool {
    table.iter().any(|pattern| match pattern.strip_suffix('*') {
        Some(prefix) => ext.starts_with(prefix),
        None => ext == *pattern,
    })
}

/// Whether `path` needs the decryptor before it can be tagged.
pub fn is_encrypted(path: &Path) -> bool {
    extension(path).is_some_and(|ext| matches_any(&ext, ENCRYPTED_EXTENSIONS))
}

pub fn is_media(path: &Path) -> bool {
    extension(path).is_some_and(|ext| matches_any(&ext, MEDIA_EXTENSIONS))
}
