//! Per-artifact records produced by a processor session.

use core_runtime::config::TidyMode;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Year written when a track carries none (or zero).
pub const DEFAULT_YEAR: u32 = 2020;

/// Lyric written when a track carries none.
pub const DEFAULT_LYRIC: &str = "[00:00.00]暂无歌词";

/// A downloaded audio track while it sits in the temp area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRecord {
    pub title: String,
    /// Joined artist string as found in the tag
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    /// Lower-case extension without the dot
    pub extension: String,
    pub size: u64,
    /// Audio bitrate in kbps
    pub bitrate: u32,
    /// Duration in seconds
    pub duration: u64,
    pub path: PathBuf,
    pub cover_url: Option<String>,
    pub lyric: Option<String>,
    pub filing_mode: TidyMode,
}

impl TrackRecord {
    /// Record with only path-derived fields filled in.
    pub fn from_path(path: &Path, filing_mode: TidyMode) -> Self {
        Self {
            title: file_stem(path),
            artist: String::new(),
            album: String::new(),
            year: None,
            extension: extension_of(path),
            size: 0,
            bitrate: 0,
            duration: 0,
            path: path.to_path_buf(),
            cover_url: None,
            lyric: None,
            filing_mode,
        }
    }

    /// Fill `year` and `lyric` when missing.
    ///
    /// Returns true when anything changed and the tag block needs rewriting.
    pub fn fill_defaults(&mut self) -> bool {
        let mut changed = false;

        if self.year.unwrap_or(0) == 0 {
            self.year = Some(DEFAULT_YEAR);
            changed = true;
        }

        if self.lyric.as_deref().map_or(true, |l| l.trim().is_empty()) {
            self.lyric = Some(DEFAULT_LYRIC.to_string());
            changed = true;
        }

        changed
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A downloaded video while it sits in the temp area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRecord {
    pub title: String,
    pub author: String,
    /// `<width>x<height>` when known
    pub resolution: String,
    /// Duration in seconds
    pub duration: u64,
    pub cover_url: Option<String>,
    pub size: u64,
    pub path: PathBuf,
    pub filing_mode: TidyMode,
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let record = TrackRecord::from_path(Path::new("/tmp/s/Song Name.FLAC"), TidyMode::Local);
        assert_eq!(record.title, "Song Name");
        assert_eq!(record.extension, "flac");
        assert_eq!(record.file_name(), "Song Name.FLAC");
    }

    #[test]
    fn test_fill_defaults() {
        let mut record = TrackRecord::from_path(Path::new("a.m4a"), TidyMode::WebDav);
        assert!(record.fill_defaults());
        assert_eq!(record.year, Some(DEFAULT_YEAR));
        assert_eq!(record.lyric.as_deref(), Some(DEFAULT_LYRIC));

        // Second pass is a no-op.
        assert!(!record.fill_defaults());
    }

    #[test]
    fn test_fill_defaults_overwrites_zero_year() {
        let mut record = TrackRecord::from_path(Path::new("a.mp3"), TidyMode::Local);
        record.year = Some(0);
        record.lyric = Some("[00:01.00]la".to_string());
        assert!(record.fill_defaults());
        assert_eq!(record.year, Some(DEFAULT_YEAR));
        assert_eq!(record.lyric.as_deref(), Some("[00:01.00]la"));
    }

    #[test]
    fn test_keeps_real_year() {
        let mut record = TrackRecord::from_path(Path::new("a.mp3"), TidyMode::Local);
        record.year = Some(1999);
        record.fill_defaults();
        assert_eq!(record.year, Some(1999));
    }
}
