//! Audio Tag Engine
//!
//! Reads tag blocks and audio properties with `lofty`, fills the defaults a
//! library expects (release year, lyric), writes them back and embeds cover
//! art. Supports ID3v2, Vorbis Comments, MP4 atoms and FLAC through lofty.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::TagEngine;
//! use core_runtime::config::TidyMode;
//!
//! let engine = TagEngine::new();
//! let record = engine.prepare(Path::new("song.flac"), TidyMode::Local).await?;
//! println!("{} - {} ({} kbps)", record.artist, record.title, record.bitrate);
//! ```
//!
//! All lofty calls run on the blocking pool. Reads are bounded by a timeout so
//! a malformed file cannot stall a worker.

use core_runtime::config::TidyMode;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::artwork::{Cover, CoverFetcher};
use crate::error::{MetadataError, Result};
use crate::info_json;
use crate::records::TrackRecord;

/// Upper bound for a single tag read.
pub const TAG_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads and repairs tags on downloaded tracks.
#[derive(Clone)]
pub struct TagEngine {
    read_timeout: Duration,
    covers: Option<CoverFetcher>,
}

impl TagEngine {
    pub fn new() -> Self {
        Self {
            read_timeout: TAG_READ_TIMEOUT,
            covers: None,
        }
    }

    /// Enable cover embedding for records that carry a `cover_url`.
    pub fn with_cover_fetcher(mut self, fetcher: CoverFetcher) -> Self {
        self.covers = Some(fetcher);
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Read tags and audio properties of `path`.
    ///
    /// A missing or empty title falls back to the file stem.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::Timeout`] when the read exceeds the configured bound
    /// - [`MetadataError::TagReadFailed`] when lofty cannot parse the file
    pub async fn read(&self, path: &Path, filing_mode: TidyMode) -> Result<TrackRecord> {
        let owned = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || read_blocking(&owned, filing_mode));

        match tokio::time::timeout(self.read_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(MetadataError::TagReadFailed(format!("tag task failed: {}", e))),
            Err(_) => {
                warn!(path = %path.display(), "Tag read timed out");
                Err(MetadataError::Timeout(self.read_timeout.as_secs()))
            }
        }
    }

    /// Persist the record's title, artist, album (also as album artist),
    /// year and lyric into the file's primary tag.
    pub async fn write(&self, record: &TrackRecord) -> Result<()> {
        let record = record.clone();
        tokio::task::spawn_blocking(move || write_blocking(&record))
            .await
            .map_err(|e| MetadataError::TagWriteFailed(format!("tag task failed: {}", e)))?
    }

    /// Read, fill defaults and write them back. The cover URL comes from a
    /// yt-dlp `.info.json` sidecar next to the file when there is one.
    ///
    /// Write failures are logged and the record is still returned: a track
    /// with stale tags is filed rather than dropped.
    pub async fn prepare(&self, path: &Path, filing_mode: TidyMode) -> Result<TrackRecord> {
        let mut record = self.read(path, filing_mode).await?;
        if record.cover_url.is_none() {
            record.cover_url = info_json::thumbnail_for(path).await;
        }

        if record.fill_defaults() {
            if let Err(e) = self.write(&record).await {
                warn!(path = %path.display(), error = %e, "Failed to persist default tags");
            }
        }

        debug!(
            path = %path.display(),
            title = %record.title,
            artist = %record.artist,
            bitrate = record.bitrate,
            "Tags prepared"
        );
        Ok(record)
    }

    /// Download `record.cover_url` and embed it as the front cover.
    ///
    /// Returns whether a cover was embedded. Every failure is a warning.
    pub async fn embed_cover(&self, record: &TrackRecord) -> bool {
        let (Some(url), Some(fetcher)) = (record.cover_url.as_deref(), &self.covers) else {
            return false;
        };

        let cover = match fetcher.fetch(url).await {
            Ok(cover) => cover,
            Err(e) => {
                warn!(error = %e, "Cover unavailable, filing without it");
                return false;
            }
        };

        let path = record.path.clone();
        match tokio::task::spawn_blocking(move || embed_blocking(&path, cover)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(path = %record.path.display(), error = %e, "Failed to embed cover");
                false
            }
            Err(e) => {
                warn!(error = %e, "Cover task failed");
                false
            }
        }
    }
}

impl Default for TagEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn open(path: &Path) -> std::result::Result<TaggedFile, lofty::error::LoftyError> {
    Probe::open(path)?.guess_file_type()?.read()
}

fn read_blocking(path: &Path, filing_mode: TidyMode) -> Result<TrackRecord> {
    let size = std::fs::metadata(path)?.len();
    let tagged = open(path)
        .map_err(|e| MetadataError::TagReadFailed(format!("{}: {}", path.display(), e)))?;

    let properties = tagged.properties();
    let mut record = TrackRecord::from_path(path, filing_mode);
    record.size = size;
    record.duration = properties.duration().as_secs();
    record.bitrate = properties
        .audio_bitrate()
        .or_else(|| properties.overall_bitrate())
        .unwrap_or(0);

    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        debug!(path = %path.display(), "No tag block, using file name");
        return Ok(record);
    };

    if let Some(title) = tag.title().map(|t| normalize_text(&t)) {
        if !title.is_empty() {
            record.title = title;
        }
    }
    record.artist = tag.artist().map(|a| normalize_text(&a)).unwrap_or_default();
    record.album = tag.album().map(|a| normalize_text(&a)).unwrap_or_default();
    record.year = tag.year();
    record.lyric = tag
        .get_string(&ItemKey::Lyrics)
        .map(str::to_string)
        .filter(|l| !l.trim().is_empty());

    Ok(record)
}

/// Open `path` and make sure it has a primary tag to edit.
fn open_for_edit(path: &Path) -> Result<TaggedFile> {
    let mut tagged = open(path)
        .map_err(|e| MetadataError::TagWriteFailed(format!("{}: {}", path.display(), e)))?;

    if tagged.primary_tag().is_none() {
        let tag_type = tagged.primary_tag_type();
        tagged.insert_tag(Tag::new(tag_type));
    }
    Ok(tagged)
}

fn save(tag: &Tag, path: &Path) -> Result<()> {
    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| MetadataError::TagWriteFailed(format!("{}: {}", path.display(), e)))
}

fn write_blocking(record: &TrackRecord) -> Result<()> {
    let mut tagged = open_for_edit(&record.path)?;
    let tag = tagged
        .primary_tag_mut()
        .ok_or_else(|| MetadataError::TagWriteFailed("no writable tag".to_string()))?;

    if !record.title.is_empty() {
        tag.set_title(record.title.clone());
    }
    if !record.artist.is_empty() {
        tag.set_artist(record.artist.clone());
    }
    if !record.album.is_empty() {
        tag.set_album(record.album.clone());
        // Album doubles as the grouping key downstream.
        tag.insert_text(ItemKey::AlbumArtist, record.album.clone());
    }
    if let Some(year) = record.year {
        tag.set_year(year);
    }
    if let Some(lyric) = &record.lyric {
        tag.insert_text(ItemKey::Lyrics, lyric.clone());
    }

    save(tag, &record.path)
}

fn embed_blocking(path: &Path, cover: Cover) -> Result<()> {
    let mut tagged = open_for_edit(path)?;
    let tag = tagged
        .primary_tag_mut()
        .ok_or_else(|| MetadataError::TagWriteFailed("no writable tag".to_string()))?;

    tag.remove_picture_type(PictureType::CoverFront);
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(cover.mime_type),
        None,
        cover.data.to_vec(),
    ));

    save(tag, path)
}

/// Collapse whitespace runs and drop control characters.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}
