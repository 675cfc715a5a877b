//! yt-dlp `.info.json` sidecar parsing.

use core_runtime::config::TidyMode;
use serde::Deserialize;
use std::path::Path;

use crate::error::{MetadataError, Result};
use crate::records::{file_stem, VideoRecord};

/// Sidecar suffix yt-dlp writes next to each video with `--write-info-json`.
pub const INFO_JSON_SUFFIX: &str = ".info.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InfoJson {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    width: Option<u64>,
    height: Option<u64>,
    resolution: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

/// Build a [`VideoRecord`] for `video` from its sidecar at `info_path`.
///
/// The size is taken from the video file itself.
pub async fn read_video_record(
    video: &Path,
    info_path: &Path,
    filing_mode: TidyMode,
) -> Result<VideoRecord> {
    let raw = tokio::fs::read(info_path).await?;
    let size = tokio::fs::metadata(video).await?.len();
    parse(&raw, video, size, filing_mode)
}

fn parse(raw: &[u8], video: &Path, size: u64, filing_mode: TidyMode) -> Result<VideoRecord> {
    let info: InfoJson =
        serde_json::from_slice(raw).map_err(|e| MetadataError::InfoJson(e.to_string()))?;

    let resolution = match (info.width, info.height) {
        (Some(w), Some(h)) => format!("{}x{}", w, h),
        _ => info.resolution.unwrap_or_default(),
    };

    Ok(VideoRecord {
        title: info
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| file_stem(video)),
        author: info.uploader.or(info.channel).unwrap_or_default(),
        resolution,
        duration: info.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0),
        cover_url: info.thumbnail,
        size,
        path: video.to_path_buf(),
        filing_mode,
    })
}

/// Thumbnail URL from the sidecar next to `media`. `None` when there is no
/// readable sidecar or it names no thumbnail.
pub async fn thumbnail_for(media: &Path) -> Option<String> {
    let raw = tokio::fs::read(sidecar_for(media)).await.ok()?;
    let info: InfoJson = serde_json::from_slice(&raw).ok()?;
    info.thumbnail.filter(|t| !t.trim().is_empty())
}

/// Sidecar path yt-dlp uses for `video` (`name.mp4` -> `name.info.json`).
pub fn sidecar_for(video: &Path) -> std::path::PathBuf {
    video.with_file_name(format!("{}{}", file_stem(video), INFO_JSON_SUFFIX))
}
