//! User-facing result messages.

use core_filing::FiledLocation;

use crate::error::IngestError;
use crate::processor::{Artifact, FiledArtifact};

const MB: f64 = 1024.0 * 1024.0;

/// `12.34 MB`
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MB)
}

/// `m:ss`, or `h:mm:ss` past an hour.
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

fn location(location: &FiledLocation) -> String {
    match location {
        FiledLocation::Local(path) => path.display().to_string(),
        FiledLocation::Remote(path) => format!("WebDAV {}", path),
    }
}

fn describe(filed: &FiledArtifact) -> String {
    match &filed.artifact {
        Artifact::Track(track) => format!(
            "标题: {}\n艺术家: {}\n专辑: {}\n码率: {} kbps\n大小: {}\n位置: {}",
            track.title,
            track.artist,
            track.album,
            track.bitrate,
            format_size(track.size),
            location(&filed.location)
        ),
        Artifact::Video(video) => {
            let mut text = format!("标题: {}", video.title);
            if !video.author.is_empty() {
                text.push_str(&format!("\n作者: {}", video.author));
            }
            if !video.resolution.is_empty() {
                text.push_str(&format!("\n分辨率: {}", video.resolution));
            }
            if video.duration > 0 {
                text.push_str(&format!("\n时长: {}", format_duration(video.duration)));
            }
            text.push_str(&format!(
                "\n大小: {}\n位置: {}",
                format_size(video.size),
                location(&filed.location)
            ));
            text
        }
    }
}

/// Success message listing every filed artifact.
pub fn success_message(files: &[FiledArtifact]) -> String {
    let blocks: Vec<String> = files.iter().map(describe).collect();
    format!("✅ 下载完成\n\n{}", blocks.join("\n\n"))
}

/// Message for a terminal failure. Tool output tails are appended verbatim.
pub fn failure_message(error: &IngestError) -> String {
    match error {
        IngestError::UnsupportedLink => "不支持的链接".to_string(),
        IngestError::PlatformDeveloping(platform) => format!("该平台功能开发中 ({})", platform),
        IngestError::DownloadFailed { reason, tail } if tail.trim().is_empty() => {
            format!("下载失败: {}", reason)
        }
        IngestError::DownloadFailed { reason, tail } => {
            format!("下载失败: {}\n{}", reason, tail.trim_end())
        }
        IngestError::DownloadTimeout(secs) => format!("下载超时 ({}s)", secs),
        IngestError::TagReadFailed(cause) => format!("读取标签失败: {}", cause),
        IngestError::DrmRemovalFailed(cause) => format!("解密失败: {}", cause),
        IngestError::FilingFailedLocal { cause, .. } => format!("文件整理失败: {}", cause),
        IngestError::FilingFailedWebDav { remote_path, cause } => {
            format!("文件整理失败: {} ({})", remote_path, cause)
        }
        IngestError::Unauthorized(_) => "没有使用权限".to_string(),
        IngestError::Cancelled => "已取消".to_string(),
    }
}
