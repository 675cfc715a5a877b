use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform label assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    AppleMusic,
    NetEase,
    QQMusic,
    SoundCloud,
    Spotify,
    YouTubeMusic,
    Bilibili,
    Douyin,
    Xiaohongshu,
    YouTube,
    Unknown,
}

/// Whether a platform yields audio tracks or videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Music,
    Video,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::AppleMusic => "AppleMusic",
            LinkType::NetEase => "NetEase",
            LinkType::QQMusic => "QQMusic",
            LinkType::SoundCloud => "SoundCloud",
            LinkType::Spotify => "Spotify",
            LinkType::YouTubeMusic => "YouTubeMusic",
            LinkType::Bilibili => "Bilibili",
            LinkType::Douyin => "Douyin",
            LinkType::Xiaohongshu => "Xiaohongshu",
            LinkType::YouTube => "YouTube",
            LinkType::Unknown => "Unknown",
        }
    }

    /// `None` for [`LinkType::Unknown`].
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            LinkType::AppleMusic
            | LinkType::NetEase
            | LinkType::QQMusic
            | LinkType::SoundCloud
            | LinkType::Spotify
            | LinkType::YouTubeMusic => Some(MediaKind::Music),
            LinkType::Bilibili | LinkType::Douyin | LinkType::Xiaohongshu | LinkType::YouTube => {
                Some(MediaKind::Video)
            }
            LinkType::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, LinkType::Unknown)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MediaKind {
    /// Directory segment under the temp root (`music` / `video`).
    pub fn as_dir(&self) -> &'static str {
        match self {
            MediaKind::Music => "music",
            MediaKind::Video => "video",
        }
    }
}

/// Canonical URL plus its platform label. Derived once per ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedLink {
    pub url: String,
    pub link_type: LinkType,
}

impl ClassifiedLink {
    /// The `("", Unknown)` sentinel.
    pub fn unknown() -> Self {
        Self {
            url: String::new(),
            link_type: LinkType::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.link_type == LinkType::Unknown
    }

    pub fn is(&self, link_type: LinkType) -> bool {
        self.link_type == link_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind() {
        assert_eq!(LinkType::AppleMusic.media_kind(), Some(MediaKind::Music));
        assert_eq!(LinkType::Douyin.media_kind(), Some(MediaKind::Video));
        assert_eq!(LinkType::Unknown.media_kind(), None);
        assert_eq!(MediaKind::Video.as_dir(), "video");
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(LinkType::QQMusic.to_string(), "QQMusic");
        let json = serde_json::to_string(&LinkType::YouTubeMusic).unwrap();
        assert_eq!(json, "\"YouTubeMusic\"");
    }

    #[test]
    fn test_unknown_sentinel() {
        let link = ClassifiedLink::unknown();
        assert!(link.is_unknown());
        assert!(link.url.is_empty());
        assert!(!link.link_type.is_known());
    }
}
