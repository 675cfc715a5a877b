//! Static platform matcher table.
//!
//! Each matcher owns a list of hosts and one or more URL-shape patterns. The
//! table is built once on first use and never mutated afterwards.

use crate::types::LinkType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Hosts and URL shapes for one platform.
#[derive(Debug)]
pub struct Matcher {
    pub link_type: LinkType,
    pub domains: &'static [&'static str],
    patterns: Vec<Regex>,
}

impl Matcher {
    fn new(link_type: LinkType, domains: &'static [&'static str], patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            // Patterns are literals below; a bad one is a programming error
            // caught by the table tests.
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!(pattern = %p, error = %e, "Invalid matcher pattern");
                    None
                }
            })
            .collect();

        Self {
            link_type,
            domains,
            patterns,
        }
    }

    /// True when any pattern matches `url`.
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(url))
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

/// Matchers in declaration order. Fallback matching walks this order, so
/// more specific hosts (YouTube Music) come before broader ones (YouTube).
pub static MATCHERS: Lazy<Vec<Matcher>> = Lazy::new(|| {
    vec![
        Matcher::new(
            LinkType::AppleMusic,
            &["music.apple.com", "itunes.apple.com", "geo.music.apple.com"],
            &[r"^https?://(geo\.)?(music|itunes)\.apple\.com/([a-z]{2}/)?(album|song|playlist|music-video|artist)/"],
        ),
        Matcher::new(
            LinkType::NetEase,
            &["music.163.com", "y.music.163.com", "163cn.tv", "163cn.link"],
            &[
                r"^https?://(y\.)?music\.163\.com/(#/)?(m/)?(song|album|playlist|program|dj)",
                r"^https?://163cn\.(tv|link)/[A-Za-z0-9]+",
            ],
        ),
        Matcher::new(
            LinkType::QQMusic,
            &["y.qq.com", "c.y.qq.com", "i.y.qq.com", "c6.y.qq.com"],
            &[
                r"^https?://y\.qq\.com/n/ryqq/(songDetail|albumDetail|playlist)/",
                r"^https?://(c\d*|i)\.y\.qq\.com/",
            ],
        ),
        Matcher::new(
            LinkType::SoundCloud,
            &["soundcloud.com", "m.soundcloud.com", "on.soundcloud.com"],
            &[
                r"^https?://(m\.)?soundcloud\.com/[\w-]+/[\w-]+",
                r"^https?://on\.soundcloud\.com/[A-Za-z0-9]+",
            ],
        ),
        Matcher::new(
            LinkType::Spotify,
            &["open.spotify.com", "spotify.link"],
            &[
                r"^https?://open\.spotify\.com/(intl-[a-z]+/)?(track|album|playlist|artist)/[A-Za-z0-9]+",
                r"^https?://spotify\.link/[A-Za-z0-9]+",
            ],
        ),
        Matcher::new(
            LinkType::YouTubeMusic,
            &["music.youtube.com"],
            &[r"^https?://music\.youtube\.com/(watch|playlist|browse)"],
        ),
        Matcher::new(
            LinkType::Bilibili,
            &["bilibili.com", "www.bilibili.com", "m.bilibili.com", "b23.tv"],
            &[
                r"^https?://((www|m)\.)?bilibili\.com/video/(BV[A-Za-z0-9]+|av\d+)",
                r"^https?://b23\.tv/[A-Za-z0-9]+",
            ],
        ),
        Matcher::new(
            LinkType::Douyin,
            &["douyin.com", "www.douyin.com", "v.douyin.com", "www.iesdouyin.com"],
            &[
                r"^https?://(www\.)?douyin\.com/(video|note)/\d+",
                r"^https?://www\.iesdouyin\.com/share/(video|note)/\d+",
                r"^https?://v\.douyin\.com/[A-Za-z0-9_-]+",
            ],
        ),
        Matcher::new(
            LinkType::Xiaohongshu,
            &["xiaohongshu.com", "www.xiaohongshu.com", "xhslink.com"],
            &[
                r"^https?://(www\.)?xiaohongshu\.com/(explore|discovery/item)/[A-Za-z0-9]+",
                r"^https?://xhslink\.com/([a-z]/)?[A-Za-z0-9]+",
            ],
        ),
        Matcher::new(
            LinkType::YouTube,
            &["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"],
            &[
                r"^https?://((www|m)\.)?youtube\.com/(watch\?|shorts/|live/)",
                r"^https?://youtu\.be/[\w-]+",
            ],
        ),
    ]
});

/// Lower-cased host -> index into [`MATCHERS`].
static HOST_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for (i, matcher) in MATCHERS.iter().enumerate() {
        for domain in matcher.domains {
            index.entry(*domain).or_insert(i);
        }
    }
    index
});

/// Matcher owning `host`, if any. `host` must already be lower-cased.
pub fn for_host(host: &str) -> Option<&'static Matcher> {
    HOST_INDEX.get(host).map(|&i| &MATCHERS[i])
}

/// First matcher (in declaration order) whose patterns match `url`.
pub fn fallback(url: &str) -> Option<&'static Matcher> {
    MATCHERS.iter().find(|m| m.matches(url))
}
