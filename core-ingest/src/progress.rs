//! Progress reporting back to the requester.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Stage messages shown to the user.
pub mod stage {
    pub const CLASSIFY: &str = "正在识别链接";
    pub const DOWNLOAD: &str = "开始下载";
    pub const DOWNLOADED: &str = "下载完成，正在整理";
    pub const DECRYPT: &str = "正在解密";
    pub const FILE: &str = "正在归档";
}

/// Minimum gap between forwarded tool lines.
pub const TOOL_LINE_INTERVAL: Duration = Duration::from_secs(1);

/// Longest tool line forwarded, in characters.
const MAX_TOOL_LINE: usize = 200;

/// Receives human-readable progress messages.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send(&self, message: String);
}

/// Forwards messages into an unbounded channel. A closed channel is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn send(&self, message: String) {
        let _ = self.tx.send(message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ProgressSink for NoopSink {
    async fn send(&self, _message: String) {}
}

/// Admits at most one line per interval.
#[derive(Debug)]
pub struct LineThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LineThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a line arriving at `now` should be forwarded.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for LineThrottle {
    fn default() -> Self {
        Self::new(TOOL_LINE_INTERVAL)
    }
}

/// Trim a raw tool line for display. `None` for blank lines.
pub fn tidy_tool_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= MAX_TOOL_LINE {
        return Some(trimmed.to_string());
    }
    let mut cut: String = trimmed.chars().take(MAX_TOOL_LINE).collect();
    cut.push('…');
    Some(cut)
}
