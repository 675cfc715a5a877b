//! Broadcast side channel for pipeline activity.
//!
//! Ingest, the directory watcher and cookie sync publish what they did; the
//! event logger service (and any future chat front end) subscribes. Nobody
//! listening is normal, so publishers ignore the result of [`EventBus::emit`].
//!
//! A subscriber that falls behind gets `RecvError::Lagged(n)` and should keep
//! reading; `RecvError::Closed` means every publisher is gone.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::RecvError;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", content = "payload")]
pub enum CoreEvent {
    Ingest(IngestEvent),
    Watch(WatchEvent),
    CookieSync(CookieSyncEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

impl CoreEvent {
    pub fn severity(&self) -> EventSeverity {
        use CoreEvent::*;
        match self {
            Ingest(IngestEvent::Failed { .. })
            | Watch(WatchEvent::Failed { .. })
            | CookieSync(CookieSyncEvent::Failed { .. }) => EventSeverity::Error,
            Watch(WatchEvent::Dropped { .. }) => EventSeverity::Warning,
            Ingest(IngestEvent::Completed { .. })
            | Watch(WatchEvent::Filed { .. })
            | Watch(WatchEvent::Registered { .. })
            | CookieSync(CookieSyncEvent::Synced { .. }) => EventSeverity::Info,
            Ingest(IngestEvent::Started { .. }) | Ingest(IngestEvent::Stage { .. }) => {
                EventSeverity::Debug
            }
        }
    }

    /// Log line for the event; details travel in the serialized payload.
    pub fn description(&self) -> &'static str {
        match self {
            CoreEvent::Ingest(IngestEvent::Started { .. }) => "Ingest started",
            CoreEvent::Ingest(IngestEvent::Stage { .. }) => "Ingest stage changed",
            CoreEvent::Ingest(IngestEvent::Completed { .. }) => "Ingest completed",
            CoreEvent::Ingest(IngestEvent::Failed { .. }) => "Ingest failed",
            CoreEvent::Watch(WatchEvent::Registered { .. }) => "Watching directory",
            CoreEvent::Watch(WatchEvent::Dropped { .. }) => "Watch queue full, event dropped",
            CoreEvent::Watch(WatchEvent::Filed { .. }) => "Dropped file filed",
            CoreEvent::Watch(WatchEvent::Failed { .. }) => "Dropped file failed",
            CoreEvent::CookieSync(CookieSyncEvent::Synced { .. }) => "Cookie file refreshed",
            CoreEvent::CookieSync(CookieSyncEvent::Failed { .. }) => "Cookie sync failed",
        }
    }
}

/// One per chat/CLI request, keyed by the extracted URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum IngestEvent {
    Started { url: String, platform: String },
    Stage { url: String, stage: String },
    Completed { url: String, files: usize },
    Failed { url: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WatchEvent {
    Registered { dir: String },
    Dropped { path: String },
    Filed { path: String },
    Failed { path: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CookieSyncEvent {
    Synced { path: String, cookies: usize },
    Failed { stage: String, reason: String },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of subscribers reached, or an error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, broadcast::error::SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver; past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
