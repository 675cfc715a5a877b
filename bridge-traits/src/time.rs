//! Injectable clock and the log level shared by config and logging.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Source of "now" for session names and the janitor.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    /// Local wall-clock time as `YYYYMMDDhhmmss`
    fn compact_local_stamp(&self) -> String {
        self.now()
            .with_timezone(&Local)
            .format("%Y%m%d%H%M%S")
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Map the numeric configuration level (1 debug .. 5 fatal).
    ///
    /// Fatal collapses into `Error`.
    pub fn from_config(level: u8) -> Option<Self> {
        match level {
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warn),
            4 | 5 => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
