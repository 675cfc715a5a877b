//! `tracing` bootstrap driven by the `log` config section.
//!
//! `log.mode` picks console, a daily rolling JSON file under `data/logs`, or
//! both; `log.level` maps onto [`LogLevel`]. `RUST_LOG` wins over both when
//! set. Writers are non-blocking, so the returned [`LoggingGuard`] has to live
//! until the process exits or buffered records are lost.

use crate::config::LogConfig;
use crate::error::{Error, Result};

use bridge_traits::time::LogLevel;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

pub const DEFAULT_LOG_DIR: &str = "data/logs";

/// Crates that are chatty at debug level.
const QUIET_DEPENDENCIES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "notify", "lofty"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl LogOutput {
    /// `log.mode`: 1 console, 2 file, 3 both.
    pub fn from_config(mode: u8) -> Option<Self> {
        match mode {
            1 => Some(LogOutput::Console),
            2 => Some(LogOutput::File),
            3 => Some(LogOutput::Both),
            _ => None,
        }
    }

    fn writes_console(self) -> bool {
        self != LogOutput::File
    }

    fn writes_file(self) -> bool {
        self != LogOutput::Console
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFormat {
    Pretty,
    Compact,
    Json,
}

impl Default for ConsoleFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ConsoleFormat::Pretty
        } else {
            ConsoleFormat::Compact
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub console_format: ConsoleFormat,
    pub log_dir: PathBuf,
    /// Prefix of the daily files, e.g. `mediaferry.log.2024-03-09`
    pub file_prefix: String,
    /// Full `EnvFilter` directive replacing the level-based default
    pub directives: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            console_format: ConsoleFormat::default(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_prefix: "mediaferry.log".to_string(),
            directives: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_app(log: &LogConfig) -> Result<Self> {
        let output = LogOutput::from_config(log.mode)
            .ok_or_else(|| Error::Config(format!("log.mode must be 1, 2 or 3, got {}", log.mode)))?;
        let level = LogLevel::from_config(log.level)
            .ok_or_else(|| Error::Config(format!("log.level must be 1..=5, got {}", log.level)))?;

        let mut config = Self {
            level,
            output,
            ..Self::default()
        };
        if !log.file.trim().is_empty() {
            config.file_prefix = log.file.trim().to_string();
        }
        Ok(config)
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_console_format(mut self, format: ConsoleFormat) -> Self {
        self.console_format = format;
        self
    }

    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        if let Ok(from_env) = EnvFilter::try_from_default_env() {
            return Ok(from_env);
        }

        let directives = match &self.directives {
            Some(custom) => custom.clone(),
            None => QUIET_DEPENDENCIES
                .iter()
                .fold(self.level.as_filter().to_string(), |acc, krate| {
                    format!("{},{}=warn", acc, krate)
                }),
        };
        EnvFilter::try_new(&directives)
            .map_err(|e| Error::Config(format!("invalid log filter {:?}: {}", directives, e)))
    }
}

/// Keeps the background writers alive; dropping it flushes them.
#[must_use = "dropping the guard stops log delivery"]
pub struct LoggingGuard {
    _writers: Vec<WorkerGuard>,
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard> {
    let filter = config.filter()?;
    let mut writers = Vec::new();

    let console = config.output.writes_console().then(|| {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        writers.push(guard);
        match config.console_format {
            ConsoleFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
            ConsoleFormat::Compact => fmt::layer().compact().with_writer(writer).boxed(),
            ConsoleFormat::Json => fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(writer)
                .boxed(),
        }
    });

    let file = if config.output.writes_file() {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            Error::Logging(format!("cannot create {}: {}", config.log_dir.display(), e))
        })?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        writers.push(guard);
        Some(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(LoggingGuard { _writers: writers })
}

/// Mask `value` when `field` names a credential. Empty stays empty.
pub fn redact_if_sensitive(field: &str, value: &str) -> String {
    const MARKERS: &[&str] = &["token", "pass", "secret", "key", "cookie", "auth"];

    let field = field.to_ascii_lowercase();
    if value.is_empty() {
        String::new()
    } else if MARKERS.iter().any(|m| field.contains(m)) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_section() {
        let section = LogConfig {
            mode: 3,
            level: 5,
            file: " bot.log ".to_string(),
        };
        let config = LoggingConfig::from_app(&section).unwrap();
        assert_eq!(config.output, LogOutput::Both);
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.file_prefix, "bot.log");
    }

    #[test]
    fn test_from_app_rejects_unknown_values() {
        let bad_mode = LogConfig {
            mode: 0,
            ..LogConfig::default()
        };
        assert!(LoggingConfig::from_app(&bad_mode).is_err());

        let bad_level = LogConfig {
            level: 9,
            ..LogConfig::default()
        };
        assert!(LoggingConfig::from_app(&bad_level).is_err());
    }

    #[test]
    fn test_default_filter_quiets_dependencies() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = LoggingConfig::default().filter().unwrap().to_string();
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("info"));
    }

    #[test]
    fn test_custom_directives() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig::default().with_directives("core_ingest=trace");
        assert!(config.filter().unwrap().to_string().contains("core_ingest=trace"));
        assert!(LoggingConfig::default()
            .with_directives("core_ingest=loud")
            .filter()
            .is_err());
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert_eq!(redact_if_sensitive("webdav_pass", "secret123"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("bot_token", "42:abc"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("cookiecloud_key", "k"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("password", ""), "");
        assert_eq!(redact_if_sensitive("platform", "AppleMusic"), "AppleMusic");
    }
}
