//! # Application Configuration
//!
//! Loads and validates the hierarchical configuration document that drives
//! every service in the process.
//!
//! ## Overview
//!
//! The document is JSON or YAML (chosen by file extension) with one section per
//! concern: `web_config`, `cookie_cloud`, `tidy`, `webdav`, `log`, `telegram`,
//! `ai`, `additional_config` and `proxy`. Every section is optional and falls
//! back to its defaults. [`AppConfig::validate`] enforces the cross-field rules
//! and fails fast with an actionable [`Error::Config`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//!
//! let config = AppConfig::load("./config.json")?;
//! let mode = config.tidy_mode()?;
//! println!("Filing into {:?}", mode);
//! ```
//!
//! ## Error Handling
//!
//! A `tidy.mode` of `0` (or anything other than 1/2) is rejected at load time
//! rather than silently producing an empty filing mode later.

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-download timeout for external tools.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub web_config: WebConfig,
    pub cookie_cloud: CookieCloudConfig,
    pub tidy: TidyConfig,
    pub webdav: WebDavConfig,
    pub log: LogConfig,
    pub telegram: TelegramConfig,
    pub ai: AiConfig,
    pub additional_config: AdditionalConfig,
    pub proxy: ProxyConfig,
}

/// HTTP admin surface. Parsed for completeness, served elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enable: bool,
    pub app_domain: String,
    pub https: bool,
    pub app_port: u16,
    pub gin_mode: String,
}

/// Remote cookie store settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieCloudConfig {
    pub enable: bool,
    pub cookiecloud_url: String,
    pub cookiecloud_uuid: String,
    /// Candidate keys, tried concurrently
    pub cookiecloud_key: Vec<String>,
    pub cookie_file: String,
    pub cookie_file_path: String,
    /// Refresh period in minutes
    pub expire_time: u64,
}

impl Default for CookieCloudConfig {
    fn default() -> Self {
        Self {
            enable: false,
            cookiecloud_url: String::new(),
            cookiecloud_uuid: String::new(),
            cookiecloud_key: Vec::new(),
            cookie_file: "cookies.txt".to_string(),
            cookie_file_path: "data/cookies".to_string(),
            expire_time: 60,
        }
    }
}

impl fmt::Debug for CookieCloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieCloudConfig")
            .field("enable", &self.enable)
            .field("cookiecloud_url", &self.cookiecloud_url)
            .field(
                "cookiecloud_uuid",
                &redact_if_sensitive("uuid_secret", &self.cookiecloud_uuid),
            )
            .field("cookiecloud_key", &format!("[{} keys]", self.cookiecloud_key.len()))
            .field("cookie_file", &self.cookie_file)
            .field("cookie_file_path", &self.cookie_file_path)
            .field("expire_time", &self.expire_time)
            .finish()
    }
}

/// Where finished artifacts go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyConfig {
    /// 1 = local directory, 2 = WebDAV
    pub mode: u8,
    pub dist_dir: String,
}

/// Filing destination selected by `tidy.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TidyMode {
    Local,
    WebDav,
}

impl TidyMode {
    pub fn from_config(mode: u8) -> Option<Self> {
        match mode {
            1 => Some(TidyMode::Local),
            2 => Some(TidyMode::WebDav),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TidyMode::Local => "LOCAL",
            TidyMode::WebDav => "WEBDAV",
        }
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDavConfig {
    pub webdav_url: String,
    pub webdav_user: String,
    pub webdav_pass: String,
    /// Base directory every remote path is joined onto
    pub webdav_dir: String,
}

impl fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("webdav_url", &self.webdav_url)
            .field("webdav_user", &self.webdav_user)
            .field("webdav_pass", &redact_if_sensitive("password", &self.webdav_pass))
            .field("webdav_dir", &self.webdav_dir)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// 1 = console, 2 = file, 3 = both
    pub mode: u8,
    /// 1 = debug .. 5 = fatal
    pub level: u8,
    /// File name prefix under `data/logs`
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            mode: 1,
            level: 2,
            file: "mediaferry.log".to_string(),
        }
    }
}

/// Chat-bot transport settings. Only `allowed_users` is consumed in-process.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enable: bool,
    /// 1 = long-poll, 2 = webhook
    pub mode: u8,
    pub chat_id: i64,
    pub bot_token: String,
    pub allowed_users: Vec<i64>,
    pub webhook_url: String,
    pub webhook_port: u16,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("enable", &self.enable)
            .field("mode", &self.mode)
            .field("chat_id", &self.chat_id)
            .field("bot_token", &redact_if_sensitive("token", &self.bot_token))
            .field("allowed_users", &self.allowed_users)
            .field("webhook_url", &self.webhook_url)
            .field("webhook_port", &self.webhook_port)
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enable: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub system_prompt: String,
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("enable", &self.enable)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact_if_sensitive("api_key", &self.api_key))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalConfig {
    pub enable_cron: bool,
    pub enable_monitor: bool,
    pub monitor_dirs: Vec<String>,
    pub enable_wrapper: bool,
    /// Seconds an external downloader may run
    pub download_timeout: u64,
    /// Root of the per-session scratch area
    pub temp_dir: String,
    pub gamdl: String,
    pub ytdlp: String,
    pub decryptor: String,
}

impl Default for AdditionalConfig {
    fn default() -> Self {
        Self {
            enable_cron: false,
            enable_monitor: false,
            monitor_dirs: Vec::new(),
            enable_wrapper: false,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            temp_dir: "data/temp".to_string(),
            gamdl: "gamdl".to_string(),
            ytdlp: "yt-dlp".to_string(),
            decryptor: "um".to_string(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enable: bool,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub auth: bool,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("enable", &self.enable)
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &redact_if_sensitive("password", &self.pass))
            .field("auth", &self.auth)
            .finish()
    }
}

impl AppConfig {
    /// Read, parse and validate the document at `path`.
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let config = if is_yaml {
            Self::from_yaml_str(&raw)?
        } else {
            Self::from_json_str(&raw)?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("Invalid YAML config: {}", e)))
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - `tidy.mode` is 1 (local, needs `dist_dir`) or 2 (WebDAV, needs `webdav_url`)
    /// - `log.mode` is within 1..=3 and `log.level` within 1..=5
    /// - an enabled cookie sync has a URL, a UUID and at least one key
    /// - an enabled directory monitor has at least one directory
    pub fn validate(&self) -> Result<()> {
        match TidyMode::from_config(self.tidy.mode) {
            Some(TidyMode::Local) => {
                if self.tidy.dist_dir.trim().is_empty() {
                    return Err(Error::Config(
                        "tidy.dist_dir is required when tidy.mode is 1 (local)".to_string(),
                    ));
                }
            }
            Some(TidyMode::WebDav) => {
                if self.webdav.webdav_url.trim().is_empty() {
                    return Err(Error::Config(
                        "webdav.webdav_url is required when tidy.mode is 2 (webdav)".to_string(),
                    ));
                }
            }
            None => {
                return Err(Error::Config(format!(
                    "tidy.mode must be 1 (local) or 2 (webdav), got {}",
                    self.tidy.mode
                )));
            }
        }

        if !(1..=3).contains(&self.log.mode) {
            return Err(Error::Config(format!(
                "log.mode must be 1 (console), 2 (file) or 3 (both), got {}",
                self.log.mode
            )));
        }

        if !(1..=5).contains(&self.log.level) {
            return Err(Error::Config(format!(
                "log.level must be between 1 (debug) and 5 (fatal), got {}",
                self.log.level
            )));
        }

        if self.cookie_cloud.enable {
            if self.cookie_cloud.cookiecloud_url.trim().is_empty()
                || self.cookie_cloud.cookiecloud_uuid.trim().is_empty()
            {
                return Err(Error::Config(
                    "cookie_cloud.cookiecloud_url and cookiecloud_uuid are required when cookie sync is enabled"
                        .to_string(),
                ));
            }
            if self.cookie_cloud.cookiecloud_key.is_empty() {
                return Err(Error::Config(
                    "cookie_cloud.cookiecloud_key needs at least one candidate key".to_string(),
                ));
            }
            if self.cookie_cloud.cookie_file.trim().is_empty() {
                return Err(Error::Config(
                    "cookie_cloud.cookie_file cannot be empty".to_string(),
                ));
            }
        }

        if self.additional_config.enable_monitor && self.additional_config.monitor_dirs.is_empty() {
            return Err(Error::Config(
                "additional_config.monitor_dirs cannot be empty when enable_monitor is set"
                    .to_string(),
            ));
        }

        if self.additional_config.download_timeout == 0 {
            return Err(Error::Config(
                "additional_config.download_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Filing mode, validated.
    pub fn tidy_mode(&self) -> Result<TidyMode> {
        TidyMode::from_config(self.tidy.mode).ok_or_else(|| {
            Error::Config(format!("Unsupported tidy.mode {}", self.tidy.mode))
        })
    }

    /// Absolute or relative path of the Netscape cookie file.
    pub fn cookie_path(&self) -> PathBuf {
        Path::new(&self.cookie_cloud.cookie_file_path).join(&self.cookie_cloud.cookie_file)
    }

    pub fn temp_root(&self) -> PathBuf {
        PathBuf::from(&self.additional_config.temp_dir)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.additional_config.download_timeout)
    }

    /// Cookie refresh period, never shorter than one minute.
    pub fn cookie_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cookie_cloud.expire_time.max(1) * 60)
    }

    /// Proxy URL for HTTP clients and downloader `--proxy` flags.
    pub fn proxy_url(&self) -> Option<String> {
        let proxy = &self.proxy;
        if !proxy.enable || proxy.host.is_empty() {
            return None;
        }

        let scheme = if proxy.scheme.is_empty() {
            "http"
        } else {
            proxy.scheme.as_str()
        };

        let credentials = if proxy.auth && !proxy.user.is_empty() {
            format!(
                "{}:{}@",
                urlencoding::encode(&proxy.user),
                urlencoding::encode(&proxy.pass)
            )
        } else {
            String::new()
        };

        Some(format!("{}://{}{}:{}", scheme, credentials, proxy.host, proxy.port))
    }
}
