//! Integration tests for configuration loading and logging setup

use bridge_traits::time::LogLevel;
use core_runtime::config::{AppConfig, TidyMode};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, ConsoleFormat, LogOutput, LoggingConfig,
};

const SAMPLE: &str = r#"{
    "cookie_cloud": {
        "enable": true,
        "cookiecloud_url": "https://cookiecloud.example.com",
        "cookiecloud_uuid": "0f1e2d3c",
        "cookiecloud_key": ["first", "second"],
        "cookie_file": "cookies.txt",
        "cookie_file_path": "data/cookies",
        "expire_time": 120
    },
    "tidy": {"mode": 1, "dist_dir": "/srv/music"},
    "log": {"mode": 2, "level": 3, "file": "bot.log"},
    "telegram": {"enable": true, "bot_token": "42:secret", "allowed_users": [1001]},
    "additional_config": {
        "enable_cron": true,
        "enable_monitor": true,
        "monitor_dirs": ["/watch/netease", "/watch/qq"],
        "download_timeout": 600
    },
    "proxy": {"enable": true, "host": "10.0.0.1", "port": 7890}
}"#;

#[test]
fn test_full_document_round_trip_through_logging_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, SAMPLE).unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.tidy_mode().unwrap(), TidyMode::Local);
    assert_eq!(config.additional_config.monitor_dirs.len(), 2);
    assert_eq!(config.download_timeout().as_secs(), 600);
    assert_eq!(config.proxy_url().as_deref(), Some("http://10.0.0.1:7890"));

    let logging = LoggingConfig::from_app(&config.log).unwrap();
    assert_eq!(logging.output, LogOutput::File);
    assert_eq!(logging.level, LogLevel::Warn);
    assert_eq!(logging.file_prefix, "bot.log");
}

#[test]
fn test_invalid_document_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "tidy:\n  mode: 0\n").unwrap();

    let err = AppConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("tidy.mode"));
}

#[test]
fn test_init_logging_writes_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let config = LoggingConfig {
        output: LogOutput::File,
        level: LogLevel::Debug,
        ..LoggingConfig::default()
    }
    .with_console_format(ConsoleFormat::Compact)
    .with_log_dir(&log_dir);

    let guard = init_logging(config).unwrap();
    tracing::info!("integration test record");
    drop(guard);

    assert!(log_dir.is_dir());

    // Only one global subscriber per process.
    assert!(init_logging(LoggingConfig::default()).is_err());
}

#[test]
fn test_redaction_of_config_secrets() {
    assert_eq!(redact_if_sensitive("bot_token", "42:secret"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("cookiecloud_key", "first"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("platform", "AppleMusic"), "AppleMusic");
}
