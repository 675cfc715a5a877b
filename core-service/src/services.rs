//! Built-in services.

use async_trait::async_trait;
use core_cookie::CookieSync;
use core_ingest::janitor::{sweep_stale_sessions, STALE_AFTER};
use core_runtime::events::{CoreEvent, EventBus, EventSeverity, RecvError};
use core_watch::{default_workers, DropPipeline, WatchManager};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::lifecycle::{Service, ServiceFactory};
use crate::CoreService;

pub const BUILTIN: &[(&str, ServiceFactory)] = &[
    ("event_logger", event_logger),
    ("janitor", janitor),
    ("cookie_sync", cookie_sync),
    ("watcher", watcher),
];

fn event_logger(core: &CoreService) -> Option<Box<dyn Service>> {
    Some(Box::new(EventLogger {
        events: core.events().clone(),
    }))
}

fn janitor(core: &CoreService) -> Option<Box<dyn Service>> {
    Some(Box::new(Janitor {
        temp_root: core.config().temp_root(),
        max_age: STALE_AFTER,
    }))
}

fn cookie_sync(core: &CoreService) -> Option<Box<dyn Service>> {
    if !core.config().additional_config.enable_cron {
        return None;
    }
    let sync = core.cookie_sync()?;
    Some(Box::new(CookieSyncService {
        sync,
        period: core.config().cookie_refresh_interval(),
    }))
}

fn watcher(core: &CoreService) -> Option<Box<dyn Service>> {
    let extra = &core.config().additional_config;
    if !extra.enable_monitor || extra.monitor_dirs.is_empty() {
        return None;
    }
    Some(Box::new(WatchService {
        pipeline: Arc::new(core.drop_pipeline()),
        dirs: extra.monitor_dirs.iter().map(PathBuf::from).collect(),
        workers: default_workers(),
        events: core.events().clone(),
    }))
}

/// Logs every [`CoreEvent`] at its severity.
pub struct EventLogger {
    pub events: EventBus,
}

fn log_event(event: &CoreEvent) {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event));
    match event.severity() {
        EventSeverity::Debug => debug!(event = %payload, "{}", event.description()),
        EventSeverity::Info => info!(event = %payload, "{}", event.description()),
        EventSeverity::Warning => warn!(event = %payload, "{}", event.description()),
        EventSeverity::Error => error!(event = %payload, "{}", event.description()),
    }
}

#[async_trait]
impl Service for EventLogger {
    fn name(&self) -> &'static str {
        "event_logger"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut rx = self.events.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = rx.recv() => match received {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event logger lagged"),
                    Err(RecvError::Closed) => return Ok(()),
                },
            }
        }
    }
}

/// One sweep of stale session directories at startup.
pub struct Janitor {
    pub temp_root: PathBuf,
    pub max_age: Duration,
}

#[async_trait]
impl Service for Janitor {
    fn name(&self) -> &'static str {
        "janitor"
    }

    async fn run(&self, _cancel: CancellationToken) -> Result<()> {
        sweep_stale_sessions(&self.temp_root, self.max_age, SystemTime::now()).await;
        Ok(())
    }
}

/// Cookie sync at start and then every `period`.
pub struct CookieSyncService {
    pub sync: CookieSync,
    pub period: Duration,
}

#[async_trait]
impl Service for CookieSyncService {
    fn name(&self) -> &'static str {
        "cookie_sync"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            period_secs = self.period.as_secs(),
            path = %self.sync.output_path().display(),
            "Cookie sync scheduled"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    // The sync logs and reports its own failures.
                    let _ = self.sync.sync_once().await;
                }
            }
        }
    }
}

/// Directory watcher over the configured drop directories.
pub struct WatchService {
    pub pipeline: Arc<DropPipeline>,
    pub dirs: Vec<PathBuf>,
    pub workers: usize,
    pub events: EventBus,
}

#[async_trait]
impl Service for WatchService {
    fn name(&self) -> &'static str {
        "watcher"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let manager = WatchManager::start(
            Arc::clone(&self.pipeline),
            self.workers,
            Some(self.events.clone()),
            cancel.clone(),
        );

        for dir in &self.dirs {
            if let Err(e) = manager.register(dir) {
                error!(dir = %dir.display(), error = %e, "Cannot watch directory");
            }
        }
        if manager.registered().is_empty() {
            warn!("No directory could be watched");
        }

        cancel.cancelled().await;
        manager.shutdown().await;
        Ok(())
    }
}
