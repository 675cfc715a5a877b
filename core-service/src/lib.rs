//! Core service façade, bootstrap helpers and the service lifecycle.
//!
//! This crate wires host-provided bridge implementations (HTTP, process
//! runner, clock, remote storage) into the ingest pipeline, the directory
//! watcher and cookie sync. Server builds enable the `desktop-shims` feature
//! (which depends on `bridge-desktop` and `provider-webdav`) and call
//! [`bootstrap_desktop`].

pub mod error;
pub mod lifecycle;
pub mod services;

pub use error::{CoreError, Result};
pub use lifecycle::{shutdown_signal, Lifecycle, Service, ServiceRegistry, SHUTDOWN_GRACE};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient, process::CommandRunner, storage::RemoteStorage, time::Clock,
};
use core_cookie::CookieSync;
use core_filing::FilingEngine;
use core_ingest::{
    Decryptor, DefaultProcessorFactory, IngestService, Orchestrator, ProcessorContext,
};
use core_metadata::{artwork::CoverFetcher, TagEngine};
use core_runtime::config::AppConfig;
use core_runtime::events::EventBus;
use core_watch::DropPipeline;
use tracing::info;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub config: Arc<AppConfig>,
    pub http_client: Arc<dyn HttpClient>,
    pub runner: Arc<dyn CommandRunner>,
    pub clock: Arc<dyn Clock>,
    /// Required when `tidy.mode` is WebDAV
    pub storage: Option<Arc<dyn RemoteStorage>>,
    pub events: EventBus,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        config: AppConfig,
        http_client: Arc<dyn HttpClient>,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
        storage: Option<Arc<dyn RemoteStorage>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            http_client,
            runner,
            clock,
            storage,
            events: EventBus::default(),
        }
    }
}

/// Primary façade: every long-lived component, built once at startup.
#[derive(Clone)]
pub struct CoreService {
    deps: Arc<CoreDependencies>,
    tags: TagEngine,
    filing: FilingEngine,
    ingest: IngestService,
}

impl CoreService {
    /// Build the pipeline components from the provided dependencies.
    pub fn new(deps: CoreDependencies) -> Result<Self> {
        let config = Arc::clone(&deps.config);
        config.validate()?;

        let tags = TagEngine::new()
            .with_cover_fetcher(CoverFetcher::new(Arc::clone(&deps.http_client)));
        let filing = FilingEngine::from_config(&config, deps.storage.clone())?;

        let ctx = ProcessorContext::from_config(
            &config,
            Arc::clone(&deps.runner),
            tags.clone(),
            Arc::clone(&deps.clock),
        )?;
        let orchestrator = Orchestrator::new(
            Arc::new(DefaultProcessorFactory::new(ctx)),
            filing.clone(),
            tags.clone(),
            Arc::clone(&deps.clock),
            config.temp_root(),
        )
        .with_event_bus(deps.events.clone());
        let ingest = IngestService::new(
            Arc::new(orchestrator),
            config.telegram.allowed_users.iter().copied(),
        );

        info!(
            tidy_mode = filing.mode().as_str(),
            temp_root = %config.temp_root().display(),
            "Core service ready"
        );

        Ok(Self {
            deps: Arc::new(deps),
            tags,
            filing,
            ingest,
        })
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    pub fn config(&self) -> &AppConfig {
        &self.deps.config
    }

    pub fn events(&self) -> &EventBus {
        &self.deps.events
    }

    pub fn ingest(&self) -> &IngestService {
        &self.ingest
    }

    /// Cookie sync bound to the configured CookieCloud endpoint, or `None`
    /// when cookie sync is disabled.
    pub fn cookie_sync(&self) -> Option<CookieSync> {
        let config = self.config();
        if !config.cookie_cloud.enable {
            return None;
        }
        Some(
            CookieSync::from_config(config, Arc::clone(&self.deps.http_client))
                .with_event_bus(self.deps.events.clone()),
        )
    }

    /// Per-file pipeline for the directory watcher.
    pub fn drop_pipeline(&self) -> DropPipeline {
        let config = self.config();
        DropPipeline::new(
            Decryptor::new(
                Arc::clone(&self.deps.runner),
                config.additional_config.decryptor.clone(),
            ),
            self.tags.clone(),
            self.filing.clone(),
            Arc::clone(&self.deps.clock),
            config.temp_root(),
        )
    }
}

/// Build a [`CoreService`] with the desktop bridges: reqwest HTTP (proxied
/// when configured), tokio process runner, system clock and a WebDAV client
/// in WebDAV mode.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: AppConfig) -> Result<CoreService> {
    use bridge_desktop::{HttpClientOptions, ReqwestHttpClient, TokioCommandRunner};
    use bridge_traits::time::SystemClock;
    use core_runtime::config::TidyMode;
    use provider_webdav::WebDavClient;

    config.validate()?;

    let options = HttpClientOptions {
        proxy: config.proxy_url(),
        ..HttpClientOptions::default()
    };
    let http_client: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::with_options(options)
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?,
    );

    let storage: Option<Arc<dyn RemoteStorage>> = match config.tidy_mode()? {
        TidyMode::WebDav => Some(Arc::new(
            WebDavClient::from_config(&config.webdav, Arc::clone(&http_client)).map_err(|e| {
                CoreError::CapabilityMissing {
                    capability: "webdav".to_string(),
                    message: e.to_string(),
                }
            })?,
        )),
        TidyMode::Local => None,
    };

    CoreService::new(CoreDependencies::new(
        config,
        http_client,
        Arc::new(TokioCommandRunner::new()),
        Arc::new(SystemClock),
        storage,
    ))
}
