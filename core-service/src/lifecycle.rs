//! # Service Lifecycle
//!
//! Long-running services are declared in a static registry of
//! `name → factory`. A factory inspects the [`CoreService`] and returns
//! `None` when its service is disabled by configuration.
//!
//! [`Lifecycle::start`] launches every enabled service in its own task under
//! one [`CancellationToken`]. On shutdown the token is cancelled and each
//! service gets [`SHUTDOWN_GRACE`] to return before it is aborted.

use async_trait::async_trait;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::CoreService;

/// Time each service gets to return after cancellation.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A long-running background service.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run until `cancel` fires or the work is done.
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

pub type ServiceFactory = fn(&CoreService) -> Option<Box<dyn Service>>;

/// Ordered `name → factory` table.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    entries: Vec<(&'static str, ServiceFactory)>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in services.
    pub fn builtin() -> Self {
        crate::services::BUILTIN
            .iter()
            .fold(Self::new(), |registry, (name, factory)| {
                registry.register(*name, *factory)
            })
    }

    /// Add or replace `name`.
    pub fn register(mut self, name: &'static str, factory: ServiceFactory) -> Self {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }
}

/// Running services.
pub struct Lifecycle {
    cancel: CancellationToken,
    tasks: JoinSet<(&'static str, Result<()>)>,
    started: Vec<&'static str>,
}

impl Lifecycle {
    /// Launch every service the registry enables for `core`.
    pub fn start(core: &CoreService, registry: &ServiceRegistry, cancel: CancellationToken) -> Self {
        let mut tasks = JoinSet::new();
        let mut started = Vec::new();

        for (name, factory) in &registry.entries {
            let Some(service) = factory(core) else {
                info!(service = %name, "Service disabled");
                continue;
            };
            let token = cancel.child_token();
            let name = *name;
            tasks.spawn(async move {
                info!(service = %name, "Service started");
                let result = service.run(token).await;
                (name, result)
            });
            started.push(name);
        }

        Self {
            cancel,
            tasks,
            started,
        }
    }

    pub fn started(&self) -> &[&'static str] {
        &self.started
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for every service. Once the token is cancelled, stragglers get
    /// `grace` before they are aborted.
    pub async fn wait(mut self, grace: Duration) {
        loop {
            let next = tokio::select! {
                next = self.tasks.join_next() => next,
                _ = self.cancel.cancelled() => break,
            };
            match next {
                Some(joined) => log_exit(joined),
                None => return,
            }
        }

        let drain = async {
            while let Some(joined) = self.tasks.join_next().await {
                log_exit(joined);
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(remaining = self.tasks.len(), "Services did not stop in time, aborting");
            self.tasks.shutdown().await;
        }
        info!("All services stopped");
    }
}

fn log_exit(joined: std::result::Result<(&'static str, Result<()>), tokio::task::JoinError>) {
    match joined {
        Ok((name, Ok(()))) => info!(service = %name, "Service finished"),
        Ok((name, Err(e))) => error!(service = %name, error = %e, "Service failed"),
        Err(e) => error!(error = %e, "Service task panicked"),
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
