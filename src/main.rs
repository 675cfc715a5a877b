//! `mediaferry` binary: load config, start logging, then either run one
//! ingest (`--ingest`) or the long-running services until SIGINT/SIGTERM.

use anyhow::Context;
use async_trait::async_trait;
use clap::{ArgAction, Parser};
use core_ingest::ProgressSink;
use core_runtime::config::AppConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{bootstrap_desktop, shutdown_signal, Lifecycle, ServiceRegistry, SHUTDOWN_GRACE};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "mediaferry", about, version, disable_version_flag = true)]
struct Args {
    /// Configuration file (JSON, or YAML by extension)
    #[arg(short = 'c', long = "config", default_value = "./config.json")]
    config: PathBuf,

    /// Print version and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: (),

    /// Run a single ingest for this text and exit
    #[arg(long)]
    ingest: Option<String>,
}

/// Progress lines straight to stdout.
struct StdoutSink;

#[async_trait]
impl ProgressSink for StdoutSink {
    async fn send(&self, message: String) {
        println!("{}", message);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mediaferry: {}", e);
            return ExitCode::from(1);
        }
    };

    let logging = match LoggingConfig::from_app(&config.log).and_then(init_logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("mediaferry: {}", e);
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("mediaferry: cannot start runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    let code = runtime.block_on(async move {
        match run(args, config).await {
            Ok(code) => code,
            Err(e) => {
                error!(error = format!("{:#}", e), "Startup failed");
                ExitCode::from(1)
            }
        }
    });

    drop(logging);
    code
}

async fn run(args: Args, config: AppConfig) -> anyhow::Result<ExitCode> {
    let core = bootstrap_desktop(config).context("failed to build core service")?;

    if let Some(text) = args.ingest {
        let cancel = CancellationToken::new();
        let watchdog = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            watchdog.cancel();
        });

        return Ok(match core.ingest().ingest(&text, &StdoutSink, cancel).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(_) => ExitCode::from(2),
        });
    }

    info!(version = env!("CARGO_PKG_VERSION"), "mediaferry starting");
    let cancel = CancellationToken::new();
    let lifecycle = Lifecycle::start(&core, &ServiceRegistry::builtin(), cancel.clone());
    info!(services = ?lifecycle.started(), "Services running");

    shutdown_signal().await;
    info!("Shutting down");
    cancel.cancel();
    lifecycle.wait(SHUTDOWN_GRACE).await;
    Ok(ExitCode::SUCCESS)
}
