mod api;
mod dashboard;

use anyhow::Context;
use axum::http::HeaderValue;
use clap::Parser;
use hostwatch_core::config::LoggingConfig;
use hostwatch_core::{AlertRouter, AlertSink, Config, HealthMonitor, PagerDutySink, SystemProbe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostwatch", about = "Single-host health monitor with an HTTP API and dashboard")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config/hostwatch.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            // Fatal: nothing else can start without configuration.
            eprintln!("{e}");
            eprintln!(
                "Copy config/hostwatch.toml into place or pass --config <path>."
            );
            std::process::exit(1);
        }
    };

    let _log_guard = init_tracing(&config.logging)?;
    info!("starting hostwatch");

    let probe = Arc::new(SystemProbe::new());
    // First refresh primes the CPU counters so early readings are not zero.
    probe.refresh();

    let sink: Option<Arc<dyn AlertSink>> = if config.alerting.pagerduty.enabled {
        info!("incident forwarding enabled");
        Some(Arc::new(PagerDutySink::new(
            config.alerting.pagerduty.api_key.clone(),
            config.alerting.pagerduty.service_id.clone(),
        )))
    } else {
        None
    };

    let router = AlertRouter::new(sink.clone());
    let monitor = HealthMonitor::new(config.clone(), probe.clone(), router);

    let state = Arc::new(api::AppState {
        config: config.clone(),
        probe,
        sink,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut listeners = Vec::new();

    if config.api.enabled {
        let origin: HeaderValue = format!(
            "http://{}:{}",
            config.dashboard.host, config.dashboard.port
        )
        .parse()
        .context("invalid dashboard host/port for CORS origin")?;

        let state = state.clone();
        let host = config.api.host.clone();
        let port = config.api.port;
        let shutdown = shutdown_rx.clone();
        listeners.push(tokio::spawn(async move {
            if let Err(e) = api::serve(state, host, port, origin, shutdown).await {
                error!("API listener failed: {e}");
            }
        }));
    }

    if config.dashboard.enabled {
        let config = config.clone();
        let shutdown = shutdown_rx.clone();
        listeners.push(tokio::spawn(async move {
            if let Err(e) = dashboard::serve(config, shutdown).await {
                error!("dashboard listener failed: {e}");
            }
        }));
    }

    let monitor_task = tokio::spawn(monitor.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    let _ = shutdown_tx.send(true);

    let _ = monitor_task.await;
    for listener in listeners {
        let _ = listener.await;
    }

    info!("stopped");
    Ok(())
}

/// Stdout logging always; an additional file writer when configured. The
/// returned guard must stay alive for the file writer to flush.
fn init_tracing(cfg: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    match &cfg.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let file_name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("hostwatch.log"));

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Ok(None)
        }
    }
}
