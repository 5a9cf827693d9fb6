use std::path::Path;
use std::sync::Arc;

use confsync::file_io::open_file_for_append;
use confsync::metrics;
use confsync::LoggingListener;
use confsync::NetworkError;
use confsync::Result;
use confsync::SyncConfig;
use confsync::SyncEngineBuilder;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let mut config = SyncConfig::new()?;
    if let Some(path) = std::env::args().nth(1) {
        config = config.with_override_config(&path)?;
    }
    let config = config.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.monitoring.log_dir)?;
    info!("loaded config: {:?}", config);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    if config.monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(
            config.monitoring.prometheus_port,
            graceful_rx.clone(),
        ));
    }

    let engine = SyncEngineBuilder::new(config)
        .listener(Arc::new(LoggingListener))
        .build()?;
    engine.start().await?;

    info!("confsync started. Waiting for CTRL+C signal...");
    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    engine.shutdown().await?;
    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        NetworkError::SignalSendFailed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

/// Logs to `{log_dir}/confsync.log`, or to stdout when `log_dir` is empty
fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    let (non_blocking, guard) = if log_dir.as_os_str().is_empty() {
        tracing_appender::non_blocking(std::io::stdout())
    } else {
        let log_file = open_file_for_append(log_dir.join("confsync.log"))?;
        tracing_appender::non_blocking(log_file)
    };

    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
