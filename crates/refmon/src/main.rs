use anyhow::Context;
use refmon::{Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            MonitorConfig::load(&path).with_context(|| format!("loading config {path}"))?
        }
        None => {
            tracing::warn!("no config file given, using defaults (no scripts mapped)");
            MonitorConfig::default()
        }
    };

    let monitor = Monitor::start(config).await.context("starting monitor")?;

    wait_for_shutdown_signal()
        .await
        .context("installing signal handlers")?;
    tracing::info!("shutdown signal received");
    monitor.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
