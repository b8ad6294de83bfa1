use anyhow::{Result, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use portwatch::api::{self, ApiState};
use portwatch::config::MonitorConfig;
use portwatch::context::DockerEnv;
use portwatch::engine::Monitor;
use portwatch::models::SnapshotStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = PathBuf::from(
        std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string()),
    );
    let startup = MonitorConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let store = Arc::new(SnapshotStore::new());
    let monitor = Arc::new(Monitor::new(
        config_path,
        &startup,
        Arc::clone(&store),
        Arc::new(DockerEnv),
    ));

    let api_state = ApiState {
        store: Arc::clone(&store),
        monitor: Arc::clone(&monitor),
        refresh_on_query: startup.refresh_on_query,
    };
    let api_port = startup.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::start_server(api_port, api_state).await {
            error!("API server failed: {:#}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::clone(&monitor);
    tokio::spawn(async move {
        if let Err(e) = scheduler.run(shutdown_rx).await {
            error!("Health-check scheduler failed: {:#}", e);
        }
    });

    signal::ctrl_c().await?;
    let _ = shutdown_tx.send(true);
    info!("Shutdown signal received. Closing portwatch...");

    Ok(())
}
