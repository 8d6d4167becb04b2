//! # MeshMQ Broker Node
//!
//! Entry point for the broker. Startup sequence:
//!
//! 1. Initialize logging (`RUST_LOG` controls the filter, `info` default)
//! 2. Load configuration (optional JSON path as the first argument,
//!    `MESHMQ_*` environment overrides)
//! 3. Open storage and assemble the broker
//! 4. Run until SIGINT or SIGTERM
//! 5. Shut down: stop sweeps, close the queue engine

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use meshmq_node::{BrokerRuntime, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config_path = std::env::args().nth(1);
    let config = NodeConfig::load(config_path.as_deref().map(Path::new))
        .context("failed to load configuration")?;

    info!(
        data_dir = %config.storage.data_dir.display(),
        namespaces = ?config.routing.designated_namespaces,
        "starting meshmq broker"
    );

    let runtime = BrokerRuntime::start(config).context("failed to start broker")?;
    info!("broker is running, press Ctrl+C to stop");

    wait_for_shutdown_signal()
        .await
        .context("failed to listen for shutdown signals")?;
    info!("shutdown signal received");

    runtime.shutdown().await.context("shutdown failed")?;
    Ok(())
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
