//! # Bridge Node
//!
//! Runs a local devnet of validators gossiping attestations over an
//! in-memory mesh against a simulated ledger.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (`BRIDGE_CONFIG`, `BRIDGE_VALIDATORS`)
//! 3. Build every validator and publish the validator set
//! 4. Run until Ctrl+C, then stop every validator

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::{Devnet, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env().context("Failed to load configuration")?;

    info!("===========================================");
    info!("  Bridge Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  attestation-gossip v{}", attestation_gossip::VERSION);
    info!("===========================================");

    let devnet = Devnet::new(config).context("Failed to start validators")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner = tokio::spawn(async move { devnet.run(shutdown_rx).await });

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    shutdown_tx.send(true)?;
    runner.await?;
    info!("Shutdown complete");

    Ok(())
}
