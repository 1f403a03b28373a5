//! # Log Node
//!
//! Entry point: install logging, load configuration, then run the request
//! server and the sequencer loop until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use log_node::{LogNode, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG, default info)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(version = merkle_log::VERSION, "Starting log node");

    let config = NodeConfig::load().context("failed to load configuration")?;
    let node = Arc::new(LogNode::new(config)?);
    let listener = node.bind().await?;

    let server = {
        let node = Arc::clone(&node);
        tokio::spawn(async move { node.serve(listener).await })
    };
    let runner = {
        let node = Arc::clone(&node);
        tokio::spawn(async move { node.run().await })
    };

    info!("Log node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    // Graceful shutdown
    node.shutdown();
    runner.await.context("sequencer loop panicked")?;
    server.await.context("request server panicked")?;
    info!("Log node stopped");

    Ok(())
}
