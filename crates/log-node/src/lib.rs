//! # Log Node
//!
//! Hosts a [`LogService`] and drives its sequencer.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, file, environment)
//! 2. Reject the zero signing key unless in dev mode
//! 3. Acquire the sequencer lease on the data directory (file storage)
//! 4. Open storage and build the service
//! 5. Serve JSON requests on `listen_addr` and run one sequencing round per
//!    interval, both until shutdown

pub mod config;
pub mod server;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use merkle_log::{
    Ed25519LogSigner, LogConfig, LogRequestHandler, LogService, SequencerLease, SystemTimeSource,
};

pub use config::{ConfigError, NodeConfig, StorageBackend};
pub use store::NodeStore;

/// Totals for one pass over every active log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub logs: usize,
    pub leaves_integrated: usize,
    pub roots_signed: usize,
    pub failures: usize,
}

/// The running node.
pub struct LogNode {
    service: Arc<LogService<NodeStore>>,
    config: NodeConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    // Held for the life of the node; released on drop.
    _lease: Option<SequencerLease>,
}

impl LogNode {
    /// Validate `config`, take the lease and open storage.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate().context("invalid node configuration")?;

        let lease = match config.storage {
            StorageBackend::File => Some(
                SequencerLease::acquire(&config.data_dir)
                    .context("cannot acquire sequencer lease")?,
            ),
            StorageBackend::Memory => None,
        };

        let store = NodeStore::open(&config).context("cannot open log storage")?;
        let seed = config.signing_seed()?;
        let signer = Ed25519LogSigner::from_seed(seed);
        info!(
            public_key = %hex::encode(signer.verifying_key()),
            storage = ?config.storage,
            data_dir = %config.data_dir.display(),
            "Log node initialised"
        );

        let service = Arc::new(LogService::new(
            store,
            Arc::new(signer),
            Arc::new(SystemTimeSource),
            config.log.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            service,
            config,
            shutdown_tx,
            shutdown_rx,
            _lease: lease,
        })
    }

    pub fn service(&self) -> Arc<LogService<NodeStore>> {
        Arc::clone(&self.service)
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.config.log
    }

    /// One sequencing round for every active, initialised log.
    pub async fn run_round(&self) -> Result<RoundStats> {
        let sequencer = self.service.sequencer();
        let outcomes = tokio::task::spawn_blocking(move || sequencer.sequence_all())
            .await
            .context("sequencing task panicked")??;

        let mut stats = RoundStats {
            logs: outcomes.len(),
            ..Default::default()
        };
        for (_, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    stats.leaves_integrated += outcome.leaves_integrated;
                    stats.roots_signed += usize::from(outcome.root_signed);
                }
                Err(_) => stats.failures += 1,
            }
        }
        Ok(stats)
    }

    /// Run rounds every `sequence_interval_ms` until [`LogNode::shutdown`].
    pub async fn run(&self) {
        let mut shutdown = self.shutdown_rx.clone();
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.sequence_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            interval_ms = self.config.sequence_interval_ms,
            "Sequencer loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_round().await {
                        Ok(stats) if stats.failures > 0 => {
                            warn!(
                                logs = stats.logs,
                                failures = stats.failures,
                                leaves = stats.leaves_integrated,
                                "Sequencing round finished with failures"
                            );
                        }
                        Ok(stats) if stats.leaves_integrated > 0 || stats.roots_signed > 0 => {
                            info!(
                                logs = stats.logs,
                                leaves = stats.leaves_integrated,
                                roots = stats.roots_signed,
                                "Sequencing round complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Sequencing round aborted"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Sequencer loop stopping");
                    break;
                }
            }
        }
    }

    /// Bind the request server's socket on `listen_addr`.
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.listen_addr)
            .await
            .with_context(|| format!("cannot listen on {}", self.config.listen_addr))
    }

    /// Answer requests on `listener` until [`LogNode::shutdown`].
    pub async fn serve(&self, listener: TcpListener) {
        let handler = Arc::new(LogRequestHandler::new(self.service()));
        server::serve(listener, handler, self.shutdown_rx.clone()).await;
    }

    /// Signal [`LogNode::run`] and [`LogNode::serve`] to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
