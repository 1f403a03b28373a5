//! # Node Configuration
//!
//! Defaults, then an optional JSON file named by `VL_CONFIG`, then
//! environment overrides.
//!
//! ## Security Requirements
//!
//! - `signing_key` MUST NOT be the all-zero seed outside `dev_mode`
//! - The key is 32 bytes, given as 64 hex characters

use merkle_log::LogConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

pub const ENV_CONFIG: &str = "VL_CONFIG";
pub const ENV_DATA_DIR: &str = "VL_DATA_DIR";
pub const ENV_STORAGE: &str = "VL_STORAGE";
pub const ENV_LISTEN_ADDR: &str = "VL_LISTEN_ADDR";
pub const ENV_SEQUENCE_INTERVAL_MS: &str = "VL_SEQUENCE_INTERVAL_MS";
pub const ENV_BATCH_SIZE: &str = "VL_BATCH_SIZE";
pub const ENV_SIGNING_KEY: &str = "VL_SIGNING_KEY";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "SECURITY VIOLATION: signing key is the default zero value. \
         Set VL_SIGNING_KEY or provide signing_key in the config file."
    )]
    InsecureSigningKey,

    #[error("signing key must be 64 hex characters")]
    InvalidSigningKey,

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("cannot read config file {path}: {message}")]
    File { path: PathBuf, message: String },
}

/// Storage backend for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

impl std::str::FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            _ => Err(()),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Holds the storage file and the sequencer lease.
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// Address of the newline-delimited JSON request server.
    pub listen_addr: SocketAddr,
    /// Delay between sequencing rounds.
    pub sequence_interval_ms: u64,
    /// Ed25519 seed as hex.
    pub signing_key: String,
    /// Allows the zero signing key.
    pub dev_mode: bool,
    pub log: LogConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::File,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 7400)),
            sequence_interval_ms: 1_000,
            signing_key: "00".repeat(32), // MUST be overridden in production
            dev_mode: false,
            log: LogConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(storage) = lookup(ENV_STORAGE) {
            config.storage = storage.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_STORAGE,
                value: storage.clone(),
            })?;
        }
        if let Some(addr) = lookup(ENV_LISTEN_ADDR) {
            config.listen_addr = addr.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_LISTEN_ADDR,
                value: addr.clone(),
            })?;
        }
        if let Some(interval) = lookup(ENV_SEQUENCE_INTERVAL_MS) {
            config.sequence_interval_ms = parse_number(ENV_SEQUENCE_INTERVAL_MS, &interval)?;
        }
        if let Some(batch) = lookup(ENV_BATCH_SIZE) {
            config.log.sequencer_batch_size = parse_number(ENV_BATCH_SIZE, &batch)?;
        }
        if let Some(key) = lookup(ENV_SIGNING_KEY) {
            config.signing_key = key;
            info!("Loaded signing key from environment");
        }

        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::File {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config = serde_json::from_str(&contents).map_err(|e| ConfigError::File {
            path: path.clone(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Decoded signing seed.
    pub fn signing_seed(&self) -> Result<[u8; 32], ConfigError> {
        let bytes = hex::decode(self.signing_key.trim()).map_err(|_| ConfigError::InvalidSigningKey)?;
        bytes.try_into().map_err(|_| ConfigError::InvalidSigningKey)
    }

    /// Validate configuration for production readiness.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - the signing key is malformed
    /// - the signing key is all zeros and `dev_mode` is off
    /// - the sequencing interval or batch size is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seed = self.signing_seed()?;
        if seed == [0u8; 32] && !self.dev_mode {
            return Err(ConfigError::InsecureSigningKey);
        }
        if self.sequence_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sequence_interval_ms",
                value: "0".to_string(),
            });
        }
        if self.log.sequencer_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sequencer_batch_size",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
