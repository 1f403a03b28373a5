//! Configuration for the log engine

use serde::{Deserialize, Serialize};

/// Log engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Maximum leaves integrated by one sequencing round.
    pub sequencer_batch_size: usize,
    /// Re-sign the latest root after this many idle seconds (0 disables).
    pub max_root_duration_secs: u64,
    /// Maximum leaves accepted or returned by a single request.
    pub max_leaves_per_request: usize,
    /// Complete tree nodes kept in the LRU cache (0 disables).
    pub node_cache_size: usize,
    /// Largest accepted leaf, value and extra data together, in bytes.
    pub max_leaf_size: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            sequencer_batch_size: 1000,
            max_root_duration_secs: 3600,
            max_leaves_per_request: 1000,
            node_cache_size: 65_536,
            max_leaf_size: 1 << 20,
        }
    }
}

impl LogConfig {
    /// Small limits for tests.
    pub fn for_testing() -> Self {
        Self {
            sequencer_batch_size: 50,
            max_root_duration_secs: 0,
            max_leaves_per_request: 100,
            node_cache_size: 256,
            max_leaf_size: 4096,
        }
    }
}
