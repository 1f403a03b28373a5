//! Cross-crate integration flows.

pub mod concurrency;
pub mod e2e;
pub mod persistence;

use merkle_log::{
    Ed25519LogSigner, KeyValueStore, LogApi, LogConfig, LogId, LogService, ManualTimeSource,
    Timestamp, TreeMode,
};
use std::sync::Arc;

/// Seed shared by test signers so roots can be checked against one key.
pub const TEST_SEED: [u8; 32] = [0x5a; 32];

pub fn make_service<KV: KeyValueStore>(kv: KV, config: LogConfig) -> LogService<KV> {
    LogService::new(
        kv,
        Arc::new(Ed25519LogSigner::from_seed(TEST_SEED)),
        Arc::new(ManualTimeSource::new(Timestamp::from_secs(1_700_000_000))),
        config,
    )
}

/// Create and initialise a tree.
pub async fn make_log<KV: KeyValueStore + 'static>(
    service: &LogService<KV>,
    mode: TreeMode,
) -> LogId {
    let tree = service
        .create_tree(mode, "integration")
        .await
        .expect("create tree");
    service.init_log(tree.log_id).await.expect("init log");
    tree.log_id
}
