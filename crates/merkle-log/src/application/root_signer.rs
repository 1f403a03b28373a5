//! Root signer: the only producer of [`SignedLogRoot`]s.

use crate::algorithms::hasher;
use crate::domain::entities::{LogRootV1, SignedLogRoot};
use crate::domain::errors::LogError;
use crate::domain::value_objects::{Hash, LogId};
use crate::ports::outbound::{KeyValueStore, LogSigner, TimeSource};
use crate::storage::LeafStore;
use std::sync::Arc;
use tracing::info;

pub struct RootSigner<KV: KeyValueStore> {
    store: Arc<LeafStore<KV>>,
    signer: Arc<dyn LogSigner>,
    clock: Arc<dyn TimeSource>,
}

impl<KV: KeyValueStore> RootSigner<KV> {
    pub fn new(
        store: Arc<LeafStore<KV>>,
        signer: Arc<dyn LogSigner>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            signer,
            clock,
        }
    }

    /// Sign `(tree_size, root_hash)` as the successor of `previous`.
    ///
    /// Revisions increase by one per root and timestamps never go backwards,
    /// even if the clock does. The result is not persisted.
    pub fn sign(
        &self,
        tree_size: u64,
        root_hash: Hash,
        previous: Option<&SignedLogRoot>,
    ) -> Result<SignedLogRoot, LogError> {
        let mut timestamp = self.clock.now();
        let mut revision = 0;
        if let Some(prev) = previous {
            timestamp = timestamp.max(prev.timestamp());
            revision = prev.revision() + 1;
        }

        let root = LogRootV1 {
            tree_size,
            root_hash,
            timestamp,
            revision,
            metadata: Vec::new(),
        };
        let signature = self.signer.sign(&root.serialize())?;

        Ok(SignedLogRoot { root, signature })
    }

    /// Issue and store the size-0 root of a new log.
    pub fn init_log(&self, log_id: LogId) -> Result<SignedLogRoot, LogError> {
        if self.store.latest_root(log_id)?.is_some() {
            return Err(LogError::AlreadyInitialized(log_id));
        }
        let root = self.sign(0, hasher::empty_root(), None)?;
        self.store.init_root(log_id, &root)?;

        info!(log_id = %log_id, "Log initialized");
        Ok(root)
    }

    /// Re-sign the latest root with a fresh timestamp, same size and hash.
    pub fn refresh(&self, log_id: LogId, latest: &SignedLogRoot) -> Result<SignedLogRoot, LogError> {
        let root = self.sign(latest.tree_size(), *latest.root_hash(), Some(latest))?;
        self.store.store_root(log_id, &root, latest.revision())?;

        info!(
            log_id = %log_id,
            tree_size = root.tree_size(),
            revision = root.revision(),
            "Root re-signed"
        );
        Ok(root)
    }

    /// Latest root; `FailedPrecondition` before the log is initialised.
    pub fn get_latest(&self, log_id: LogId) -> Result<SignedLogRoot, LogError> {
        self.store.latest_root(log_id)?.ok_or_else(|| {
            LogError::FailedPrecondition(format!("log {} is not initialized", log_id))
        })
    }

    /// The first root issued at `tree_size`.
    pub fn get_at(&self, log_id: LogId, tree_size: u64) -> Result<SignedLogRoot, LogError> {
        self.store.root_at_size(log_id, tree_size)?.ok_or_else(|| {
            LogError::NotFound(format!("no root issued for log {} at size {}", log_id, tree_size))
        })
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.signer.public_key()
    }
}
