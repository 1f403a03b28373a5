//! Log Service
//!
//! Main service implementing [`LogApi`] over a [`LeafStore`].

use crate::algorithms::proofs::ProofComputer;
use crate::algorithms::tree_builder::TreeBuilder;
use crate::application::root_signer::RootSigner;
use crate::application::sequencer::Sequencer;
use crate::config::LogConfig;
use crate::domain::entities::{
    ConsistencyResult, EntryAndProof, InclusionByHashResult, InclusionResult, LatestRootResult,
    LogLeaf, QueuedLogLeaf, SignedLogRoot, Tree,
};
use crate::domain::errors::LogError;
use crate::domain::invariants::{
    check_batch_size, check_leaf_sizes, check_preordered_contiguous, check_writable,
};
use crate::domain::value_objects::{Hash, LogId, TreeMode, TreeState};
use crate::ports::inbound::LogApi;
use crate::ports::outbound::{KeyValueStore, LogSigner, TimeSource};
use crate::storage::LeafStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Log Service
///
/// Request pipeline:
/// 1. Resolve the tree (`LogNotFound`)
/// 2. Require an initial root (`FailedPrecondition`)
/// 3. Validate the request against tree state, mode and limits
/// 4. Delegate to the leaf store, proof computer or sequencer
pub struct LogService<KV: KeyValueStore> {
    store: Arc<LeafStore<KV>>,
    root_signer: Arc<RootSigner<KV>>,
    sequencer: Arc<Sequencer<KV>>,
    clock: Arc<dyn TimeSource>,
    config: LogConfig,
}

impl<KV: KeyValueStore> LogService<KV> {
    pub fn new(
        kv: KV,
        signer: Arc<dyn LogSigner>,
        clock: Arc<dyn TimeSource>,
        config: LogConfig,
    ) -> Self {
        let store = Arc::new(LeafStore::new(kv, config.node_cache_size));
        let root_signer = Arc::new(RootSigner::new(store.clone(), signer, clock.clone()));
        let sequencer = Arc::new(Sequencer::new(
            store.clone(),
            root_signer.clone(),
            clock.clone(),
            config.clone(),
        ));

        Self {
            store,
            root_signer,
            sequencer,
            clock,
            config,
        }
    }

    /// Handle to the sequencer sharing this service's store.
    pub fn sequencer(&self) -> Arc<Sequencer<KV>> {
        self.sequencer.clone()
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Public half of the root-signing key.
    pub fn public_key(&self) -> Vec<u8> {
        self.root_signer.public_key()
    }

    fn require_tree(&self, log_id: LogId) -> Result<Tree, LogError> {
        self.store
            .get_tree(log_id)?
            .ok_or(LogError::LogNotFound(log_id))
    }

    /// Tree plus its latest root; uninitialised logs fail `FailedPrecondition`.
    fn require_initialized(&self, log_id: LogId) -> Result<(Tree, SignedLogRoot), LogError> {
        let tree = self.require_tree(log_id)?;
        let root = self.root_signer.get_latest(log_id)?;
        Ok((tree, root))
    }

    fn validate_write(
        &self,
        log_id: LogId,
        mode: TreeMode,
        leaves: &[LogLeaf],
    ) -> Result<(), LogError> {
        let (tree, _) = self.require_initialized(log_id)?;
        check_writable(&tree, mode)?;
        check_batch_size(leaves.len(), self.config.max_leaves_per_request)?;
        check_leaf_sizes(leaves, self.config.max_leaf_size)
    }

    fn single(mut results: Vec<QueuedLogLeaf>) -> Result<QueuedLogLeaf, LogError> {
        results
            .pop()
            .ok_or_else(|| LogError::Internal("admission returned no result".to_string()))
    }
}

#[async_trait]
impl<KV: KeyValueStore + 'static> LogApi for LogService<KV> {
    async fn create_tree(&self, mode: TreeMode, display_name: &str) -> Result<Tree, LogError> {
        let tree = self.store.create_tree(mode, display_name, self.clock.now())?;
        info!(log_id = %tree.log_id, mode = %mode, name = display_name, "Tree created");
        Ok(tree)
    }

    async fn get_tree(&self, log_id: LogId) -> Result<Tree, LogError> {
        self.require_tree(log_id)
    }

    async fn list_trees(&self) -> Result<Vec<Tree>, LogError> {
        self.store.list_trees()
    }

    async fn set_tree_state(&self, log_id: LogId, state: TreeState) -> Result<Tree, LogError> {
        let mut tree = self.require_tree(log_id)?;
        if tree.state != TreeState::Active || state != TreeState::Frozen {
            return Err(LogError::FailedPrecondition(format!(
                "log {} cannot move from {:?} to {:?}",
                log_id, tree.state, state
            )));
        }

        tree.state = state;
        tree.update_time = self.clock.now();
        self.store.update_tree(&tree)?;

        info!(log_id = %log_id, "Tree frozen");
        Ok(tree)
    }

    async fn init_log(&self, log_id: LogId) -> Result<SignedLogRoot, LogError> {
        self.require_tree(log_id)?;
        self.root_signer.init_log(log_id)
    }

    async fn queue_leaf(&self, log_id: LogId, leaf: LogLeaf) -> Result<QueuedLogLeaf, LogError> {
        Self::single(self.queue_leaves(log_id, vec![leaf]).await?)
    }

    async fn queue_leaves(
        &self,
        log_id: LogId,
        leaves: Vec<LogLeaf>,
    ) -> Result<Vec<QueuedLogLeaf>, LogError> {
        if let Err(e) = self.validate_write(log_id, TreeMode::Log, &leaves) {
            warn!(log_id = %log_id, count = leaves.len(), error = %e, "Rejected leaf batch");
            return Err(e);
        }

        let count = leaves.len();
        let results = self.store.admit_queued(log_id, leaves, self.clock.now())?;
        debug!(log_id = %log_id, count, "QueueLeaves handled");
        Ok(results)
    }

    async fn add_sequenced_leaf(
        &self,
        log_id: LogId,
        leaf: LogLeaf,
    ) -> Result<QueuedLogLeaf, LogError> {
        Self::single(self.add_sequenced_leaves(log_id, vec![leaf]).await?)
    }

    async fn add_sequenced_leaves(
        &self,
        log_id: LogId,
        leaves: Vec<LogLeaf>,
    ) -> Result<Vec<QueuedLogLeaf>, LogError> {
        let validated = self
            .validate_write(log_id, TreeMode::PreorderedLog, &leaves)
            .and_then(|_| check_preordered_contiguous(&leaves));
        let first_index = match validated {
            Ok(first) => first,
            Err(e) => {
                warn!(log_id = %log_id, count = leaves.len(), error = %e, "Rejected leaf batch");
                return Err(e);
            }
        };

        let count = leaves.len();
        let results = self
            .store
            .admit_preordered(log_id, leaves, self.clock.now())?;
        debug!(log_id = %log_id, first_index, count, "AddSequencedLeaves handled");
        Ok(results)
    }

    async fn get_leaves_by_index(
        &self,
        log_id: LogId,
        indices: &[u64],
    ) -> Result<Vec<LogLeaf>, LogError> {
        let (_, root) = self.require_initialized(log_id)?;
        let size = root.tree_size();
        if indices.len() > self.config.max_leaves_per_request {
            return Err(LogError::InvalidArgument(format!(
                "{} indices exceed limit {}",
                indices.len(),
                self.config.max_leaves_per_request
            )));
        }

        let mut leaves = Vec::with_capacity(indices.len());
        for &index in indices {
            if index >= size {
                return Err(LogError::OutOfRange(format!(
                    "leaf index {} is not below tree size {}",
                    index, size
                )));
            }
            let leaf = self.store.leaf_at(log_id, index)?.ok_or_else(|| {
                LogError::Internal(format!("integrated leaf {} missing from store", index))
            })?;
            leaves.push(leaf);
        }
        Ok(leaves)
    }

    async fn get_leaves_by_range(
        &self,
        log_id: LogId,
        start: u64,
        count: u64,
    ) -> Result<Vec<LogLeaf>, LogError> {
        if count == 0 {
            return Err(LogError::InvalidArgument("count must be positive".to_string()));
        }
        let (_, root) = self.require_initialized(log_id)?;
        let size = root.tree_size();
        if start >= size {
            return Err(LogError::OutOfRange(format!(
                "start {} is not below tree size {}",
                start, size
            )));
        }

        let count = count.min(self.config.max_leaves_per_request as u64);
        let end = start.saturating_add(count).min(size);
        self.store.leaves_in_range(log_id, start, end)
    }

    async fn get_leaves_by_hash(
        &self,
        log_id: LogId,
        leaf_hashes: &[Hash],
        order_by_sequence: bool,
    ) -> Result<Vec<LogLeaf>, LogError> {
        let (_, root) = self.require_initialized(log_id)?;
        let size = root.tree_size();

        let mut seen = HashSet::new();
        let mut indices = Vec::new();
        for hash in leaf_hashes {
            for index in self.store.indices_for_hash(log_id, hash)? {
                if index < size && seen.insert(index) {
                    indices.push(index);
                }
            }
        }
        if order_by_sequence {
            indices.sort_unstable();
        }

        let mut leaves = Vec::with_capacity(indices.len());
        for index in indices {
            if let Some(leaf) = self.store.leaf_at(log_id, index)? {
                leaves.push(leaf);
            }
        }
        Ok(leaves)
    }

    async fn get_inclusion_proof(
        &self,
        log_id: LogId,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<InclusionResult, LogError> {
        let (_, root) = self.require_initialized(log_id)?;

        let reader = self.store.node_reader(log_id);
        let builder = TreeBuilder::new(&reader);
        let proof =
            ProofComputer::new(&builder).inclusion_proof(leaf_index, tree_size, root.tree_size())?;

        Ok(InclusionResult {
            proof,
            signed_log_root: root,
        })
    }

    async fn get_inclusion_proof_by_hash(
        &self,
        log_id: LogId,
        leaf_hash: &Hash,
        tree_size: u64,
        order_by_sequence: bool,
    ) -> Result<InclusionByHashResult, LogError> {
        let (_, root) = self.require_initialized(log_id)?;
        if tree_size == 0 || tree_size > root.tree_size() {
            return Err(LogError::OutOfRange(format!(
                "tree size {} outside 1..={}",
                tree_size,
                root.tree_size()
            )));
        }

        let mut indices: Vec<u64> = self
            .store
            .indices_for_hash(log_id, leaf_hash)?
            .into_iter()
            .filter(|index| *index < tree_size)
            .collect();
        if indices.is_empty() {
            return Err(LogError::NotFound(format!(
                "no leaf with hash {} below tree size {}",
                hex::encode(leaf_hash),
                tree_size
            )));
        }
        if order_by_sequence {
            indices.sort_unstable();
        }

        let reader = self.store.node_reader(log_id);
        let builder = TreeBuilder::new(&reader);
        let computer = ProofComputer::new(&builder);
        let proofs = indices
            .into_iter()
            .map(|index| computer.inclusion_proof(index, tree_size, root.tree_size()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InclusionByHashResult {
            proofs,
            signed_log_root: root,
        })
    }

    async fn get_consistency_proof(
        &self,
        log_id: LogId,
        first_tree_size: u64,
        second_tree_size: u64,
    ) -> Result<ConsistencyResult, LogError> {
        let (_, root) = self.require_initialized(log_id)?;

        let reader = self.store.node_reader(log_id);
        let builder = TreeBuilder::new(&reader);
        let proof = ProofComputer::new(&builder).consistency_proof(
            first_tree_size,
            second_tree_size,
            root.tree_size(),
        )?;

        Ok(ConsistencyResult {
            proof,
            signed_log_root: root,
        })
    }

    async fn get_latest_signed_log_root(
        &self,
        log_id: LogId,
        first_tree_size: u64,
    ) -> Result<LatestRootResult, LogError> {
        let (_, root) = self.require_initialized(log_id)?;
        if first_tree_size == 0 {
            return Ok(LatestRootResult {
                signed_log_root: root,
                proof: None,
            });
        }

        let size = root.tree_size();
        let reader = self.store.node_reader(log_id);
        let builder = TreeBuilder::new(&reader);
        let proof = ProofComputer::new(&builder).consistency_proof(first_tree_size, size, size)?;

        Ok(LatestRootResult {
            signed_log_root: root,
            proof: Some(proof),
        })
    }

    async fn get_signed_root_at(
        &self,
        log_id: LogId,
        tree_size: u64,
    ) -> Result<SignedLogRoot, LogError> {
        self.require_tree(log_id)?;
        self.root_signer.get_at(log_id, tree_size)
    }

    async fn get_sequenced_leaf_count(&self, log_id: LogId) -> Result<u64, LogError> {
        let (_, root) = self.require_initialized(log_id)?;
        Ok(root.tree_size())
    }

    async fn get_entry_and_proof(
        &self,
        log_id: LogId,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<EntryAndProof, LogError> {
        let (_, root) = self.require_initialized(log_id)?;
        let tree_size = tree_size.min(root.tree_size());

        let reader = self.store.node_reader(log_id);
        let builder = TreeBuilder::new(&reader);
        let proof =
            ProofComputer::new(&builder).inclusion_proof(leaf_index, tree_size, root.tree_size())?;

        let leaf = self.store.leaf_at(log_id, leaf_index)?.ok_or_else(|| {
            LogError::Internal(format!("integrated leaf {} missing from store", leaf_index))
        })?;

        Ok(EntryAndProof {
            leaf,
            proof,
            signed_log_root: root,
        })
    }
}
