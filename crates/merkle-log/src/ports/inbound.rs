//! # Inbound Ports (Driving Ports)
//!
//! The API the log service exposes to RPC front-ends and embedders.

use crate::domain::entities::{
    ConsistencyResult, EntryAndProof, InclusionByHashResult, InclusionResult, LatestRootResult,
    LogLeaf, QueuedLogLeaf, SignedLogRoot, Tree,
};
use crate::domain::errors::LogError;
use crate::domain::value_objects::{Hash, LogId, TreeMode, TreeState};
use async_trait::async_trait;

/// Primary log API.
///
/// Write calls report per-leaf outcomes in [`QueuedLogLeaf::status`] and only
/// fail as a whole for protocol violations or tree-level preconditions.
#[async_trait]
pub trait LogApi: Send + Sync {
    // ---------------------------------------------------------------
    // Tree administration
    // ---------------------------------------------------------------

    /// Allocate a new ACTIVE tree. It must be initialised before use.
    async fn create_tree(&self, mode: TreeMode, display_name: &str) -> Result<Tree, LogError>;

    async fn get_tree(&self, log_id: LogId) -> Result<Tree, LogError>;

    async fn list_trees(&self) -> Result<Vec<Tree>, LogError>;

    /// Only ACTIVE -> FROZEN is permitted.
    async fn set_tree_state(&self, log_id: LogId, state: TreeState) -> Result<Tree, LogError>;

    /// Sign and store the size-0 root.
    ///
    /// Fails `AlreadyInitialized` if the log already has a root.
    async fn init_log(&self, log_id: LogId) -> Result<SignedLogRoot, LogError>;

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    async fn queue_leaf(&self, log_id: LogId, leaf: LogLeaf) -> Result<QueuedLogLeaf, LogError>;

    /// Admit leaves into a LOG tree's pending queue.
    ///
    /// A leaf whose identity is already queued or integrated comes back with
    /// status `AlreadyExists` and the stored leaf.
    async fn queue_leaves(
        &self,
        log_id: LogId,
        leaves: Vec<LogLeaf>,
    ) -> Result<Vec<QueuedLogLeaf>, LogError>;

    async fn add_sequenced_leaf(
        &self,
        log_id: LogId,
        leaf: LogLeaf,
    ) -> Result<QueuedLogLeaf, LogError>;

    /// Admit caller-indexed leaves into a PREORDERED_LOG tree.
    ///
    /// The batch must be contiguous. Occupied indices succeed only when the
    /// stored entry is identical.
    async fn add_sequenced_leaves(
        &self,
        log_id: LogId,
        leaves: Vec<LogLeaf>,
    ) -> Result<Vec<QueuedLogLeaf>, LogError>;

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    async fn get_leaves_by_index(
        &self,
        log_id: LogId,
        indices: &[u64],
    ) -> Result<Vec<LogLeaf>, LogError>;

    /// Leaves `[start, start + count)`, short when the range passes the
    /// current size.
    async fn get_leaves_by_range(
        &self,
        log_id: LogId,
        start: u64,
        count: u64,
    ) -> Result<Vec<LogLeaf>, LogError>;

    async fn get_leaves_by_hash(
        &self,
        log_id: LogId,
        leaf_hashes: &[Hash],
        order_by_sequence: bool,
    ) -> Result<Vec<LogLeaf>, LogError>;

    async fn get_inclusion_proof(
        &self,
        log_id: LogId,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<InclusionResult, LogError>;

    async fn get_inclusion_proof_by_hash(
        &self,
        log_id: LogId,
        leaf_hash: &Hash,
        tree_size: u64,
        order_by_sequence: bool,
    ) -> Result<InclusionByHashResult, LogError>;

    async fn get_consistency_proof(
        &self,
        log_id: LogId,
        first_tree_size: u64,
        second_tree_size: u64,
    ) -> Result<ConsistencyResult, LogError>;

    /// Latest root; with `first_tree_size > 0` also a consistency proof from
    /// that size.
    async fn get_latest_signed_log_root(
        &self,
        log_id: LogId,
        first_tree_size: u64,
    ) -> Result<LatestRootResult, LogError>;

    /// The first root issued at `tree_size`.
    ///
    /// Fails `NotFound` if the log never reached that size.
    async fn get_signed_root_at(
        &self,
        log_id: LogId,
        tree_size: u64,
    ) -> Result<SignedLogRoot, LogError>;

    async fn get_sequenced_leaf_count(&self, log_id: LogId) -> Result<u64, LogError>;

    async fn get_entry_and_proof(
        &self,
        log_id: LogId,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<EntryAndProof, LogError>;
}
