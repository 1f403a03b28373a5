//! # Leaf Store
//!
//! Durable per-log records over a [`KeyValueStore`]: trees, signed roots, the
//! pending queue, integrated leaves and complete tree nodes.
//!
//! ## Admission
//!
//! Identity deduplication is a conditional insert: the identity key is read
//! and written under the store's write lock in the same atomic batch as the
//! queued leaf, so concurrent submitters of one identity converge on a single
//! queue entry no matter how many service handles share the store.
//!
//! ## Commit
//!
//! A sequencing round is one atomic batch: integrated leaves, their hash and
//! identity index entries, new tree nodes, the new root and the removal of the
//! drained queue entries. Nothing is visible until all of it is.

use crate::algorithms::tree_builder::NodeReader;
use crate::domain::entities::{LogLeaf, QueuedLogLeaf, SignedLogRoot, Tree};
use crate::domain::errors::{KVStoreError, LogError, SerializationError};
use crate::domain::value_objects::{
    Hash, LogId, NodeId, Timestamp, TreeMode, TreeState, HASH_SIZE,
};
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use crate::storage::keys::{trailing_u64, KeyPrefix};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::debug;

/// Where an identity hash currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityRecord {
    /// Waiting in the queue under this sequence number.
    Queued(u64),
    /// Integrated at this leaf index.
    Integrated(u64),
}

/// Everything a sequencing round writes.
#[derive(Debug)]
pub struct RoundCommit {
    pub mode: TreeMode,
    /// Newly integrated leaves with index and integrate timestamp set.
    pub integrated: Vec<LogLeaf>,
    /// Queue sequence numbers drained this round (LOG mode).
    pub drained_queue: Vec<u64>,
    /// Pending indices drained this round (PREORDERED_LOG mode).
    pub drained_pending: Vec<u64>,
    pub nodes: Vec<(NodeId, Hash)>,
    pub root: SignedLogRoot,
    /// Revision of the root the round started from.
    pub base_revision: u64,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    Ok(bincode::deserialize(bytes)?)
}

fn decode_hash(bytes: &[u8]) -> Result<Hash, SerializationError> {
    bytes
        .try_into()
        .map_err(|_| SerializationError::InvalidLength {
            field: "node hash",
            expected: HASH_SIZE,
            actual: bytes.len(),
        })
}

pub struct LeafStore<KV: KeyValueStore> {
    kv: RwLock<KV>,
    node_cache: Option<Mutex<LruCache<(LogId, NodeId), Hash>>>,
}

impl<KV: KeyValueStore> LeafStore<KV> {
    /// Wrap a store. A `node_cache_size` of zero disables node caching.
    pub fn new(kv: KV, node_cache_size: usize) -> Self {
        let node_cache = NonZeroUsize::new(node_cache_size).map(|n| Mutex::new(LruCache::new(n)));
        Self {
            kv: RwLock::new(kv),
            node_cache,
        }
    }

    fn get_record<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, LogError> {
        match self.kv.read().get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // =========================================================
    // TREES
    // =========================================================

    /// Allocate the next log id and store an ACTIVE tree under it.
    pub fn create_tree(
        &self,
        mode: TreeMode,
        display_name: &str,
        now: Timestamp,
    ) -> Result<Tree, LogError> {
        let mut kv = self.kv.write();

        let counter_key = KeyPrefix::next_tree_id_key();
        let next_id = match kv.get(&counter_key)? {
            Some(bytes) => decode::<u64>(&bytes)?,
            None => 1,
        };

        let tree = Tree {
            log_id: LogId(next_id),
            mode,
            state: TreeState::Active,
            display_name: display_name.to_string(),
            create_time: now,
            update_time: now,
        };

        kv.atomic_batch_write(vec![
            BatchOperation::put(KeyPrefix::tree_key(tree.log_id), encode(&tree)?),
            BatchOperation::put(counter_key, encode(&(next_id + 1))?),
        ])?;

        Ok(tree)
    }

    pub fn get_tree(&self, log_id: LogId) -> Result<Option<Tree>, LogError> {
        self.get_record(&KeyPrefix::tree_key(log_id))
    }

    pub fn list_trees(&self) -> Result<Vec<Tree>, LogError> {
        let entries = self.kv.read().prefix_scan(KeyPrefix::Tree.as_bytes())?;
        entries
            .iter()
            .map(|(_, value)| decode::<Tree>(value).map_err(LogError::from))
            .collect()
    }

    pub fn update_tree(&self, tree: &Tree) -> Result<(), LogError> {
        self.kv
            .write()
            .put(&KeyPrefix::tree_key(tree.log_id), &encode(tree)?)?;
        Ok(())
    }

    // =========================================================
    // ROOTS
    // =========================================================

    pub fn latest_root(&self, log_id: LogId) -> Result<Option<SignedLogRoot>, LogError> {
        self.get_record(&KeyPrefix::latest_root_key(log_id))
    }

    pub fn root_by_revision(
        &self,
        log_id: LogId,
        revision: u64,
    ) -> Result<Option<SignedLogRoot>, LogError> {
        self.get_record(&KeyPrefix::root_revision_key(log_id, revision))
    }

    /// The first root issued at `tree_size`.
    pub fn root_at_size(
        &self,
        log_id: LogId,
        tree_size: u64,
    ) -> Result<Option<SignedLogRoot>, LogError> {
        let revision: Option<u64> = self.get_record(&KeyPrefix::root_size_key(log_id, tree_size))?;
        match revision {
            Some(revision) => self.root_by_revision(log_id, revision),
            None => Ok(None),
        }
    }

    fn root_ops(
        kv: &KV,
        log_id: LogId,
        root: &SignedLogRoot,
    ) -> Result<Vec<BatchOperation>, LogError> {
        let encoded = encode(root)?;
        let mut ops = vec![
            BatchOperation::put(KeyPrefix::latest_root_key(log_id), encoded.clone()),
            BatchOperation::put(
                KeyPrefix::root_revision_key(log_id, root.revision()),
                encoded,
            ),
        ];
        let size_key = KeyPrefix::root_size_key(log_id, root.tree_size());
        if !kv.exists(&size_key)? {
            ops.push(BatchOperation::put(size_key, encode(&root.revision())?));
        }
        Ok(ops)
    }

    fn check_base_revision(
        kv: &KV,
        log_id: LogId,
        base_revision: u64,
    ) -> Result<(), LogError> {
        let latest: Option<SignedLogRoot> = match kv.get(&KeyPrefix::latest_root_key(log_id))? {
            Some(bytes) => Some(decode(&bytes)?),
            None => None,
        };
        match latest {
            Some(root) if root.revision() == base_revision => Ok(()),
            Some(root) => Err(LogError::Unavailable(format!(
                "log {} advanced to revision {} during the round (expected {})",
                log_id,
                root.revision(),
                base_revision
            ))),
            None => Err(LogError::FailedPrecondition(format!(
                "log {} is not initialized",
                log_id
            ))),
        }
    }

    /// Store the size-0 root of a fresh log.
    pub fn init_root(&self, log_id: LogId, root: &SignedLogRoot) -> Result<(), LogError> {
        let mut kv = self.kv.write();
        if kv.exists(&KeyPrefix::latest_root_key(log_id))? {
            return Err(LogError::AlreadyInitialized(log_id));
        }
        let ops = Self::root_ops(&kv, log_id, root)?;
        kv.atomic_batch_write(ops)?;
        Ok(())
    }

    /// Store a re-signed root for an unchanged tree size.
    pub fn store_root(
        &self,
        log_id: LogId,
        root: &SignedLogRoot,
        base_revision: u64,
    ) -> Result<(), LogError> {
        let mut kv = self.kv.write();
        Self::check_base_revision(&kv, log_id, base_revision)?;
        let ops = Self::root_ops(&kv, log_id, root)?;
        kv.atomic_batch_write(ops)?;
        Ok(())
    }

    // =========================================================
    // ADMISSION
    // =========================================================

    /// Conditionally insert LOG-mode leaves into the pending queue.
    ///
    /// Leaves whose identity is already queued or integrated, or repeated
    /// within this call, come back as `AlreadyExists` with the stored leaf.
    pub fn admit_queued(
        &self,
        log_id: LogId,
        leaves: Vec<LogLeaf>,
        now: Timestamp,
    ) -> Result<Vec<QueuedLogLeaf>, LogError> {
        let mut kv = self.kv.write();

        let counter_key = KeyPrefix::queue_counter_key(log_id);
        let mut next_seq = match kv.get(&counter_key)? {
            Some(bytes) => decode::<u64>(&bytes)?,
            None => 0,
        };

        let mut ops = Vec::with_capacity(leaves.len() * 2 + 1);
        let mut admitted: HashMap<Hash, LogLeaf> = HashMap::new();
        let mut results = Vec::with_capacity(leaves.len());

        for leaf in leaves {
            let mut leaf = leaf.rehash();
            leaf.leaf_index = None;
            leaf.integrate_timestamp = None;

            if let Some(earlier) = admitted.get(&leaf.leaf_identity_hash) {
                results.push(QueuedLogLeaf::already_exists(earlier.clone()));
                continue;
            }

            let identity_key = KeyPrefix::identity_key(log_id, &leaf.leaf_identity_hash);
            let existing = match kv.get(&identity_key)? {
                Some(bytes) => Some(decode::<IdentityRecord>(&bytes)?),
                None => None,
            };

            match existing {
                Some(record) => {
                    let stored_key = match record {
                        IdentityRecord::Queued(seq) => KeyPrefix::queue_key(log_id, seq),
                        IdentityRecord::Integrated(index) => KeyPrefix::leaf_key(log_id, index),
                    };
                    let stored = kv.get(&stored_key)?.ok_or_else(|| {
                        KVStoreError::CorruptionError {
                            message: format!(
                                "identity {} points at missing {:?}",
                                hex::encode(leaf.leaf_identity_hash),
                                record
                            ),
                        }
                    })?;
                    results.push(QueuedLogLeaf::already_exists(decode(&stored)?));
                }
                None => {
                    leaf.queue_timestamp = Some(now);
                    ops.push(BatchOperation::put(
                        KeyPrefix::queue_key(log_id, next_seq),
                        encode(&leaf)?,
                    ));
                    ops.push(BatchOperation::put(
                        identity_key,
                        encode(&IdentityRecord::Queued(next_seq))?,
                    ));
                    next_seq += 1;
                    admitted.insert(leaf.leaf_identity_hash, leaf.clone());
                    results.push(QueuedLogLeaf::ok(leaf));
                }
            }
        }

        if !ops.is_empty() {
            ops.push(BatchOperation::put(counter_key, encode(&next_seq)?));
            kv.atomic_batch_write(ops)?;
        }

        debug!(
            log_id = %log_id,
            admitted = admitted.len(),
            total = results.len(),
            "Leaves queued"
        );
        Ok(results)
    }

    /// Insert caller-indexed leaves into the pending set of a PREORDERED_LOG
    /// tree. Contiguity of the batch is checked by the caller.
    ///
    /// An occupied index (integrated or pending) yields `Ok` with the stored
    /// leaf when identical and `FailedPrecondition` otherwise.
    pub fn admit_preordered(
        &self,
        log_id: LogId,
        leaves: Vec<LogLeaf>,
        now: Timestamp,
    ) -> Result<Vec<QueuedLogLeaf>, LogError> {
        let mut kv = self.kv.write();
        let mut ops = Vec::with_capacity(leaves.len());
        let mut results = Vec::with_capacity(leaves.len());

        for leaf in leaves {
            let mut leaf = leaf.rehash();
            leaf.integrate_timestamp = None;
            let index = leaf.leaf_index.ok_or_else(|| {
                LogError::FailedPrecondition("pre-ordered leaf without an index".to_string())
            })?;

            let occupant = match kv.get(&KeyPrefix::leaf_key(log_id, index))? {
                Some(bytes) => Some(bytes),
                None => kv.get(&KeyPrefix::pending_key(log_id, index))?,
            };

            match occupant {
                Some(bytes) => {
                    let stored: LogLeaf = decode(&bytes)?;
                    if stored.same_entry(&leaf) {
                        results.push(QueuedLogLeaf::ok(stored));
                    } else {
                        results.push(QueuedLogLeaf::failed_precondition(leaf));
                    }
                }
                None => {
                    leaf.queue_timestamp = Some(now);
                    ops.push(BatchOperation::put(
                        KeyPrefix::pending_key(log_id, index),
                        encode(&leaf)?,
                    ));
                    results.push(QueuedLogLeaf::ok(leaf));
                }
            }
        }

        if !ops.is_empty() {
            kv.atomic_batch_write(ops)?;
        }
        Ok(results)
    }

    // =========================================================
    // SEQUENCING
    // =========================================================

    /// Up to `limit` queued leaves in arrival order, with their sequence numbers.
    pub fn queued_leaves(&self, log_id: LogId, limit: usize) -> Result<Vec<(u64, LogLeaf)>, LogError> {
        let entries = self
            .kv
            .read()
            .prefix_scan_limit(&KeyPrefix::Queue.log_prefix(log_id), limit)?;

        entries
            .iter()
            .map(|(key, value)| -> Result<(u64, LogLeaf), LogError> {
                let seq = trailing_u64(key).ok_or_else(|| KVStoreError::CorruptionError {
                    message: "malformed queue key".to_string(),
                })?;
                Ok((seq, decode(value)?))
            })
            .collect()
    }

    pub fn identity_record(
        &self,
        log_id: LogId,
        identity: &Hash,
    ) -> Result<Option<IdentityRecord>, LogError> {
        self.get_record(&KeyPrefix::identity_key(log_id, identity))
    }

    /// The contiguous run of pending pre-ordered leaves starting at `from`.
    pub fn pending_run(
        &self,
        log_id: LogId,
        from: u64,
        limit: usize,
    ) -> Result<Vec<LogLeaf>, LogError> {
        let kv = self.kv.read();
        let mut run = Vec::new();
        let mut next = from;
        while run.len() < limit {
            match kv.get(&KeyPrefix::pending_key(log_id, next))? {
                Some(bytes) => run.push(decode(&bytes)?),
                None => break,
            }
            next += 1;
        }
        Ok(run)
    }

    /// Number of pending pre-ordered leaves (including ones behind a gap).
    pub fn pending_count(&self, log_id: LogId) -> Result<usize, LogError> {
        Ok(self
            .kv
            .read()
            .prefix_scan(&KeyPrefix::Pending.log_prefix(log_id))?
            .len())
    }

    /// Number of leaves waiting in the LOG-mode queue.
    pub fn queue_len(&self, log_id: LogId) -> Result<usize, LogError> {
        Ok(self
            .kv
            .read()
            .prefix_scan(&KeyPrefix::Queue.log_prefix(log_id))?
            .len())
    }

    /// Drop transient duplicate queue entries without integrating them.
    pub fn discard_queued(&self, log_id: LogId, seqs: &[u64]) -> Result<(), LogError> {
        if seqs.is_empty() {
            return Ok(());
        }
        let ops = seqs
            .iter()
            .map(|seq| BatchOperation::delete(KeyPrefix::queue_key(log_id, *seq)))
            .collect();
        self.kv.write().atomic_batch_write(ops)?;
        Ok(())
    }

    /// Apply a sequencing round atomically.
    ///
    /// Fails without side effects if another writer moved the latest root
    /// since `base_revision`, or if the store rejects the batch.
    pub fn commit_round(&self, log_id: LogId, commit: &RoundCommit) -> Result<(), LogError> {
        let mut kv = self.kv.write();
        Self::check_base_revision(&kv, log_id, commit.base_revision)?;

        let mut ops = Vec::with_capacity(
            commit.integrated.len() * 3
                + commit.drained_queue.len()
                + commit.drained_pending.len()
                + commit.nodes.len()
                + 3,
        );

        for seq in &commit.drained_queue {
            ops.push(BatchOperation::delete(KeyPrefix::queue_key(log_id, *seq)));
        }
        for index in &commit.drained_pending {
            ops.push(BatchOperation::delete(KeyPrefix::pending_key(log_id, *index)));
        }

        for leaf in &commit.integrated {
            let index = leaf.leaf_index.ok_or_else(|| {
                LogError::Internal("integrated leaf without an index".to_string())
            })?;
            ops.push(BatchOperation::put(
                KeyPrefix::leaf_key(log_id, index),
                encode(leaf)?,
            ));
            ops.push(BatchOperation::put(
                KeyPrefix::leaf_hash_key(log_id, &leaf.merkle_leaf_hash, index),
                Vec::new(),
            ));
            if commit.mode == TreeMode::Log {
                ops.push(BatchOperation::put(
                    KeyPrefix::identity_key(log_id, &leaf.leaf_identity_hash),
                    encode(&IdentityRecord::Integrated(index))?,
                ));
            }
        }

        for (node, hash) in &commit.nodes {
            ops.push(BatchOperation::put(
                KeyPrefix::node_key(log_id, *node),
                hash.to_vec(),
            ));
        }

        ops.extend(Self::root_ops(&kv, log_id, &commit.root)?);
        kv.atomic_batch_write(ops)?;
        drop(kv);

        if let Some(cache) = &self.node_cache {
            let mut cache = cache.lock();
            for (node, hash) in &commit.nodes {
                cache.put((log_id, *node), *hash);
            }
        }
        Ok(())
    }

    // =========================================================
    // READS
    // =========================================================

    pub fn leaf_at(&self, log_id: LogId, index: u64) -> Result<Option<LogLeaf>, LogError> {
        self.get_record(&KeyPrefix::leaf_key(log_id, index))
    }

    /// Integrated leaves `[start, end)`; stops early at the first gap.
    pub fn leaves_in_range(
        &self,
        log_id: LogId,
        start: u64,
        end: u64,
    ) -> Result<Vec<LogLeaf>, LogError> {
        let kv = self.kv.read();
        let mut leaves = Vec::with_capacity(end.saturating_sub(start).min(1024) as usize);
        for index in start..end {
            match kv.get(&KeyPrefix::leaf_key(log_id, index))? {
                Some(bytes) => leaves.push(decode(&bytes)?),
                None => break,
            }
        }
        Ok(leaves)
    }

    /// Indices of integrated leaves with this Merkle leaf hash, ascending.
    pub fn indices_for_hash(&self, log_id: LogId, merkle_hash: &Hash) -> Result<Vec<u64>, LogError> {
        let entries = self
            .kv
            .read()
            .prefix_scan(&KeyPrefix::leaf_hash_prefix(log_id, merkle_hash))?;
        Ok(entries
            .iter()
            .filter_map(|(key, _)| trailing_u64(key))
            .collect())
    }

    /// Node lookups for one log, served from the LRU cache when possible.
    pub fn node_reader(&self, log_id: LogId) -> LogNodeReader<'_, KV> {
        LogNodeReader {
            store: self,
            log_id,
        }
    }

    fn read_node(&self, log_id: LogId, node: NodeId) -> Result<Option<Hash>, LogError> {
        if let Some(cache) = &self.node_cache {
            if let Some(hash) = cache.lock().get(&(log_id, node)) {
                return Ok(Some(*hash));
            }
        }

        let bytes = self.kv.read().get(&KeyPrefix::node_key(log_id, node))?;
        let hash = match bytes {
            Some(bytes) => decode_hash(&bytes)?,
            None => return Ok(None),
        };

        if let Some(cache) = &self.node_cache {
            cache.lock().put((log_id, node), hash);
        }
        Ok(Some(hash))
    }
}

/// [`NodeReader`] bound to one log.
pub struct LogNodeReader<'a, KV: KeyValueStore> {
    store: &'a LeafStore<KV>,
    log_id: LogId,
}

impl<KV: KeyValueStore> NodeReader for LogNodeReader<'_, KV> {
    fn read_node(&self, id: NodeId) -> Result<Option<Hash>, LogError> {
        self.store.read_node(self.log_id, id)
    }
}
