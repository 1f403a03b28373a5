//! Key layout for log records.
//!
//! Every per-log key is `prefix | log_id:u64 BE | suffix`. Integers in
//! suffixes are big-endian so prefix scans return them in numeric order.

use crate::domain::value_objects::{Hash, LogId, NodeId};

/// Record families stored in the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// Tree record: `t:{log_id}` -> Tree
    Tree,
    /// Store metadata: `m:{name}` -> u64
    Metadata,
    /// Latest signed root: `a:{log_id}` -> SignedLogRoot
    LatestRoot,
    /// Every issued root: `r:{log_id}{revision}` -> SignedLogRoot
    RootByRevision,
    /// First root issued at a size: `s:{log_id}{tree_size}` -> revision
    RootBySize,
    /// Pending LOG-mode leaf in arrival order: `q:{log_id}{seq}` -> LogLeaf
    Queue,
    /// Next queue sequence number: `c:{log_id}` -> u64
    QueueCounter,
    /// Identity claim: `i:{log_id}{identity_hash}` -> IdentityRecord
    Identity,
    /// Integrated leaf: `l:{log_id}{leaf_index}` -> LogLeaf
    Leaf,
    /// Merkle hash index: `h:{log_id}{merkle_leaf_hash}{leaf_index}` -> ()
    LeafByHash,
    /// Pending PREORDERED_LOG leaf: `p:{log_id}{leaf_index}` -> LogLeaf
    Pending,
    /// Complete subtree node: `n:{log_id}{level:u8}{index}` -> Hash
    Node,
}

impl KeyPrefix {
    /// Get the byte prefix for this key type.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Tree => b"t:",
            KeyPrefix::Metadata => b"m:",
            KeyPrefix::LatestRoot => b"a:",
            KeyPrefix::RootByRevision => b"r:",
            KeyPrefix::RootBySize => b"s:",
            KeyPrefix::Queue => b"q:",
            KeyPrefix::QueueCounter => b"c:",
            KeyPrefix::Identity => b"i:",
            KeyPrefix::Leaf => b"l:",
            KeyPrefix::LeafByHash => b"h:",
            KeyPrefix::Pending => b"p:",
            KeyPrefix::Node => b"n:",
        }
    }

    /// Build a full key with the given suffix.
    pub fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(suffix);
        key
    }

    /// Prefix covering every record of this family for one log.
    pub fn log_prefix(&self, log_id: LogId) -> Vec<u8> {
        self.key(&log_id.to_be_bytes())
    }

    fn log_key(&self, log_id: LogId, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.log_prefix(log_id);
        key.extend_from_slice(suffix);
        key
    }

    pub fn tree_key(log_id: LogId) -> Vec<u8> {
        KeyPrefix::Tree.log_prefix(log_id)
    }

    pub fn next_tree_id_key() -> Vec<u8> {
        KeyPrefix::Metadata.key(b"next_tree_id")
    }

    pub fn latest_root_key(log_id: LogId) -> Vec<u8> {
        KeyPrefix::LatestRoot.log_prefix(log_id)
    }

    pub fn root_revision_key(log_id: LogId, revision: u64) -> Vec<u8> {
        KeyPrefix::RootByRevision.log_key(log_id, &revision.to_be_bytes())
    }

    pub fn root_size_key(log_id: LogId, tree_size: u64) -> Vec<u8> {
        KeyPrefix::RootBySize.log_key(log_id, &tree_size.to_be_bytes())
    }

    pub fn queue_key(log_id: LogId, seq: u64) -> Vec<u8> {
        KeyPrefix::Queue.log_key(log_id, &seq.to_be_bytes())
    }

    pub fn queue_counter_key(log_id: LogId) -> Vec<u8> {
        KeyPrefix::QueueCounter.log_prefix(log_id)
    }

    pub fn identity_key(log_id: LogId, identity: &Hash) -> Vec<u8> {
        KeyPrefix::Identity.log_key(log_id, identity)
    }

    pub fn leaf_key(log_id: LogId, index: u64) -> Vec<u8> {
        KeyPrefix::Leaf.log_key(log_id, &index.to_be_bytes())
    }

    pub fn leaf_hash_prefix(log_id: LogId, merkle_hash: &Hash) -> Vec<u8> {
        KeyPrefix::LeafByHash.log_key(log_id, merkle_hash)
    }

    pub fn leaf_hash_key(log_id: LogId, merkle_hash: &Hash, index: u64) -> Vec<u8> {
        let mut key = Self::leaf_hash_prefix(log_id, merkle_hash);
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    pub fn pending_key(log_id: LogId, index: u64) -> Vec<u8> {
        KeyPrefix::Pending.log_key(log_id, &index.to_be_bytes())
    }

    pub fn node_key(log_id: LogId, node: NodeId) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(9);
        suffix.push(node.level as u8);
        suffix.extend_from_slice(&node.index.to_be_bytes());
        KeyPrefix::Node.log_key(log_id, &suffix)
    }
}

/// Trailing big-endian u64 of a key, e.g. the seq of a queue key.
pub fn trailing_u64(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    let bytes: [u8; 8] = key[start..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
