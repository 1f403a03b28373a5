//! Domain entities: trees, leaves, signed roots and proofs.

use crate::algorithms::hasher;
use crate::domain::errors::SerializationError;
use crate::domain::value_objects::{
    Hash, LogId, StatusCode, Timestamp, TreeMode, TreeState, HASH_SIZE,
};
use serde::{Deserialize, Serialize};

// ============================================================
// TREE
// ============================================================

/// A log and its fixed configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub log_id: LogId,
    pub mode: TreeMode,
    pub state: TreeState,
    pub display_name: String,
    pub create_time: Timestamp,
    pub update_time: Timestamp,
}

impl Tree {
    pub fn is_frozen(&self) -> bool {
        self.state == TreeState::Frozen
    }
}

// ============================================================
// LEAVES
// ============================================================

/// A single log entry.
///
/// `merkle_leaf_hash` is always derived from `leaf_value`. The identity hash
/// drives deduplication and defaults to the Merkle leaf hash. `leaf_index`
/// and the timestamps are only ever assigned by the storage layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLeaf {
    pub merkle_leaf_hash: Hash,
    pub leaf_value: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub leaf_index: Option<u64>,
    pub leaf_identity_hash: Hash,
    pub queue_timestamp: Option<Timestamp>,
    pub integrate_timestamp: Option<Timestamp>,
}

impl LogLeaf {
    /// Build a leaf from its value, deriving both hashes.
    pub fn new(leaf_value: impl Into<Vec<u8>>) -> Self {
        let leaf_value = leaf_value.into();
        let merkle_leaf_hash = hasher::leaf_hash(&leaf_value);
        Self {
            merkle_leaf_hash,
            leaf_value,
            extra_data: Vec::new(),
            leaf_index: None,
            leaf_identity_hash: merkle_leaf_hash,
            queue_timestamp: None,
            integrate_timestamp: None,
        }
    }

    pub fn with_extra_data(mut self, extra_data: impl Into<Vec<u8>>) -> Self {
        self.extra_data = extra_data.into();
        self
    }

    pub fn with_identity_hash(mut self, identity: Hash) -> Self {
        self.leaf_identity_hash = identity;
        self
    }

    /// Caller-supplied index, only honoured by PREORDERED_LOG trees.
    pub fn with_index(mut self, index: u64) -> Self {
        self.leaf_index = Some(index);
        self
    }

    pub fn is_integrated(&self) -> bool {
        self.integrate_timestamp.is_some()
    }

    /// Two submissions carry the same entry when value, extra data and
    /// identity all agree.
    pub fn same_entry(&self, other: &LogLeaf) -> bool {
        self.merkle_leaf_hash == other.merkle_leaf_hash
            && self.extra_data == other.extra_data
            && self.leaf_identity_hash == other.leaf_identity_hash
    }

    /// Recompute the Merkle leaf hash from the value; callers cannot supply it.
    pub(crate) fn rehash(mut self) -> Self {
        self.merkle_leaf_hash = hasher::leaf_hash(&self.leaf_value);
        self
    }
}

/// Outcome of submitting one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedLogLeaf {
    pub leaf: LogLeaf,
    pub status: StatusCode,
}

impl QueuedLogLeaf {
    pub fn ok(leaf: LogLeaf) -> Self {
        Self {
            leaf,
            status: StatusCode::Ok,
        }
    }

    pub fn already_exists(leaf: LogLeaf) -> Self {
        Self {
            leaf,
            status: StatusCode::AlreadyExists,
        }
    }

    pub fn failed_precondition(leaf: LogLeaf) -> Self {
        Self {
            leaf,
            status: StatusCode::FailedPrecondition,
        }
    }
}

// ============================================================
// SIGNED ROOTS
// ============================================================

/// Canonical log root, version 1.
///
/// Wire layout (big-endian):
/// `version:u16 | tree_size:u64 | len:u8 | root_hash | timestamp_nanos:u64 |
/// revision:u64 | len:u16 | metadata`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRootV1 {
    pub tree_size: u64,
    pub root_hash: Hash,
    pub timestamp: Timestamp,
    pub revision: u64,
    pub metadata: Vec<u8>,
}

impl LogRootV1 {
    pub const VERSION: u16 = 1;

    /// Bytes covered by the root signature.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 8 + 1 + HASH_SIZE + 8 + 8 + 2 + self.metadata.len());
        out.extend_from_slice(&Self::VERSION.to_be_bytes());
        out.extend_from_slice(&self.tree_size.to_be_bytes());
        out.push(HASH_SIZE as u8);
        out.extend_from_slice(&self.root_hash);
        out.extend_from_slice(&self.timestamp.as_nanos().to_be_bytes());
        out.extend_from_slice(&self.revision.to_be_bytes());
        out.extend_from_slice(&(self.metadata.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.metadata);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut reader = ByteReader::new(bytes);

        let version = u16::from_be_bytes(reader.take_array()?);
        if version != Self::VERSION {
            return Err(SerializationError::UnsupportedVersion(version));
        }
        let tree_size = u64::from_be_bytes(reader.take_array()?);
        let hash_len = reader.take(1)?[0] as usize;
        if hash_len != HASH_SIZE {
            return Err(SerializationError::InvalidLength {
                field: "root_hash",
                expected: HASH_SIZE,
                actual: hash_len,
            });
        }
        let root_hash: Hash = reader.take_array()?;
        let timestamp = Timestamp::from_nanos(u64::from_be_bytes(reader.take_array()?));
        let revision = u64::from_be_bytes(reader.take_array()?);
        let meta_len = u16::from_be_bytes(reader.take_array()?) as usize;
        let metadata = reader.take(meta_len)?.to_vec();

        if !reader.is_empty() {
            return Err(SerializationError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            tree_size,
            root_hash,
            timestamp,
            revision,
            metadata,
        })
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SerializationError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(SerializationError::Truncated),
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], SerializationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// A log root plus the signature over its canonical encoding. Immutable once
/// issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLogRoot {
    pub root: LogRootV1,
    pub signature: Vec<u8>,
}

impl SignedLogRoot {
    pub fn tree_size(&self) -> u64 {
        self.root.tree_size
    }

    pub fn root_hash(&self) -> &Hash {
        &self.root.root_hash
    }

    pub fn timestamp(&self) -> Timestamp {
        self.root.timestamp
    }

    pub fn revision(&self) -> u64 {
        self.root.revision
    }

    /// The exact bytes the signature covers.
    pub fn log_root_bytes(&self) -> Vec<u8> {
        self.root.serialize()
    }
}

// ============================================================
// PROOFS
// ============================================================

/// Audit path for one leaf, ordered from the leaf towards the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub leaf_index: u64,
    pub tree_size: u64,
    pub hashes: Vec<Hash>,
}

/// Node set proving the tree at `first_size` is a prefix of `second_size`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyProof {
    pub first_size: u64,
    pub second_size: u64,
    pub hashes: Vec<Hash>,
}

// ============================================================
// COMPOSITE READ RESULTS
// ============================================================

/// Inclusion proof together with the root it was served under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionResult {
    pub proof: InclusionProof,
    pub signed_log_root: SignedLogRoot,
}

/// Every inclusion proof for a Merkle leaf hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionByHashResult {
    pub proofs: Vec<InclusionProof>,
    pub signed_log_root: SignedLogRoot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub proof: ConsistencyProof,
    pub signed_log_root: SignedLogRoot,
}

/// Latest root, optionally with a consistency proof from a caller's size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRootResult {
    pub signed_log_root: SignedLogRoot,
    pub proof: Option<ConsistencyProof>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAndProof {
    pub leaf: LogLeaf,
    pub proof: InclusionProof,
    pub signed_log_root: SignedLogRoot,
}
