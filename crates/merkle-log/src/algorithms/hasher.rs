//! # RFC 6962 Tree Hasher
//!
//! Domain-separated SHA-256 hashing for Merkle tree leaves and interior nodes.
//!
//! ## Domain Separation
//!
//! - Leaf: `SHA-256(0x00 || value)`
//! - Node: `SHA-256(0x01 || left || right)`
//!
//! A leaf hash can never collide with a node hash because the first hashed
//! byte differs. The empty tree hashes to `SHA-256("")`.

use crate::domain::value_objects::Hash;
use sha2::{Digest, Sha256};

/// Prefix byte for leaf hashes.
pub const LEAF_PREFIX: u8 = 0x00;

/// Prefix byte for interior node hashes.
pub const NODE_PREFIX: u8 = 0x01;

/// Hash of a leaf value.
pub fn leaf_hash(value: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(value);
    hasher.finalize().into()
}

/// Hash of an interior node from its two children.
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Root of the tree with no leaves.
pub fn empty_root() -> Hash {
    Sha256::digest([]).into()
}
