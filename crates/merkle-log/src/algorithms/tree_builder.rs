//! # Tree Builder
//!
//! Computes roots and node hashes for any historical tree size from the set
//! of complete subtree nodes.
//!
//! ## Node Model
//!
//! Only *complete* nodes are ever stored: node `(level, index)` exists once all
//! `2^level` leaves beneath it are integrated, and it never changes afterwards.
//! Everything else (the right edge of a non-power-of-two tree, roots of past
//! sizes) is recomputed from complete nodes by splitting at the largest power
//! of two, so a node without a sibling is carried up unchanged.
//!
//! Extending the tree from size `m` to `n` creates exactly the nodes
//! `j in [m >> l, n >> l)` at each level `l`. They are held in an overlay until
//! the sequencer commits them.

use crate::algorithms::hasher;
use crate::domain::errors::LogError;
use crate::domain::value_objects::{Hash, NodeId};
use std::collections::HashMap;

/// Read access to committed complete nodes.
pub trait NodeReader {
    fn read_node(&self, id: NodeId) -> Result<Option<Hash>, LogError>;
}

impl NodeReader for HashMap<NodeId, Hash> {
    fn read_node(&self, id: NodeId) -> Result<Option<Hash>, LogError> {
        Ok(self.get(&id).copied())
    }
}

/// Largest power of two strictly less than `n`. Requires `n >= 2`.
pub fn split_point(n: u64) -> u64 {
    debug_assert!(n >= 2);
    1u64 << (63 - (n - 1).leading_zeros())
}

/// Root and node computation over a [`NodeReader`] plus uncommitted nodes.
pub struct TreeBuilder<'a, R: NodeReader + ?Sized> {
    reader: &'a R,
    overlay: HashMap<NodeId, Hash>,
}

impl<'a, R: NodeReader + ?Sized> TreeBuilder<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            overlay: HashMap::new(),
        }
    }

    /// Append `leaf_hashes` to a tree of `old_size` leaves.
    ///
    /// Returns every newly completed node in creation order (leaves first,
    /// then level by level).
    pub fn extend(
        &mut self,
        old_size: u64,
        leaf_hashes: &[Hash],
    ) -> Result<Vec<(NodeId, Hash)>, LogError> {
        let new_size = old_size
            .checked_add(leaf_hashes.len() as u64)
            .ok_or_else(|| LogError::Internal("tree size overflow".to_string()))?;

        let mut created = Vec::with_capacity(leaf_hashes.len() * 2);

        for (offset, hash) in leaf_hashes.iter().enumerate() {
            let id = NodeId::leaf(old_size + offset as u64);
            self.overlay.insert(id, *hash);
            created.push((id, *hash));
        }

        let mut level = 1u32;
        while level < 64 && (new_size >> level) > 0 {
            for index in (old_size >> level)..(new_size >> level) {
                let id = NodeId::new(level, index);
                let left = self.complete_node(NodeId::new(level - 1, index << 1))?;
                let right = self.complete_node(NodeId::new(level - 1, (index << 1) | 1))?;
                let hash = hasher::node_hash(&left, &right);
                self.overlay.insert(id, hash);
                created.push((id, hash));
            }
            level += 1;
        }

        Ok(created)
    }

    /// Root hash of the tree at size `n`.
    pub fn root_at(&self, n: u64) -> Result<Hash, LogError> {
        if n == 0 {
            return Ok(hasher::empty_root());
        }
        self.range_hash(0, n)
    }

    /// Hash of node `(level, index)` as it appears in the tree of size `n`.
    ///
    /// For a node on the right edge this is the hash of its truncated subtree.
    pub fn node_hash_at(&self, level: u32, index: u64, n: u64) -> Result<Hash, LogError> {
        let out_of_range = || {
            LogError::OutOfRange(format!(
                "node ({}, {}) does not exist at size {}",
                level, index, n
            ))
        };
        if level >= 64 {
            return Err(out_of_range());
        }
        let width = 1u64 << level;
        let start = index.checked_mul(width).ok_or_else(out_of_range)?;
        if start >= n {
            return Err(out_of_range());
        }
        let end = start.saturating_add(width).min(n);
        self.range_hash(start, end)
    }

    /// Merkle Tree Hash of leaves `[start, end)`.
    ///
    /// Every range reached from the root is aligned so that it is either a
    /// complete node or splits at its largest power of two.
    pub fn range_hash(&self, start: u64, end: u64) -> Result<Hash, LogError> {
        debug_assert!(start < end);
        let size = end - start;
        if size.is_power_of_two() && start % size == 0 {
            return self.complete_node(NodeId::new(size.trailing_zeros(), start / size));
        }
        let k = split_point(size);
        let left = self.range_hash(start, start + k)?;
        let right = self.range_hash(start + k, end)?;
        Ok(hasher::node_hash(&left, &right))
    }

    fn complete_node(&self, id: NodeId) -> Result<Hash, LogError> {
        if let Some(hash) = self.overlay.get(&id) {
            return Ok(*hash);
        }
        self.reader.read_node(id)?.ok_or_else(|| {
            LogError::Internal(format!(
                "missing tree node at level {} index {}",
                id.level, id.index
            ))
        })
    }
}
