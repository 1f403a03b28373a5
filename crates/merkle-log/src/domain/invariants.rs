//! Domain invariants for the log engine.
//!
//! Request-level checks shared by the service and the sequencer. Each returns
//! the error kind the caller must see when the invariant does not hold.

use super::entities::{LogLeaf, Tree};
use super::errors::LogError;
use super::value_objects::TreeMode;

/// Inclusion proofs need `leaf_index < tree_size <= current_size`.
pub fn check_inclusion_range(
    leaf_index: u64,
    tree_size: u64,
    current_size: u64,
) -> Result<(), LogError> {
    if tree_size > current_size {
        return Err(LogError::OutOfRange(format!(
            "tree_size {} exceeds current size {}",
            tree_size, current_size
        )));
    }
    if leaf_index >= tree_size {
        return Err(LogError::OutOfRange(format!(
            "leaf_index {} is not below tree_size {}",
            leaf_index, tree_size
        )));
    }
    Ok(())
}

/// Consistency proofs need `0 < first <= second <= current_size`.
pub fn check_consistency_range(first: u64, second: u64, current_size: u64) -> Result<(), LogError> {
    if first == 0 {
        return Err(LogError::OutOfRange(
            "first_tree_size must be positive".to_string(),
        ));
    }
    if first > second {
        return Err(LogError::OutOfRange(format!(
            "first_tree_size {} exceeds second_tree_size {}",
            first, second
        )));
    }
    if second > current_size {
        return Err(LogError::OutOfRange(format!(
            "second_tree_size {} exceeds current size {}",
            second, current_size
        )));
    }
    Ok(())
}

/// Writes are only accepted by ACTIVE trees of the matching mode.
pub fn check_writable(tree: &Tree, expected: TreeMode) -> Result<(), LogError> {
    if tree.is_frozen() {
        return Err(LogError::FailedPrecondition(format!(
            "log {} is frozen",
            tree.log_id
        )));
    }
    if tree.mode != expected {
        return Err(LogError::FailedPrecondition(format!(
            "log {} is a {} tree, operation requires {}",
            tree.log_id, tree.mode, expected
        )));
    }
    Ok(())
}

/// Batch size must be in `1..=max`.
pub fn check_batch_size(len: usize, max: usize) -> Result<(), LogError> {
    if len == 0 {
        return Err(LogError::InvalidArgument("empty leaf batch".to_string()));
    }
    if len > max {
        return Err(LogError::InvalidArgument(format!(
            "batch of {} leaves exceeds limit {}",
            len, max
        )));
    }
    Ok(())
}

/// Each leaf's value plus extra data must fit in `max` bytes.
pub fn check_leaf_sizes(leaves: &[LogLeaf], max: usize) -> Result<(), LogError> {
    for (position, leaf) in leaves.iter().enumerate() {
        let size = leaf.leaf_value.len().saturating_add(leaf.extra_data.len());
        if size > max {
            return Err(LogError::InvalidArgument(format!(
                "leaf {} is {} bytes, limit is {}",
                position, size, max
            )));
        }
    }
    Ok(())
}

/// Pre-ordered batches carry indices `i0, i0 + 1, i0 + 2, ...` in submitted
/// order. Returns the first index.
pub fn check_preordered_contiguous(leaves: &[LogLeaf]) -> Result<u64, LogError> {
    let mut expected: Option<u64> = None;
    for leaf in leaves {
        let index = leaf.leaf_index.ok_or_else(|| {
            LogError::FailedPrecondition("pre-ordered leaf without an index".to_string())
        })?;
        if let Some(want) = expected {
            if index != want {
                return Err(LogError::FailedPrecondition(format!(
                    "non-contiguous indices: expected {}, got {}",
                    want, index
                )));
            }
        }
        expected = Some(index.checked_add(1).ok_or_else(|| {
            LogError::InvalidArgument("leaf index overflow".to_string())
        })?);
    }
    leaves
        .first()
        .and_then(|leaf| leaf.leaf_index)
        .ok_or_else(|| LogError::InvalidArgument("empty leaf batch".to_string()))
}
