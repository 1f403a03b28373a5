//! # Property Tests for Roots and Proofs
//!
//! Compares the incremental tree builder against a straightforward recursive
//! Merkle Tree Hash and checks that every served proof verifies.
//!
//! ## Properties
//!
//! 1. **Root agreement** - any chunking of appends yields the reference root at every size
//! 2. **Inclusion** - proofs verify for every `index < size <= n`
//! 3. **Consistency** - proofs verify for every `0 < m <= size <= n`
//! 4. **Tamper detection** - flipping a proof byte breaks verification

use merkle_log::algorithms::hasher::{empty_root, leaf_hash, node_hash};
use merkle_log::algorithms::tree_builder::split_point;
use merkle_log::algorithms::verifier::inclusion_proof_len;
use merkle_log::algorithms::{ProofComputer, TreeBuilder};
use merkle_log::{verify_consistency, verify_inclusion, Hash, NodeId};
use proptest::prelude::*;
use std::collections::HashMap;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn reference_root(leaves: &[Hash]) -> Hash {
    match leaves.len() {
        0 => empty_root(),
        1 => leaves[0],
        n => {
            let k = split_point(n as u64) as usize;
            node_hash(&reference_root(&leaves[..k]), &reference_root(&leaves[k..]))
        }
    }
}

fn leaf_hashes(n: usize) -> Vec<Hash> {
    (0..n).map(|i| leaf_hash(format!("entry-{}", i).as_bytes())).collect()
}

/// Append `leaves` in the given chunk sizes, committing nodes after each one.
fn build_in_chunks(leaves: &[Hash], chunks: &[usize]) -> HashMap<NodeId, Hash> {
    let mut nodes: HashMap<NodeId, Hash> = HashMap::new();
    let mut size = 0usize;
    let mut chunks = chunks.iter().copied().cycle();

    while size < leaves.len() {
        let take = chunks.next().unwrap_or(1).max(1).min(leaves.len() - size);
        let created = {
            let mut builder = TreeBuilder::new(&nodes);
            builder.extend(size as u64, &leaves[size..size + take]).unwrap()
        };
        nodes.extend(created);
        size += take;
    }
    nodes
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_root_matches_reference_for_any_chunking(
        n in 0usize..130,
        chunks in prop::collection::vec(1usize..17, 1..8),
    ) {
        let leaves = leaf_hashes(n);
        let nodes = build_in_chunks(&leaves, &chunks);
        let builder = TreeBuilder::new(&nodes);

        for size in 0..=n {
            prop_assert_eq!(builder.root_at(size as u64).unwrap(), reference_root(&leaves[..size]));
        }
    }

    #[test]
    fn prop_inclusion_proofs_verify(n in 1usize..100, seed in any::<u64>()) {
        let leaves = leaf_hashes(n);
        let nodes = build_in_chunks(&leaves, &[7]);
        let builder = TreeBuilder::new(&nodes);
        let computer = ProofComputer::new(&builder);

        let size = 1 + (seed % n as u64);
        let index = (seed / 7) % size;
        let proof = computer.inclusion_proof(index, size, n as u64).unwrap();
        let root = reference_root(&leaves[..size as usize]);

        prop_assert_eq!(proof.hashes.len(), inclusion_proof_len(index, size));
        prop_assert!(verify_inclusion(index, size, &leaves[index as usize], &proof.hashes, &root).is_ok());
    }

    #[test]
    fn prop_consistency_proofs_verify(n in 1usize..100, a in any::<u64>(), b in any::<u64>()) {
        let leaves = leaf_hashes(n);
        let nodes = build_in_chunks(&leaves, &[3, 11]);
        let builder = TreeBuilder::new(&nodes);
        let computer = ProofComputer::new(&builder);

        let second = 1 + (a % n as u64);
        let first = 1 + (b % second);
        let proof = computer.consistency_proof(first, second, n as u64).unwrap();

        let root1 = reference_root(&leaves[..first as usize]);
        let root2 = reference_root(&leaves[..second as usize]);
        prop_assert!(verify_consistency(first, second, &proof.hashes, &root1, &root2).is_ok());
        if first == second {
            prop_assert!(proof.hashes.is_empty());
        }
    }

    #[test]
    fn prop_tampered_inclusion_proof_fails(n in 2usize..64, seed in any::<u64>(), bit in 0u8..8) {
        let leaves = leaf_hashes(n);
        let nodes = build_in_chunks(&leaves, &[5]);
        let builder = TreeBuilder::new(&nodes);
        let computer = ProofComputer::new(&builder);

        let index = seed % n as u64;
        let mut proof = computer.inclusion_proof(index, n as u64, n as u64).unwrap();
        let root = reference_root(&leaves);

        let victim = (seed as usize / n) % proof.hashes.len();
        proof.hashes[victim][0] ^= 1 << bit;
        prop_assert!(verify_inclusion(index, n as u64, &leaves[index as usize], &proof.hashes, &root).is_err());
    }
}

// =============================================================================
// EDGE CASES
// =============================================================================

#[test]
fn test_single_leaf_tree() {
    let leaves = leaf_hashes(1);
    let nodes = build_in_chunks(&leaves, &[1]);
    let builder = TreeBuilder::new(&nodes);
    let computer = ProofComputer::new(&builder);

    assert_eq!(builder.root_at(1).unwrap(), leaves[0]);
    let proof = computer.inclusion_proof(0, 1, 1).unwrap();
    assert!(proof.hashes.is_empty());
    verify_inclusion(0, 1, &leaves[0], &proof.hashes, &leaves[0]).unwrap();
}

#[test]
fn test_power_of_two_boundaries() {
    let leaves = leaf_hashes(64);
    let nodes = build_in_chunks(&leaves, &[64]);
    let builder = TreeBuilder::new(&nodes);
    let computer = ProofComputer::new(&builder);

    for size in [1u64, 2, 4, 8, 16, 32, 64] {
        let proof = computer.inclusion_proof(size - 1, size, 64).unwrap();
        assert_eq!(proof.hashes.len(), size.trailing_zeros() as usize);
    }
    // Left half of a complete tree: the proof is just the right half
    let proof = computer.consistency_proof(32, 64, 64).unwrap();
    assert_eq!(proof.hashes.len(), 1);
}

#[test]
fn test_proof_beyond_current_size_is_rejected() {
    let leaves = leaf_hashes(10);
    let nodes = build_in_chunks(&leaves, &[10]);
    let builder = TreeBuilder::new(&nodes);
    let computer = ProofComputer::new(&builder);

    assert!(computer.inclusion_proof(3, 11, 10).is_err());
    assert!(computer.consistency_proof(5, 11, 10).is_err());
    assert!(computer.consistency_proof(0, 5, 10).is_err());
}
