//! # Proof Verification
//!
//! Client-side checks for inclusion and consistency proofs, following
//! RFC 9162 §2.1.3.2 and §2.1.4.2. Verifiers only need the hasher; they never
//! touch log storage.

use crate::algorithms::hasher::node_hash;
use crate::domain::errors::VerificationError;
use crate::domain::value_objects::Hash;

/// Number of hashes in the audit path of `index` in a tree of `size` leaves.
pub fn inclusion_proof_len(index: u64, size: u64) -> usize {
    let inner = 64 - (index ^ (size - 1)).leading_zeros();
    let border = if inner >= 64 {
        0
    } else {
        (index >> inner).count_ones()
    };
    (inner + border) as usize
}

/// Recompute the root implied by an inclusion proof.
pub fn root_from_inclusion_proof(
    leaf_index: u64,
    tree_size: u64,
    leaf_hash: &Hash,
    proof: &[Hash],
) -> Result<Hash, VerificationError> {
    if leaf_index >= tree_size {
        return Err(VerificationError::IndexOutOfRange {
            index: leaf_index,
            size: tree_size,
        });
    }
    if proof.len() != inclusion_proof_len(leaf_index, tree_size) {
        return Err(VerificationError::InvalidProofLength(proof.len()));
    }

    let mut fnode = leaf_index;
    let mut snode = tree_size - 1;
    let mut root = *leaf_hash;

    for sibling in proof {
        if snode == 0 {
            return Err(VerificationError::InvalidProofLength(proof.len()));
        }
        if fnode & 1 == 1 || fnode == snode {
            root = node_hash(sibling, &root);
            while fnode & 1 == 0 && fnode != 0 {
                fnode >>= 1;
                snode >>= 1;
            }
        } else {
            root = node_hash(&root, sibling);
        }
        fnode >>= 1;
        snode >>= 1;
    }

    if snode != 0 {
        return Err(VerificationError::InvalidProofLength(proof.len()));
    }
    Ok(root)
}

/// Check that `leaf_hash` sits at `leaf_index` in the tree with `root`.
pub fn verify_inclusion(
    leaf_index: u64,
    tree_size: u64,
    leaf_hash: &Hash,
    proof: &[Hash],
    root: &Hash,
) -> Result<(), VerificationError> {
    let computed = root_from_inclusion_proof(leaf_index, tree_size, leaf_hash, proof)?;
    if computed != *root {
        return Err(VerificationError::RootMismatch);
    }
    Ok(())
}

/// Check that the tree `(size1, root1)` is a prefix of `(size2, root2)`.
pub fn verify_consistency(
    size1: u64,
    size2: u64,
    proof: &[Hash],
    root1: &Hash,
    root2: &Hash,
) -> Result<(), VerificationError> {
    if size2 < size1 {
        return Err(VerificationError::InvalidSizes {
            first: size1,
            second: size2,
        });
    }
    if size1 == size2 {
        if !proof.is_empty() {
            return Err(VerificationError::InvalidProofLength(proof.len()));
        }
        if root1 != root2 {
            return Err(VerificationError::RootMismatch);
        }
        return Ok(());
    }
    if size1 == 0 {
        // Every tree extends the empty tree
        if !proof.is_empty() {
            return Err(VerificationError::InvalidProofLength(proof.len()));
        }
        return Ok(());
    }
    if proof.is_empty() {
        return Err(VerificationError::InvalidProofLength(0));
    }

    let mut path: Vec<Hash> = Vec::with_capacity(proof.len() + 1);
    if size1.is_power_of_two() {
        path.push(*root1);
    }
    path.extend_from_slice(proof);

    let mut fnode = size1 - 1;
    let mut snode = size2 - 1;
    while fnode & 1 == 1 {
        fnode >>= 1;
        snode >>= 1;
    }

    let mut first_root = path[0];
    let mut second_root = path[0];

    for c in &path[1..] {
        if snode == 0 {
            return Err(VerificationError::InvalidProofLength(proof.len()));
        }
        if fnode & 1 == 1 || fnode == snode {
            first_root = node_hash(c, &first_root);
            second_root = node_hash(c, &second_root);
            while fnode & 1 == 0 && fnode != 0 {
                fnode >>= 1;
                snode >>= 1;
            }
        } else {
            second_root = node_hash(&second_root, c);
        }
        fnode >>= 1;
        snode >>= 1;
    }

    if snode != 0 {
        return Err(VerificationError::InvalidProofLength(proof.len()));
    }
    if first_root != *root1 || second_root != *root2 {
        return Err(VerificationError::RootMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::hasher::leaf_hash;
    use crate::algorithms::proofs::ProofComputer;
    use crate::algorithms::tree_builder::TreeBuilder;
    use crate::domain::value_objects::NodeId;
    use std::collections::HashMap;

    fn make_tree(n: usize) -> (Vec<Hash>, HashMap<NodeId, Hash>) {
        let leaves: Vec<Hash> = (0..n)
            .map(|i| leaf_hash(format!("entry-{}", i).as_bytes()))
            .collect();
        let store = HashMap::new();
        let nodes = TreeBuilder::new(&store)
            .extend(0, &leaves)
            .unwrap()
            .into_iter()
            .collect();
        (leaves, nodes)
    }

    #[test]
    fn test_inclusion_proof_len() {
        assert_eq!(inclusion_proof_len(0, 1), 0);
        assert_eq!(inclusion_proof_len(0, 2), 1);
        assert_eq!(inclusion_proof_len(0, 7), 3);
        assert_eq!(inclusion_proof_len(6, 7), 2);
        assert_eq!(inclusion_proof_len(4, 5), 1);
        assert_eq!(inclusion_proof_len(3, 8), 3);
    }

    #[test]
    fn test_inclusion_round_trip_all_positions() {
        let (leaves, nodes) = make_tree(21);
        let builder = TreeBuilder::new(&nodes);
        let computer = ProofComputer::new(&builder);

        for size in 1..=21u64 {
            let root = builder.root_at(size).unwrap();
            for index in 0..size {
                let proof = computer.inclusion_proof(index, size, 21).unwrap();
                assert_eq!(proof.hashes.len(), inclusion_proof_len(index, size));
                verify_inclusion(index, size, &leaves[index as usize], &proof.hashes, &root)
                    .unwrap_or_else(|e| panic!("index {} size {}: {}", index, size, e));
            }
        }
    }

    #[test]
    fn test_inclusion_detects_tampering() {
        let (leaves, nodes) = make_tree(11);
        let builder = TreeBuilder::new(&nodes);
        let root = builder.root_at(11).unwrap();
        let proof = ProofComputer::new(&builder)
            .inclusion_proof(5, 11, 11)
            .unwrap();

        for i in 0..proof.hashes.len() {
            let mut bad = proof.hashes.clone();
            bad[i][0] ^= 0x01;
            assert_eq!(
                verify_inclusion(5, 11, &leaves[5], &bad, &root),
                Err(VerificationError::RootMismatch)
            );
        }

        // Wrong leaf, wrong index, truncated and extended proofs
        assert!(verify_inclusion(5, 11, &leaves[4], &proof.hashes, &root).is_err());
        assert!(verify_inclusion(4, 11, &leaves[5], &proof.hashes, &root).is_err());
        assert!(verify_inclusion(
            5,
            11,
            &leaves[5],
            &proof.hashes[..proof.hashes.len() - 1],
            &root
        )
        .is_err());
        let mut longer = proof.hashes.clone();
        longer.push([0u8; 32]);
        assert!(matches!(
            verify_inclusion(5, 11, &leaves[5], &longer, &root),
            Err(VerificationError::InvalidProofLength(_))
        ));
    }

    #[test]
    fn test_inclusion_index_out_of_range() {
        assert_eq!(
            root_from_inclusion_proof(3, 3, &[0u8; 32], &[]),
            Err(VerificationError::IndexOutOfRange { index: 3, size: 3 })
        );
    }

    #[test]
    fn test_consistency_round_trip_all_pairs() {
        let (_, nodes) = make_tree(19);
        let builder = TreeBuilder::new(&nodes);
        let computer = ProofComputer::new(&builder);

        for size2 in 1..=19u64 {
            let root2 = builder.root_at(size2).unwrap();
            for size1 in 1..=size2 {
                let root1 = builder.root_at(size1).unwrap();
                let proof = computer.consistency_proof(size1, size2, 19).unwrap();
                verify_consistency(size1, size2, &proof.hashes, &root1, &root2)
                    .unwrap_or_else(|e| panic!("{} -> {}: {}", size1, size2, e));
            }
        }
    }

    #[test]
    fn test_consistency_detects_tampering() {
        let (_, nodes) = make_tree(13);
        let builder = TreeBuilder::new(&nodes);
        let root1 = builder.root_at(6).unwrap();
        let root2 = builder.root_at(13).unwrap();
        let proof = ProofComputer::new(&builder)
            .consistency_proof(6, 13, 13)
            .unwrap();

        for i in 0..proof.hashes.len() {
            let mut bad = proof.hashes.clone();
            bad[i][31] ^= 0x80;
            assert!(verify_consistency(6, 13, &bad, &root1, &root2).is_err());
        }

        let mut wrong_root = root1;
        wrong_root[0] ^= 1;
        assert_eq!(
            verify_consistency(6, 13, &proof.hashes, &wrong_root, &root2),
            Err(VerificationError::RootMismatch)
        );
    }

    #[test]
    fn test_consistency_edge_cases() {
        let a = leaf_hash(b"a");
        let b = leaf_hash(b"b");

        assert!(verify_consistency(3, 3, &[], &a, &a).is_ok());
        assert_eq!(
            verify_consistency(3, 3, &[], &a, &b),
            Err(VerificationError::RootMismatch)
        );
        assert!(verify_consistency(0, 5, &[], &a, &b).is_ok());
        assert!(verify_consistency(0, 5, &[a], &a, &b).is_err());
        assert!(verify_consistency(2, 5, &[], &a, &b).is_err());
        assert_eq!(
            verify_consistency(5, 2, &[], &a, &b),
            Err(VerificationError::InvalidSizes {
                first: 5,
                second: 2
            })
        );
    }
}
