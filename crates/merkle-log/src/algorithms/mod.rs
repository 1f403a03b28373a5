//! Pure algorithms: hashing, tree construction, proof derivation and
//! verification.

pub mod hasher;
pub mod proofs;
pub mod tree_builder;
pub mod verifier;

pub use hasher::{empty_root, leaf_hash, node_hash};
pub use proofs::ProofComputer;
pub use tree_builder::{NodeReader, TreeBuilder};
pub use verifier::{root_from_inclusion_proof, verify_consistency, verify_inclusion};
