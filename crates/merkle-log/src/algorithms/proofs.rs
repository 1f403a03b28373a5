//! # Proof Computer
//!
//! Derives inclusion and consistency proofs (RFC 6962 §2.1.1 / §2.1.2) from
//! [`TreeBuilder`] range lookups. Both are deterministic for a given size.
//!
//! - Inclusion: `PATH(m, D[n])`, siblings ordered leaf to root.
//! - Consistency: `SUBPROOF(m, D[n], true)`, empty when `m == n`.

use crate::algorithms::tree_builder::{split_point, NodeReader, TreeBuilder};
use crate::domain::entities::{ConsistencyProof, InclusionProof};
use crate::domain::errors::LogError;
use crate::domain::invariants::{check_consistency_range, check_inclusion_range};
use crate::domain::value_objects::Hash;

pub struct ProofComputer<'b, 'a, R: NodeReader + ?Sized> {
    builder: &'b TreeBuilder<'a, R>,
}

impl<'b, 'a, R: NodeReader + ?Sized> ProofComputer<'b, 'a, R> {
    pub fn new(builder: &'b TreeBuilder<'a, R>) -> Self {
        Self { builder }
    }

    /// Audit path for `leaf_index` in the tree of `tree_size` leaves.
    ///
    /// Fails `OutOfRange` unless `leaf_index < tree_size <= current_size`.
    pub fn inclusion_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
        current_size: u64,
    ) -> Result<InclusionProof, LogError> {
        check_inclusion_range(leaf_index, tree_size, current_size)?;

        let mut hashes = Vec::new();
        self.path(leaf_index, 0, tree_size, &mut hashes)?;

        Ok(InclusionProof {
            leaf_index,
            tree_size,
            hashes,
        })
    }

    /// Proof that the tree at `first` is a prefix of the tree at `second`.
    ///
    /// Fails `OutOfRange` unless `0 < first <= second <= current_size`.
    pub fn consistency_proof(
        &self,
        first: u64,
        second: u64,
        current_size: u64,
    ) -> Result<ConsistencyProof, LogError> {
        check_consistency_range(first, second, current_size)?;

        let mut hashes = Vec::new();
        self.subproof(first, 0, second, true, &mut hashes)?;

        Ok(ConsistencyProof {
            first_size: first,
            second_size: second,
            hashes,
        })
    }

    // PATH(m, D[lo:hi]) with m relative to lo. Hashes are pushed after
    // recursing so the output runs from the leaf upward.
    fn path(&self, m: u64, lo: u64, hi: u64, out: &mut Vec<Hash>) -> Result<(), LogError> {
        let size = hi - lo;
        if size <= 1 {
            return Ok(());
        }
        let k = split_point(size);
        if m < k {
            self.path(m, lo, lo + k, out)?;
            out.push(self.builder.range_hash(lo + k, hi)?);
        } else {
            self.path(m - k, lo + k, hi, out)?;
            out.push(self.builder.range_hash(lo, lo + k)?);
        }
        Ok(())
    }

    // SUBPROOF(m, D[lo:hi], b) with m relative to lo.
    fn subproof(
        &self,
        m: u64,
        lo: u64,
        hi: u64,
        complete: bool,
        out: &mut Vec<Hash>,
    ) -> Result<(), LogError> {
        let size = hi - lo;
        if m == size {
            if !complete {
                out.push(self.builder.range_hash(lo, hi)?);
            }
            return Ok(());
        }
        let k = split_point(size);
        if m <= k {
            self.subproof(m, lo, lo + k, complete, out)?;
            out.push(self.builder.range_hash(lo + k, hi)?);
        } else {
            self.subproof(m - k, lo + k, hi, false, out)?;
            out.push(self.builder.range_hash(lo, lo + k)?);
        }
        Ok(())
    }
}
