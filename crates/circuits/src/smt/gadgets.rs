//! In-circuit SMT verification gadgets.
//!
//! Path directions are always the bits of the index the caller claims. A
//! proof taken for any other leaf walks a different path and cannot reach the
//! expected root.

use ark_bn254::Fr;
use ark_r1cs_std::{boolean::Boolean, fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use super::proof::MerkleProof;
use crate::poseidon::poseidon_hash_two_var;

/// Circuit variable representation of a Merkle path.
#[derive(Clone)]
pub struct MerkleProofVar {
    /// Sibling hashes as circuit variables
    path: Vec<FpVar<Fr>>,
}

impl MerkleProofVar {
    /// Allocate the sibling hashes of a proof as witness variables.
    pub fn new_witness(
        cs: ConstraintSystemRef<Fr>,
        proof: &MerkleProof,
    ) -> Result<Self, SynthesisError> {
        let path = proof
            .path()
            .iter()
            .map(|h| FpVar::new_witness(cs.clone(), || Ok(*h)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { path })
    }

    /// Get the path variables.
    pub fn path(&self) -> &[FpVar<Fr>] {
        &self.path
    }

    /// Get the proof depth.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Compute the root hash from a leaf and Merkle path in-circuit.
///
/// `index_bits` are little-endian and must have one entry per level.
pub fn compute_root_from_path(
    cs: ConstraintSystemRef<Fr>,
    leaf_hash: &FpVar<Fr>,
    proof: &MerkleProofVar,
    index_bits: &[Boolean<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    if index_bits.len() != proof.depth() {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut current = leaf_hash.clone();

    for (sibling, is_right) in proof.path.iter().zip(index_bits.iter()) {
        // If is_right: H(sibling, current), else H(current, sibling)
        let left = is_right.select(sibling, &current)?;
        let right = is_right.select(&current, sibling)?;

        current = poseidon_hash_two_var(cs.clone(), &left, &right)?;
    }

    Ok(current)
}

/// Constrain `leaf_hash` to sit at `index_bits` under `expected_root`.
pub fn verify_membership(
    cs: ConstraintSystemRef<Fr>,
    expected_root: &FpVar<Fr>,
    leaf_hash: &FpVar<Fr>,
    proof: &MerkleProofVar,
    index_bits: &[Boolean<Fr>],
) -> Result<(), SynthesisError> {
    let computed_root = compute_root_from_path(cs, leaf_hash, proof, index_bits)?;
    computed_root.enforce_equal(expected_root)
}

/// Authenticate `old_leaf_hash` under `old_root` and return the root after
/// replacing it with `new_leaf_hash`.
///
/// Siblings do not change when a single leaf is replaced, so both roots are
/// computed from the same path.
pub fn verify_and_update(
    cs: ConstraintSystemRef<Fr>,
    old_root: &FpVar<Fr>,
    old_leaf_hash: &FpVar<Fr>,
    new_leaf_hash: &FpVar<Fr>,
    proof: &MerkleProofVar,
    index_bits: &[Boolean<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    verify_membership(cs.clone(), old_root, old_leaf_hash, proof, index_bits)?;
    compute_root_from_path(cs, new_leaf_hash, proof, index_bits)
}
