//! Merkle proof structure for SMT membership verification.

use ark_bn254::Fr;

use crate::error::CircuitError;
use crate::poseidon::poseidon_hash_two;

/// A Merkle authentication path for one leaf.
///
/// Contains the sibling hashes from leaf to root and the leaf index bits
/// (little-endian, so `indices[0]` is the direction at the leaf level).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Sibling hashes from leaf level (0) to root level (depth-1)
    path: Vec<Fr>,

    /// Direction at each level: true = current node is right child
    indices: Vec<bool>,
}

impl MerkleProof {
    /// Create a new Merkle proof.
    pub fn new(path: Vec<Fr>, indices: Vec<bool>) -> Result<Self, CircuitError> {
        if path.len() != indices.len() {
            return Err(CircuitError::ProofDepth {
                tree: "merkle",
                expected: indices.len(),
                actual: path.len(),
            });
        }
        Ok(Self { path, indices })
    }

    /// Create a proof from siblings and the leaf index they were taken for.
    pub fn from_siblings(path: Vec<Fr>, index: u64) -> Self {
        let indices = (0..path.len()).map(|level| level < 64 && (index >> level) & 1 == 1).collect();
        Self { path, indices }
    }

    /// Get the proof path (sibling hashes).
    pub fn path(&self) -> &[Fr] {
        &self.path
    }

    /// Get the direction indices.
    pub fn indices(&self) -> &[bool] {
        &self.indices
    }

    /// The leaf index encoded by the direction bits.
    pub fn index(&self) -> u64 {
        self.indices
            .iter()
            .enumerate()
            .fold(0u64, |acc, (level, &right)| acc | ((right as u64) << level))
    }

    /// Get the proof depth (number of levels).
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Fail with a structural error unless the proof has exactly `expected` levels.
    pub fn check_depth(&self, tree: &'static str, expected: usize) -> Result<(), CircuitError> {
        if self.depth() != expected {
            return Err(CircuitError::ProofDepth {
                tree,
                expected,
                actual: self.depth(),
            });
        }
        Ok(())
    }

    /// Compute the root reached from `leaf_hash` along this path.
    pub fn compute_root(&self, leaf_hash: Fr) -> Fr {
        self.compute_root_at(leaf_hash, self.index())
    }

    /// Compute the root reached from `leaf_hash` when the leaf sits at `index`.
    ///
    /// The circuit takes its path directions from the claimed index, not from
    /// the proof, so this is the native counterpart of the gadget.
    pub fn compute_root_at(&self, leaf_hash: Fr, index: u64) -> Fr {
        self.path
            .iter()
            .enumerate()
            .fold(leaf_hash, |current, (level, sibling)| {
                if level < 64 && (index >> level) & 1 == 1 {
                    poseidon_hash_two(*sibling, current)
                } else {
                    poseidon_hash_two(current, *sibling)
                }
            })
    }
}

#[cfg(test)]
mod proof_tests {
    use super::*;

    #[test]
    fn test_proof_structure() {
        let path = vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)];
        let proof = MerkleProof::new(path.clone(), vec![false, true, false]).unwrap();

        assert_eq!(proof.depth(), 3);
        assert_eq!(proof.path(), &path);
        assert_eq!(proof.index(), 2);
        assert_eq!(proof, MerkleProof::from_siblings(path, 2));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = MerkleProof::new(vec![Fr::from(1u64)], vec![true, false]).unwrap_err();
        assert!(matches!(err, CircuitError::ProofDepth { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_check_depth() {
        let proof = MerkleProof::from_siblings(vec![Fr::from(0u64); 4], 0);
        assert!(proof.check_depth("accounts", 4).is_ok());
        assert_eq!(
            proof.check_depth("accounts", 24),
            Err(CircuitError::ProofDepth {
                tree: "accounts",
                expected: 24,
                actual: 4
            })
        );
    }

    #[test]
    fn test_direction_changes_root() {
        let proof = MerkleProof::from_siblings(vec![Fr::from(1u64), Fr::from(2u64)], 0);
        let leaf = Fr::from(100u64);
        assert_eq!(proof.compute_root(leaf), proof.compute_root_at(leaf, 0));
        assert_ne!(proof.compute_root_at(leaf, 0), proof.compute_root_at(leaf, 1));
    }
}
