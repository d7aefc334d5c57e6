//! Sparse Merkle Tree native implementation.
//!
//! A Sparse Merkle Tree (SMT) is a Merkle tree where most leaves are empty.
//! Only non-empty leaves and their ancestors are stored, which keeps a
//! 2^24-leaf accounts tree cheap to hold in memory.
//!
//! The tree stores leaf *hashes*; what a leaf contains (account fields,
//! trade history fields) is decided by the caller.

use std::collections::HashMap;

use ark_bn254::Fr;

use super::proof::MerkleProof;
use crate::error::CircuitError;
use crate::poseidon::poseidon_hash_two;

/// Sparse Merkle Tree over Poseidon.
#[derive(Clone, Debug)]
pub struct SparseMerkleTree {
    /// Tree depth (number of levels from root to leaves)
    depth: usize,

    /// Sparse node storage: (level, index) -> hash
    /// Level 0 = leaves, level `depth` = root
    nodes: HashMap<(usize, u64), Fr>,

    /// Precomputed default hashes for each level
    /// defaults[0] = hash of an empty leaf
    /// defaults[i] = hash(defaults[i-1], defaults[i-1])
    defaults: Vec<Fr>,
}

impl SparseMerkleTree {
    /// Create an empty tree whose unset leaves all hash to `empty_leaf`.
    pub fn new(depth: usize, empty_leaf: Fr) -> Self {
        let mut defaults = Vec::with_capacity(depth + 1);
        defaults.push(empty_leaf);
        for level in 0..depth {
            let prev = defaults[level];
            defaults.push(poseidon_hash_two(prev, prev));
        }

        Self {
            depth,
            nodes: HashMap::new(),
            defaults,
        }
    }

    fn check_index(&self, index: u64) -> Result<(), CircuitError> {
        if self.depth < 64 && index >> self.depth != 0 {
            return Err(CircuitError::BitWidth {
                field: "leaf index",
                bits: self.depth,
                value: index.to_string(),
            });
        }
        Ok(())
    }

    /// Set the leaf hash at `index` and recompute its path.
    /// Returns the new root hash.
    pub fn update(&mut self, index: u64, leaf_hash: Fr) -> Result<Fr, CircuitError> {
        self.check_index(index)?;

        self.nodes.insert((0, index), leaf_hash);

        let mut current_index = index;
        let mut current_hash = leaf_hash;

        for level in 0..self.depth {
            let sibling_hash = self.get_node(level, current_index ^ 1);

            current_hash = if current_index & 1 == 0 {
                poseidon_hash_two(current_hash, sibling_hash)
            } else {
                poseidon_hash_two(sibling_hash, current_hash)
            };
            current_index >>= 1;

            self.nodes.insert((level + 1, current_index), current_hash);
        }

        Ok(current_hash)
    }

    /// Get a node hash, returning default if not present.
    fn get_node(&self, level: usize, index: u64) -> Fr {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or(self.defaults[level])
    }

    /// Leaf hash at `index` (the empty-leaf hash if never set).
    pub fn leaf(&self, index: u64) -> Fr {
        self.get_node(0, index)
    }

    /// Get the current root hash.
    pub fn root(&self) -> Fr {
        self.get_node(self.depth, 0)
    }

    /// Generate a Merkle proof for the leaf at `index`.
    pub fn proof(&self, index: u64) -> Result<MerkleProof, CircuitError> {
        self.check_index(index)?;

        let path = (0..self.depth)
            .map(|level| self.get_node(level, (index >> level) ^ 1))
            .collect();

        Ok(MerkleProof::from_siblings(path, index))
    }

    /// Get the tree depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Root of an entirely empty tree of this shape.
    pub fn empty_root(&self) -> Fr {
        self.defaults[self.depth]
    }
}
