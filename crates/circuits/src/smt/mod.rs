//! Sparse Merkle trees for the accounts and trading history state.
//!
//! This module provides:
//! - Native tree storage over Poseidon leaf hashes (insert, update, proofs)
//! - In-circuit path authentication and update gadgets
//! - Merkle proof structures

mod gadgets;
mod proof;
mod tree;


pub use gadgets::{compute_root_from_path, verify_and_update, verify_membership, MerkleProofVar};
pub use proof::MerkleProof;
pub use tree::SparseMerkleTree;
