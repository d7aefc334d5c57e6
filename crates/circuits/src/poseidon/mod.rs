//! Poseidon hash over the BN254 scalar field.
//!
//! Used for every algebraic hash in the circuit: Merkle nodes, account and
//! trade history leaves, and the EdDSA challenge. The public data commitment
//! uses SHA-256 instead (see `public_data`).

mod config;
mod gadgets;
mod native;

pub use config::poseidon_config;
pub use gadgets::{poseidon_hash_many_var, poseidon_hash_two_var};
pub use native::{poseidon_hash_many, poseidon_hash_two};
