//! Proof generation library for batched order cancellation.
//!
//! This crate provides utilities for:
//! - Trusted setup (generating proving and verifying keys per batch size)
//! - Proof generation for `BatchCancelCircuit`, after a witness check
//! - Local proof verification
//! - The JSON block input format

pub mod block;
pub mod prove;
pub mod setup;
pub mod verify;

#[cfg(test)]
mod test_utils;

pub use block::{BlockError, BlockInput};
pub use prove::{prove_batch, prove_with_keys, ProofWithInputs, ProveError};
pub use setup::{setup_batch, setup_keys, CircuitKeyPair, CircuitKeys, KeyMetadata, SetupError};
pub use verify::{verify_batch, verify_proof, VerifyError};

use ark_bn254::Fr;

/// Common field type for all operations
pub type ConstraintF = Fr;

/// Install a `tracing` subscriber for the binaries.
///
/// Arkworks emits spans under the `r1cs` target for every gadget call; they
/// stay off unless `RUST_LOG` asks for them.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,r1cs=off"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
