//! Proof generation for the batch cancel circuit.

use std::time::Instant;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, ProvingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use cancel_circuits::{check_witness, BatchCancelCircuit, CircuitError};

use crate::setup::{CircuitKeys, KeyMetadata};

/// Errors during proof generation
#[derive(Error, Debug)]
pub enum ProveError {
    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),
    #[error("Witness does not satisfy the circuit at constraint {index} ({label})")]
    Unsatisfied { index: usize, label: String },
    #[error("Invalid batch: {0}")]
    Circuit(#[from] CircuitError),
    #[error("Keys were generated for {keys:?}, batch is {batch:?}")]
    KeyMismatch { keys: KeyMetadata, batch: KeyMetadata },
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// A proof with its public inputs
#[derive(Clone, Debug)]
pub struct ProofWithInputs {
    pub proof: Proof<Bn254>,
    pub public_inputs: Vec<Fr>,
}

impl ProofWithInputs {
    /// Serialize proof to bytes
    pub fn serialize_proof(&self) -> Result<Vec<u8>, ProveError> {
        let mut bytes = Vec::new();
        self.proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProveError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize public inputs to bytes (each Fr is 32 bytes)
    pub fn serialize_public_inputs(&self) -> Result<Vec<u8>, ProveError> {
        let mut bytes = Vec::new();
        for input in &self.public_inputs {
            input
                .serialize_compressed(&mut bytes)
                .map_err(|e| ProveError::Serialization(e.to_string()))?;
        }
        Ok(bytes)
    }

    /// Deserialize proof from bytes
    pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>, ProveError> {
        Proof::deserialize_compressed(bytes).map_err(|e| ProveError::Serialization(e.to_string()))
    }
}

/// Prove a batch.
///
/// The witness is checked first, so an invalid batch is reported with the
/// failing check instead of producing a proof that will not verify.
pub fn prove_batch(
    pk: &ProvingKey<Bn254>,
    circuit: BatchCancelCircuit,
) -> Result<ProofWithInputs, ProveError> {
    let report = check_witness(circuit.clone())?;
    if let Some(failure) = report.first_failure {
        if let Err(e) = circuit.preflight() {
            warn!("preflight: {}", e);
        }
        return Err(ProveError::Unsatisfied {
            index: failure.index,
            label: failure.label.unwrap_or_else(|| "unlabelled".to_string()),
        });
    }

    let public_inputs = circuit.public_inputs();
    let num_cancels = circuit.num_cancels();

    let start = Instant::now();
    let mut rng = StdRng::from_entropy();
    let proof = Groth16::<Bn254>::prove(pk, circuit, &mut rng)
        .map_err(|e| ProveError::ProofGeneration(e.to_string()))?;

    info!(
        num_cancels,
        constraints = report.num_constraints,
        elapsed = ?start.elapsed(),
        "batch proof generated"
    );

    Ok(ProofWithInputs {
        proof,
        public_inputs,
    })
}

/// Prove a batch with keys whose recorded shape must match the batch.
pub fn prove_with_keys(
    keys: &CircuitKeys,
    circuit: BatchCancelCircuit,
) -> Result<ProofWithInputs, ProveError> {
    let batch = KeyMetadata {
        config: *circuit.config(),
        num_cancels: circuit.num_cancels(),
    };
    if batch != keys.metadata {
        return Err(ProveError::KeyMismatch {
            keys: keys.metadata,
            batch,
        });
    }

    prove_batch(&keys.batch_cancel.proving_key, circuit)
}
