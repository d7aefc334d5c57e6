//! Local proof verification.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, VerifyingKey};
use ark_snark::SNARK;
use thiserror::Error;

use crate::prove::ProofWithInputs;

/// Errors during verification
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Verification failed: {0}")]
    Verification(String),
    #[error("Expected exactly one public input, got {0}")]
    InvalidInputs(usize),
}

/// Verify a batch proof against its public data hash (the single public input)
pub fn verify_batch(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_data_hash: Fr,
) -> Result<bool, VerifyError> {
    let public_inputs = vec![public_data_hash];

    Groth16::<Bn254>::verify(vk, &public_inputs, proof)
        .map_err(|e| VerifyError::Verification(e.to_string()))
}

/// Verify a proof as returned by the prover
pub fn verify_proof(
    vk: &VerifyingKey<Bn254>,
    proof: &ProofWithInputs,
) -> Result<bool, VerifyError> {
    match proof.public_inputs.as_slice() {
        [public_data_hash] => verify_batch(vk, &proof.proof, *public_data_hash),
        inputs => Err(VerifyError::InvalidInputs(inputs.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prove::prove_batch;
    use crate::setup::setup_batch;
    use crate::test_utils::{one_cancel_batch, small_config};
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    #[test]
    #[ignore = "slow: runs a Groth16 setup"]
    fn test_verify_batch() {
        let mut rng = StdRng::seed_from_u64(42);
        let keys = setup_batch(small_config(), 1, &mut rng).unwrap();

        let proof_result = prove_batch(&keys.proving_key, one_cancel_batch()).unwrap();

        // Verify with correct public hash
        assert!(verify_proof(&keys.verifying_key, &proof_result).unwrap());

        // Try to verify with wrong public hash
        let wrong_hash = Fr::from(99999u64);
        let valid = verify_batch(&keys.verifying_key, &proof_result.proof, wrong_hash).unwrap();
        assert!(!valid);

        let padded = ProofWithInputs {
            public_inputs: vec![proof_result.public_inputs[0], Fr::from(0u64)],
            ..proof_result
        };
        assert!(matches!(
            verify_proof(&keys.verifying_key, &padded),
            Err(VerifyError::InvalidInputs(2))
        ));
    }
}
