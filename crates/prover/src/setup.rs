//! Trusted setup utilities for generating proving and verifying keys.
//!
//! A key pair is only valid for the circuit shape it was generated for: the
//! circuit configuration and the number of cancellations per batch. Both are
//! stored next to the keys in `config.json` and checked on load.

use std::path::Path;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, CryptoRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use cancel_circuits::{BatchCancelCircuit, CircuitConfig, CircuitError};

const PROVING_KEY_FILE: &str = "batch_cancel.pk";
const VERIFYING_KEY_FILE: &str = "batch_cancel.vk";
const METADATA_FILE: &str = "config.json";

/// Errors that can occur during setup
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Circuit setup failed: {0}")]
    CircuitSetup(String),
    #[error("Invalid circuit: {0}")]
    Circuit(#[from] CircuitError),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
    #[error("Keys were generated for {found:?}, expected {expected:?}")]
    ConfigMismatch {
        expected: KeyMetadata,
        found: KeyMetadata,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Circuit shape a key pair belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub config: CircuitConfig,
    pub num_cancels: usize,
}

/// Keys for a single circuit
#[derive(Clone)]
pub struct CircuitKeyPair {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
}

impl CircuitKeyPair {
    /// Serialize proving key to bytes
    pub fn serialize_pk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize verifying key to bytes
    pub fn serialize_vk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize proving key from bytes
    pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, SetupError> {
        ProvingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }

    /// Deserialize verifying key from bytes
    pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, SetupError> {
        VerifyingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }
}

/// Batch cancel keys together with the shape they were generated for.
#[derive(Clone)]
pub struct CircuitKeys {
    pub metadata: KeyMetadata,
    pub batch_cancel: CircuitKeyPair,
}

impl CircuitKeys {
    /// Save keys and metadata to a directory
    pub fn save_to_directory(&self, dir: &Path) -> Result<(), SetupError> {
        std::fs::create_dir_all(dir)?;

        std::fs::write(dir.join(PROVING_KEY_FILE), self.batch_cancel.serialize_pk()?)?;
        std::fs::write(dir.join(VERIFYING_KEY_FILE), self.batch_cancel.serialize_vk()?)?;

        let metadata = serde_json::to_string_pretty(&self.metadata)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        std::fs::write(dir.join(METADATA_FILE), metadata)?;

        Ok(())
    }

    /// Load keys from a directory, whatever shape they were generated for
    pub fn load_from_directory(dir: &Path) -> Result<Self, SetupError> {
        let metadata: KeyMetadata =
            serde_json::from_slice(&std::fs::read(dir.join(METADATA_FILE))?)
                .map_err(|e| SetupError::Deserialization(e.to_string()))?;
        metadata.config.validate()?;

        let batch_cancel = CircuitKeyPair {
            proving_key: CircuitKeyPair::deserialize_pk(&std::fs::read(
                dir.join(PROVING_KEY_FILE),
            )?)?,
            verifying_key: CircuitKeyPair::deserialize_vk(&std::fs::read(
                dir.join(VERIFYING_KEY_FILE),
            )?)?,
        };

        Ok(Self {
            metadata,
            batch_cancel,
        })
    }

    /// Load keys and fail unless they match `expected`
    pub fn load_checked(dir: &Path, expected: KeyMetadata) -> Result<Self, SetupError> {
        let keys = Self::load_from_directory(dir)?;
        keys.ensure_matches(expected)?;
        Ok(keys)
    }

    pub fn ensure_matches(&self, expected: KeyMetadata) -> Result<(), SetupError> {
        if self.metadata != expected {
            return Err(SetupError::ConfigMismatch {
                expected,
                found: self.metadata,
            });
        }
        Ok(())
    }
}

/// Run setup for a batch of `num_cancels` operations
pub fn setup_batch<R: RngCore + CryptoRng>(
    config: CircuitConfig,
    num_cancels: usize,
    rng: &mut R,
) -> Result<CircuitKeyPair, SetupError> {
    let circuit = BatchCancelCircuit::empty(config, num_cancels)?;
    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit, rng)
        .map_err(|e| SetupError::CircuitSetup(e.to_string()))?;

    Ok(CircuitKeyPair {
        proving_key: pk,
        verifying_key: vk,
    })
}

/// Run setup and bundle the keys with their metadata
pub fn setup_keys(config: CircuitConfig, num_cancels: usize) -> Result<CircuitKeys, SetupError> {
    // Use a fixed seed for reproducible setup (in production, use secure randomness)
    let mut rng = StdRng::seed_from_u64(42);

    info!(num_cancels, ?config, "setting up BatchCancelCircuit");
    let batch_cancel = setup_batch(config, num_cancels, &mut rng)?;

    Ok(CircuitKeys {
        metadata: KeyMetadata {
            config,
            num_cancels,
        },
        batch_cancel,
    })
}
