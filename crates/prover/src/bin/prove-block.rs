//! Prove one block of cancellations read from JSON.
//!
//! Usage:
//!   cargo run --release --bin prove-block -- <block.json> [keys-dir] [out.json]
//!
//! Keys must have been generated for the block's number of cancellations
//! (see `export-vks`).

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, warn};

use cancel_circuits::bits::field_to_decimal;
use cancel_prover::{prove_with_keys, verify_proof, BlockInput, CircuitKeys};

fn main() {
    cancel_prover::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(block_path) = args.get(1) else {
        eprintln!("Usage: prove-block <block.json> [keys-dir] [out.json]");
        std::process::exit(2);
    };
    let keys_dir = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("keys"));
    let out_path = args.get(3).map(PathBuf::from);

    let start = Instant::now();
    let keys = CircuitKeys::load_from_directory(&keys_dir).unwrap_or_else(|e| {
        error!("Failed to load keys from {:?}: {}", keys_dir, e);
        std::process::exit(1);
    });
    info!("Keys loaded in {:?}", start.elapsed());

    let circuit = BlockInput::from_file(Path::new(block_path))
        .and_then(|block| block.into_circuit(keys.metadata.config))
        .unwrap_or_else(|e| {
            error!("Failed to read block {}: {}", block_path, e);
            std::process::exit(1);
        });

    if let Err(e) = circuit.ensure_size(keys.metadata.num_cancels) {
        error!("Keys in {:?} do not fit this block: {}", keys_dir, e);
        std::process::exit(1);
    }

    if let Err(e) = circuit.preflight() {
        warn!("Preflight: {}", e);
    }
    if let Ok(diagnostics) = circuit.diagnostics() {
        info!("Public data hash: {}", diagnostics.public_input);
    }

    let start = Instant::now();
    let proof = match prove_with_keys(&keys, circuit) {
        Ok(proof) => proof,
        Err(e) => {
            error!("Proof generation failed: {}", e);
            std::process::exit(1);
        }
    };
    info!("Proof generated in {:?}", start.elapsed());

    match verify_proof(&keys.batch_cancel.verifying_key, &proof) {
        Ok(true) => info!("Proof verified locally"),
        Ok(false) => {
            error!("Proof does not verify");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Verification failed: {}", e);
            std::process::exit(1);
        }
    }

    let proof_bytes = proof.serialize_proof().expect("Failed to serialize proof");
    let json = serde_json::json!({
        "proof": format!("0x{}", hex::encode(&proof_bytes)),
        "publicDataHash": field_to_decimal(&proof.public_inputs[0]),
    });
    let json = serde_json::to_string_pretty(&json).expect("Failed to encode JSON");

    match out_path {
        Some(path) => {
            std::fs::write(&path, json).expect("Failed to write proof");
            info!("Proof written to {:?}", path);
        }
        None => println!("{}", json),
    }
}
