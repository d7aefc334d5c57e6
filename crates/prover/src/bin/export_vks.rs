//! Export the batch cancel verifying key.
//!
//! This tool generates or loads keys for one batch size and exports the
//! verifying key as hex, for use by an on-chain verifier.
//!
//! Usage:
//!   cargo run --release --bin export-vks -- [keys-dir] [num-cancels]

use std::path::PathBuf;

use tracing::info;

use cancel_circuits::CircuitConfig;
use cancel_prover::setup::{setup_keys, CircuitKeys, KeyMetadata};

fn main() {
    cancel_prover::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let keys_dir = PathBuf::from(args.get(1).map(String::as_str).unwrap_or("keys"));
    let num_cancels: usize = args
        .get(2)
        .map(|n| n.parse().expect("num-cancels must be a number"))
        .unwrap_or(1);
    let expected = KeyMetadata {
        config: CircuitConfig::default(),
        num_cancels,
    };

    let keys = if keys_dir.exists() {
        info!("Loading existing keys from {:?}", keys_dir);
        CircuitKeys::load_checked(&keys_dir, expected).expect("Failed to load keys")
    } else {
        info!("Running trusted setup (this may take a while)...");
        let keys = setup_keys(expected.config, num_cancels).expect("Failed to setup circuit");
        keys.save_to_directory(&keys_dir).expect("Failed to save keys");
        info!("Keys saved to {:?}", keys_dir);
        keys
    };

    let vk = keys.batch_cancel.serialize_vk().expect("Failed to serialize verifying key");

    println!("\n=== Verifying Key (batch of {}) ===\n", num_cancels);
    println!("BatchCancel VK ({} bytes):", vk.len());
    println!("0x{}\n", hex::encode(&vk));

    // Also export as JSON for scripting
    let json = serde_json::json!({
        "num_cancels": num_cancels,
        "config": keys.metadata.config,
        "batch_cancel_vk": format!("0x{}", hex::encode(&vk)),
    });

    let json_path = keys_dir.join("verifying_key.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&json).expect("Failed to encode JSON"))
        .expect("Failed to write JSON");
    println!("JSON exported to {:?}", json_path);
}
