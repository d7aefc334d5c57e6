//! Circuit statistics utility - reports constraint counts per batch size
//!
//! Usage:
//!   cargo run --release --bin circuit-stats                        # batches of 1, 2, 4, 8
//!   cargo run --release --bin circuit-stats -- 1 16 32             # chosen batch sizes
//!   cargo run --release --bin circuit-stats -- --config cfg.json   # non-default circuit

use std::collections::BTreeMap;
use std::path::Path;

use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use rayon::prelude::*;

use cancel_circuits::{check_witness, BatchCancelCircuit, CircuitConfig};

fn count_constraints(config: CircuitConfig, num_cancels: usize) -> Result<usize, String> {
    let circuit = BatchCancelCircuit::empty(config, num_cancels).map_err(|e| e.to_string())?;
    let cs = ConstraintSystem::<Fr>::new_ref();
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| e.to_string())?;
    // Empty circuits use dummy values so they may not satisfy all constraints
    // The constraint count is still accurate
    Ok(cs.num_constraints())
}

/// `cancel[3].signature` -> `cancel.signature`
fn strip_index(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut in_brackets = false;
    for c in label.chars() {
        match c {
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            _ if !in_brackets => out.push(c),
            _ => {}
        }
    }
    out
}

fn load_config(path: &Path) -> Result<CircuitConfig, String> {
    let json = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let config: CircuitConfig = serde_json::from_str(&json).map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() {
    cancel_prover::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = CircuitConfig::default();
    let mut sizes = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let Some(path) = iter.next() else {
                eprintln!("--config needs a path");
                std::process::exit(2);
            };
            config = load_config(Path::new(path)).unwrap_or_else(|e| {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            });
        } else {
            match arg.parse::<usize>() {
                Ok(n) => sizes.push(n),
                Err(_) => {
                    eprintln!("Not a batch size: {}", arg);
                    std::process::exit(2);
                }
            }
        }
    }
    if sizes.is_empty() {
        sizes = vec![1, 2, 4, 8];
    }

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              BATCH CANCEL CIRCUIT STATS                  ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Accounts depth:        {}", config.accounts_depth);
    println!("Trading history depth: {}", config.trade_history_depth);
    println!("Order id bits:         {}", config.order_id_bits);
    println!("Re-cancel policy:      {:?}\n", config.recancel);

    println!("─────────────────────────────────────────────────────────────");
    println!("CONSTRAINTS PER BATCH SIZE:");
    println!("─────────────────────────────────────────────────────────────\n");

    let counts: Vec<(usize, Result<usize, String>)> = sizes
        .par_iter()
        .map(|&n| (n, count_constraints(config, n)))
        .collect();

    for (n, count) in &counts {
        match count {
            Ok(count) => println!(
                "{:>4} cancels   {:>10} constraints   {:>8} per cancel",
                n,
                count,
                count / (*n).max(1)
            ),
            Err(e) => println!("{:>4} cancels   failed: {}", n, e),
        }
    }

    println!("\n─────────────────────────────────────────────────────────────");
    println!("BREAKDOWN (batch of 1):");
    println!("─────────────────────────────────────────────────────────────\n");

    let report = BatchCancelCircuit::empty(config, 1)
        .map_err(|e| e.to_string())
        .and_then(|circuit| check_witness(circuit).map_err(|e| e.to_string()));
    match report {
        Ok(report) => {
            let mut by_check: BTreeMap<String, usize> = BTreeMap::new();
            for (range, label) in report.labels.iter() {
                *by_check.entry(strip_index(label)).or_default() += range.len();
            }
            for (label, count) in by_check {
                println!("{:40} {:>8}", label, count);
            }
            println!("\n{:40} {:>8}", "total", report.num_constraints);
        }
        Err(e) => println!("failed: {}", e),
    }
}
