//! ZK circuits for batched order cancellation in an L2 exchange.
//!
//! A batch proves that N cancel operations were applied, in order, to the
//! trading history tree, each authorised by the account's EdDSA key, while
//! revealing nothing but a SHA-256 commitment to
//! `[rootBefore][rootAfter][account, orderID]*`.
//!
//! - [`BatchCancelCircuit`]: the provable unit, one public input
//! - [`CancelGadget`]: one cancel operation
//! - [`ExchangeState`]: in-memory trees used to produce witnesses
//! - [`check_witness`]: evaluate a witness and name the first failing check

pub mod batch;
pub mod bits;
pub mod cancel;
pub mod config;
pub mod eddsa;
pub mod error;
pub mod poseidon;
pub mod public_data;
pub mod smt;
pub mod state;
pub mod witness_check;

#[cfg(test)]
mod tests;

pub use batch::{BatchCancelCircuit, BatchDiagnostics, RootLink, RootSource};
pub use cancel::{AccountUpdate, CancelGadget, CancelOutput, Cancellation, TradeHistoryUpdate};
pub use config::{
    CircuitConfig, RecancelPolicy, NUM_BITS_ORDER_ID, NUM_BITS_PADDING, NUM_BITS_WALLET_ID,
    TOKEN_ID_ETH, TREE_DEPTH_ACCOUNTS, TREE_DEPTH_TOKENS,
    TREE_DEPTH_TRADING_HISTORY,
};
pub use eddsa::{EddsaParams, KeyPair, Signature};
pub use error::{CircuitError, PreflightError};
pub use public_data::{pack_digest, PublicData, PUBLIC_INPUT_BITS};
pub use smt::{MerkleProof, SparseMerkleTree};
pub use state::{trade_history_address, AccountLeaf, ExchangeState, TradeHistoryLeaf};
pub use witness_check::{check_witness, ConstraintLabels, LabeledCircuit, WitnessReport};

use ark_bn254::Fr;

/// Common type aliases
pub type ConstraintF = Fr;
