//! Structural errors raised while building a batch.
//!
//! These are caller contract violations (wrong widths, wrong proof depths,
//! unparsable field strings). A witness that is well-formed but wrong never
//! produces one of these: it builds fine and fails the witness check instead.

use ark_relations::r1cs::SynthesisError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitError {
    #[error("{field} = {value} does not fit in {bits} bits")]
    BitWidth {
        field: &'static str,
        bits: usize,
        value: String,
    },
    #[error("{tree} Merkle proof has depth {actual}, expected {expected}")]
    ProofDepth {
        tree: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid field element for {field}: {value:?}")]
    ParseField { field: &'static str, value: String },
    #[error("{field} is not a point of the prime-order subgroup")]
    InvalidPoint { field: &'static str },
    #[error("invalid circuit configuration: {0}")]
    InvalidConfig(String),
    #[error("batch holds {actual} cancellations, circuit was configured for {expected}")]
    BatchSize { expected: usize, actual: usize },
    #[error("cancellation {index}: {source}")]
    Cancellation {
        index: usize,
        #[source]
        source: Box<CircuitError>,
    },
    #[error("public data hashing failed: {0}")]
    Hash(String),
    #[error("constraint synthesis failed: {0}")]
    Synthesis(String),
}

impl CircuitError {
    /// Attach the position of the offending cancellation within its batch.
    pub fn at(self, index: usize) -> Self {
        CircuitError::Cancellation {
            index,
            source: Box::new(self),
        }
    }
}

impl From<SynthesisError> for CircuitError {
    fn from(e: SynthesisError) -> Self {
        CircuitError::Synthesis(e.to_string())
    }
}

/// First problem found by the native pre-flight of a batch.
///
/// Diagnostic only: the circuit rejects the same witnesses on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreflightError {
    #[error("cancellation {index}: signature does not verify")]
    Signature { index: usize },
    #[error("cancellation {index}: account leaf is not under the accounts root")]
    AccountMembership { index: usize },
    #[error("cancellation {index}: account leaf changed")]
    AccountChanged { index: usize },
    #[error("cancellation {index}: trading history leaf is not under its input root")]
    TradeHistoryMembership { index: usize },
    #[error("cancellation {index}: order is already cancelled")]
    AlreadyCancelled { index: usize },
    #[error("cancellation {index}: trading history leaf after is not a cancel of the leaf before")]
    NotCancelled { index: usize },
    #[error("final trading history root does not match the claimed root")]
    FinalRoot,
    #[error("public data hash does not match the committed digest")]
    Commitment,
}
