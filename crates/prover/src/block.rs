//! JSON block input: the roots and cancellations of one batch.
//!
//! Field elements travel as decimal strings (`0x` hex is accepted on input).
//! Merkle proofs carry sibling hashes only; path directions come from the
//! account index and the trading history address.
//!
//! ```json
//! {
//!   "tradingHistoryMerkleRootBefore": "...",
//!   "tradingHistoryMerkleRootAfter": "...",
//!   "accountsMerkleRoot": "...",
//!   "cancels": [{
//!     "account": 7, "orderID": 42, "padding": 0,
//!     "signature": { "Rx": "...", "Ry": "...", "s": "..." },
//!     "tradeHistoryUpdate": { "before": {...}, "after": {...}, "proof": ["..."] },
//!     "accountUpdate": { "before": {...}, "after": {...}, "proof": ["..."] }
//!   }]
//! }
//! ```

use std::path::Path;

use ark_bn254::Fr;
use ark_ed_on_bn254::EdwardsAffine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cancel_circuits::bits::{check_width, field_to_decimal, parse_field};
use cancel_circuits::{
    trade_history_address, AccountLeaf, AccountUpdate, BatchCancelCircuit, Cancellation,
    CircuitConfig, CircuitError, MerkleProof, Signature, TradeHistoryLeaf, TradeHistoryUpdate,
};

/// Errors while reading or converting a block
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Malformed block JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid block: {0}")]
    Circuit(#[from] CircuitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInput {
    pub trading_history_merkle_root_before: String,
    pub trading_history_merkle_root_after: String,
    pub accounts_merkle_root: String,
    pub cancels: Vec<CancelInput>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelInput {
    pub account: u64,
    #[serde(rename = "orderID")]
    pub order_id: u64,
    #[serde(default)]
    pub padding: u64,
    pub signature: SignatureInput,
    pub trade_history_update: TradeHistoryUpdateInput,
    pub account_update: AccountUpdateInput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInput {
    #[serde(rename = "Rx")]
    pub r_x: String,
    #[serde(rename = "Ry")]
    pub r_y: String,
    pub s: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeHistoryLeafInput {
    pub filled: String,
    /// 0 or 1
    pub cancelled: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeHistoryUpdateInput {
    pub before: TradeHistoryLeafInput,
    pub after: TradeHistoryLeafInput,
    pub proof: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLeafInput {
    pub public_key_x: String,
    pub public_key_y: String,
    #[serde(rename = "walletID")]
    pub wallet_id: u32,
    #[serde(rename = "tokenID")]
    pub token_id: u32,
    pub balance: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateInput {
    pub before: AccountLeafInput,
    pub after: AccountLeafInput,
    pub proof: Vec<String>,
}

fn parse_path(field: &'static str, siblings: &[String]) -> Result<Vec<Fr>, CircuitError> {
    siblings.iter().map(|s| parse_field(field, s)).collect()
}

fn path_to_strings(proof: &MerkleProof) -> Vec<String> {
    proof.path().iter().map(field_to_decimal).collect()
}

impl TradeHistoryLeafInput {
    fn parse(&self) -> Result<TradeHistoryLeaf, CircuitError> {
        check_width("cancelled", self.cancelled, 1)?;
        Ok(TradeHistoryLeaf {
            filled: parse_field("filled", &self.filled)?,
            cancelled: self.cancelled == 1,
        })
    }

    fn from_leaf(leaf: &TradeHistoryLeaf) -> Self {
        Self {
            filled: field_to_decimal(&leaf.filled),
            cancelled: leaf.cancelled as u64,
        }
    }
}

impl AccountLeafInput {
    fn parse(&self) -> Result<AccountLeaf, CircuitError> {
        Ok(AccountLeaf {
            public_key: EdwardsAffine::new_unchecked(
                parse_field("publicKeyX", &self.public_key_x)?,
                parse_field("publicKeyY", &self.public_key_y)?,
            ),
            wallet_id: self.wallet_id,
            token_id: self.token_id,
            balance: parse_field("balance", &self.balance)?,
        })
    }

    fn from_leaf(leaf: &AccountLeaf) -> Self {
        Self {
            public_key_x: field_to_decimal(&leaf.public_key.x),
            public_key_y: field_to_decimal(&leaf.public_key.y),
            wallet_id: leaf.wallet_id,
            token_id: leaf.token_id,
            balance: field_to_decimal(&leaf.balance),
        }
    }
}

impl CancelInput {
    fn parse(&self, config: &CircuitConfig) -> Result<Cancellation, CircuitError> {
        let signature = Signature {
            r: EdwardsAffine::new_unchecked(
                parse_field("signature.Rx", &self.signature.r_x)?,
                parse_field("signature.Ry", &self.signature.r_y)?,
            ),
            s: parse_field("signature.s", &self.signature.s)?,
        };

        let trade = &self.trade_history_update;
        let address = trade_history_address(config, self.account, self.order_id);
        let trade_history = TradeHistoryUpdate {
            before: trade.before.parse()?,
            after: trade.after.parse()?,
            proof: MerkleProof::from_siblings(
                parse_path("tradeHistoryUpdate.proof", &trade.proof)?,
                address,
            ),
        };

        let account = &self.account_update;
        let account_update = AccountUpdate {
            before: account.before.parse()?,
            after: account.after.parse()?,
            proof: MerkleProof::from_siblings(
                parse_path("accountUpdate.proof", &account.proof)?,
                self.account,
            ),
        };

        Ok(Cancellation {
            account: self.account,
            order_id: self.order_id,
            padding: self.padding,
            signature,
            trade_history,
            account_update,
        })
    }

    fn from_cancellation(cancellation: &Cancellation) -> Self {
        let trade = &cancellation.trade_history;
        let account = &cancellation.account_update;
        Self {
            account: cancellation.account,
            order_id: cancellation.order_id,
            padding: cancellation.padding,
            signature: SignatureInput {
                r_x: field_to_decimal(&cancellation.signature.r.x),
                r_y: field_to_decimal(&cancellation.signature.r.y),
                s: field_to_decimal(&cancellation.signature.s),
            },
            trade_history_update: TradeHistoryUpdateInput {
                before: TradeHistoryLeafInput::from_leaf(&trade.before),
                after: TradeHistoryLeafInput::from_leaf(&trade.after),
                proof: path_to_strings(&trade.proof),
            },
            account_update: AccountUpdateInput {
                before: AccountLeafInput::from_leaf(&account.before),
                after: AccountLeafInput::from_leaf(&account.after),
                proof: path_to_strings(&account.proof),
            },
        }
    }
}

impl BlockInput {
    pub fn from_json(json: &str) -> Result<Self, BlockError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, BlockError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String, BlockError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the batch circuit. Every structural error names the offending
    /// field, and cancellation errors carry their position in the block.
    pub fn into_circuit(self, config: CircuitConfig) -> Result<BatchCancelCircuit, BlockError> {
        let cancellations = self
            .cancels
            .iter()
            .enumerate()
            .map(|(index, cancel)| cancel.parse(&config).map_err(|e| e.at(index)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchCancelCircuit::from_strings(
            config,
            cancellations,
            &self.trading_history_merkle_root_before,
            &self.trading_history_merkle_root_after,
            &self.accounts_merkle_root,
        )?)
    }

    /// Export a batch in block form.
    pub fn from_circuit(circuit: &BatchCancelCircuit) -> Self {
        Self {
            trading_history_merkle_root_before: field_to_decimal(
                &circuit.trading_history_root_before(),
            ),
            trading_history_merkle_root_after: field_to_decimal(
                &circuit.trading_history_root_after(),
            ),
            accounts_merkle_root: field_to_decimal(&circuit.accounts_root()),
            cancels: circuit
                .cancellations()
                .iter()
                .map(CancelInput::from_cancellation)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{one_cancel_batch, small_config};

    #[test]
    fn test_export_and_reimport() {
        let circuit = one_cancel_batch();
        let json = BlockInput::from_circuit(&circuit).to_json().unwrap();

        assert!(json.contains("\"orderID\": 3"));
        assert!(json.contains("\"tradingHistoryMerkleRootBefore\""));
        assert!(json.contains("\"Rx\""));
        assert!(json.contains("\"walletID\""));

        let rebuilt = BlockInput::from_json(&json)
            .unwrap()
            .into_circuit(small_config())
            .unwrap();
        assert_eq!(rebuilt.cancellations(), circuit.cancellations());
        assert_eq!(rebuilt.public_data_hash(), circuit.public_data_hash());
        assert!(rebuilt.preflight().is_ok());
    }

    #[test]
    fn test_bad_field_is_named() {
        let mut block = BlockInput::from_circuit(&one_cancel_batch());
        block.cancels[0].account_update.before.balance = "forty".to_string();

        match block.into_circuit(small_config()) {
            Err(BlockError::Circuit(CircuitError::Cancellation { index, source })) => {
                assert_eq!(index, 0);
                assert_eq!(
                    *source,
                    CircuitError::ParseField {
                        field: "balance",
                        value: "forty".to_string()
                    }
                );
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.num_cancels())),
        }
    }

    #[test]
    fn test_cancelled_flag_is_a_bit() {
        let mut block = BlockInput::from_circuit(&one_cancel_batch());
        block.cancels[0].trade_history_update.after.cancelled = 2;

        assert!(matches!(
            block.into_circuit(small_config()),
            Err(BlockError::Circuit(CircuitError::Cancellation { .. }))
        ));
    }

    #[test]
    fn test_short_proof_rejected() {
        let mut block = BlockInput::from_circuit(&one_cancel_batch());
        block.cancels[0].account_update.proof.pop();

        match block.into_circuit(small_config()) {
            Err(BlockError::Circuit(CircuitError::Cancellation { source, .. })) => {
                assert!(matches!(*source, CircuitError::ProofDepth { tree: "accounts", .. }));
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.num_cancels())),
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(BlockInput::from_json("{"), Err(BlockError::Json(_))));
    }
}
