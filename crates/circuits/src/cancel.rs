//! The cancel operation: one order of one account marked cancelled.
//!
//! [`CancelGadget::alloc`] assigns every witness of one operation and
//! [`CancelGadget::enforce`] emits its constraints, in that order:
//!
//! 1. the account leaf authenticates against the accounts root
//! 2. the trading history leaf moves from `(filled, cancelledBefore)` to
//!    `(filled, cancelledAfter)` under the incoming root
//! 3. `cancelledAfter == 1`
//! 4. the account key signed `account ‖ orderID ‖ padding`
//!
//! and hands back the new trading history root plus this operation's public
//! data bits.

use ark_bn254::Fr;
use ark_ed_on_bn254::{constraints::EdwardsVar, EdwardsProjective};
use ark_r1cs_std::{boolean::Boolean, fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::bits::{check_width, u64_to_bits_le};
use crate::config::{CircuitConfig, RecancelPolicy};
use crate::eddsa::{verify_signature, EddsaParams, Signature, SignatureVar};
use crate::error::CircuitError;
use crate::poseidon::poseidon_hash_many_var;
use crate::smt::{verify_and_update, verify_membership, MerkleProof, MerkleProofVar};
use crate::state::{trade_history_address, AccountLeaf, TradeHistoryLeaf};
use crate::witness_check::ConstraintLabels;

/// Trading history leaf before and after the cancel, with its path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeHistoryUpdate {
    pub before: TradeHistoryLeaf,
    pub after: TradeHistoryLeaf,
    pub proof: MerkleProof,
}

/// Account leaf before and after the cancel, with its path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdate {
    pub before: AccountLeaf,
    pub after: AccountLeaf,
    pub proof: MerkleProof,
}

/// Private witness for one cancel operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cancellation {
    pub account: u64,
    pub order_id: u64,
    pub padding: u64,
    pub signature: Signature,
    pub trade_history: TradeHistoryUpdate,
    pub account_update: AccountUpdate,
}

impl Cancellation {
    /// Placeholder witness of the right shape, used for key generation.
    pub fn dummy(config: &CircuitConfig) -> Self {
        let zeros = |depth| MerkleProof::from_siblings(vec![Fr::from(0u64); depth], 0);
        Self {
            account: 0,
            order_id: 0,
            padding: 0,
            signature: Signature::default(),
            trade_history: TradeHistoryUpdate {
                before: TradeHistoryLeaf::default(),
                after: TradeHistoryLeaf::default(),
                proof: zeros(config.trade_history_depth),
            },
            account_update: AccountUpdate {
                before: AccountLeaf::default(),
                after: AccountLeaf::default(),
                proof: zeros(config.accounts_depth),
            },
        }
    }

    /// Structural checks: every integer fits its width and every proof has
    /// the depth of its tree. Says nothing about whether the witness is valid.
    pub fn validate(&self, config: &CircuitConfig) -> Result<(), CircuitError> {
        check_width("account", self.account, config.accounts_depth)?;
        check_width("orderID", self.order_id, config.order_id_bits)?;
        check_width("padding", self.padding, config.padding_bits)?;

        for leaf in [&self.account_update.before, &self.account_update.after] {
            check_width("walletID", leaf.wallet_id as u64, config.wallet_id_bits)?;
            check_width("tokenID", leaf.token_id as u64, config.token_id_bits())?;

            let pk = leaf.public_key;
            if !pk.is_on_curve() || !pk.is_in_correct_subgroup_assuming_on_curve() {
                return Err(CircuitError::InvalidPoint { field: "publicKey" });
            }
        }

        self.account_update
            .proof
            .check_depth("accounts", config.accounts_depth)?;
        self.trade_history
            .proof
            .check_depth("trading history", config.trade_history_depth)?;

        Ok(())
    }

    /// Leaf index of this order in the trading history tree.
    pub fn address(&self, config: &CircuitConfig) -> u64 {
        trade_history_address(config, self.account, self.order_id)
    }

    /// Trading history root after this operation, given the proof it carries.
    pub fn root_out(&self, config: &CircuitConfig) -> Fr {
        self.trade_history
            .proof
            .compute_root_at(self.trade_history.after.hash(), self.address(config))
    }
}

/// Account leaf fields as circuit variables.
struct AccountLeafVar {
    public_key: EdwardsVar,
    wallet_id: FpVar<Fr>,
    token_id: FpVar<Fr>,
    balance: FpVar<Fr>,
}

impl AccountLeafVar {
    fn new_witness(cs: ConstraintSystemRef<Fr>, leaf: &AccountLeaf) -> Result<Self, SynthesisError> {
        Ok(Self {
            public_key: EdwardsVar::new_witness(cs.clone(), || {
                Ok(EdwardsProjective::from(leaf.public_key))
            })?,
            wallet_id: FpVar::new_witness(cs.clone(), || Ok(Fr::from(leaf.wallet_id)))?,
            token_id: FpVar::new_witness(cs.clone(), || Ok(Fr::from(leaf.token_id)))?,
            balance: FpVar::new_witness(cs, || Ok(leaf.balance))?,
        })
    }

    fn hash(&self, cs: ConstraintSystemRef<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        poseidon_hash_many_var(
            cs,
            &[
                self.public_key.x.clone(),
                self.public_key.y.clone(),
                self.wallet_id.clone(),
                self.token_id.clone(),
                self.balance.clone(),
            ],
        )
    }

    fn enforce_equal(&self, other: &Self) -> Result<(), SynthesisError> {
        self.public_key.enforce_equal(&other.public_key)?;
        self.wallet_id.enforce_equal(&other.wallet_id)?;
        self.token_id.enforce_equal(&other.token_id)?;
        self.balance.enforce_equal(&other.balance)
    }
}

/// Result of one cancel operation.
pub struct CancelOutput {
    pub trading_history_root_out: FpVar<Fr>,
    /// Account bits then order id bits, each MSB-first
    pub public_data: Vec<Boolean<Fr>>,
}

/// Allocated witnesses of one cancel operation.
pub struct CancelGadget {
    index: usize,
    config: CircuitConfig,
    params: EddsaParams,

    trading_history_root_in: FpVar<Fr>,
    accounts_root: FpVar<Fr>,

    /// Little-endian
    account_bits: Vec<Boolean<Fr>>,
    order_id_bits: Vec<Boolean<Fr>>,
    padding_bits: Vec<Boolean<Fr>>,

    account_before: AccountLeafVar,
    account_after: AccountLeafVar,
    account_proof: MerkleProofVar,

    filled: FpVar<Fr>,
    filled_after: FpVar<Fr>,
    cancelled_before: FpVar<Fr>,
    cancelled_after: FpVar<Fr>,
    trade_history_proof: MerkleProofVar,

    signature: SignatureVar,
}

fn alloc_bits(
    cs: &ConstraintSystemRef<Fr>,
    field: &'static str,
    value: u64,
    width: usize,
) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    // Widths are checked when the batch is built.
    let bits = u64_to_bits_le(field, value, width).map_err(|_| SynthesisError::Unsatisfiable)?;
    bits.into_iter()
        .map(|bit| Boolean::new_witness(cs.clone(), || Ok(bit)))
        .collect()
}

fn msb_first(bits: &[Boolean<Fr>]) -> impl Iterator<Item = Boolean<Fr>> + '_ {
    bits.iter().rev().cloned()
}

impl CancelGadget {
    /// Assign every witness of operation `index`.
    pub fn alloc(
        cs: ConstraintSystemRef<Fr>,
        index: usize,
        config: &CircuitConfig,
        params: &EddsaParams,
        cancellation: &Cancellation,
        trading_history_root_in: FpVar<Fr>,
        accounts_root: FpVar<Fr>,
    ) -> Result<Self, SynthesisError> {
        let trade = &cancellation.trade_history;
        let account = &cancellation.account_update;

        Ok(Self {
            index,
            config: *config,
            params: *params,
            trading_history_root_in,
            accounts_root,

            account_bits: alloc_bits(&cs, "account", cancellation.account, config.accounts_depth)?,
            order_id_bits: alloc_bits(&cs, "orderID", cancellation.order_id, config.order_id_bits)?,
            padding_bits: alloc_bits(&cs, "padding", cancellation.padding, config.padding_bits)?,

            account_before: AccountLeafVar::new_witness(cs.clone(), &account.before)?,
            account_after: AccountLeafVar::new_witness(cs.clone(), &account.after)?,
            account_proof: MerkleProofVar::new_witness(cs.clone(), &account.proof)?,

            filled: FpVar::new_witness(cs.clone(), || Ok(trade.before.filled))?,
            filled_after: FpVar::new_witness(cs.clone(), || Ok(trade.after.filled))?,
            cancelled_before: FpVar::new_witness(cs.clone(), || Ok(Fr::from(trade.before.cancelled)))?,
            cancelled_after: FpVar::new_witness(cs.clone(), || Ok(Fr::from(trade.after.cancelled)))?,
            trade_history_proof: MerkleProofVar::new_witness(cs.clone(), &trade.proof)?,

            signature: SignatureVar::new_witness(cs, &cancellation.signature)?,
        })
    }

    fn label(&self, check: &str) -> String {
        format!("cancel[{}].{}", self.index, check)
    }

    /// Emit the constraints of this operation.
    pub fn enforce(
        self,
        cs: ConstraintSystemRef<Fr>,
        labels: &mut ConstraintLabels,
    ) -> Result<CancelOutput, SynthesisError> {
        labels.scope(&cs, self.label("account leaf unchanged"), |_| {
            self.account_after.enforce_equal(&self.account_before)
        })?;

        labels.scope(&cs, self.label("accountsMerkleRoot"), |_| {
            let leaf = self.account_before.hash(cs.clone())?;
            verify_membership(
                cs.clone(),
                &self.accounts_root,
                &leaf,
                &self.account_proof,
                &self.account_bits,
            )
        })?;

        labels.scope(&cs, self.label("filled unchanged"), |_| {
            self.filled_after.enforce_equal(&self.filled)
        })?;

        labels.scope(&cs, self.label("cancelledAfter == 1"), |_| {
            self.cancelled_after.enforce_equal(&FpVar::one())
        })?;

        if self.config.recancel == RecancelPolicy::Reject {
            // `is_eq` assigns its helper for any value, so a re-cancel
            // shows up as an unsatisfied constraint rather than a missing
            // assignment.
            labels.scope(&cs, self.label("cancelledBefore != 1"), |_| {
                self.cancelled_before
                    .is_eq(&FpVar::one())?
                    .enforce_equal(&Boolean::FALSE)
            })?;
        }

        let trading_history_root_out =
            labels.scope(&cs, self.label("tradingHistoryMerkleRoot"), |_| {
                let address_bits: Vec<Boolean<Fr>> = self
                    .order_id_bits
                    .iter()
                    .chain(self.account_bits.iter())
                    .take(self.config.trade_history_depth)
                    .cloned()
                    .collect();

                let old_leaf = poseidon_hash_many_var(
                    cs.clone(),
                    &[self.filled.clone(), self.cancelled_before.clone()],
                )?;
                let new_leaf = poseidon_hash_many_var(
                    cs.clone(),
                    &[self.filled_after.clone(), self.cancelled_after.clone()],
                )?;

                verify_and_update(
                    cs.clone(),
                    &self.trading_history_root_in,
                    &old_leaf,
                    &new_leaf,
                    &self.trade_history_proof,
                    &address_bits,
                )
            })?;

        labels.scope(&cs, self.label("signature"), |_| {
            let message: Vec<Boolean<Fr>> = self
                .account_bits
                .iter()
                .chain(self.order_id_bits.iter())
                .chain(self.padding_bits.iter())
                .cloned()
                .collect();

            verify_signature(
                cs.clone(),
                &self.params,
                &self.account_before.public_key,
                &message,
                &self.signature,
            )
        })?;

        let public_data = msb_first(&self.account_bits)
            .chain(msb_first(&self.order_id_bits))
            .collect();

        Ok(CancelOutput {
            trading_history_root_out,
            public_data,
        })
    }
}
