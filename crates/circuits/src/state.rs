//! Ledger leaves and an in-memory exchange state used to build witnesses.
//!
//! The circuit never sees this type; it only sees the `Cancellation` records
//! produced by [`ExchangeState::cancel_order`].

use std::collections::HashMap;

use ark_bn254::Fr;
use ark_ed_on_bn254::EdwardsAffine;
use ark_ff::Field;
use tracing::debug;

use crate::bits::check_width;
use crate::cancel::{AccountUpdate, Cancellation, TradeHistoryUpdate};
use crate::config::CircuitConfig;
use crate::eddsa::{EddsaParams, KeyPair};
use crate::error::CircuitError;
use crate::poseidon::poseidon_hash_many;
use crate::smt::{MerkleProof, SparseMerkleTree};

/// One leaf of the accounts tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountLeaf {
    pub public_key: EdwardsAffine,
    pub wallet_id: u32,
    pub token_id: u32,
    pub balance: Fr,
}

impl Default for AccountLeaf {
    fn default() -> Self {
        Self {
            public_key: EdwardsAffine::zero(),
            wallet_id: 0,
            token_id: 0,
            balance: Fr::from(0u64),
        }
    }
}

impl AccountLeaf {
    /// Poseidon(pk.x, pk.y, walletId, tokenId, balance)
    pub fn hash(&self) -> Fr {
        poseidon_hash_many(&[
            self.public_key.x,
            self.public_key.y,
            Fr::from(self.wallet_id),
            Fr::from(self.token_id),
            self.balance,
        ])
    }
}

/// One leaf of the trading history tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TradeHistoryLeaf {
    pub filled: Fr,
    pub cancelled: bool,
}

impl TradeHistoryLeaf {
    /// Poseidon(filled, cancelled)
    pub fn hash(&self) -> Fr {
        poseidon_hash_many(&[self.filled, Fr::from(self.cancelled)])
    }
}

/// Leaf index of `(account, order_id)` in the trading history tree.
///
/// The low `trade_history_depth` bits of `orderId ‖ account`, with the order
/// id in the low bits.
pub fn trade_history_address(config: &CircuitConfig, account: u64, order_id: u64) -> u64 {
    let joined = (order_id as u128) | ((account as u128) << config.order_id_bits);
    let mask = (1u128 << config.trade_history_depth) - 1;
    (joined & mask) as u64
}

/// The signed message `account ‖ orderId ‖ padding` packed little-endian.
pub fn signed_message(config: &CircuitConfig, account: u64, order_id: u64, padding: u64) -> Fr {
    let two = Fr::from(2u64);
    Fr::from(account)
        + Fr::from(order_id) * two.pow([config.accounts_depth as u64])
        + Fr::from(padding) * two.pow([(config.accounts_depth + config.order_id_bits) as u64])
}

/// Accounts and trading history trees held in memory.
#[derive(Clone, Debug)]
pub struct ExchangeState {
    config: CircuitConfig,
    params: EddsaParams,
    accounts: SparseMerkleTree,
    trading_history: SparseMerkleTree,
    account_leaves: HashMap<u64, AccountLeaf>,
    trade_leaves: HashMap<u64, TradeHistoryLeaf>,
}

impl ExchangeState {
    pub fn new(config: CircuitConfig) -> Result<Self, CircuitError> {
        config.validate()?;
        Ok(Self {
            config,
            params: EddsaParams::default(),
            accounts: SparseMerkleTree::new(config.accounts_depth, AccountLeaf::default().hash()),
            trading_history: SparseMerkleTree::new(
                config.trade_history_depth,
                TradeHistoryLeaf::default().hash(),
            ),
            account_leaves: HashMap::new(),
            trade_leaves: HashMap::new(),
        })
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Write an account leaf. Returns the new accounts root.
    pub fn set_account(&mut self, index: u64, leaf: AccountLeaf) -> Result<Fr, CircuitError> {
        check_width("walletID", leaf.wallet_id as u64, self.config.wallet_id_bits)?;
        check_width("tokenID", leaf.token_id as u64, self.config.token_id_bits())?;

        let root = self.accounts.update(index, leaf.hash())?;
        self.account_leaves.insert(index, leaf);
        Ok(root)
    }

    pub fn account(&self, index: u64) -> AccountLeaf {
        self.account_leaves.get(&index).copied().unwrap_or_default()
    }

    pub fn account_proof(&self, index: u64) -> Result<MerkleProof, CircuitError> {
        self.accounts.proof(index)
    }

    /// Write the trading history leaf of `(account, order_id)`. Returns the new
    /// trading history root.
    pub fn set_trade_history(
        &mut self,
        account: u64,
        order_id: u64,
        leaf: TradeHistoryLeaf,
    ) -> Result<Fr, CircuitError> {
        let address = self.address(account, order_id)?;
        let root = self.trading_history.update(address, leaf.hash())?;
        self.trade_leaves.insert(address, leaf);
        Ok(root)
    }

    pub fn trade_history(&self, account: u64, order_id: u64) -> Result<TradeHistoryLeaf, CircuitError> {
        let address = self.address(account, order_id)?;
        Ok(self.trade_leaves.get(&address).copied().unwrap_or_default())
    }

    pub fn accounts_root(&self) -> Fr {
        self.accounts.root()
    }

    pub fn trading_history_root(&self) -> Fr {
        self.trading_history.root()
    }

    fn address(&self, account: u64, order_id: u64) -> Result<u64, CircuitError> {
        check_width("account", account, self.config.accounts_depth)?;
        check_width("orderID", order_id, self.config.order_id_bits)?;
        Ok(trade_history_address(&self.config, account, order_id))
    }

    /// Cancel `order_id` of `account`, signing with `keypair`.
    ///
    /// The trading history tree is updated in place, so successive calls
    /// produce a chain of cancellations that can be batched in order.
    pub fn cancel_order(
        &mut self,
        keypair: &KeyPair,
        account: u64,
        order_id: u64,
    ) -> Result<Cancellation, CircuitError> {
        let padding = 0;
        let address = self.address(account, order_id)?;

        let account_leaf = self.account(account);
        let account_proof = self.accounts.proof(account)?;

        let before = self.trade_leaves.get(&address).copied().unwrap_or_default();
        let after = TradeHistoryLeaf {
            filled: before.filled,
            cancelled: true,
        };
        let trade_proof = self.trading_history.proof(address)?;
        let root = self.trading_history.update(address, after.hash())?;
        self.trade_leaves.insert(address, after);

        let message = signed_message(&self.config, account, order_id, padding);
        let signature = keypair.sign(&self.params, message);

        debug!(account, order_id, address, "cancelled order, trading history root {}", root);

        Ok(Cancellation {
            account,
            order_id,
            padding,
            signature,
            trade_history: TradeHistoryUpdate {
                before,
                after,
                proof: trade_proof,
            },
            account_update: AccountUpdate {
                before: account_leaf,
                after: account_leaf,
                proof: account_proof,
            },
        })
    }
}
