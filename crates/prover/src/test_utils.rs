//! Shared fixtures for prover tests.

use ark_bn254::Fr;
use cancel_circuits::{
    AccountLeaf, BatchCancelCircuit, CircuitConfig, EddsaParams, ExchangeState, KeyPair,
    TradeHistoryLeaf,
};

pub fn small_config() -> CircuitConfig {
    CircuitConfig {
        accounts_depth: 4,
        trade_history_depth: 6,
        order_id_bits: 4,
        ..CircuitConfig::default()
    }
}

/// One valid cancellation of order 3 of account 1.
pub fn one_cancel_batch() -> BatchCancelCircuit {
    let config = small_config();
    let owner = KeyPair::from_secret(&EddsaParams::default(), 5u64.into());

    let mut state = ExchangeState::new(config).unwrap();
    state
        .set_account(
            1,
            AccountLeaf {
                public_key: owner.public_key(),
                wallet_id: 0,
                token_id: 1,
                balance: Fr::from(40u64),
            },
        )
        .unwrap();
    state
        .set_trade_history(
            1,
            3,
            TradeHistoryLeaf {
                filled: Fr::from(2u64),
                cancelled: false,
            },
        )
        .unwrap();

    let root_before = state.trading_history_root();
    let cancellation = state.cancel_order(&owner, 1, 3).unwrap();

    BatchCancelCircuit::new(
        config,
        vec![cancellation],
        root_before,
        state.trading_history_root(),
        state.accounts_root(),
    )
    .unwrap()
}
