//! Integration tests for the batch cancel circuit.

use ark_bn254::{Bn254, Fr};
use ark_ed_on_bn254::{EdwardsAffine, Fr as ScalarField};
use ark_ff::Field;
use ark_groth16::Groth16;
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};

use crate::bits::{field_to_bits_le, u64_to_bits_le};
use crate::{
    check_witness, trade_history_address, AccountLeaf, BatchCancelCircuit, Cancellation,
    CircuitConfig, CircuitError, EddsaParams, ExchangeState, KeyPair, PreflightError,
    RecancelPolicy, RootSource, TradeHistoryLeaf, TOKEN_ID_ETH,
};

/// Default tree depths, with order ids wide enough for order 42.
fn scenario_config() -> CircuitConfig {
    CircuitConfig {
        order_id_bits: 8,
        ..CircuitConfig::default()
    }
}

/// Shallow trees for tests that only care about composition.
fn small_config() -> CircuitConfig {
    CircuitConfig {
        accounts_depth: 4,
        trade_history_depth: 6,
        order_id_bits: 4,
        ..CircuitConfig::default()
    }
}

fn keypair(seed: u64) -> KeyPair {
    KeyPair::from_secret(&EddsaParams::default(), ScalarField::from(seed))
}

fn open_account(state: &mut ExchangeState, index: u64, keypair: &KeyPair, balance: u64) {
    state
        .set_account(
            index,
            AccountLeaf {
                public_key: keypair.public_key(),
                wallet_id: 1,
                token_id: TOKEN_ID_ETH,
                balance: Fr::from(balance),
            },
        )
        .unwrap();
}

fn place_order(state: &mut ExchangeState, account: u64, order_id: u64, filled: u64) {
    state
        .set_trade_history(
            account,
            order_id,
            TradeHistoryLeaf {
                filled: Fr::from(filled),
                cancelled: false,
            },
        )
        .unwrap();
}

/// Account 7 (balance 100, token 0) with order 42 filled 30, cancelled.
fn scenario() -> (ExchangeState, BatchCancelCircuit, Fr) {
    let config = scenario_config();
    let owner = keypair(7);

    let mut state = ExchangeState::new(config).unwrap();
    open_account(&mut state, 7, &owner, 100);
    place_order(&mut state, 7, 42, 30);

    let root_before = state.trading_history_root();
    let cancellation = state.cancel_order(&owner, 7, 42).unwrap();

    let circuit = BatchCancelCircuit::new(
        config,
        vec![cancellation],
        root_before,
        state.trading_history_root(),
        state.accounts_root(),
    )
    .unwrap();

    (state, circuit, root_before)
}

/// Rebuild `circuit` around modified cancellations, keeping the claimed roots.
fn rebuild(circuit: &BatchCancelCircuit, cancellations: Vec<Cancellation>) -> BatchCancelCircuit {
    BatchCancelCircuit::new(
        *circuit.config(),
        cancellations,
        circuit.trading_history_root_before(),
        circuit.trading_history_root_after(),
        circuit.accounts_root(),
    )
    .unwrap()
}

fn flip_bit(value: Fr, bit: usize) -> Fr {
    let step = Fr::from(2u64).pow([bit as u64]);
    if field_to_bits_le(&value, bit + 1)[bit] {
        value - step
    } else {
        value + step
    }
}

#[test]
fn test_scenario_cancel_satisfies() {
    let (state, circuit, _) = scenario();
    let accounts_root = state.accounts_root();

    let report = check_witness(circuit.clone()).unwrap();
    assert!(report.satisfied, "failed at {:?}", report.first_failure);
    println!("Batch of 1 constraints: {}", report.num_constraints);

    // One public input besides the constant one
    assert_eq!(report.num_instance_variables, 2);
    assert_eq!(circuit.public_inputs(), vec![circuit.public_data_hash()]);
    assert!(circuit.preflight().is_ok());

    // New root authenticates (filled 30, cancelled 1) at the address of (42, 7)
    let address = trade_history_address(circuit.config(), 7, 42);
    assert_eq!(address, (7 << 8) | 42);
    let cancelled = TradeHistoryLeaf {
        filled: Fr::from(30u64),
        cancelled: true,
    };
    let proof = &circuit.cancellations()[0].trade_history.proof;
    assert_eq!(proof.compute_root_at(cancelled.hash(), address), state.trading_history_root());

    // Accounts tree untouched
    assert_eq!(circuit.accounts_root(), accounts_root);
    assert_eq!(state.account(7).balance, Fr::from(100u64));
}

#[test]
fn test_cancelled_after_zero_fails() {
    let (_, circuit, _) = scenario();
    let mut cancellation = circuit.cancellations()[0].clone();
    cancellation.trade_history.after.cancelled = false;

    let report = check_witness(rebuild(&circuit, vec![cancellation])).unwrap();
    assert!(!report.satisfied);
    assert_eq!(report.failing_label(), Some("cancel[0].cancelledAfter == 1"));
}

#[test]
fn test_flipped_signature_scalar_fails() {
    let (_, circuit, _) = scenario();

    for bit in [0, 7, 128, 250] {
        let mut cancellation = circuit.cancellations()[0].clone();
        cancellation.signature.s = flip_bit(cancellation.signature.s, bit);

        let report = check_witness(rebuild(&circuit, vec![cancellation])).unwrap();
        assert_eq!(
            report.failing_label(),
            Some("cancel[0].signature"),
            "bit {} of s",
            bit
        );
    }
}

#[test]
fn test_flipped_signature_point_fails() {
    let (_, circuit, _) = scenario();
    let original = circuit.cancellations()[0].signature.r;

    let tampered = [
        EdwardsAffine::new_unchecked(flip_bit(original.x, 0), original.y),
        EdwardsAffine::new_unchecked(flip_bit(original.x, 100), original.y),
        EdwardsAffine::new_unchecked(original.x, flip_bit(original.y, 1)),
    ];

    for r in tampered {
        let mut cancellation = circuit.cancellations()[0].clone();
        cancellation.signature.r = r;

        let report = check_witness(rebuild(&circuit, vec![cancellation])).unwrap();
        assert_eq!(report.failing_label(), Some("cancel[0].signature"));
    }
}

#[test]
fn test_wrong_signer_fails() {
    let (_, circuit, _) = scenario();
    let mut cancellation = circuit.cancellations()[0].clone();
    let message = crate::state::signed_message(circuit.config(), 7, 42, 0);
    cancellation.signature = keypair(8).sign(&EddsaParams::default(), message);

    let circuit = rebuild(&circuit, vec![cancellation]);
    assert_eq!(circuit.preflight(), Err(PreflightError::Signature { index: 0 }));
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("cancel[0].signature"));
}

#[test]
fn test_account_proof_for_other_index_fails() {
    let config = scenario_config();
    let owner = keypair(7);

    let mut state = ExchangeState::new(config).unwrap();
    open_account(&mut state, 7, &owner, 100);
    open_account(&mut state, 8, &keypair(8), 5);
    place_order(&mut state, 7, 42, 30);

    let root_before = state.trading_history_root();
    let mut cancellation = state.cancel_order(&owner, 7, 42).unwrap();
    cancellation.account_update.proof = state.account_proof(8).unwrap();

    let circuit = BatchCancelCircuit::new(
        config,
        vec![cancellation],
        root_before,
        state.trading_history_root(),
        state.accounts_root(),
    )
    .unwrap();

    assert_eq!(
        circuit.preflight(),
        Err(PreflightError::AccountMembership { index: 0 })
    );
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("cancel[0].accountsMerkleRoot"));
}

#[test]
fn test_account_leaf_must_not_change() {
    let (_, circuit, _) = scenario();
    let mut cancellation = circuit.cancellations()[0].clone();
    cancellation.account_update.after.balance = Fr::from(99u64);

    let circuit = rebuild(&circuit, vec![cancellation]);
    assert_eq!(circuit.preflight(), Err(PreflightError::AccountChanged { index: 0 }));
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("cancel[0].account leaf unchanged"));
}

#[test]
fn test_filled_must_not_change() {
    let (_, circuit, root_before) = scenario();
    let config = *circuit.config();
    let mut cancellation = circuit.cancellations()[0].clone();
    cancellation.trade_history.after.filled = Fr::from(0u64);

    // Claim the root the altered leaf leads to, so only the filled check trips
    let root_after = cancellation.root_out(&config);
    let circuit = BatchCancelCircuit::new(
        config,
        vec![cancellation],
        root_before,
        root_after,
        circuit.accounts_root(),
    )
    .unwrap();

    assert_eq!(circuit.preflight(), Err(PreflightError::NotCancelled { index: 0 }));
    let report = check_witness(circuit).unwrap();
    assert!(!report.satisfied);
    assert_eq!(report.failing_label(), Some("cancel[0].filled unchanged"));
}

/// The address keeps only the low bits of the account, so accounts that
/// agree on those bits share trading history slots.
#[test]
fn test_trade_history_address_aliases_high_accounts() {
    let config = CircuitConfig::default();
    let shift = config.trade_history_depth - config.order_id_bits;
    let (a, b) = (7u64, 7u64 + (1 << shift));
    assert_eq!(b, 4103);
    assert_eq!(trade_history_address(&config, a, 5), 117);
    assert_eq!(trade_history_address(&config, b, 5), 117);

    let owner = keypair(7);
    let mut state = ExchangeState::new(config).unwrap();
    open_account(&mut state, a, &owner, 100);
    open_account(&mut state, b, &keypair(8), 100);
    place_order(&mut state, b, 5, 12);

    let root_before = state.trading_history_root();
    let cancellation = state.cancel_order(&owner, a, 5).unwrap();
    let circuit = BatchCancelCircuit::new(
        config,
        vec![cancellation],
        root_before,
        state.trading_history_root(),
        state.accounts_root(),
    )
    .unwrap();

    assert!(check_witness(circuit).unwrap().satisfied);
    let slot = state.trade_history(b, 5).unwrap();
    assert!(slot.cancelled);
    assert_eq!(slot.filled, Fr::from(12u64));
}

#[test]
fn test_batch_size_check() {
    let (_, circuit) = chained();
    assert!(circuit.ensure_size(3).is_ok());
    assert_eq!(
        circuit.ensure_size(4),
        Err(CircuitError::BatchSize {
            expected: 4,
            actual: 3
        })
    );
}

fn recancel(policy: RecancelPolicy) -> BatchCancelCircuit {
    let config = CircuitConfig {
        recancel: policy,
        ..small_config()
    };
    let owner = keypair(3);

    let mut state = ExchangeState::new(config).unwrap();
    open_account(&mut state, 3, &owner, 10);
    state
        .set_trade_history(
            3,
            5,
            TradeHistoryLeaf {
                filled: Fr::from(4u64),
                cancelled: true,
            },
        )
        .unwrap();

    let root_before = state.trading_history_root();
    let cancellation = state.cancel_order(&owner, 3, 5).unwrap();
    assert!(cancellation.trade_history.before.cancelled);
    // Cancelling twice leaves the leaf, and so the root, as it was
    assert_eq!(state.trading_history_root(), root_before);

    BatchCancelCircuit::new(
        config,
        vec![cancellation],
        root_before,
        state.trading_history_root(),
        state.accounts_root(),
    )
    .unwrap()
}

#[test]
fn test_recancel_rejected_by_default() {
    let circuit = recancel(RecancelPolicy::default());

    assert_eq!(
        circuit.preflight(),
        Err(PreflightError::AlreadyCancelled { index: 0 })
    );
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("cancel[0].cancelledBefore != 1"));
}

#[test]
fn test_recancel_allowed_by_policy() {
    let circuit = recancel(RecancelPolicy::Allow);

    assert!(circuit.preflight().is_ok());
    assert!(check_witness(circuit).unwrap().satisfied);
}

/// Three cancels over two accounts, applied in order.
fn chained() -> (ExchangeState, BatchCancelCircuit) {
    let config = small_config();
    let alice = keypair(1);
    let bob = keypair(2);

    let mut state = ExchangeState::new(config).unwrap();
    open_account(&mut state, 1, &alice, 50);
    open_account(&mut state, 2, &bob, 60);
    place_order(&mut state, 1, 3, 0);
    place_order(&mut state, 2, 3, 10);
    place_order(&mut state, 1, 9, 20);

    let root_before = state.trading_history_root();
    let cancellations = vec![
        state.cancel_order(&alice, 1, 3).unwrap(),
        state.cancel_order(&bob, 2, 3).unwrap(),
        state.cancel_order(&alice, 1, 9).unwrap(),
    ];

    let circuit = BatchCancelCircuit::new(
        config,
        cancellations,
        root_before,
        state.trading_history_root(),
        state.accounts_root(),
    )
    .unwrap();

    (state, circuit)
}

#[test]
fn test_chained_batch_satisfies() {
    let (state, circuit) = chained();

    let report = check_witness(circuit.clone()).unwrap();
    assert!(report.satisfied, "failed at {:?}", report.first_failure);
    assert!(report.labels.count("chain[2]") >= 1);
    println!("Batch of 3 constraints: {}", report.num_constraints);

    let chain = circuit.root_chain();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].source, RootSource::BatchBefore);
    assert_eq!(chain[0].root_in, circuit.trading_history_root_before());
    for pair in chain.windows(2) {
        assert_eq!(pair[1].source, RootSource::OutputOf(pair[0].index));
        assert_eq!(pair[1].root_in, pair[0].root_out);
    }
    assert_eq!(chain[2].root_out, state.trading_history_root());
    assert_eq!(chain[2].root_out, circuit.trading_history_root_after());
}

#[test]
fn test_reordered_batch_fails() {
    let (_, circuit) = chained();
    let mut cancellations = circuit.cancellations().to_vec();
    cancellations.swap(0, 1);

    let circuit = rebuild(&circuit, cancellations);
    assert_eq!(
        circuit.preflight(),
        Err(PreflightError::TradeHistoryMembership { index: 0 })
    );
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("cancel[0].tradingHistoryMerkleRoot"));
}

#[test]
fn test_wrong_claimed_root_after_fails() {
    let (_, circuit) = chained();
    let circuit = BatchCancelCircuit::new(
        *circuit.config(),
        circuit.cancellations().to_vec(),
        circuit.trading_history_root_before(),
        Fr::from(1u64),
        circuit.accounts_root(),
    )
    .unwrap();

    assert_eq!(circuit.preflight(), Err(PreflightError::FinalRoot));
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("tradingHistoryRootAfter"));
}

#[test]
fn test_public_data_hash_mismatch_fails() {
    let (_, circuit) = chained();
    let tampered = circuit.public_data_hash() + Fr::from(1u64);
    let circuit = circuit.with_public_data_hash(tampered);

    assert_eq!(circuit.preflight(), Err(PreflightError::Commitment));
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("publicData.check()"));
}

#[test]
fn test_public_data_ordering() {
    let (_, circuit) = chained();
    let config = circuit.config();
    let data = circuit.public_data().unwrap();
    let bits = data.bits();

    let per_cancel = config.public_data_bits_per_cancel();
    assert_eq!(bits.len(), 512 + 3 * per_cancel);

    let msb_first = |value: u64, width: usize| {
        let mut bits = u64_to_bits_le("test", value, width).unwrap();
        bits.reverse();
        bits
    };
    let mut before = field_to_bits_le(&circuit.trading_history_root_before(), 256);
    before.reverse();
    assert_eq!(&bits[..256], &before[..]);

    // Second operation: account 2 then order 3
    let op = &bits[512 + per_cancel..512 + 2 * per_cancel];
    assert_eq!(&op[..config.accounts_depth], &msb_first(2, config.accounts_depth)[..]);
    assert_eq!(&op[config.accounts_depth..], &msb_first(3, config.order_id_bits)[..]);

    let diagnostics = circuit.diagnostics().unwrap();
    assert_eq!(diagnostics.computed_commitment, diagnostics.public_input);
    assert_eq!(diagnostics.digest_hex.len(), 64);
    assert_eq!(diagnostics.public_data_hex, data.to_hex());
}

#[test]
fn test_empty_batch() {
    let config = small_config();
    let root = Fr::from(12345u64);

    let circuit = BatchCancelCircuit::new(config, vec![], root, root, Fr::from(0u64)).unwrap();
    assert!(check_witness(circuit).unwrap().satisfied);

    let circuit =
        BatchCancelCircuit::new(config, vec![], root, root + Fr::from(1u64), Fr::from(0u64)).unwrap();
    let report = check_witness(circuit).unwrap();
    assert_eq!(report.failing_label(), Some("tradingHistoryRootAfter"));
}

#[test]
fn test_structural_errors_name_the_field() {
    let config = small_config();

    let err = BatchCancelCircuit::from_strings(config, vec![], "1", "abc", "0").unwrap_err();
    assert_eq!(
        err,
        CircuitError::ParseField {
            field: "tradingHistoryMerkleRootAfter",
            value: "abc".to_string()
        }
    );

    let mut wide = Cancellation::dummy(&config);
    wide.account = 1 << config.accounts_depth;
    let err = BatchCancelCircuit::new(
        config,
        vec![Cancellation::dummy(&config), wide],
        Fr::from(0u64),
        Fr::from(0u64),
        Fr::from(0u64),
    )
    .unwrap_err();
    match err {
        CircuitError::Cancellation { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, CircuitError::BitWidth { field: "account", .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_circuit_shape_matches_real_batch() {
    let (_, circuit) = chained();
    let real = check_witness(circuit).unwrap();
    let empty = check_witness(BatchCancelCircuit::empty(small_config(), 3).unwrap()).unwrap();

    assert_eq!(real.num_constraints, empty.num_constraints);
    assert_eq!(real.num_witness_variables, empty.num_witness_variables);
}

/// Full Groth16 setup, prove and verify for a two-operation batch.
#[test]
#[ignore = "slow: runs a Groth16 setup"]
fn test_batch_full_proof() {
    let mut rng = StdRng::seed_from_u64(42);
    let config = small_config();

    let empty = BatchCancelCircuit::empty(config, 2).unwrap();
    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(empty, &mut rng).unwrap();

    let alice = keypair(1);
    let mut state = ExchangeState::new(config).unwrap();
    open_account(&mut state, 1, &alice, 50);
    place_order(&mut state, 1, 3, 0);
    place_order(&mut state, 1, 4, 7);

    let root_before = state.trading_history_root();
    let cancellations = vec![
        state.cancel_order(&alice, 1, 3).unwrap(),
        state.cancel_order(&alice, 1, 4).unwrap(),
    ];
    let circuit = BatchCancelCircuit::new(
        config,
        cancellations,
        root_before,
        state.trading_history_root(),
        state.accounts_root(),
    )
    .unwrap();
    let public_inputs = circuit.public_inputs();

    let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).unwrap();

    assert!(Groth16::<Bn254>::verify(&vk, &public_inputs, &proof).unwrap());
    let wrong = vec![public_inputs[0] + Fr::from(1u64)];
    assert!(!Groth16::<Bn254>::verify(&vk, &wrong, &proof).unwrap());
}
