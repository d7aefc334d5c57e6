//! Batch cancel circuit: N chained cancel operations under one commitment.
//!
//! Operation 0 reads `tradingHistoryRootBefore`; operation `i > 0` reads the
//! output of operation `i - 1`. Each operation gets its own input root
//! variable, equated to its source, so operations do not share variables
//! beyond that single link.
//!
//! Public input: the packed SHA-256 digest of
//! `[rootBefore][rootAfter][op 0 public data]...[op N-1 public data]`.

use ark_bn254::Fr;
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use rayon::prelude::*;
use tracing::debug;

use crate::bits::{field_to_decimal, parse_field};
use crate::cancel::{CancelGadget, Cancellation};
use crate::config::{CircuitConfig, RecancelPolicy};
use crate::eddsa::{verify, EddsaParams};
use crate::error::{CircuitError, PreflightError};
use crate::public_data::{PublicData, PublicDataVar};
use crate::state::signed_message;
use crate::witness_check::{ConstraintLabels, LabeledCircuit};

/// Where an operation's input trading history root comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootSource {
    /// `tradingHistoryRootBefore` of the batch
    BatchBefore,
    /// `tradingHistoryRootOut` of an earlier operation
    OutputOf(usize),
}

impl RootSource {
    pub fn for_operation(index: usize) -> Self {
        match index {
            0 => RootSource::BatchBefore,
            i => RootSource::OutputOf(i - 1),
        }
    }
}

/// One link of the trading history root chain, computed natively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootLink {
    pub index: usize,
    pub source: RootSource,
    pub root_in: Fr,
    pub root_out: Fr,
}

/// Debug dump of the commitment inputs.
#[derive(Clone, Debug)]
pub struct BatchDiagnostics {
    pub public_data_hex: String,
    pub digest_hex: String,
    /// Packed digest recomputed from the witness, decimal
    pub computed_commitment: String,
    /// Public input the circuit will be checked against, decimal
    pub public_input: String,
    pub root_chain: Vec<RootLink>,
}

/// Circuit proving a batch of order cancellations.
#[derive(Clone, Debug)]
pub struct BatchCancelCircuit {
    config: CircuitConfig,
    params: EddsaParams,
    cancellations: Vec<Cancellation>,

    trading_history_root_before: Fr,
    /// Claimed root after the whole batch
    trading_history_root_after: Fr,
    accounts_root: Fr,

    /// Public input: packed digest of the public data
    public_data_hash: Fr,
}

impl BatchCancelCircuit {
    /// Build a batch and compute its commitment.
    ///
    /// Fails only on structural problems. A batch whose witnesses are wrong
    /// builds fine and fails [`crate::check_witness`].
    pub fn new(
        config: CircuitConfig,
        cancellations: Vec<Cancellation>,
        trading_history_root_before: Fr,
        trading_history_root_after: Fr,
        accounts_root: Fr,
    ) -> Result<Self, CircuitError> {
        config.validate()?;

        cancellations
            .par_iter()
            .enumerate()
            .try_for_each(|(index, cancellation)| {
                cancellation.validate(&config).map_err(|e| e.at(index))
            })?;

        let mut circuit = Self {
            config,
            params: EddsaParams::default(),
            cancellations,
            trading_history_root_before,
            trading_history_root_after,
            accounts_root,
            public_data_hash: Fr::from(0u64),
        };
        circuit.public_data_hash = circuit.public_data()?.commitment()?;

        debug!(
            cancellations = circuit.cancellations.len(),
            "batch built, public data hash {}", circuit.public_data_hash
        );

        Ok(circuit)
    }

    /// Build a batch from decimal (or `0x` hex) root strings.
    pub fn from_strings(
        config: CircuitConfig,
        cancellations: Vec<Cancellation>,
        trading_history_root_before: &str,
        trading_history_root_after: &str,
        accounts_root: &str,
    ) -> Result<Self, CircuitError> {
        Self::new(
            config,
            cancellations,
            parse_field("tradingHistoryMerkleRootBefore", trading_history_root_before)?,
            parse_field("tradingHistoryMerkleRootAfter", trading_history_root_after)?,
            parse_field("accountsMerkleRoot", accounts_root)?,
        )
    }

    /// A batch of `num_cancels` placeholder operations, for key generation.
    pub fn empty(config: CircuitConfig, num_cancels: usize) -> Result<Self, CircuitError> {
        let cancellations = vec![Cancellation::dummy(&config); num_cancels];
        let zero = Fr::from(0u64);
        Self::new(config, cancellations, zero, zero, zero)
    }

    /// Replace the public input. The circuit still computes the digest from
    /// the witness, so a different value makes it unsatisfiable.
    pub fn with_public_data_hash(mut self, public_data_hash: Fr) -> Self {
        self.public_data_hash = public_data_hash;
        self
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    pub fn cancellations(&self) -> &[Cancellation] {
        &self.cancellations
    }

    pub fn num_cancels(&self) -> usize {
        self.cancellations.len()
    }

    pub fn trading_history_root_before(&self) -> Fr {
        self.trading_history_root_before
    }

    pub fn trading_history_root_after(&self) -> Fr {
        self.trading_history_root_after
    }

    pub fn accounts_root(&self) -> Fr {
        self.accounts_root
    }

    pub fn public_data_hash(&self) -> Fr {
        self.public_data_hash
    }

    /// The verifier's view of this batch.
    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_data_hash]
    }

    /// Fail unless the batch holds exactly `expected` operations.
    pub fn ensure_size(&self, expected: usize) -> Result<(), CircuitError> {
        if self.num_cancels() != expected {
            return Err(CircuitError::BatchSize {
                expected,
                actual: self.num_cancels(),
            });
        }
        Ok(())
    }

    /// Native public data built from the claimed roots and the operations.
    pub fn public_data(&self) -> Result<PublicData, CircuitError> {
        let mut data = PublicData::new(
            &self.trading_history_root_before,
            &self.trading_history_root_after,
        );
        for (index, cancellation) in self.cancellations.iter().enumerate() {
            data.push_cancel(&self.config, cancellation.account, cancellation.order_id)
                .map_err(|e| e.at(index))?;
        }
        Ok(data)
    }

    /// Input and output root of every operation, as the witnesses imply.
    pub fn root_chain(&self) -> Vec<RootLink> {
        let mut root_in = self.trading_history_root_before;
        self.cancellations
            .iter()
            .enumerate()
            .map(|(index, cancellation)| {
                let root_out = cancellation.root_out(&self.config);
                let link = RootLink {
                    index,
                    source: RootSource::for_operation(index),
                    root_in,
                    root_out,
                };
                root_in = root_out;
                link
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Result<BatchDiagnostics, CircuitError> {
        let data = self.public_data()?;
        let digest = data.digest()?;

        let diagnostics = BatchDiagnostics {
            public_data_hex: data.to_hex(),
            digest_hex: digest.iter().map(|b| format!("{:02x}", b)).collect(),
            computed_commitment: field_to_decimal(&data.commitment()?),
            public_input: field_to_decimal(&self.public_data_hash),
            root_chain: self.root_chain(),
        };

        debug!(public_data = %diagnostics.public_data_hex, "public data");
        debug!(digest = %diagnostics.digest_hex, "public data digest");
        debug!(
            computed = %diagnostics.computed_commitment,
            expected = %diagnostics.public_input,
            "public data hash"
        );

        Ok(diagnostics)
    }

    /// Checks of one operation that do not depend on the root chain.
    fn check_operation(&self, index: usize, cancellation: &Cancellation) -> Option<PreflightError> {
        let account = &cancellation.account_update;
        let trade = &cancellation.trade_history;

        if account.proof.compute_root_at(account.before.hash(), cancellation.account)
            != self.accounts_root
        {
            return Some(PreflightError::AccountMembership { index });
        }
        if account.after != account.before {
            return Some(PreflightError::AccountChanged { index });
        }
        if self.config.recancel == RecancelPolicy::Reject && trade.before.cancelled {
            return Some(PreflightError::AlreadyCancelled { index });
        }
        if !trade.after.cancelled || trade.after.filled != trade.before.filled {
            return Some(PreflightError::NotCancelled { index });
        }

        let message = signed_message(
            &self.config,
            cancellation.account,
            cancellation.order_id,
            cancellation.padding,
        );
        if !verify(&self.params, &account.before.public_key, message, &cancellation.signature) {
            return Some(PreflightError::Signature { index });
        }

        None
    }

    /// Native re-run of every check the circuit makes, reporting the first
    /// operation that would fail. Diagnostic only.
    pub fn preflight(&self) -> Result<(), PreflightError> {
        let independent: Vec<Option<PreflightError>> = self
            .cancellations
            .par_iter()
            .enumerate()
            .map(|(index, cancellation)| self.check_operation(index, cancellation))
            .collect();

        let mut root = self.trading_history_root_before;
        for (index, (cancellation, failure)) in
            self.cancellations.iter().zip(independent).enumerate()
        {
            if let Some(failure) = failure {
                return Err(failure);
            }

            let trade = &cancellation.trade_history;
            let address = cancellation.address(&self.config);
            if trade.proof.compute_root_at(trade.before.hash(), address) != root {
                return Err(PreflightError::TradeHistoryMembership { index });
            }
            root = cancellation.root_out(&self.config);
        }

        if root != self.trading_history_root_after {
            return Err(PreflightError::FinalRoot);
        }

        let computed = self
            .public_data()
            .and_then(|data| data.commitment())
            .map_err(|_| PreflightError::Commitment)?;
        if computed != self.public_data_hash {
            return Err(PreflightError::Commitment);
        }

        Ok(())
    }
}

impl ConstraintSynthesizer<Fr> for BatchCancelCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        self.synthesize_labeled(cs, &mut ConstraintLabels::default())
    }
}

impl LabeledCircuit for BatchCancelCircuit {
    fn synthesize_labeled(
        self,
        cs: ConstraintSystemRef<Fr>,
        labels: &mut ConstraintLabels,
    ) -> Result<(), SynthesisError> {
        // === Public input ===
        let public_data_hash = FpVar::new_input(cs.clone(), || Ok(self.public_data_hash))?;

        // === Batch roots ===
        let root_before = FpVar::new_witness(cs.clone(), || Ok(self.trading_history_root_before))?;
        let root_after = FpVar::new_witness(cs.clone(), || Ok(self.trading_history_root_after))?;
        let accounts_root = FpVar::new_witness(cs.clone(), || Ok(self.accounts_root))?;

        let mut public_data = labels.scope(&cs, "publicData.roots", |_| {
            PublicDataVar::new(&root_before, &root_after)
        })?;

        // === Operations ===
        let mut outputs: Vec<FpVar<Fr>> = Vec::with_capacity(self.cancellations.len());
        for (index, cancellation) in self.cancellations.iter().enumerate() {
            let source = match RootSource::for_operation(index) {
                RootSource::BatchBefore => &root_before,
                RootSource::OutputOf(prev) => &outputs[prev],
            };
            let root_in = FpVar::new_witness(cs.clone(), || source.value())?;
            labels.scope(&cs, format!("chain[{}]", index), |_| {
                root_in.enforce_equal(source)
            })?;

            let gadget = labels.scope(&cs, format!("cancel[{}].witness", index), |_| {
                CancelGadget::alloc(
                    cs.clone(),
                    index,
                    &self.config,
                    &self.params,
                    cancellation,
                    root_in,
                    accounts_root.clone(),
                )
            })?;
            let output = gadget.enforce(cs.clone(), labels)?;

            public_data.extend(output.public_data);
            outputs.push(output.trading_history_root_out);
        }

        // === Final root ===
        let last = outputs.last().unwrap_or(&root_before);
        labels.scope(&cs, "tradingHistoryRootAfter", |_| last.enforce_equal(&root_after))?;

        // === Commitment ===
        let computed = labels.scope(&cs, "publicData.hash", |_| public_data.commitment())?;
        labels.scope(&cs, "publicData.check()", |_| {
            computed.enforce_equal(&public_data_hash)
        })?;

        debug!(
            cancellations = self.cancellations.len(),
            constraints = cs.num_constraints(),
            public_data_bits = public_data.len(),
            "batch cancel circuit synthesized"
        );

        Ok(())
    }
}
