//! Witness check: synthesize a circuit and find the first broken constraint.
//!
//! Circuits record which constraint indices each logical check produced, so
//! a failure can be reported as `cancel[0].signature` rather than as a bare
//! row number.

use std::ops::Range;

use ark_bn254::Fr;
use ark_ff::Zero;
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, SynthesisError,
};
use tracing::{debug, warn};

use crate::error::CircuitError;

/// Constraint index ranges tagged with the check that emitted them.
#[derive(Clone, Debug, Default)]
pub struct ConstraintLabels {
    ranges: Vec<(Range<usize>, String)>,
}

impl ConstraintLabels {
    /// Run `f` and label every constraint it adds.
    ///
    /// Nested scopes finish first, so the most specific label is found first.
    pub fn scope<T>(
        &mut self,
        cs: &ConstraintSystemRef<Fr>,
        label: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<T, SynthesisError>,
    ) -> Result<T, SynthesisError> {
        let start = cs.num_constraints();
        let out = f(self)?;
        let end = cs.num_constraints();
        if end > start {
            self.ranges.push((start..end, label.into()));
        }
        Ok(out)
    }

    /// Label covering constraint `index`, if any.
    pub fn label_of(&self, index: usize) -> Option<&str> {
        self.ranges
            .iter()
            .find(|(range, _)| range.contains(&index))
            .map(|(_, label)| label.as_str())
    }

    /// Constraints emitted under `label`.
    pub fn count(&self, label: &str) -> usize {
        self.ranges
            .iter()
            .filter(|(_, l)| l == label)
            .map(|(range, _)| range.len())
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Range<usize>, &str)> {
        self.ranges.iter().map(|(range, label)| (range, label.as_str()))
    }
}

/// A circuit that can report which check emitted each constraint.
pub trait LabeledCircuit: ConstraintSynthesizer<Fr> {
    fn synthesize_labeled(
        self,
        cs: ConstraintSystemRef<Fr>,
        labels: &mut ConstraintLabels,
    ) -> Result<(), SynthesisError>;
}

/// The first constraint that does not hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedConstraint {
    pub index: usize,
    pub label: Option<String>,
}

/// Outcome of [`check_witness`].
#[derive(Clone, Debug)]
pub struct WitnessReport {
    pub satisfied: bool,
    pub num_constraints: usize,
    pub num_instance_variables: usize,
    pub num_witness_variables: usize,
    pub first_failure: Option<FailedConstraint>,
    pub labels: ConstraintLabels,
}

impl WitnessReport {
    pub fn failing_label(&self) -> Option<&str> {
        self.first_failure.as_ref().and_then(|f| f.label.as_deref())
    }
}

fn dot(row: &[(Fr, usize)], assignment: &[Fr]) -> Fr {
    row.iter()
        .fold(Fr::zero(), |acc, (coeff, var)| acc + *coeff * assignment[*var])
}

/// Synthesize `circuit` with its witness and evaluate every constraint.
///
/// Only structural problems are errors; an unsatisfied witness is a normal
/// report with `satisfied == false`.
pub fn check_witness<C: LabeledCircuit>(circuit: C) -> Result<WitnessReport, CircuitError> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    let mut labels = ConstraintLabels::default();
    circuit.synthesize_labeled(cs.clone(), &mut labels)?;
    cs.finalize();

    let matrices = cs
        .to_matrices()
        .ok_or_else(|| CircuitError::Synthesis("constraint matrices unavailable".into()))?;
    let assignment: Vec<Fr> = {
        let inner = cs
            .borrow()
            .ok_or_else(|| CircuitError::Synthesis("constraint system dropped".into()))?;
        inner
            .instance_assignment
            .iter()
            .chain(inner.witness_assignment.iter())
            .copied()
            .collect()
    };

    let first_failure = (0..matrices.num_constraints)
        .find(|&i| {
            dot(&matrices.a[i], &assignment) * dot(&matrices.b[i], &assignment)
                != dot(&matrices.c[i], &assignment)
        })
        .map(|index| FailedConstraint {
            index,
            label: labels.label_of(index).map(str::to_string),
        });

    match &first_failure {
        Some(failure) => warn!(
            index = failure.index,
            label = failure.label.as_deref().unwrap_or("<unlabelled>"),
            "witness check failed"
        ),
        None => debug!(constraints = matrices.num_constraints, "witness check passed"),
    }

    Ok(WitnessReport {
        satisfied: first_failure.is_none(),
        num_constraints: matrices.num_constraints,
        num_instance_variables: matrices.num_instance_variables,
        num_witness_variables: matrices.num_witness_variables,
        first_failure,
        labels,
    })
}
