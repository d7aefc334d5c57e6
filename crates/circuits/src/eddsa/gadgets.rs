//! In-circuit EdDSA verification.

use ark_bn254::Fr;
use ark_ec::twisted_edwards::TECurveConfig;
use ark_ed_on_bn254::{constraints::EdwardsVar, EdwardsConfig, EdwardsProjective};
use ark_ff::PrimeField;
use ark_r1cs_std::{boolean::Boolean, fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use super::native::{EddsaParams, Signature};
use crate::bits::field_to_bits_le;
use crate::poseidon::poseidon_hash_many_var;

/// Width of the witnessed signature scalar.
pub const SIGNATURE_SCALAR_BITS: usize = Fr::MODULUS_BIT_SIZE as usize;

/// Signature as circuit variables.
///
/// `R` is witnessed as raw coordinates and only checked to lie on the curve.
/// The verification equation itself rules out small-order components.
#[derive(Clone)]
pub struct SignatureVar {
    pub r_x: FpVar<Fr>,
    pub r_y: FpVar<Fr>,
    /// Little-endian bits of `s`
    pub s_bits: Vec<Boolean<Fr>>,
}

impl SignatureVar {
    pub fn new_witness(
        cs: ConstraintSystemRef<Fr>,
        signature: &Signature,
    ) -> Result<Self, SynthesisError> {
        let r_x = FpVar::new_witness(cs.clone(), || Ok(signature.r.x))?;
        let r_y = FpVar::new_witness(cs.clone(), || Ok(signature.r.y))?;
        let s_bits = field_to_bits_le(&signature.s, SIGNATURE_SCALAR_BITS)
            .into_iter()
            .map(|bit| Boolean::new_witness(cs.clone(), || Ok(bit)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { r_x, r_y, s_bits })
    }
}

/// a·x² + y² == 1 + d·x²·y²
fn enforce_on_curve(x: &FpVar<Fr>, y: &FpVar<Fr>) -> Result<(), SynthesisError> {
    let x2 = x.square()?;
    let y2 = y.square()?;
    let lhs = x2.clone() * EdwardsConfig::COEFF_A + &y2;
    let rhs = (x2 * &y2) * EdwardsConfig::COEFF_D + Fr::from(1u64);
    lhs.enforce_equal(&rhs)
}

/// Constrain `signature` to be valid for `message_bits` under `public_key`.
///
/// `message_bits` are packed little-endian into the challenge input.
pub fn verify_signature(
    cs: ConstraintSystemRef<Fr>,
    params: &EddsaParams,
    public_key: &EdwardsVar,
    message_bits: &[Boolean<Fr>],
    signature: &SignatureVar,
) -> Result<(), SynthesisError> {
    enforce_on_curve(&signature.r_x, &signature.r_y)?;
    let r = EdwardsVar::new(signature.r_x.clone(), signature.r_y.clone());

    let message = Boolean::le_bits_to_fp_var(message_bits)?;
    let h = poseidon_hash_many_var(
        cs,
        &[
            r.x.clone(),
            r.y.clone(),
            public_key.x.clone(),
            public_key.y.clone(),
            message,
        ],
    )?;
    let h_bits = h.to_bits_le()?;

    let base = EdwardsVar::constant(EdwardsProjective::from(params.base));
    let lhs = base.scalar_mul_le(signature.s_bits.iter())?;
    let rhs = r + public_key.scalar_mul_le(h_bits.iter())?;

    lhs.enforce_equal(&rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eddsa::KeyPair;
    use ark_ed_on_bn254::{EdwardsAffine, Fr as ScalarField};
    use ark_relations::r1cs::ConstraintSystem;

    const MESSAGE_BITS: usize = 12;

    fn message_bits(cs: ConstraintSystemRef<Fr>, value: u64) -> Vec<Boolean<Fr>> {
        (0..MESSAGE_BITS)
            .map(|i| Boolean::new_witness(cs.clone(), || Ok((value >> i) & 1 == 1)).unwrap())
            .collect()
    }

    fn run(public_key: EdwardsAffine, message: u64, signature: &Signature) -> bool {
        let params = EddsaParams::default();
        let cs = ConstraintSystem::<Fr>::new_ref();

        let pk_var =
            EdwardsVar::new_witness(cs.clone(), || Ok(EdwardsProjective::from(public_key)))
                .unwrap();
        let bits = message_bits(cs.clone(), message);
        let sig_var = SignatureVar::new_witness(cs.clone(), signature).unwrap();

        verify_signature(cs.clone(), &params, &pk_var, &bits, &sig_var).unwrap();
        println!("EdDSA verification constraints: {}", cs.num_constraints());
        cs.is_satisfied().unwrap()
    }

    #[test]
    fn test_valid_signature_satisfies() {
        let params = EddsaParams::default();
        let keypair = KeyPair::from_secret(&params, ScalarField::from(31337u64));
        let signature = keypair.sign(&params, Fr::from(0xabcu64));

        assert!(run(keypair.public_key(), 0xabc, &signature));
    }

    #[test]
    fn test_other_message_fails() {
        let params = EddsaParams::default();
        let keypair = KeyPair::from_secret(&params, ScalarField::from(31337u64));
        let signature = keypair.sign(&params, Fr::from(0xabcu64));

        assert!(!run(keypair.public_key(), 0xabd, &signature));
    }

    #[test]
    fn test_off_curve_r_fails() {
        let params = EddsaParams::default();
        let keypair = KeyPair::from_secret(&params, ScalarField::from(5u64));
        let mut signature = keypair.sign(&params, Fr::from(3u64));
        signature.r = EdwardsAffine::new_unchecked(signature.r.x + Fr::from(1u64), signature.r.y);

        assert!(!run(keypair.public_key(), 3, &signature));
    }
}
