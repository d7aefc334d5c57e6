//! Native key generation, signing and verification.

use ark_bn254::Fr;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, Fr as ScalarField};
use ark_ff::{BigInteger, PrimeField};
use ark_std::rand::Rng;
use ark_std::UniformRand;

use crate::poseidon::poseidon_hash_many;

/// Signature scheme parameters agreed by signer and circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EddsaParams {
    /// Base point of the prime-order subgroup
    pub base: EdwardsAffine,
}

impl Default for EddsaParams {
    fn default() -> Self {
        Self {
            base: EdwardsAffine::generator().mul_by_cofactor(),
        }
    }
}

/// Signature `(R, s)`. `s` is carried in the circuit field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r: EdwardsAffine,
    pub s: Fr,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            r: EdwardsAffine::zero(),
            s: Fr::from(0u64),
        }
    }
}

/// A signing key and its public key `A = [a]B`.
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret: ScalarField,
    public: EdwardsAffine,
}

/// Reinterpret an element of one prime field in another, reducing if needed.
fn convert<A: PrimeField, B: PrimeField>(value: &A) -> B {
    B::from_le_bytes_mod_order(&value.into_bigint().to_bytes_le())
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate<R: Rng + ?Sized>(params: &EddsaParams, rng: &mut R) -> Self {
        Self::from_secret(params, ScalarField::rand(rng))
    }

    pub fn from_secret(params: &EddsaParams, secret: ScalarField) -> Self {
        let public = params.base.mul_bigint(secret.into_bigint()).into_affine();
        Self { secret, public }
    }

    pub fn public_key(&self) -> EdwardsAffine {
        self.public
    }

    /// Sign a packed message.
    ///
    /// The nonce is derived from the secret and the message, so signing the
    /// same message twice yields the same signature.
    pub fn sign(&self, params: &EddsaParams, message: Fr) -> Signature {
        let nonce: ScalarField =
            convert(&poseidon_hash_many(&[convert(&self.secret), message]));
        let r = params.base.mul_bigint(nonce.into_bigint()).into_affine();

        let h: ScalarField = convert(&challenge(&r, &self.public, message));
        let s = nonce + h * self.secret;

        Signature { r, s: convert(&s) }
    }
}

/// Challenge hash binding the nonce point, the signer and the message.
pub fn challenge(r: &EdwardsAffine, public_key: &EdwardsAffine, message: Fr) -> Fr {
    poseidon_hash_many(&[r.x, r.y, public_key.x, public_key.y, message])
}

/// Check `[s]B == R + [h]A`.
pub fn verify(
    params: &EddsaParams,
    public_key: &EdwardsAffine,
    message: Fr,
    signature: &Signature,
) -> bool {
    let r = signature.r;
    if !r.is_on_curve() || !r.is_in_correct_subgroup_assuming_on_curve() {
        return false;
    }

    let h = challenge(&r, public_key, message);
    let lhs = params.base.mul_bigint(signature.s.into_bigint());
    let rhs = public_key.mul_bigint(h.into_bigint()) + r;

    lhs.into_affine() == rhs.into_affine()
}
