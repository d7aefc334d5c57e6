//! EdDSA over the twisted Edwards curve embedded in BN254 (ed-on-bn254).
//!
//! The curve's base field is the BN254 scalar field, so points are native
//! circuit values. The challenge hash is Poseidon:
//!
//! ```text
//! h = Poseidon(R.x, R.y, A.x, A.y, m)
//! valid  <=>  [s]B == R + [h]A
//! ```
//!
//! where `m` is the signed message packed into one field element and `B` is
//! the configured base point.

mod gadgets;
mod native;

pub use gadgets::{verify_signature, SignatureVar, SIGNATURE_SCALAR_BITS};
pub use native::{challenge, verify, EddsaParams, KeyPair, Signature};
