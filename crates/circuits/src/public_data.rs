//! Public data bit string and its SHA-256 commitment.
//!
//! Layout, MSB-first per field:
//!
//! ```text
//! [tradingHistoryRootBefore : 256][tradingHistoryRootAfter : 256]
//! [op 0 account : accounts_depth][op 0 orderID : order_id_bits] ... [op N-1 ...]
//! ```
//!
//! The bits are packed into bytes MSB-first (a trailing partial byte is zero
//! filled) and hashed. The verifier sees one field element: the low
//! [`PUBLIC_INPUT_BITS`] bits of the digest read as a big-endian integer.

use ark_bn254::Fr;
use ark_crypto_primitives::crh::sha256::constraints::Sha256Gadget;
use ark_crypto_primitives::crh::sha256::Sha256;
use ark_crypto_primitives::crh::CRHScheme;
use ark_r1cs_std::{boolean::Boolean, fields::fp::FpVar, prelude::*, uint8::UInt8};
use ark_relations::r1cs::SynthesisError;
use num_bigint::BigUint;

use crate::bits::{bits_to_bytes_be, bits_to_hex, field_to_bits_be, u64_to_bits_le, ROOT_BITS};
use crate::config::CircuitConfig;
use crate::error::CircuitError;

/// Digest bits that fit injectively into the BN254 scalar field.
pub const PUBLIC_INPUT_BITS: usize = 253;

/// Native public data accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublicData {
    bits: Vec<bool>,
}

impl PublicData {
    pub fn new(root_before: &Fr, root_after: &Fr) -> Self {
        let mut bits = field_to_bits_be(root_before, ROOT_BITS);
        bits.extend(field_to_bits_be(root_after, ROOT_BITS));
        Self { bits }
    }

    /// Append one cancellation: account index then order id.
    pub fn push_cancel(
        &mut self,
        config: &CircuitConfig,
        account: u64,
        order_id: u64,
    ) -> Result<(), CircuitError> {
        for (field, value, width) in [
            ("account", account, config.accounts_depth),
            ("orderID", order_id, config.order_id_bits),
        ] {
            let mut bits = u64_to_bits_le(field, value, width)?;
            bits.reverse();
            self.bits.extend(bits);
        }
        Ok(())
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bits_to_bytes_be(&self.bits)
    }

    pub fn to_hex(&self) -> String {
        bits_to_hex(&self.bits)
    }

    /// SHA-256 of the packed bytes.
    pub fn digest(&self) -> Result<Vec<u8>, CircuitError> {
        Sha256::evaluate(&(), self.to_bytes().as_slice()).map_err(|e| CircuitError::Hash(e.to_string()))
    }

    /// The packed digest exposed as the circuit's public input.
    pub fn commitment(&self) -> Result<Fr, CircuitError> {
        Ok(pack_digest(&self.digest()?))
    }
}

/// Low [`PUBLIC_INPUT_BITS`] bits of a big-endian digest.
pub fn pack_digest(digest: &[u8]) -> Fr {
    let value = BigUint::from_bytes_be(digest);
    let mask = (BigUint::from(1u32) << PUBLIC_INPUT_BITS) - 1u32;
    Fr::from(value & mask)
}

/// In-circuit public data accumulator.
#[derive(Clone, Default)]
pub struct PublicDataVar {
    bits: Vec<Boolean<Fr>>,
}

impl PublicDataVar {
    /// Start with both roots, each expanded to 256 MSB-first bits.
    pub fn new(root_before: &FpVar<Fr>, root_after: &FpVar<Fr>) -> Result<Self, SynthesisError> {
        let mut data = Self::default();
        data.push_root(root_before)?;
        data.push_root(root_after)?;
        Ok(data)
    }

    fn push_root(&mut self, root: &FpVar<Fr>) -> Result<(), SynthesisError> {
        let mut bits = root.to_bits_le()?;
        bits.resize(ROOT_BITS, Boolean::FALSE);
        bits.reverse();
        self.bits.extend(bits);
        Ok(())
    }

    /// Append bits that are already MSB-first.
    pub fn extend(&mut self, bits: impl IntoIterator<Item = Boolean<Fr>>) {
        self.bits.extend(bits);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// MSB-first byte packing, zero filling the last byte.
    pub fn to_bytes(&self) -> Vec<UInt8<Fr>> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                let mut le: Vec<Boolean<Fr>> = chunk.to_vec();
                le.resize(8, Boolean::FALSE);
                le.reverse();
                UInt8::from_bits_le(&le)
            })
            .collect()
    }

    /// SHA-256 digest bytes.
    pub fn digest(&self) -> Result<Vec<UInt8<Fr>>, SynthesisError> {
        Sha256Gadget::<Fr>::digest(&self.to_bytes())?.to_bytes()
    }

    /// The digest packed the same way as [`pack_digest`].
    pub fn commitment(&self) -> Result<FpVar<Fr>, SynthesisError> {
        let digest = self.digest()?;

        let mut bits = Vec::with_capacity(8 * digest.len());
        for byte in digest.iter().rev() {
            bits.extend(byte.to_bits_le()?);
        }
        bits.truncate(PUBLIC_INPUT_BITS);

        Boolean::le_bits_to_fp_var(&bits)
    }
}
