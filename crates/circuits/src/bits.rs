//! Field element parsing and bit-level encodings.
//!
//! Conventions used throughout the crate:
//! - integer witnesses (indices, ids) are decomposed little-endian, so bit 0
//!   of an account index is also the first Merkle path direction;
//! - public data is laid out MSB-first per field, and packed into bytes
//!   MSB-first before hashing.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use num_traits::Num;

use crate::error::CircuitError;

/// Width used for roots in the public data (a full SHA-256 word block).
pub const ROOT_BITS: usize = 256;

/// Parse a field element from a decimal or `0x`-prefixed hex string.
///
/// Values at or above the modulus are rejected rather than reduced.
pub fn parse_field(field: &'static str, text: &str) -> Result<Fr, CircuitError> {
    let err = || CircuitError::ParseField {
        field,
        value: text.to_string(),
    };

    let trimmed = text.trim();
    let value = match trimmed.strip_prefix("0x") {
        Some(hex) => BigUint::from_str_radix(hex, 16),
        None => BigUint::from_str_radix(trimmed, 10),
    }
    .map_err(|_| err())?;

    let modulus: BigUint = Fr::MODULUS.into();
    if value >= modulus {
        return Err(err());
    }

    Ok(Fr::from(value))
}

/// Render a field element as a decimal string.
pub fn field_to_decimal(value: &Fr) -> String {
    let value: BigUint = value.into_bigint().into();
    value.to_str_radix(10)
}

/// Little-endian decomposition of `value` into exactly `width` bits.
pub fn u64_to_bits_le(field: &'static str, value: u64, width: usize) -> Result<Vec<bool>, CircuitError> {
    if width < 64 && value >> width != 0 {
        return Err(CircuitError::BitWidth {
            field,
            bits: width,
            value: value.to_string(),
        });
    }
    Ok((0..width).map(|i| i < 64 && (value >> i) & 1 == 1).collect())
}

/// Check that `value` fits in `width` bits.
pub fn check_width(field: &'static str, value: u64, width: usize) -> Result<(), CircuitError> {
    u64_to_bits_le(field, value, width).map(|_| ())
}

/// Little-endian bits of a field element, padded with zeros to `width`.
pub fn field_to_bits_le(value: &Fr, width: usize) -> Vec<bool> {
    let mut bits = value.into_bigint().to_bits_le();
    bits.resize(width, false);
    bits
}

/// MSB-first bits of a field element over `width` bits.
pub fn field_to_bits_be(value: &Fr, width: usize) -> Vec<bool> {
    let mut bits = field_to_bits_le(value, width);
    bits.reverse();
    bits
}

/// Pack MSB-first bits into bytes, zero-filling a trailing partial byte.
pub fn bits_to_bytes_be(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit as u8) << (7 - i)))
        })
        .collect()
}

/// Hex rendering of an MSB-first bit string, for diagnostics.
pub fn bits_to_hex(bits: &[bool]) -> String {
    bits_to_bytes_be(bits)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
