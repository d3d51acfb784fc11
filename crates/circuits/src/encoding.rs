//! Canonical conversions between field elements, strings and bytes.
//!
//! Field elements travel as decimal strings in persisted state and notes, and
//! as 32-byte big-endian hex words in contract calls. Parsing is strict: a
//! value at or above the field modulus is rejected, never reduced, because a
//! silently reduced circuit input produces a proof for a different statement.

use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use num_traits::Num;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

/// Bit width of an EVM address.
pub const ADDRESS_BITS: u64 = 160;

/// Errors produced by the strict parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Empty numeric string")]
    Empty,
    #[error("Invalid decimal string: {0}")]
    InvalidDecimal(String),
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),
    #[error("Value {0} is not below the field modulus")]
    OutOfField(String),
    #[error("Value {value} does not fit in {bits} bits")]
    TooWide { value: String, bits: u64 },
}

/// The modulus of `F` as an unbounded integer.
pub fn modulus<F: PrimeField>() -> BigUint {
    BigUint::from_bytes_be(&F::MODULUS.to_bytes_be())
}

/// Canonical integer value of a field element.
pub fn field_to_biguint<F: PrimeField>(value: &F) -> BigUint {
    BigUint::from_bytes_be(&value.into_bigint().to_bytes_be())
}

/// Convert an integer to a field element, rejecting values >= the modulus.
pub fn biguint_to_field<F: PrimeField>(value: &BigUint) -> Result<F, EncodingError> {
    if *value >= modulus::<F>() {
        return Err(EncodingError::OutOfField(value.to_str_radix(10)));
    }
    Ok(F::from_be_bytes_mod_order(&value.to_bytes_be()))
}

/// Decimal representation, as used for persistence and circuit inputs.
pub fn field_to_decimal<F: PrimeField>(value: &F) -> String {
    field_to_biguint(value).to_str_radix(10)
}

/// Parse a decimal string into a field element.
pub fn field_from_decimal<F: PrimeField>(s: &str) -> Result<F, EncodingError> {
    let digits = s.trim();
    if digits.is_empty() {
        return Err(EncodingError::Empty);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EncodingError::InvalidDecimal(digits.to_string()));
    }
    let value = BigUint::from_str_radix(digits, 10)
        .map_err(|_| EncodingError::InvalidDecimal(digits.to_string()))?;
    biguint_to_field(&value)
}

/// 32-byte big-endian encoding.
pub fn field_to_bytes_be<F: PrimeField>(value: &F) -> [u8; 32] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    let start = out.len().saturating_sub(bytes.len());
    let skip = bytes.len().saturating_sub(out.len());
    out[start..].copy_from_slice(&bytes[skip..]);
    out
}

/// `0x`-prefixed, zero-padded 64-digit hex, the format contracts expect.
pub fn field_to_hex<F: PrimeField>(value: &F) -> String {
    format!("0x{}", hex::encode(field_to_bytes_be(value)))
}

/// Parse a hex string (with or without `0x`) into a field element.
pub fn field_from_hex<F: PrimeField>(s: &str) -> Result<F, EncodingError> {
    biguint_to_field(&parse_hex(s)?)
}

/// Parse an EVM address into a field element.
pub fn address_to_field<F: PrimeField>(s: &str) -> Result<F, EncodingError> {
    let value = parse_hex(s)?;
    if value.bits() > ADDRESS_BITS {
        return Err(EncodingError::TooWide {
            value: s.trim().to_string(),
            bits: ADDRESS_BITS,
        });
    }
    biguint_to_field(&value)
}

/// Whether `value` is below 2^bits.
pub fn fits_in_bits<F: PrimeField>(value: &F, bits: u64) -> bool {
    field_to_biguint(value).bits() <= bits
}

/// Sample 256 random bits and reduce them into the field.
///
/// Only accepts cryptographic RNGs; an RNG failure is returned as is.
pub fn random_field<F, R>(rng: &mut R) -> Result<F, rand::Error>
where
    F: PrimeField,
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; 32];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(F::from_be_bytes_mod_order(&bytes))
}

fn parse_hex(s: &str) -> Result<BigUint, EncodingError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(EncodingError::Empty);
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EncodingError::InvalidHex(trimmed.to_string()));
    }
    BigUint::from_str_radix(digits, 16).map_err(|_| EncodingError::InvalidHex(trimmed.to_string()))
}

/// Serde adapter: a field element as a decimal string.
pub mod serde_decimal {
    use ark_ff::PrimeField;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<F: PrimeField, S: Serializer>(value: &F, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::field_to_decimal(value))
    }

    pub fn deserialize<'de, F: PrimeField, D: Deserializer<'de>>(deserializer: D) -> Result<F, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::field_from_decimal(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter: a list of field elements as decimal strings.
pub mod serde_decimal_vec {
    use ark_ff::PrimeField;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<F: PrimeField, S: Serializer>(values: &[F], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(super::field_to_decimal))
    }

    pub fn deserialize<'de, F: PrimeField, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<F>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| super::field_from_decimal(s).map_err(D::Error::custom))
            .collect()
    }
}

/// Serde adapter: an EVM address stored as a field element.
pub mod serde_address {
    use ark_ff::PrimeField;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<F: PrimeField, S: Serializer>(value: &F, serializer: S) -> Result<S::Ok, S::Error> {
        let word = super::field_to_bytes_be(value);
        serializer.serialize_str(&format!("0x{}", hex::encode(&word[12..])))
    }

    pub fn deserialize<'de, F: PrimeField, D: Deserializer<'de>>(deserializer: D) -> Result<F, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::address_to_field(&s).map_err(D::Error::custom)
    }
}
