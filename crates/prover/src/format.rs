//! Proof encodings for the on-chain verifier, snarkjs tooling and the relayer.
//!
//! Solidity Groth16 verifiers take G2 coordinates as `[c1, c0]` pairs, the
//! reverse of the order arkworks and snarkjs use. [`ContractProof`] applies
//! that swap; [`SnarkjsProof`] and [`RelayProof`] keep the native order.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_groth16::{Proof, VerifyingKey};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swap_circuits::encoding::{field_from_decimal, field_to_decimal, EncodingError};
use swap_circuits::PUBLIC_SIGNAL_COUNT;

/// Errors while converting between proof encodings.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] EncodingError),
    #[error("Value does not fit in a uint256: {0}")]
    WordOverflow(String),
    #[error("Point {0} is not on the curve or not in the prime-order subgroup")]
    InvalidPoint(&'static str),
    #[error("Expected {expected} public signals, got {found}")]
    SignalCount { expected: usize, found: usize },
}

/// Proof in the argument layout of the Solidity verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractProof {
    pub a: [String; 2],
    pub b: [[String; 2]; 2],
    pub c: [String; 2],
    pub input: Vec<String>,
}

/// Proof in snarkjs JSON layout (projective coordinates, native order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: [String; 3],
    pub pi_b: [[String; 2]; 3],
    pub pi_c: [String; 3],
    pub protocol: String,
    pub curve: String,
}

/// Proof points as the relayer expects them (native order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProof {
    pub a: [String; 2],
    pub b: [[String; 2]; 2],
    pub c: [String; 2],
}

/// Uniswap v4 pool key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKey {
    pub currency0: String,
    pub currency1: String,
    pub fee: u32,
    pub tick_spacing: i32,
    pub hooks: String,
}

/// Swap leg submitted alongside the proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySwapParams {
    pub pool_key: PoolKey,
    pub zero_for_one: bool,
    pub amount_specified: String,
    #[serde(rename = "sqrtPriceLimitX96")]
    pub sqrt_price_limit_x96: String,
}

/// Payload for the relayer's submission endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub proof: RelayProof,
    pub public_signals: Vec<String>,
    pub swap_params: RelaySwapParams,
}

fn g1_coords(p: &G1Affine) -> [String; 2] {
    [field_to_decimal(&p.x), field_to_decimal(&p.y)]
}

fn fq2_native(v: &Fq2) -> [String; 2] {
    [field_to_decimal(&v.c0), field_to_decimal(&v.c1)]
}

fn fq2_swapped(v: &Fq2) -> [String; 2] {
    [field_to_decimal(&v.c1), field_to_decimal(&v.c0)]
}

fn signals_to_decimal(public_signals: &[Fr]) -> Vec<String> {
    public_signals.iter().map(field_to_decimal).collect()
}

impl ContractProof {
    pub fn from_proof(proof: &Proof<Bn254>, public_signals: &[Fr]) -> Self {
        Self {
            a: g1_coords(&proof.a),
            b: [fq2_swapped(&proof.b.x), fq2_swapped(&proof.b.y)],
            c: g1_coords(&proof.c),
            input: signals_to_decimal(public_signals),
        }
    }

    /// ABI-encode as `(uint256[2], uint256[2][2], uint256[2], uint256[8])`.
    ///
    /// All four are static types, so the encoding is the sixteen 32-byte
    /// words in order with no offsets.
    pub fn encode_hook_data(&self) -> Result<Vec<u8>, FormatError> {
        if self.input.len() != PUBLIC_SIGNAL_COUNT {
            return Err(FormatError::SignalCount {
                expected: PUBLIC_SIGNAL_COUNT,
                found: self.input.len(),
            });
        }

        let words = self
            .a
            .iter()
            .chain(self.b.iter().flatten())
            .chain(self.c.iter())
            .chain(self.input.iter());

        let mut out = Vec::with_capacity(32 * (8 + PUBLIC_SIGNAL_COUNT));
        for value in words {
            out.extend_from_slice(&uint256_word(value)?);
        }
        Ok(out)
    }

    /// [`ContractProof::encode_hook_data`] as a `0x`-prefixed hex string.
    pub fn hook_data_hex(&self) -> Result<String, FormatError> {
        Ok(format!("0x{}", hex::encode(self.encode_hook_data()?)))
    }
}

fn uint256_word(decimal: &str) -> Result<[u8; 32], FormatError> {
    let value = BigUint::parse_bytes(decimal.trim().as_bytes(), 10)
        .ok_or_else(|| EncodingError::InvalidDecimal(decimal.to_string()))?;
    if value.bits() > 256 {
        return Err(FormatError::WordOverflow(decimal.to_string()));
    }

    let bytes = value.to_bytes_be();
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

impl SnarkjsProof {
    pub fn from_proof(proof: &Proof<Bn254>) -> Self {
        Self {
            pi_a: g1_projective(&proof.a),
            pi_b: g2_projective(&proof.b),
            pi_c: g1_projective(&proof.c),
            protocol: "groth16".to_string(),
            curve: "bn128".to_string(),
        }
    }

    /// Parse back into an arkworks proof, checking every point.
    pub fn to_proof(&self) -> Result<Proof<Bn254>, FormatError> {
        Ok(Proof {
            a: parse_g1(&self.pi_a, "pi_a")?,
            b: parse_g2(&self.pi_b, "pi_b")?,
            c: parse_g1(&self.pi_c, "pi_c")?,
        })
    }

    /// Relayer layout: affine coordinates, native order.
    pub fn to_relay_proof(&self) -> RelayProof {
        RelayProof {
            a: [self.pi_a[0].clone(), self.pi_a[1].clone()],
            b: [self.pi_b[0].clone(), self.pi_b[1].clone()],
            c: [self.pi_c[0].clone(), self.pi_c[1].clone()],
        }
    }
}

fn parse_g1(coords: &[String; 3], name: &'static str) -> Result<G1Affine, FormatError> {
    let x: Fq = field_from_decimal(&coords[0])?;
    let y: Fq = field_from_decimal(&coords[1])?;
    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(FormatError::InvalidPoint(name));
    }
    Ok(point)
}

fn parse_g2(coords: &[[String; 2]; 3], name: &'static str) -> Result<G2Affine, FormatError> {
    let x = Fq2::new(field_from_decimal(&coords[0][0])?, field_from_decimal(&coords[0][1])?);
    let y = Fq2::new(field_from_decimal(&coords[1][0])?, field_from_decimal(&coords[1][1])?);
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(FormatError::InvalidPoint(name));
    }
    Ok(point)
}

/// Verifying key in snarkjs `verification_key.json` layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsVerifyingKey {
    pub protocol: String,
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: [String; 3],
    pub vk_beta_2: [[String; 2]; 3],
    pub vk_gamma_2: [[String; 2]; 3],
    pub vk_delta_2: [[String; 2]; 3],
    #[serde(rename = "IC")]
    pub ic: Vec<[String; 3]>,
}

fn g1_projective(p: &G1Affine) -> [String; 3] {
    let [x, y] = g1_coords(p);
    [x, y, "1".to_string()]
}

fn g2_projective(p: &G2Affine) -> [[String; 2]; 3] {
    [fq2_native(&p.x), fq2_native(&p.y), ["1".to_string(), "0".to_string()]]
}

impl SnarkjsVerifyingKey {
    pub fn from_vk(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            protocol: "groth16".to_string(),
            curve: "bn128".to_string(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_projective(&vk.alpha_g1),
            vk_beta_2: g2_projective(&vk.beta_g2),
            vk_gamma_2: g2_projective(&vk.gamma_g2),
            vk_delta_2: g2_projective(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_projective).collect(),
        }
    }
}

impl RelayRequest {
    pub fn new(proof: &Proof<Bn254>, public_signals: &[Fr], swap_params: RelaySwapParams) -> Self {
        Self {
            proof: SnarkjsProof::from_proof(proof).to_relay_proof(),
            public_signals: signals_to_decimal(public_signals),
            swap_params,
        }
    }
}
