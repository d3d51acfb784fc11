//! Poseidon hash function for BN254.
//!
//! This module provides the circomlib flavour of Poseidon, so that every
//! commitment, nullifier hash and tree node computed here is bit-for-bit
//! identical to what a circom spend circuit (and `circomlibjs`) computes.
//! The same permutation is available natively and as an R1CS gadget.

mod config;
mod gadgets;
mod native;

#[cfg(test)]
mod tests;

pub use config::{MAX_INPUTS, SBOX_ALPHA};
pub use gadgets::poseidon_hash_var;
pub use native::{HashError, PoseidonHasher};
