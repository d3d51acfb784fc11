//! ZK building blocks for the shielded-swap pool.
//!
//! This crate provides:
//! - `PoseidonHasher`: circom-compatible Poseidon, natively and in-circuit
//! - `DepositNote`: commitment / nullifier codec for deposits
//! - `SparseMerkleTree`: append-only commitment tree with inclusion proofs
//! - `SpendCircuit`: proves a deposit is in the tree and authorizes a swap

pub mod encoding;
pub mod merkle;
pub mod note;
pub mod poseidon;
pub mod spend;


pub use encoding::EncodingError;
pub use merkle::{
    dense_root, MerkleProof, SparseMerkleTree, TreeError, TreeState, DEFAULT_HEIGHT, MAX_HEIGHT, ZERO_VALUE,
};
pub use note::{
    compute_commitment, compute_nullifier_hash, format_commitment_for_contract, DepositNote,
    NoteError,
};
pub use poseidon::{HashError, PoseidonHasher};
pub use spend::{
    SpendCircuit, SpendPublicInputs, SpendWitness, PUBLIC_SIGNAL_COUNT, PUBLIC_SIGNAL_NAMES,
};

use ark_bn254::Fr;

/// Common type aliases
pub type ConstraintF = Fr;
