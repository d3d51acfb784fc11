//! Sparse incremental Merkle tree over deposit commitments.
//!
//! This module provides:
//! - Native append-only tree operations (insert, root, proof extraction)
//! - Merkle proof structures and path replay
//! - In-circuit path verification gadgets

mod dense;
mod gadgets;
mod proof;
mod tree;


pub use dense::dense_root;
pub use gadgets::{compute_root_from_path, verify_membership, MerkleProofVar};
pub use proof::MerkleProof;
pub use tree::{
    zero_chain, SparseMerkleTree, TreeError, TreeState, DEFAULT_HEIGHT, MAX_HEIGHT, ZERO_VALUE,
};
