//! Sparse incremental Merkle tree native implementation.
//!
//! Leaves are appended at sequential indices and never change afterwards.
//! Only the inserted leaves are stored. Any subtree whose index range lies
//! entirely past the last inserted leaf is the precomputed zero hash for its
//! level, so computing the root or a proof costs O(height) hashes on top of
//! whatever is already cached, regardless of the tree's capacity.

use std::ops::Range;

use ark_bn254::Fr;
use ark_ff::MontFp;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::proof::MerkleProof;
use crate::encoding::serde_decimal_vec;
use crate::poseidon::PoseidonHasher;

/// Height of the deployed pool tree (2^20 = 1,048,576 leaves).
pub const DEFAULT_HEIGHT: usize = 20;

/// Largest supported height; leaf indices are `u64` and capacity is 2^height.
pub const MAX_HEIGHT: usize = 32;

/// Value of a leaf that has not been inserted yet.
///
/// Must equal the zero leaf hardcoded in the spend circuit.
pub const ZERO_VALUE: Fr = MontFp!("0");

/// Errors from tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Invalid tree height {0}: must be between 1 and 32")]
    InvalidHeight(usize),
    #[error("Leaf index {index} out of bounds ({leaf_count} leaves)")]
    IndexOutOfBounds { index: u64, leaf_count: u64 },
    #[error("Tree is full: capacity of {capacity} leaves exceeded")]
    CapacityExceeded { capacity: u64 },
}

/// Exported tree state: the height and every leaf in index order.
///
/// This is the only form in which a tree is persisted. Cached nodes are never
/// exported; importing replays the leaves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeState {
    pub height: usize,
    #[serde(with = "serde_decimal_vec")]
    pub leaves: Vec<Fr>,
}

/// Per-level default hashes: `zeros[0] = ZERO_VALUE`, `zeros[i] = H(zeros[i-1], zeros[i-1])`.
pub fn zero_chain(hasher: &PoseidonHasher, height: usize) -> Vec<Fr> {
    let mut zeros = Vec::with_capacity(height + 1);
    let mut current = ZERO_VALUE;
    zeros.push(current);
    for _ in 0..height {
        current = hasher.hash_two(current, current);
        zeros.push(current);
    }
    zeros
}

/// Append-only sparse Merkle tree.
///
/// Not synchronized: wrap it in a lock to share it between threads, and
/// insert leaves in the same order the on-chain tree accepted them.
#[derive(Clone, Debug)]
pub struct SparseMerkleTree {
    hasher: PoseidonHasher,

    /// Number of levels above the leaves; the root lives at level `height`.
    height: usize,

    /// Default hash of an empty subtree rooted at each level.
    zeros: Vec<Fr>,

    /// Inserted leaves in index order.
    leaves: Vec<Fr>,

    /// Node cache indexed by `[level][index]` for levels 1..=height.
    /// Row `level` has one slot per non-empty node at that level; `None`
    /// marks a slot that must be recomputed.
    cache: Vec<Vec<Option<Fr>>>,
}

impl SparseMerkleTree {
    /// Create an empty tree of the given height, precomputing the zero chain.
    pub fn new(hasher: PoseidonHasher, height: usize) -> Result<Self, TreeError> {
        if height == 0 || height > MAX_HEIGHT {
            return Err(TreeError::InvalidHeight(height));
        }
        let zeros = zero_chain(&hasher, height);

        Ok(Self {
            hasher,
            height,
            zeros,
            leaves: Vec::new(),
            cache: vec![Vec::new(); height + 1],
        })
    }

    /// Rebuild a tree from exported state by re-inserting every leaf.
    pub fn from_state(hasher: PoseidonHasher, state: &TreeState) -> Result<Self, TreeError> {
        let mut tree = Self::new(hasher, state.height)?;
        tree.insert_many(&state.leaves)?;
        tree.warm_cache();
        Ok(tree)
    }

    /// Export the height and leaves.
    pub fn export_state(&self) -> TreeState {
        TreeState {
            height: self.height,
            leaves: self.leaves.clone(),
        }
    }

    /// Append a leaf and return its index.
    pub fn insert(&mut self, leaf: Fr) -> Result<u64, TreeError> {
        let index = self.leaf_count();
        if index >= self.capacity() {
            return Err(TreeError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        self.leaves.push(leaf);
        self.invalidate_path(index);
        Ok(index)
    }

    /// Append several leaves. Either all of them are inserted or none is.
    pub fn insert_many(&mut self, leaves: &[Fr]) -> Result<Range<u64>, TreeError> {
        let start = self.leaf_count();
        let end = start + leaves.len() as u64;
        if end > self.capacity() {
            return Err(TreeError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        for &leaf in leaves {
            self.insert(leaf)?;
        }
        Ok(start..end)
    }

    /// Current root.
    pub fn root(&mut self) -> Fr {
        self.node(self.height, 0)
    }

    /// Inclusion proof for an inserted leaf, against the current root.
    pub fn proof(&mut self, leaf_index: u64) -> Result<MerkleProof, TreeError> {
        if leaf_index >= self.leaf_count() {
            return Err(TreeError::IndexOutOfBounds {
                index: leaf_index,
                leaf_count: self.leaf_count(),
            });
        }

        let mut path_elements = Vec::with_capacity(self.height);
        let mut path_indices = Vec::with_capacity(self.height);

        let mut current_index = leaf_index;
        for level in 0..self.height {
            path_elements.push(self.node(level, current_index ^ 1));
            path_indices.push(current_index & 1 == 1); // true if current is right child
            current_index >>= 1;
        }

        Ok(MerkleProof {
            path_elements,
            path_indices,
            root: self.root(),
            leaf: self.leaves[leaf_index as usize],
            leaf_index,
        })
    }

    /// Replay a proof with this tree's hasher.
    ///
    /// Independent of the tree's contents: it checks the proof against the
    /// root the proof carries.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        proof.verify(&self.hasher)
    }

    /// Get the tree height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of leaves the tree can hold.
    pub fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    /// Number of inserted leaves.
    pub fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Check if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Inserted leaves in index order.
    pub fn leaves(&self) -> &[Fr] {
        &self.leaves
    }

    /// Get the default hash for a level.
    pub fn zero_at(&self, level: usize) -> Option<Fr> {
        self.zeros.get(level).copied()
    }

    /// The hasher this tree compresses nodes with.
    pub fn hasher(&self) -> &PoseidonHasher {
        &self.hasher
    }

    /// Node `(level, index)`, computed on demand.
    fn node(&mut self, level: usize, index: u64) -> Fr {
        if level == 0 {
            return self
                .leaves
                .get(index as usize)
                .copied()
                .unwrap_or(self.zeros[0]);
        }

        // No inserted leaf below this node: it is the zero subtree.
        if index << level >= self.leaf_count() {
            return self.zeros[level];
        }

        let slot = index as usize;
        if let Some(Some(hash)) = self.cache[level].get(slot) {
            return *hash;
        }

        let left = self.node(level - 1, index << 1);
        let right = self.node(level - 1, (index << 1) | 1);
        let hash = self.hasher.hash_two(left, right);

        if let Some(cached) = self.cache[level].get_mut(slot) {
            *cached = Some(hash);
        }
        hash
    }

    /// Drop the cached ancestors of a freshly inserted leaf.
    ///
    /// Leaves are append-only, so these are the only nodes whose value changes.
    fn invalidate_path(&mut self, leaf_index: u64) {
        for level in 1..=self.height {
            let slot = (leaf_index >> level) as usize;
            let row = &mut self.cache[level];
            if slot < row.len() {
                row[slot] = None;
            } else {
                row.resize(slot + 1, None);
            }
        }
    }

    /// Compute every non-empty node bottom-up, one level at a time in parallel.
    fn warm_cache(&mut self) {
        if self.leaves.is_empty() {
            return;
        }

        let hasher = &self.hasher;
        let mut below = self.leaves.clone();
        for level in 1..=self.height {
            let zero = self.zeros[level - 1];
            let row: Vec<Fr> = below
                .par_chunks(2)
                .map(|pair| hasher.hash_two(pair[0], pair.get(1).copied().unwrap_or(zero)))
                .collect();
            self.cache[level] = row.iter().copied().map(Some).collect();
            below = row;
        }
    }
}
