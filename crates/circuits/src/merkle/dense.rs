//! Dense reference tree builder.
//!
//! Hashes every node of a full tree level by level. Only practical for small
//! heights; used to cross-check the sparse tree.

use ark_bn254::Fr;
use rayon::prelude::*;

use super::tree::{TreeError, MAX_HEIGHT, ZERO_VALUE};
use crate::poseidon::PoseidonHasher;

/// Root of a tree of `height` whose first leaves are `leaves` and the rest zero.
pub fn dense_root(hasher: &PoseidonHasher, height: usize, leaves: &[Fr]) -> Result<Fr, TreeError> {
    if height == 0 || height > MAX_HEIGHT {
        return Err(TreeError::InvalidHeight(height));
    }
    let capacity = 1u64 << height;
    if leaves.len() as u64 > capacity {
        return Err(TreeError::CapacityExceeded { capacity });
    }

    let mut level: Vec<Fr> = leaves.to_vec();
    level.resize(capacity as usize, ZERO_VALUE);

    for _ in 0..height {
        level = level
            .par_chunks(2)
            .map(|pair| hasher.hash_two(pair[0], pair[1]))
            .collect();
    }

    Ok(level[0])
}
