//! Merkle inclusion proof for a deposited commitment.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use crate::encoding::{serde_decimal, serde_decimal_vec};
use crate::poseidon::PoseidonHasher;

/// Inclusion proof for one leaf.
///
/// `path_elements[i]` is the sibling at level `i` (leaf level first) and
/// `path_indices[i]` tells whether the running node is the right child at
/// that level. Both have one entry per level of the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    #[serde(with = "serde_decimal_vec")]
    pub path_elements: Vec<Fr>,

    /// Serialized as 0/1 integers, matching the circuit's input format.
    #[serde(with = "bits")]
    pub path_indices: Vec<bool>,

    #[serde(with = "serde_decimal")]
    pub root: Fr,

    #[serde(with = "serde_decimal")]
    pub leaf: Fr,

    pub leaf_index: u64,
}

impl MerkleProof {
    /// Number of levels the proof covers.
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    /// Replay the path from `self.leaf` to a root.
    ///
    /// Returns `None` if the two path vectors differ in length.
    pub fn compute_root(&self, hasher: &PoseidonHasher) -> Option<Fr> {
        if self.path_elements.len() != self.path_indices.len() {
            return None;
        }

        let mut current = self.leaf;
        for (sibling, &is_right) in self.path_elements.iter().zip(self.path_indices.iter()) {
            current = if is_right {
                hasher.hash_two(*sibling, current)
            } else {
                hasher.hash_two(current, *sibling)
            };
        }
        Some(current)
    }

    /// Check that the path is consistent with the leaf index and leads to `self.root`.
    pub fn verify(&self, hasher: &PoseidonHasher) -> bool {
        if self.path_index_bits() != self.path_indices {
            return false;
        }
        self.compute_root(hasher) == Some(self.root)
    }

    /// Direction bits derived from `leaf_index`, least significant first.
    pub fn path_index_bits(&self) -> Vec<bool> {
        (0..self.depth())
            .map(|level| level < 64 && (self.leaf_index >> level) & 1 == 1)
            .collect()
    }
}

mod bits {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bits: &[bool], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(bits.iter().map(|&b| u8::from(b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<bool>, D::Error> {
        Vec::<u8>::deserialize(deserializer)?
            .into_iter()
            .map(|b| match b {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(D::Error::custom(format!("path index must be 0 or 1, got {other}"))),
            })
            .collect()
    }
}
