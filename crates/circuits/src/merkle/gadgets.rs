//! In-circuit Merkle path verification.

use ark_bn254::Fr;
use ark_r1cs_std::{boolean::Boolean, fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use super::proof::MerkleProof;
use crate::poseidon::{poseidon_hash_var, PoseidonHasher};

/// Circuit variable representation of a Merkle path.
#[derive(Clone)]
pub struct MerkleProofVar {
    /// Sibling hashes as circuit variables
    path: Vec<FpVar<Fr>>,

    /// Direction booleans: true = running node is the right child
    indices: Vec<Boolean<Fr>>,
}

impl MerkleProofVar {
    /// Allocate a Merkle path as witness variables.
    pub fn new_witness(
        cs: ConstraintSystemRef<Fr>,
        proof: &MerkleProof,
    ) -> Result<Self, SynthesisError> {
        Self::from_parts(cs, &proof.path_elements, &proof.path_indices)
    }

    /// Allocate a path from raw siblings and directions.
    pub fn from_parts(
        cs: ConstraintSystemRef<Fr>,
        path: &[Fr],
        indices: &[bool],
    ) -> Result<Self, SynthesisError> {
        if path.len() != indices.len() {
            return Err(SynthesisError::Unsatisfiable);
        }

        let path = path
            .iter()
            .map(|h| FpVar::new_witness(cs.clone(), || Ok(*h)))
            .collect::<Result<Vec<_>, _>>()?;

        let indices = indices
            .iter()
            .map(|&b| Boolean::new_witness(cs.clone(), || Ok(b)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { path, indices })
    }

    pub fn path(&self) -> &[FpVar<Fr>] {
        &self.path
    }

    pub fn indices(&self) -> &[Boolean<Fr>] {
        &self.indices
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Compute the root reached from `leaf` along `proof`.
pub fn compute_root_from_path(
    hasher: &PoseidonHasher,
    leaf: &FpVar<Fr>,
    proof: &MerkleProofVar,
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut current = leaf.clone();

    for (sibling, is_right) in proof.path.iter().zip(proof.indices.iter()) {
        // If is_right: H(sibling, current), else H(current, sibling)
        let left = is_right.select(sibling, &current)?;
        let right = is_right.select(&current, sibling)?;

        current = poseidon_hash_var(hasher, &[left, right])?;
    }

    Ok(current)
}

/// Enforce that `leaf` is a member of the tree with root `expected_root`.
pub fn verify_membership(
    hasher: &PoseidonHasher,
    expected_root: &FpVar<Fr>,
    leaf: &FpVar<Fr>,
    proof: &MerkleProofVar,
) -> Result<(), SynthesisError> {
    let computed_root = compute_root_from_path(hasher, leaf, proof)?;
    computed_root.enforce_equal(expected_root)
}
