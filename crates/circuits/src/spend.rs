//! Spend circuit: proves ownership of one deposit in the pool tree.
//!
//! Public inputs, in order:
//! `merkleRoot, nullifierHash, recipient, relayer, relayerFee, amountIn,
//! minAmountOut, poolKey`.
//!
//! Private inputs: `nullifier, secret, amount` and the Merkle path.
//!
//! Constraints:
//! 1. `commitment = Poseidon(nullifier, secret, amount)`
//! 2. `nullifierHash = Poseidon(nullifier)`
//! 3. the path from `commitment` replays to `merkleRoot`
//! 4. the spend parameters are bound to the proof (squared), so changing any
//!    of them after proving invalidates the proof

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::merkle::{verify_membership, MerkleProofVar};
use crate::poseidon::{poseidon_hash_var, PoseidonHasher};

/// Number of public signals the circuit exposes.
pub const PUBLIC_SIGNAL_COUNT: usize = 8;

/// Public signal names in circuit order.
pub const PUBLIC_SIGNAL_NAMES: [&str; PUBLIC_SIGNAL_COUNT] = [
    "merkleRoot",
    "nullifierHash",
    "recipient",
    "relayer",
    "relayerFee",
    "amountIn",
    "minAmountOut",
    "poolKey",
];

/// Public inputs of a spend proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SpendPublicInputs {
    pub merkle_root: Fr,
    pub nullifier_hash: Fr,
    pub recipient: Fr,
    pub relayer: Fr,
    pub relayer_fee: Fr,
    pub amount_in: Fr,
    pub min_amount_out: Fr,
    pub pool_key: Fr,
}

impl SpendPublicInputs {
    /// Signals in circuit order, as the verifier expects them.
    pub fn to_vec(&self) -> Vec<Fr> {
        vec![
            self.merkle_root,
            self.nullifier_hash,
            self.recipient,
            self.relayer,
            self.relayer_fee,
            self.amount_in,
            self.min_amount_out,
            self.pool_key,
        ]
    }

    /// Inverse of [`SpendPublicInputs::to_vec`]. `None` unless exactly eight signals are given.
    pub fn from_slice(signals: &[Fr]) -> Option<Self> {
        match signals {
            &[merkle_root, nullifier_hash, recipient, relayer, relayer_fee, amount_in, min_amount_out, pool_key] => {
                Some(Self {
                    merkle_root,
                    nullifier_hash,
                    recipient,
                    relayer,
                    relayer_fee,
                    amount_in,
                    min_amount_out,
                    pool_key,
                })
            }
            _ => None,
        }
    }
}

/// Private inputs of a spend proof.
#[derive(Clone, PartialEq, Eq)]
pub struct SpendWitness {
    pub nullifier: Fr,
    pub secret: Fr,
    pub amount: Fr,
    /// Siblings from the leaf level up
    pub path_elements: Vec<Fr>,
    /// true = running node is the right child
    pub path_indices: Vec<bool>,
}

impl SpendWitness {
    /// All-zero witness with a path of `depth` levels.
    pub fn zero(depth: usize) -> Self {
        Self {
            nullifier: Fr::from(0u64),
            secret: Fr::from(0u64),
            amount: Fr::from(0u64),
            path_elements: vec![Fr::from(0u64); depth],
            path_indices: vec![false; depth],
        }
    }

    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }
}

/// Spend circuit over a tree of fixed depth.
#[derive(Clone)]
pub struct SpendCircuit {
    hasher: PoseidonHasher,
    pub public: SpendPublicInputs,
    pub witness: SpendWitness,
}

impl SpendCircuit {
    /// Create an empty circuit for setup.
    ///
    /// Uses zero values that produce the same constraint structure as a real
    /// spend over a tree of `depth` levels.
    pub fn empty(hasher: PoseidonHasher, depth: usize) -> Self {
        Self {
            hasher,
            public: SpendPublicInputs::default(),
            witness: SpendWitness::zero(depth),
        }
    }

    /// Create a circuit with real assignments.
    pub fn new(hasher: PoseidonHasher, public: SpendPublicInputs, witness: SpendWitness) -> Self {
        Self {
            hasher,
            public,
            witness,
        }
    }

    pub fn depth(&self) -> usize {
        self.witness.depth()
    }
}

impl ConstraintSynthesizer<Fr> for SpendCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let public = self.public;

        // === Allocate public inputs (order is the verifier's contract) ===
        let root_var = FpVar::new_input(cs.clone(), || Ok(public.merkle_root))?;
        let nullifier_hash_var = FpVar::new_input(cs.clone(), || Ok(public.nullifier_hash))?;
        let bound_inputs = [
            public.recipient,
            public.relayer,
            public.relayer_fee,
            public.amount_in,
            public.min_amount_out,
            public.pool_key,
        ]
        .iter()
        .map(|value| FpVar::new_input(cs.clone(), || Ok(*value)))
        .collect::<Result<Vec<_>, _>>()?;

        // === Allocate private inputs ===
        let nullifier_var = FpVar::new_witness(cs.clone(), || Ok(self.witness.nullifier))?;
        let secret_var = FpVar::new_witness(cs.clone(), || Ok(self.witness.secret))?;
        let amount_var = FpVar::new_witness(cs.clone(), || Ok(self.witness.amount))?;
        let path_var = MerkleProofVar::from_parts(
            cs.clone(),
            &self.witness.path_elements,
            &self.witness.path_indices,
        )?;

        // === Constraint 1: commitment ===
        let commitment_var = poseidon_hash_var(
            &self.hasher,
            &[nullifier_var.clone(), secret_var, amount_var],
        )?;

        // === Constraint 2: nullifier hash ===
        let computed_nullifier_hash = poseidon_hash_var(&self.hasher, &[nullifier_var])?;
        computed_nullifier_hash.enforce_equal(&nullifier_hash_var)?;

        // === Constraint 3: membership ===
        verify_membership(&self.hasher, &root_var, &commitment_var, &path_var)?;

        // === Constraint 4: bind spend parameters ===
        for input in &bound_inputs {
            let _square = input.square()?;
        }

        Ok(())
    }
}
