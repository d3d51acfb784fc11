//! Native Poseidon hash functions (outside circuits).

use std::fmt;
use std::sync::Arc;

use ark_bn254::Fr;
use ark_ff::{Field, Zero};
use light_poseidon::PoseidonParameters;
use thiserror::Error;

use super::config::{circom_parameters, MAX_INPUTS};

/// Errors raised while building or using the hasher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Poseidon does not support {0} inputs (expected 1..=3)")]
    UnsupportedArity(usize),
    #[error("Invalid Poseidon parameters: {0}")]
    Parameters(String),
}

struct Tables {
    one: PoseidonParameters<Fr>,
    two: PoseidonParameters<Fr>,
    three: PoseidonParameters<Fr>,
}

/// Shared, read-only Poseidon handle.
///
/// Building the parameter tables is the expensive part, so construct one
/// hasher at start-up and clone it into every component that hashes. Clones
/// share the same tables and the handle is safe to use from many threads.
#[derive(Clone)]
pub struct PoseidonHasher {
    tables: Arc<Tables>,
}

impl PoseidonHasher {
    /// Load the circom parameter tables for every supported arity.
    pub fn new() -> Result<Self, HashError> {
        let tables = Tables {
            one: circom_parameters(1)?,
            two: circom_parameters(2)?,
            three: circom_parameters(3)?,
        };
        Ok(Self {
            tables: Arc::new(tables),
        })
    }

    /// Hash 1..=3 field elements.
    pub fn hash(&self, inputs: &[Fr]) -> Result<Fr, HashError> {
        let params = self
            .parameters(inputs.len())
            .ok_or(HashError::UnsupportedArity(inputs.len()))?;
        Ok(permute(params, inputs))
    }

    /// Hash a single field element.
    pub fn hash_one(&self, input: Fr) -> Fr {
        permute(&self.tables.one, &[input])
    }

    /// Hash two field elements. This is the tree's compression function.
    pub fn hash_two(&self, left: Fr, right: Fr) -> Fr {
        permute(&self.tables.two, &[left, right])
    }

    /// Hash three field elements.
    pub fn hash_three(&self, a: Fr, b: Fr, c: Fr) -> Fr {
        permute(&self.tables.three, &[a, b, c])
    }

    pub(crate) fn parameters(&self, nr_inputs: usize) -> Option<&PoseidonParameters<Fr>> {
        match nr_inputs {
            1 => Some(&self.tables.one),
            2 => Some(&self.tables.two),
            3 => Some(&self.tables.three),
            _ => None,
        }
    }
}

impl fmt::Debug for PoseidonHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoseidonHasher")
            .field("max_inputs", &MAX_INPUTS)
            .finish()
    }
}

/// The circom permutation: state = [0, inputs..], output = state[0].
///
/// `inputs.len()` must equal `params.width - 1`; callers pick the table by arity.
/// Same output as `light_poseidon::Poseidon::hash`, without its per-call state.
fn permute(params: &PoseidonParameters<Fr>, inputs: &[Fr]) -> Fr {
    let width = params.width;
    let half_full = params.full_rounds / 2;
    let total_rounds = params.full_rounds + params.partial_rounds;

    let mut state = Vec::with_capacity(width);
    state.push(Fr::zero());
    state.extend_from_slice(inputs);

    for round in 0..total_rounds {
        for (i, element) in state.iter_mut().enumerate() {
            *element += params.ark[round * width + i];
        }

        if round < half_full || round >= half_full + params.partial_rounds {
            for element in state.iter_mut() {
                *element = element.pow([params.alpha]);
            }
        } else {
            state[0] = state[0].pow([params.alpha]);
        }

        state = params
            .mds
            .iter()
            .map(|row| {
                row.iter()
                    .zip(state.iter())
                    .fold(Fr::zero(), |acc, (m, s)| acc + *m * s)
            })
            .collect();
    }

    state[0]
}
