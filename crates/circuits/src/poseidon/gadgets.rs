//! Poseidon R1CS gadget for in-circuit hashing.

use ark_bn254::Fr;
use ark_r1cs_std::fields::{fp::FpVar, FieldVar};
use ark_relations::r1cs::SynthesisError;

use super::config::SBOX_ALPHA;
use super::native::PoseidonHasher;

/// Hash 1..=3 field elements in-circuit.
///
/// Runs the same permutation as [`PoseidonHasher::hash`], so a value hashed
/// here equals the native hash of the assigned witnesses.
pub fn poseidon_hash_var(
    hasher: &PoseidonHasher,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let params = hasher
        .parameters(inputs.len())
        .ok_or(SynthesisError::Unsatisfiable)?;
    if params.alpha != SBOX_ALPHA {
        return Err(SynthesisError::Unsatisfiable);
    }

    let width = params.width;
    let half_full = params.full_rounds / 2;
    let total_rounds = params.full_rounds + params.partial_rounds;

    let mut state: Vec<FpVar<Fr>> = Vec::with_capacity(width);
    state.push(FpVar::zero());
    state.extend(inputs.iter().cloned());

    for round in 0..total_rounds {
        for (i, element) in state.iter_mut().enumerate() {
            *element += params.ark[round * width + i];
        }

        if round < half_full || round >= half_full + params.partial_rounds {
            for element in state.iter_mut() {
                *element = sbox(element)?;
            }
        } else {
            state[0] = sbox(&state[0])?;
        }

        // MDS mixing is linear, so it costs no constraints.
        state = params
            .mds
            .iter()
            .map(|row| {
                row.iter()
                    .zip(state.iter())
                    .fold(FpVar::zero(), |acc, (m, s)| acc + s * *m)
            })
            .collect();
    }

    Ok(state.swap_remove(0))
}

/// x^5 with three multiplication constraints.
fn sbox(x: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    let x2 = x.square()?;
    let x4 = x2.square()?;
    Ok(x4 * x)
}
