//! Poseidon configuration for BN254.
//!
//! Round constants and MDS matrices are the circomlib ones, as published by
//! `light-poseidon` in its `bn254_x5` tables.

use ark_bn254::Fr;
use light_poseidon::{parameters::bn254_x5, PoseidonParameters};

use super::native::HashError;

/// Largest number of inputs a single hash call accepts.
///
/// The note codec needs three (`nullifier, secret, amount`), the tree needs two.
pub const MAX_INPUTS: usize = 3;

/// S-box exponent of the x^5 parameter family.
pub const SBOX_ALPHA: u64 = 5;

/// Load the circom parameters for a permutation absorbing `nr_inputs` elements.
///
/// The permutation width is `nr_inputs + 1` (one capacity element).
pub(crate) fn circom_parameters(nr_inputs: usize) -> Result<PoseidonParameters<Fr>, HashError> {
    if nr_inputs == 0 || nr_inputs > MAX_INPUTS {
        return Err(HashError::UnsupportedArity(nr_inputs));
    }
    let width = u8::try_from(nr_inputs + 1).map_err(|_| HashError::UnsupportedArity(nr_inputs))?;

    let params = bn254_x5::get_poseidon_parameters::<Fr>(width)
        .map_err(|e| HashError::Parameters(e.to_string()))?;

    if params.alpha != SBOX_ALPHA {
        return Err(HashError::Parameters(format!(
            "unexpected S-box exponent {}",
            params.alpha
        )));
    }
    if params.ark.len() != (params.full_rounds + params.partial_rounds) * params.width
        || params.mds.len() != params.width
    {
        return Err(HashError::Parameters(format!(
            "inconsistent parameter tables for width {}",
            params.width
        )));
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_valid() {
        for nr_inputs in 1..=MAX_INPUTS {
            let params = circom_parameters(nr_inputs).unwrap();
            assert_eq!(params.width, nr_inputs + 1);
            assert_eq!(params.full_rounds, 8);
            assert_eq!(params.mds.len(), params.width);
        }
    }

    #[test]
    fn test_rejects_unsupported_arity() {
        assert!(matches!(
            circom_parameters(0),
            Err(HashError::UnsupportedArity(0))
        ));
        assert!(matches!(
            circom_parameters(MAX_INPUTS + 1),
            Err(HashError::UnsupportedArity(4))
        ));
    }
}
