//! Local proof verification against the spend verifying key.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, VerifyingKey};
use ark_snark::SNARK;
use thiserror::Error;

use swap_circuits::{SpendPublicInputs, PUBLIC_SIGNAL_COUNT};

/// Errors during verification
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Verification failed: {0}")]
    Verification(String),
    #[error("Invalid public inputs: expected {expected} signals, got {found}")]
    InvalidInputs { expected: usize, found: usize },
}

/// Verify a spend proof against its ordered public signals.
///
/// `Ok(false)` means the proof is well formed but does not verify.
pub fn verify_spend(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_signals: &[Fr],
) -> Result<bool, VerifyError> {
    if public_signals.len() != PUBLIC_SIGNAL_COUNT {
        return Err(VerifyError::InvalidInputs {
            expected: PUBLIC_SIGNAL_COUNT,
            found: public_signals.len(),
        });
    }

    Groth16::<Bn254>::verify(vk, public_signals, proof)
        .map_err(|e| VerifyError::Verification(e.to_string()))
}

/// Verify a spend proof against typed public inputs.
pub fn verify_spend_inputs(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public: &SpendPublicInputs,
) -> Result<bool, VerifyError> {
    verify_spend(vk, proof, &public.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Groth16Backend, ProvingBackend};
    use crate::inputs::{SpendInputs, SpendParams};
    use crate::setup::setup_spend_circuit;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use swap_circuits::{DepositNote, PoseidonHasher, SparseMerkleTree};

    const DEPTH: usize = 4;

    fn prove_fixture() -> (VerifyingKey<Bn254>, Proof<Bn254>, Vec<Fr>) {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new().unwrap();
        let keys = setup_spend_circuit(&mut rng, &hasher, DEPTH).unwrap();

        let mut tree = SparseMerkleTree::new(hasher.clone(), DEPTH).unwrap();
        let note = DepositNote::create(&hasher, Fr::from(100u64), &mut rng).unwrap();
        let index = tree.insert(note.commitment).unwrap();
        let note = note.with_leaf_index(index);
        let merkle_proof = tree.proof(index).unwrap();

        let params = SpendParams {
            recipient: Fr::from(1u64),
            relayer: Fr::from(2u64),
            relayer_fee: 10,
            amount_in: Fr::from(100u64),
            min_amount_out: Fr::from(99u64),
            pool_key: Fr::from(5u64),
        };
        let inputs = SpendInputs::assemble(&note, &merkle_proof, &params, DEPTH).unwrap();

        let backend = Groth16Backend::new(hasher, keys.proving_key);
        let output = backend.prove(&inputs).unwrap();
        (keys.verifying_key, output.proof, output.public_inputs)
    }

    #[test]
    fn test_verify_spend() {
        let (vk, proof, signals) = prove_fixture();
        assert!(verify_spend(&vk, &proof, &signals).unwrap());

        let typed = SpendPublicInputs::from_slice(&signals).unwrap();
        assert!(verify_spend_inputs(&vk, &proof, &typed).unwrap());
    }

    #[test]
    fn test_verify_altered_signal_fails() {
        let (vk, proof, signals) = prove_fixture();

        for i in 0..signals.len() {
            let mut altered = signals.clone();
            altered[i] += Fr::from(1u64);
            assert!(!verify_spend(&vk, &proof, &altered).unwrap(), "signal {} not bound", i);
        }
    }

    #[test]
    fn test_verify_wrong_signal_count() {
        let (vk, proof, signals) = prove_fixture();

        let result = verify_spend(&vk, &proof, &signals[..7]);
        assert!(matches!(
            result,
            Err(VerifyError::InvalidInputs {
                expected: 8,
                found: 7
            })
        ));
    }
}
