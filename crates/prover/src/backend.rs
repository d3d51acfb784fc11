//! Proving backends.
//!
//! The orchestrator only sees [`ProvingBackend`]: typed inputs in, a proof
//! and its ordered public signals out. [`Groth16Backend`] proves the spend
//! circuit in-process with arkworks.

use std::sync::Arc;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey};
use ark_snark::SNARK;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use swap_circuits::{PoseidonHasher, SpendCircuit};

use crate::inputs::SpendInputs;
use crate::prove::{ProofWithInputs, ProveError};

/// Anything that can turn spend inputs into a Groth16 proof.
pub trait ProvingBackend: Send + Sync {
    /// Produce a proof and the public signals it was generated for.
    fn prove(&self, inputs: &SpendInputs) -> Result<ProofWithInputs, ProveError>;
}

/// In-process Groth16 prover for the spend circuit.
#[derive(Clone)]
pub struct Groth16Backend {
    hasher: PoseidonHasher,
    proving_key: Arc<ProvingKey<Bn254>>,
}

impl Groth16Backend {
    pub fn new(hasher: PoseidonHasher, proving_key: ProvingKey<Bn254>) -> Self {
        Self {
            hasher,
            proving_key: Arc::new(proving_key),
        }
    }
}

impl ProvingBackend for Groth16Backend {
    fn prove(&self, inputs: &SpendInputs) -> Result<ProofWithInputs, ProveError> {
        let circuit = SpendCircuit::new(self.hasher.clone(), inputs.public, inputs.witness.clone());
        debug!(depth = circuit.depth(), "proving spend circuit");

        let mut rng = StdRng::from_entropy();
        let proof = Groth16::<Bn254>::prove(&self.proving_key, circuit, &mut rng)
            .map_err(|e| ProveError::ProofGeneration(e.to_string()))?;

        Ok(ProofWithInputs {
            proof,
            public_inputs: inputs.public_signals(),
        })
    }
}
