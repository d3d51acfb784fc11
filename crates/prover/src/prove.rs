//! Spend proof orchestration.
//!
//! [`SpendProver::generate_proof`] runs the whole pipeline for one spend:
//!
//! 1. check the note and Merkle proof and assemble typed circuit inputs
//! 2. call the proving backend
//! 3. re-verify the proof locally against the verifying key
//! 4. format the proof for the on-chain verifier
//!
//! A proof is only returned once step 3 has passed. [`SpendProver::spawn`]
//! runs the same pipeline on a blocking thread and reports progress over a
//! channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Proof, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use swap_circuits::{DepositNote, MerkleProof, NoteError, PoseidonHasher};

use crate::backend::{Groth16Backend, ProvingBackend};
use crate::format::{ContractProof, SnarkjsProof};
use crate::inputs::{SpendInputs, SpendParams};
use crate::setup::CircuitKeyPair;
use crate::verify::{verify_spend, VerifyError};

/// Errors during proof generation
#[derive(Error, Debug)]
pub enum ProveError {
    #[error("Deposit note has no leaf index; wait for the deposit to be confirmed")]
    NoteNotAnchored,
    #[error("Merkle proof leaf does not match the note commitment")]
    LeafMismatch,
    #[error("Merkle proof is for leaf {proof}, note is at leaf {note}")]
    IndexMismatch { note: u64, proof: u64 },
    #[error("Invalid deposit note: {0}")]
    InvalidNote(#[from] NoteError),
    #[error("Invalid circuit input: {0}")]
    InvalidInput(String),
    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),
    #[error("Generated proof is invalid")]
    InvalidProof,
    #[error(transparent)]
    Verification(#[from] VerifyError),
    #[error("Proof generation was cancelled")]
    Cancelled,
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// A proof with its public inputs
#[derive(Clone, Debug, PartialEq)]
pub struct ProofWithInputs {
    pub proof: Proof<Bn254>,
    pub public_inputs: Vec<Fr>,
}

impl ProofWithInputs {
    /// Compressed arkworks encoding of the proof (128 bytes on BN254).
    pub fn serialize_proof(&self) -> Result<Vec<u8>, ProveError> {
        let mut bytes = Vec::new();
        self.proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProveError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Inverse of [`ProofWithInputs::serialize_proof`]; points are checked.
    pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>, ProveError> {
        Proof::deserialize_compressed(bytes).map_err(|e| ProveError::Serialization(e.to_string()))
    }
}

/// A locally verified spend proof, ready to submit.
#[derive(Clone, Debug)]
pub struct GeneratedProof {
    pub proof: ProofWithInputs,
    pub contract_proof: ContractProof,
}

impl GeneratedProof {
    pub fn public_signals(&self) -> &[Fr] {
        &self.proof.public_inputs
    }

    pub fn snarkjs(&self) -> SnarkjsProof {
        SnarkjsProof::from_proof(&self.proof.proof)
    }
}

/// Pipeline stages reported while a proof is generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofStage {
    PreparingInputs,
    GeneratingWitness,
    VerifyingProof,
    Done,
}

impl ProofStage {
    pub fn label(self) -> &'static str {
        match self {
            ProofStage::PreparingInputs => "Preparing inputs",
            ProofStage::GeneratingWitness => "Generating witness",
            ProofStage::VerifyingProof => "Verifying proof",
            ProofStage::Done => "Proof generated",
        }
    }

    /// Fraction of the work done when the stage starts.
    pub fn fraction(self) -> f32 {
        match self {
            ProofStage::PreparingInputs => 0.1,
            ProofStage::GeneratingWitness => 0.3,
            ProofStage::VerifyingProof => 0.9,
            ProofStage::Done => 1.0,
        }
    }
}

impl fmt::Display for ProofStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One progress update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressEvent {
    pub stage: ProofStage,
    pub fraction: f32,
}

impl From<ProofStage> for ProgressEvent {
    fn from(stage: ProofStage) -> Self {
        Self {
            stage,
            fraction: stage.fraction(),
        }
    }
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation signal for one proof generation.
#[derive(Clone, Default)]
pub struct CancelFlag {
    state: Arc<CancelState>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancelFlag::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    fn check(&self) -> Result<(), ProveError> {
        if self.is_cancelled() {
            return Err(ProveError::Cancelled);
        }
        Ok(())
    }
}

/// Spend proof orchestrator.
///
/// Cheap to clone: the backend and verifying key are shared.
#[derive(Clone)]
pub struct SpendProver {
    hasher: PoseidonHasher,
    backend: Arc<dyn ProvingBackend>,
    verifying_key: Arc<VerifyingKey<Bn254>>,
    depth: usize,
}

impl SpendProver {
    pub fn new(
        hasher: PoseidonHasher,
        backend: Arc<dyn ProvingBackend>,
        verifying_key: VerifyingKey<Bn254>,
        depth: usize,
    ) -> Self {
        Self {
            hasher,
            backend,
            verifying_key: Arc::new(verifying_key),
            depth,
        }
    }

    /// Prover backed by the in-process Groth16 backend.
    pub fn from_keys(hasher: PoseidonHasher, keys: CircuitKeyPair) -> Self {
        let backend = Groth16Backend::new(hasher.clone(), keys.proving_key);
        Self::new(hasher, Arc::new(backend), keys.verifying_key, keys.depth)
    }

    /// Tree depth the circuit was set up for.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.verifying_key
    }

    /// Check the note and Merkle proof and build the circuit inputs.
    pub fn prepare_inputs(
        &self,
        note: &DepositNote,
        merkle_proof: &MerkleProof,
        params: &SpendParams,
    ) -> Result<SpendInputs, ProveError> {
        if !note.is_anchored() {
            return Err(ProveError::NoteNotAnchored);
        }
        note.verify_integrity(&self.hasher)?;

        let inputs = SpendInputs::assemble(note, merkle_proof, params, self.depth)?;

        // An unsatisfiable witness would only fail inside the backend.
        if !merkle_proof.verify(&self.hasher) {
            return Err(ProveError::InvalidInput(
                "Merkle path does not reproduce its root".to_string(),
            ));
        }
        Ok(inputs)
    }

    /// Re-verify a proof against the verifying key.
    pub fn verify_locally(&self, proof: &Proof<Bn254>, public_signals: &[Fr]) -> Result<bool, ProveError> {
        Ok(verify_spend(&self.verifying_key, proof, public_signals)?)
    }

    /// Generate, verify and format a spend proof.
    ///
    /// `progress` is called at every stage. If `cancel` fires the call returns
    /// [`ProveError::Cancelled`] at the next stage boundary and any proof
    /// already produced is dropped.
    pub fn generate_proof<P>(
        &self,
        note: &DepositNote,
        merkle_proof: &MerkleProof,
        params: &SpendParams,
        cancel: &CancelFlag,
        mut progress: P,
    ) -> Result<GeneratedProof, ProveError>
    where
        P: FnMut(ProgressEvent),
    {
        cancel.check()?;
        progress(ProofStage::PreparingInputs.into());
        let inputs = self.prepare_inputs(note, merkle_proof, params)?;

        cancel.check()?;
        progress(ProofStage::GeneratingWitness.into());
        debug!(leaf_index = inputs.leaf_index, depth = self.depth, "generating spend proof");
        let output = self.backend.prove(&inputs)?;
        cancel.check()?;

        let expected = inputs.public_signals();
        if output.public_inputs != expected {
            warn!("proving backend returned unexpected public signals");
            return Err(ProveError::ProofGeneration(
                "backend public signals do not match the requested inputs".to_string(),
            ));
        }

        progress(ProofStage::VerifyingProof.into());
        if !self.verify_locally(&output.proof, &output.public_inputs)? {
            warn!(leaf_index = inputs.leaf_index, "generated proof failed local verification");
            return Err(ProveError::InvalidProof);
        }
        cancel.check()?;

        let contract_proof = ContractProof::from_proof(&output.proof, &output.public_inputs);
        progress(ProofStage::Done.into());
        info!(leaf_index = inputs.leaf_index, "spend proof generated and verified");

        Ok(GeneratedProof {
            proof: output,
            contract_proof,
        })
    }

    /// [`SpendProver::generate_proof`] without progress reporting or cancellation.
    pub fn prove(
        &self,
        note: &DepositNote,
        merkle_proof: &MerkleProof,
        params: &SpendParams,
    ) -> Result<GeneratedProof, ProveError> {
        self.generate_proof(note, merkle_proof, params, &CancelFlag::new(), |_| {})
    }

    /// Run proof generation on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, note: DepositNote, merkle_proof: MerkleProof, params: SpendParams) -> ProofTask {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();

        let prover = self.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            prover.generate_proof(&note, &merkle_proof, &params, &task_cancel, |event| {
                // The receiver may already be gone; progress is best effort.
                let _ = tx.send(event);
            })
        });

        ProofTask {
            progress: rx,
            cancel,
            handle,
        }
    }
}

/// Handle to a proof generation running in the background.
pub struct ProofTask {
    progress: mpsc::UnboundedReceiver<ProgressEvent>,
    cancel: CancelFlag,
    handle: JoinHandle<Result<GeneratedProof, ProveError>>,
}

impl ProofTask {
    /// Next progress event; `None` once the task has stopped reporting.
    pub async fn next_progress(&mut self) -> Option<ProgressEvent> {
        self.progress.recv().await
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Wait for the result.
    ///
    /// Returns [`ProveError::Cancelled`] as soon as the task is cancelled,
    /// without waiting for the backend call to finish. Dropping the returned
    /// future before it resolves cancels the task.
    pub async fn wait(self) -> Result<GeneratedProof, ProveError> {
        let ProofTask {
            cancel, mut handle, ..
        } = self;
        let guard = CancelOnDrop(Some(cancel.clone()));

        let result = tokio::select! {
            joined = &mut handle => match joined {
                Err(e) => Err(ProveError::ProofGeneration(format!("proving task failed: {}", e))),
                Ok(_) if cancel.is_cancelled() => Err(ProveError::Cancelled),
                Ok(result) => result,
            },
            _ = cancel.cancelled() => Err(ProveError::Cancelled),
        };

        guard.disarm();
        result
    }
}

/// Cancels a proof run when dropped, unless disarmed first.
struct CancelOnDrop(Option<CancelFlag>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(flag) = self.0.take() {
            debug!("proof task abandoned; cancelling");
            flag.cancel();
        }
    }
}

#[cfg(test)]
mod tests;
