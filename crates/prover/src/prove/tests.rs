//! Orchestrator tests: real Groth16 proving plus scripted backends for the
//! failure paths.

use std::sync::atomic::AtomicUsize;
use std::sync::Mutex;
use std::time::Duration;

use ark_bn254::{G1Projective, G2Projective};
use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use rand::rngs::StdRng;
use rand::SeedableRng;

use swap_circuits::SparseMerkleTree;

use super::*;
use crate::setup::setup_spend_circuit;

const DEPTH: usize = 4;

struct Fixture {
    hasher: PoseidonHasher,
    keys: CircuitKeyPair,
    note: DepositNote,
    merkle_proof: MerkleProof,
    params: SpendParams,
}

fn fixture() -> Fixture {
    let mut rng = StdRng::seed_from_u64(7);
    let hasher = PoseidonHasher::new().unwrap();
    let keys = setup_spend_circuit(&mut rng, &hasher, DEPTH).unwrap();

    let mut tree = SparseMerkleTree::new(hasher.clone(), DEPTH).unwrap();
    tree.insert(Fr::from(123u64)).unwrap();
    let note = DepositNote::create(&hasher, Fr::from(5_000u64), &mut rng).unwrap();
    let index = tree.insert(note.commitment).unwrap();
    let note = note.with_leaf_index(index);
    let merkle_proof = tree.proof(index).unwrap();

    let params = SpendParams {
        recipient: Fr::from(0x1111u64),
        relayer: Fr::from(0x2222u64),
        relayer_fee: 30,
        amount_in: Fr::from(5_000u64),
        min_amount_out: Fr::from(4_900u64),
        pool_key: Fr::from(1u64),
    };

    Fixture {
        hasher,
        keys,
        note,
        merkle_proof,
        params,
    }
}

fn random_proof(seed: u64) -> Proof<Bn254> {
    let mut rng = StdRng::seed_from_u64(seed);
    Proof {
        a: G1Projective::rand(&mut rng).into_affine(),
        b: G2Projective::rand(&mut rng).into_affine(),
        c: G1Projective::rand(&mut rng).into_affine(),
    }
}

/// Backend returning a fixed answer and counting calls.
struct ScriptedBackend {
    calls: AtomicUsize,
    respond: Box<dyn Fn(&SpendInputs) -> Result<ProofWithInputs, ProveError> + Send + Sync>,
}

impl ScriptedBackend {
    fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&SpendInputs) -> Result<ProofWithInputs, ProveError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProvingBackend for ScriptedBackend {
    fn prove(&self, inputs: &SpendInputs) -> Result<ProofWithInputs, ProveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(inputs)
    }
}

fn scripted_prover(f: &Fixture, backend: Arc<ScriptedBackend>) -> SpendProver {
    SpendProver::new(f.hasher.clone(), backend, f.keys.verifying_key.clone(), DEPTH)
}

#[test]
fn test_generate_proof() {
    let f = fixture();
    let prover = SpendProver::from_keys(f.hasher.clone(), f.keys.clone());

    let mut events = Vec::new();
    let generated = prover
        .generate_proof(&f.note, &f.merkle_proof, &f.params, &CancelFlag::new(), |e| {
            events.push(e)
        })
        .unwrap();

    let stages: Vec<ProofStage> = events.iter().map(|e| e.stage).collect();
    assert_eq!(
        stages,
        vec![
            ProofStage::PreparingInputs,
            ProofStage::GeneratingWitness,
            ProofStage::VerifyingProof,
            ProofStage::Done
        ]
    );
    assert_eq!(events.last().unwrap().fraction, 1.0);

    let signals = generated.public_signals();
    assert_eq!(signals[0], f.merkle_proof.root);
    assert_eq!(signals[1], f.note.nullifier_hash);
    assert!(prover.verify_locally(&generated.proof.proof, signals).unwrap());

    // Altering any public signal breaks verification.
    let mut altered = signals.to_vec();
    altered[4] = Fr::from(31u64);
    assert!(!prover.verify_locally(&generated.proof.proof, &altered).unwrap());

    assert_eq!(generated.contract_proof.input.len(), 8);
    assert_eq!(generated.snarkjs().to_proof().unwrap(), generated.proof.proof);
}

#[test]
fn test_proof_bytes_round_trip() {
    let f = fixture();
    let prover = SpendProver::from_keys(f.hasher.clone(), f.keys.clone());
    let generated = prover.prove(&f.note, &f.merkle_proof, &f.params).unwrap();

    let bytes = generated.proof.serialize_proof().unwrap();
    let proof = ProofWithInputs::deserialize_proof(&bytes).unwrap();
    assert_eq!(proof, generated.proof.proof);
    assert_eq!(bytes.len(), 128);
    assert!(ProofWithInputs::deserialize_proof(&bytes[..100]).is_err());
}

#[test]
fn test_unanchored_note_rejected() {
    let f = fixture();
    let backend = ScriptedBackend::new(|_| Err(ProveError::ProofGeneration("unused".into())));
    let prover = scripted_prover(&f, backend.clone());

    let mut note = f.note.clone();
    note.leaf_index = None;

    let result = prover.prove(&note, &f.merkle_proof, &f.params);
    assert!(matches!(result, Err(ProveError::NoteNotAnchored)));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_tampered_note_rejected() {
    let f = fixture();
    let backend = ScriptedBackend::new(|_| Err(ProveError::ProofGeneration("unused".into())));
    let prover = scripted_prover(&f, backend.clone());

    let mut note = f.note.clone();
    note.secret += Fr::from(1u64);

    let result = prover.prove(&note, &f.merkle_proof, &f.params);
    assert!(matches!(result, Err(ProveError::InvalidNote(_))));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_broken_merkle_path_rejected() {
    let f = fixture();
    let backend = ScriptedBackend::new(|_| Err(ProveError::ProofGeneration("unused".into())));
    let prover = scripted_prover(&f, backend.clone());

    let mut merkle_proof = f.merkle_proof.clone();
    merkle_proof.path_elements[2] = Fr::from(99u64);

    let result = prover.prove(&f.note, &merkle_proof, &f.params);
    assert!(matches!(result, Err(ProveError::InvalidInput(_))));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_invalid_proof_is_never_returned() {
    let f = fixture();
    let backend = ScriptedBackend::new(|inputs| {
        Ok(ProofWithInputs {
            proof: random_proof(1),
            public_inputs: inputs.public_signals(),
        })
    });
    let prover = scripted_prover(&f, backend.clone());

    let result = prover.prove(&f.note, &f.merkle_proof, &f.params);
    assert!(matches!(result, Err(ProveError::InvalidProof)));
    assert_eq!(backend.calls(), 1);
}

#[test]
fn test_mismatched_backend_signals_rejected() {
    let f = fixture();
    let backend = ScriptedBackend::new(|inputs| {
        let mut public_inputs = inputs.public_signals();
        public_inputs[2] = Fr::from(0u64);
        Ok(ProofWithInputs {
            proof: random_proof(2),
            public_inputs,
        })
    });
    let prover = scripted_prover(&f, backend);

    let result = prover.prove(&f.note, &f.merkle_proof, &f.params);
    assert!(matches!(result, Err(ProveError::ProofGeneration(_))));
}

#[test]
fn test_backend_error_propagates() {
    let f = fixture();
    let backend = ScriptedBackend::new(|_| Err(ProveError::ProofGeneration("out of memory".into())));
    let prover = scripted_prover(&f, backend);

    match prover.prove(&f.note, &f.merkle_proof, &f.params) {
        Err(ProveError::ProofGeneration(msg)) => assert_eq!(msg, "out of memory"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_cancelled_before_start() {
    let f = fixture();
    let backend = ScriptedBackend::new(|_| Err(ProveError::ProofGeneration("unused".into())));
    let prover = scripted_prover(&f, backend.clone());

    let cancel = CancelFlag::new();
    cancel.cancel();

    let mut events = Vec::new();
    let result = prover.generate_proof(&f.note, &f.merkle_proof, &f.params, &cancel, |e| events.push(e));
    assert!(matches!(result, Err(ProveError::Cancelled)));
    assert!(events.is_empty());
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_stage_labels() {
    assert_eq!(ProofStage::PreparingInputs.to_string(), "Preparing inputs");
    assert_eq!(ProofStage::GeneratingWitness.fraction(), 0.3);
    assert_eq!(ProgressEvent::from(ProofStage::VerifyingProof).fraction, 0.9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawned_task_reports_progress() {
    let f = fixture();
    let prover = SpendProver::from_keys(f.hasher.clone(), f.keys.clone());

    let mut task = prover.spawn(f.note.clone(), f.merkle_proof.clone(), f.params.clone());

    let mut stages = Vec::new();
    while let Some(event) = task.next_progress().await {
        stages.push(event.stage);
    }
    assert_eq!(stages.first(), Some(&ProofStage::PreparingInputs));
    assert_eq!(stages.last(), Some(&ProofStage::Done));

    let generated = task.wait().await.unwrap();
    assert!(prover
        .verify_locally(&generated.proof.proof, generated.public_signals())
        .unwrap());
}

/// Backend that blocks until the returned sender fires, standing in for a
/// long proving run.
fn blocking_backend() -> (Arc<ScriptedBackend>, std::sync::mpsc::Sender<()>) {
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let backend = ScriptedBackend::new(move |inputs| {
        let _ = release_rx
            .lock()
            .map(|rx| rx.recv_timeout(Duration::from_secs(10)));
        Ok(ProofWithInputs {
            proof: random_proof(3),
            public_inputs: inputs.public_signals(),
        })
    });
    (backend, release_tx)
}

async fn wait_for_backend(task: &mut ProofTask) {
    loop {
        match task.next_progress().await {
            Some(event) if event.stage == ProofStage::GeneratingWitness => break,
            Some(_) => continue,
            None => panic!("task stopped before proving"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawned_task_cancellation() {
    let f = fixture();
    let (backend, release_tx) = blocking_backend();
    let prover = scripted_prover(&f, backend);

    let mut task = prover.spawn(f.note.clone(), f.merkle_proof.clone(), f.params.clone());
    wait_for_backend(&mut task).await;

    let flag = task.cancel_flag();
    task.cancel();
    assert!(flag.is_cancelled());

    let result = tokio::time::timeout(Duration::from_secs(5), task.wait())
        .await
        .expect("wait did not return after cancel");
    assert!(matches!(result, Err(ProveError::Cancelled)));

    let _ = release_tx.send(());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_wait_cancels_task() {
    let f = fixture();
    let (backend, release_tx) = blocking_backend();
    let prover = scripted_prover(&f, backend);

    let mut task = prover.spawn(f.note.clone(), f.merkle_proof.clone(), f.params.clone());
    wait_for_backend(&mut task).await;
    let flag = task.cancel_flag();

    // The caller gives up; its wait future is dropped mid-flight.
    let waited = tokio::time::timeout(Duration::from_millis(50), task.wait()).await;
    assert!(waited.is_err());
    assert!(flag.is_cancelled());

    let _ = release_tx.send(());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completed_wait_leaves_flag_clear() {
    let f = fixture();
    let backend = ScriptedBackend::new(|inputs| {
        Ok(ProofWithInputs {
            proof: random_proof(5),
            public_inputs: inputs.public_signals(),
        })
    });
    let prover = scripted_prover(&f, backend);

    let task = prover.spawn(f.note.clone(), f.merkle_proof.clone(), f.params.clone());
    let flag = task.cancel_flag();

    // A random proof fails local verification; the error path still completes the wait.
    assert!(matches!(task.wait().await, Err(ProveError::InvalidProof)));
    assert!(!flag.is_cancelled());
}

#[tokio::test]
async fn test_cancel_flag_wakes_waiters() {
    let flag = CancelFlag::new();
    let waiter = flag.clone();
    let handle = tokio::spawn(async move { waiter.cancelled().await });

    tokio::task::yield_now().await;
    flag.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
