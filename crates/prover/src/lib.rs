//! Spend proof pipeline for the shielded-swap pool.
//!
//! This crate provides utilities for:
//! - Trusted setup (generating proving and verifying keys)
//! - Assembling typed circuit inputs and generating spend proofs
//! - Local proof verification and verifier/relayer encodings
//! - Persisting commitment trees between sessions

pub mod backend;
pub mod format;
pub mod inputs;
pub mod oracle;
pub mod prove;
pub mod setup;
pub mod store;
pub mod verify;

pub use backend::{Groth16Backend, ProvingBackend};
pub use format::{ContractProof, FormatError, RelayRequest, SnarkjsProof, SnarkjsVerifyingKey};
pub use inputs::{SpendInputs, SpendParams, MAX_RELAYER_FEE_BPS};
pub use oracle::{check_root, RootHistory, RootOracle, RootStatus};
pub use prove::{
    CancelFlag, GeneratedProof, ProgressEvent, ProofStage, ProofTask, ProofWithInputs, ProveError,
    SpendProver,
};
pub use setup::{load_or_setup, setup_spend_circuit, CircuitKeyPair, SetupError};
pub use store::{load_tree, FileStore, MemoryStore, StoreError, StoredTree, TreeId, TreeStore};
pub use verify::{verify_spend, VerifyError};

use ark_bn254::Fr;

/// Common field type for all operations
pub type ConstraintF = Fr;
