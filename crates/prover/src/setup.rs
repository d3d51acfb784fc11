//! Trusted setup utilities for generating proving and verifying keys.

use std::path::Path;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use swap_circuits::{PoseidonHasher, SpendCircuit, PUBLIC_SIGNAL_COUNT};

const PK_FILE: &str = "spend.pk";
const VK_FILE: &str = "spend.vk";
const META_FILE: &str = "spend.json";

/// Errors that can occur during setup
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Circuit setup failed: {0}")]
    CircuitSetup(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
    #[error("Keys were generated for depth {found}, expected {expected}")]
    DepthMismatch { expected: usize, found: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Description of the circuit a key pair was generated for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    pub circuit: String,
    pub depth: usize,
    pub public_signals: usize,
}

/// Keys for the spend circuit
#[derive(Clone)]
pub struct CircuitKeyPair {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
    pub depth: usize,
}

impl CircuitKeyPair {
    /// Serialize proving key to bytes
    pub fn serialize_pk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize verifying key to bytes
    pub fn serialize_vk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize proving key from bytes
    pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, SetupError> {
        ProvingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }

    /// Deserialize verifying key from bytes
    pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, SetupError> {
        VerifyingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }

    pub fn metadata(&self) -> KeyMetadata {
        KeyMetadata {
            circuit: "spend".to_string(),
            depth: self.depth,
            public_signals: PUBLIC_SIGNAL_COUNT,
        }
    }

    /// Save the keys and their metadata to a directory
    pub fn save_to_directory(&self, dir: &Path) -> Result<(), SetupError> {
        std::fs::create_dir_all(dir)?;

        std::fs::write(dir.join(PK_FILE), self.serialize_pk()?)?;
        std::fs::write(dir.join(VK_FILE), self.serialize_vk()?)?;

        let meta = serde_json::to_vec_pretty(&self.metadata())
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        std::fs::write(dir.join(META_FILE), meta)?;

        info!(dir = %dir.display(), depth = self.depth, "saved spend keys");
        Ok(())
    }

    /// Load keys from a directory
    pub fn load_from_directory(dir: &Path) -> Result<Self, SetupError> {
        let meta: KeyMetadata = serde_json::from_slice(&std::fs::read(dir.join(META_FILE))?)
            .map_err(|e| SetupError::Deserialization(e.to_string()))?;

        let keys = Self {
            proving_key: Self::deserialize_pk(&std::fs::read(dir.join(PK_FILE))?)?,
            verifying_key: Self::deserialize_vk(&std::fs::read(dir.join(VK_FILE))?)?,
            depth: meta.depth,
        };

        // One extra input for the constant term.
        let expected_inputs = PUBLIC_SIGNAL_COUNT + 1;
        if keys.verifying_key.gamma_abc_g1.len() != expected_inputs {
            return Err(SetupError::Deserialization(format!(
                "verifying key has {} inputs, expected {}",
                keys.verifying_key.gamma_abc_g1.len(),
                expected_inputs
            )));
        }

        Ok(keys)
    }

    /// Whether `dir` holds any part of a saved key pair.
    pub fn exists_in(dir: &Path) -> bool {
        [PK_FILE, VK_FILE, META_FILE]
            .iter()
            .any(|file| dir.join(file).exists())
    }

    /// Load keys and check they were generated for `depth`.
    pub fn load_for_depth(dir: &Path, depth: usize) -> Result<Self, SetupError> {
        let keys = Self::load_from_directory(dir)?;
        if keys.depth != depth {
            return Err(SetupError::DepthMismatch {
                expected: depth,
                found: keys.depth,
            });
        }
        Ok(keys)
    }
}

/// Run circuit-specific setup for the spend circuit over a tree of `depth` levels.
pub fn setup_spend_circuit<R: RngCore + CryptoRng>(
    rng: &mut R,
    hasher: &PoseidonHasher,
    depth: usize,
) -> Result<CircuitKeyPair, SetupError> {
    info!(depth, "running spend circuit setup");

    let circuit = SpendCircuit::empty(hasher.clone(), depth);
    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit, rng)
        .map_err(|e| SetupError::CircuitSetup(e.to_string()))?;

    Ok(CircuitKeyPair {
        proving_key: pk,
        verifying_key: vk,
        depth,
    })
}

/// Load the keys in `dir`, or run setup and save them if `dir` holds none.
///
/// Returns the keys and whether they were generated. Existing keys are never
/// overwritten: a depth mismatch or an unreadable file is an error.
pub fn load_or_setup<R: RngCore + CryptoRng>(
    dir: &Path,
    rng: &mut R,
    hasher: &PoseidonHasher,
    depth: usize,
) -> Result<(CircuitKeyPair, bool), SetupError> {
    if CircuitKeyPair::exists_in(dir) {
        info!(dir = %dir.display(), "loading spend keys");
        return Ok((CircuitKeyPair::load_for_depth(dir, depth)?, false));
    }
    let keys = setup_spend_circuit(rng, hasher, depth)?;
    keys.save_to_directory(dir)?;
    Ok((keys, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TEST_DEPTH: usize = 4;

    fn keys() -> CircuitKeyPair {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new().unwrap();
        setup_spend_circuit(&mut rng, &hasher, TEST_DEPTH).unwrap()
    }

    #[test]
    fn test_setup_spend() {
        let keys = keys();

        // Verify keys can be serialized and deserialized
        let pk_bytes = keys.serialize_pk().unwrap();
        let vk_bytes = keys.serialize_vk().unwrap();

        let _pk = CircuitKeyPair::deserialize_pk(&pk_bytes).unwrap();
        let vk = CircuitKeyPair::deserialize_vk(&vk_bytes).unwrap();

        assert_eq!(vk, keys.verifying_key);
        assert_eq!(vk.gamma_abc_g1.len(), PUBLIC_SIGNAL_COUNT + 1);
    }

    #[test]
    fn test_save_and_load() {
        let keys = keys();
        let dir = tempfile::tempdir().unwrap();

        keys.save_to_directory(dir.path()).unwrap();
        assert!(dir.path().join("spend.pk").exists());
        assert!(dir.path().join("spend.vk").exists());
        assert!(dir.path().join("spend.json").exists());

        let loaded = CircuitKeyPair::load_for_depth(dir.path(), TEST_DEPTH).unwrap();
        assert_eq!(loaded.depth, TEST_DEPTH);
        assert_eq!(loaded.verifying_key, keys.verifying_key);
        assert_eq!(loaded.metadata(), keys.metadata());
    }

    #[test]
    fn test_load_wrong_depth() {
        let keys = keys();
        let dir = tempfile::tempdir().unwrap();
        keys.save_to_directory(dir.path()).unwrap();

        let err = CircuitKeyPair::load_for_depth(dir.path(), 20).err().unwrap();
        assert!(matches!(
            err,
            SetupError::DepthMismatch {
                expected: 20,
                found: TEST_DEPTH
            }
        ));
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = CircuitKeyPair::load_from_directory(&dir.path().join("missing"));
        assert!(matches!(result, Err(SetupError::Io(_))));
    }

    #[test]
    fn test_load_or_setup_creates_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = PoseidonHasher::new().unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        assert!(!CircuitKeyPair::exists_in(dir.path()));
        let (created, generated) = load_or_setup(dir.path(), &mut rng, &hasher, TEST_DEPTH).unwrap();
        assert!(generated);
        assert!(CircuitKeyPair::exists_in(dir.path()));

        let (loaded, generated) = load_or_setup(dir.path(), &mut rng, &hasher, TEST_DEPTH).unwrap();
        assert!(!generated);
        assert_eq!(loaded.verifying_key, created.verifying_key);
    }

    #[test]
    fn test_load_or_setup_never_overwrites_keys() {
        let keys = keys();
        let dir = tempfile::tempdir().unwrap();
        keys.save_to_directory(dir.path()).unwrap();
        let pk_before = std::fs::read(dir.path().join("spend.pk")).unwrap();

        let hasher = PoseidonHasher::new().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let err = load_or_setup(dir.path(), &mut rng, &hasher, TEST_DEPTH + 1)
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::DepthMismatch { .. }));
        assert_eq!(std::fs::read(dir.path().join("spend.pk")).unwrap(), pk_before);
    }

    #[test]
    fn test_load_or_setup_rejects_partial_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("spend.json"), b"not json").unwrap();

        let hasher = PoseidonHasher::new().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let err = load_or_setup(dir.path(), &mut rng, &hasher, TEST_DEPTH)
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::Deserialization(_)));
        assert!(!dir.path().join("spend.pk").exists());
    }
}
