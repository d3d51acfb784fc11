//! Deposit notes: the private record behind one shielded deposit.
//!
//! A note holds the random `nullifier` and `secret` chosen at deposit time
//! together with the values derived from them:
//!
//! - `commitment = Poseidon(nullifier, secret, amount)`, inserted into the tree
//! - `nullifier_hash = Poseidon(nullifier)`, revealed when the note is spent

use std::fmt;

use ark_bn254::Fr;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::{field_to_hex, random_field, serde_decimal};
use crate::poseidon::PoseidonHasher;

/// Errors from note creation and decoding.
#[derive(Error, Debug)]
pub enum NoteError {
    #[error("Secure random source unavailable: {0}")]
    Entropy(#[from] rand::Error),
    #[error("Malformed note: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Stored commitment does not match Poseidon(nullifier, secret, amount)")]
    CommitmentMismatch,
    #[error("Stored nullifier hash does not match Poseidon(nullifier)")]
    NullifierHashMismatch,
}

/// `Poseidon(nullifier, secret, amount)`.
pub fn compute_commitment(hasher: &PoseidonHasher, nullifier: Fr, secret: Fr, amount: Fr) -> Fr {
    hasher.hash_three(nullifier, secret, amount)
}

/// `Poseidon(nullifier)`.
pub fn compute_nullifier_hash(hasher: &PoseidonHasher, nullifier: Fr) -> Fr {
    hasher.hash_one(nullifier)
}

/// Commitment as a `0x`-prefixed 32-byte word for contract calls.
pub fn format_commitment_for_contract(commitment: &Fr) -> String {
    field_to_hex(commitment)
}

/// One shielded deposit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositNote {
    #[serde(with = "serde_decimal")]
    pub nullifier: Fr,
    #[serde(with = "serde_decimal")]
    pub secret: Fr,
    #[serde(with = "serde_decimal")]
    pub amount: Fr,
    #[serde(with = "serde_decimal")]
    pub commitment: Fr,
    #[serde(with = "serde_decimal")]
    pub nullifier_hash: Fr,
    /// Position of the commitment in the on-chain tree, once confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_tx_hash: Option<String>,
}

impl DepositNote {
    /// Sample a fresh nullifier and secret and derive the public values.
    pub fn create<R: RngCore + CryptoRng>(
        hasher: &PoseidonHasher,
        amount: Fr,
        rng: &mut R,
    ) -> Result<Self, NoteError> {
        let nullifier: Fr = random_field(rng)?;
        let secret: Fr = random_field(rng)?;
        Ok(Self::reconstruct(hasher, nullifier, secret, amount, None, None))
    }

    /// [`DepositNote::create`] with the operating system's random source.
    pub fn random(hasher: &PoseidonHasher, amount: Fr) -> Result<Self, NoteError> {
        Self::create(hasher, amount, &mut OsRng)
    }

    /// Rebuild a note from its private values, re-deriving everything else.
    pub fn reconstruct(
        hasher: &PoseidonHasher,
        nullifier: Fr,
        secret: Fr,
        amount: Fr,
        leaf_index: Option<u64>,
        deposit_tx_hash: Option<String>,
    ) -> Self {
        Self {
            nullifier,
            secret,
            amount,
            commitment: compute_commitment(hasher, nullifier, secret, amount),
            nullifier_hash: compute_nullifier_hash(hasher, nullifier),
            leaf_index,
            deposit_tx_hash,
        }
    }

    /// Attach the confirmed leaf index.
    pub fn with_leaf_index(mut self, leaf_index: u64) -> Self {
        self.leaf_index = Some(leaf_index);
        self
    }

    pub fn is_anchored(&self) -> bool {
        self.leaf_index.is_some()
    }

    /// Encode as JSON with decimal strings for every field element.
    pub fn serialize(&self) -> Result<String, NoteError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a note produced by [`DepositNote::serialize`].
    ///
    /// Rejects values outside the field instead of reducing them. The derived
    /// fields are taken as stored; call [`DepositNote::verify_integrity`] to
    /// check them.
    pub fn deserialize(s: &str) -> Result<Self, NoteError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Check that the stored commitment and nullifier hash match the private values.
    pub fn verify_integrity(&self, hasher: &PoseidonHasher) -> Result<(), NoteError> {
        if compute_commitment(hasher, self.nullifier, self.secret, self.amount) != self.commitment {
            return Err(NoteError::CommitmentMismatch);
        }
        if compute_nullifier_hash(hasher, self.nullifier) != self.nullifier_hash {
            return Err(NoteError::NullifierHashMismatch);
        }
        Ok(())
    }

    pub fn commitment_hex(&self) -> String {
        format_commitment_for_contract(&self.commitment)
    }
}

// Keep the private values out of logs.
impl fmt::Debug for DepositNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepositNote")
            .field("nullifier", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("amount", &self.amount)
            .field("commitment", &self.commitment)
            .field("nullifier_hash", &self.nullifier_hash)
            .field("leaf_index", &self.leaf_index)
            .field("deposit_tx_hash", &self.deposit_tx_hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hasher() -> PoseidonHasher {
        PoseidonHasher::new().unwrap()
    }

    #[test]
    fn test_create_derives_public_values() {
        let h = hasher();
        let mut rng = StdRng::seed_from_u64(42);
        let note = DepositNote::create(&h, Fr::from(1_000u64), &mut rng).unwrap();

        assert_eq!(note.commitment, h.hash_three(note.nullifier, note.secret, note.amount));
        assert_eq!(note.nullifier_hash, h.hash_one(note.nullifier));
        assert!(!note.is_anchored());
        assert!(note.verify_integrity(&h).is_ok());
    }

    #[test]
    fn test_random_notes_differ() {
        let h = hasher();
        let a = DepositNote::random(&h, Fr::from(5u64)).unwrap();
        let b = DepositNote::random(&h, Fr::from(5u64)).unwrap();

        assert_ne!(a.nullifier, b.nullifier);
        assert_ne!(a.commitment, b.commitment);
    }

    #[test]
    fn test_commitment_determinism() {
        let h = hasher();
        let (n, s, a) = (Fr::from(1u64), Fr::from(2u64), Fr::from(3u64));
        let base = compute_commitment(&h, n, s, a);

        assert_eq!(base, compute_commitment(&h, n, s, a));
        assert_ne!(base, compute_commitment(&h, Fr::from(9u64), s, a));
        assert_ne!(base, compute_commitment(&h, n, Fr::from(9u64), a));
        assert_ne!(base, compute_commitment(&h, n, s, Fr::from(9u64)));
    }

    #[test]
    fn test_round_trip() {
        let h = hasher();
        let mut rng = StdRng::seed_from_u64(7);
        let mut note = DepositNote::create(&h, Fr::from(123_456_789u64), &mut rng)
            .unwrap()
            .with_leaf_index(17);
        note.deposit_tx_hash = Some("0xabc".to_string());

        let encoded = note.serialize().unwrap();
        let decoded = DepositNote::deserialize(&encoded).unwrap();

        assert_eq!(decoded, note);
        assert_eq!(decoded.leaf_index, Some(17));
    }

    #[test]
    fn test_json_keys() {
        let h = hasher();
        let note = DepositNote::reconstruct(&h, Fr::from(1u64), Fr::from(2u64), Fr::from(3u64), Some(4), None);
        let json: serde_json::Value = serde_json::from_str(&note.serialize().unwrap()).unwrap();

        assert_eq!(json["nullifier"], "1");
        assert_eq!(json["amount"], "3");
        assert_eq!(json["leafIndex"], 4);
        assert!(json.get("nullifierHash").is_some());
        assert!(json.get("depositTxHash").is_none());
    }

    #[test]
    fn test_deserialize_rejects_out_of_field() {
        let json = r#"{
            "nullifier": "21888242871839275222246405745257275088548364400416034343698204186575808495617",
            "secret": "1", "amount": "1", "commitment": "1", "nullifierHash": "1"
        }"#;
        assert!(matches!(
            DepositNote::deserialize(json),
            Err(NoteError::Malformed(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(DepositNote::deserialize("not json").is_err());
        assert!(DepositNote::deserialize(r#"{"nullifier": 1}"#).is_err());
    }

    #[test]
    fn test_reconstruct_matches_created() {
        let h = hasher();
        let mut rng = StdRng::seed_from_u64(3);
        let note = DepositNote::create(&h, Fr::from(10u64), &mut rng).unwrap();

        let rebuilt = DepositNote::reconstruct(&h, note.nullifier, note.secret, note.amount, None, None);
        assert_eq!(rebuilt, note);
    }

    #[test]
    fn test_tampered_note_detected() {
        let h = hasher();
        let mut note = DepositNote::random(&h, Fr::from(10u64)).unwrap();
        note.amount = Fr::from(11u64);
        assert!(matches!(note.verify_integrity(&h), Err(NoteError::CommitmentMismatch)));

        let mut note = DepositNote::random(&h, Fr::from(10u64)).unwrap();
        note.nullifier_hash = Fr::from(0u64);
        assert!(matches!(note.verify_integrity(&h), Err(NoteError::NullifierHashMismatch)));
    }

    #[test]
    fn test_commitment_hex() {
        let h = hasher();
        let note = DepositNote::random(&h, Fr::from(1u64)).unwrap();
        let hex = note.commitment_hex();

        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let h = hasher();
        let note = DepositNote::reconstruct(&h, Fr::from(777_777u64), Fr::from(888_888u64), Fr::from(1u64), None, None);
        let debug = format!("{:?}", note);

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("777777"));
        assert!(!debug.contains("888888"));
    }
}
