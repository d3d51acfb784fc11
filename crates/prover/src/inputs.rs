//! Typed circuit inputs for a spend proof.
//!
//! Everything handed to a proving backend goes through [`SpendInputs::assemble`],
//! which rejects inconsistent or out-of-range values before any proving work
//! starts.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use swap_circuits::encoding::{field_to_decimal, fits_in_bits, serde_address, serde_decimal, ADDRESS_BITS};
use swap_circuits::{DepositNote, MerkleProof, SpendPublicInputs, SpendWitness};

use crate::prove::ProveError;

/// Largest relayer fee, in basis points (100%).
pub const MAX_RELAYER_FEE_BPS: u32 = 10_000;

/// Public parameters of a swap spend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendParams {
    /// Stealth address receiving the swap output
    #[serde(with = "serde_address")]
    pub recipient: Fr,
    #[serde(with = "serde_address")]
    pub relayer: Fr,
    /// Basis points (100 = 1%)
    pub relayer_fee: u32,
    #[serde(with = "serde_decimal")]
    pub amount_in: Fr,
    #[serde(with = "serde_decimal")]
    pub min_amount_out: Fr,
    /// Encoded pool identifier
    #[serde(with = "serde_decimal")]
    pub pool_key: Fr,
}

/// Validated inputs for one spend proof.
#[derive(Clone, PartialEq, Eq)]
pub struct SpendInputs {
    pub public: SpendPublicInputs,
    pub witness: SpendWitness,
    pub leaf_index: u64,
}

impl SpendInputs {
    /// Combine a note, its Merkle proof and the spend parameters.
    ///
    /// Fails if the note has no leaf index, the proof is for another leaf or
    /// another depth, or a parameter is out of range.
    pub fn assemble(
        note: &DepositNote,
        proof: &MerkleProof,
        params: &SpendParams,
        depth: usize,
    ) -> Result<Self, ProveError> {
        let leaf_index = note.leaf_index.ok_or(ProveError::NoteNotAnchored)?;

        if proof.leaf != note.commitment {
            return Err(ProveError::LeafMismatch);
        }
        if proof.leaf_index != leaf_index {
            return Err(ProveError::IndexMismatch {
                note: leaf_index,
                proof: proof.leaf_index,
            });
        }
        if proof.path_elements.len() != depth || proof.path_indices.len() != depth {
            return Err(ProveError::InvalidInput(format!(
                "Merkle path has {} levels, circuit expects {}",
                proof.path_elements.len(),
                depth
            )));
        }
        if proof.path_indices != proof.path_index_bits() {
            return Err(ProveError::InvalidInput(
                "path indices do not match the leaf index".to_string(),
            ));
        }

        params.validate()?;

        Ok(Self {
            public: SpendPublicInputs {
                merkle_root: proof.root,
                nullifier_hash: note.nullifier_hash,
                recipient: params.recipient,
                relayer: params.relayer,
                relayer_fee: Fr::from(params.relayer_fee),
                amount_in: params.amount_in,
                min_amount_out: params.min_amount_out,
                pool_key: params.pool_key,
            },
            witness: SpendWitness {
                nullifier: note.nullifier,
                secret: note.secret,
                amount: note.amount,
                path_elements: proof.path_elements.clone(),
                path_indices: proof.path_indices.clone(),
            },
            leaf_index,
        })
    }

    pub fn depth(&self) -> usize {
        self.witness.depth()
    }

    /// Public signals in circuit order.
    pub fn public_signals(&self) -> Vec<Fr> {
        self.public.to_vec()
    }

    /// Flat named-input map in the format circom/snarkjs witness generators read.
    pub fn to_circuit_json(&self) -> Value {
        let decimal = |values: &[Fr]| values.iter().map(field_to_decimal).collect::<Vec<_>>();
        let indices: Vec<u8> = self.witness.path_indices.iter().map(|&b| u8::from(b)).collect();

        json!({
            // Private inputs
            "secret": field_to_decimal(&self.witness.secret),
            "nullifier": field_to_decimal(&self.witness.nullifier),
            "amount": field_to_decimal(&self.witness.amount),
            "pathElements": decimal(&self.witness.path_elements),
            "pathIndices": indices,

            // Public inputs
            "merkleRoot": field_to_decimal(&self.public.merkle_root),
            "nullifierHash": field_to_decimal(&self.public.nullifier_hash),
            "recipient": field_to_decimal(&self.public.recipient),
            "relayer": field_to_decimal(&self.public.relayer),
            "relayerFee": field_to_decimal(&self.public.relayer_fee),
            "amountIn": field_to_decimal(&self.public.amount_in),
            "minAmountOut": field_to_decimal(&self.public.min_amount_out),
            "poolKey": field_to_decimal(&self.public.pool_key),
        })
    }
}

impl SpendParams {
    /// Check every parameter is within the range the verifier accepts.
    pub fn validate(&self) -> Result<(), ProveError> {
        if self.relayer_fee > MAX_RELAYER_FEE_BPS {
            return Err(ProveError::InvalidInput(format!(
                "relayer fee {} bps exceeds {}",
                self.relayer_fee, MAX_RELAYER_FEE_BPS
            )));
        }
        if !fits_in_bits(&self.recipient, ADDRESS_BITS) {
            return Err(ProveError::InvalidInput("recipient is not a 20-byte address".to_string()));
        }
        if !fits_in_bits(&self.relayer, ADDRESS_BITS) {
            return Err(ProveError::InvalidInput("relayer is not a 20-byte address".to_string()));
        }
        Ok(())
    }
}
