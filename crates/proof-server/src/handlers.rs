//! HTTP request handlers for notes, trees and spend proofs.

use std::sync::Arc;

use ark_bn254::Fr;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use swap_circuits::encoding::{field_to_decimal, serde_decimal, serde_decimal_vec};
use swap_circuits::{format_commitment_for_contract, DepositNote, MerkleProof};
use swap_prover::format::RelaySwapParams;
use swap_prover::{
    ContractProof, RelayRequest, RootStatus, SnarkjsProof, SpendParams, TreeId,
};

use crate::error::ApiError;
use crate::state::AppState;

pub type SharedState = Arc<AppState>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tree_height: usize,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tree_height: state.tree_height(),
    })
}

fn parse_tree_id(raw: &str) -> Result<TreeId, ApiError> {
    Ok(raw.parse::<TreeId>()?)
}

// ============ Notes ============

#[derive(Deserialize)]
pub struct CreateNoteRequest {
    #[serde(with = "serde_decimal")]
    pub amount: Fr,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteResponse {
    pub note: DepositNote,
    /// Commitment as a 0x-prefixed 32-byte word for the deposit call
    pub commitment_hex: String,
}

pub async fn create_note(
    State(state): State<SharedState>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<Json<CreateNoteResponse>, ApiError> {
    let note = DepositNote::random(&state.hasher, req.amount)?;
    let commitment_hex = format_commitment_for_contract(&note.commitment);
    Ok(Json(CreateNoteResponse {
        note,
        commitment_hex,
    }))
}

// ============ Trees ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRequest {
    #[serde(with = "serde_decimal_vec")]
    pub commitments: Vec<Fr>,
    /// Block up to which the caller has synced deposit events
    #[serde(default)]
    pub last_synced_block: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    pub first_index: u64,
    pub leaf_count: u64,
    #[serde(with = "serde_decimal")]
    pub root: Fr,
}

pub async fn insert_leaves(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<InsertRequest>,
) -> Result<Json<InsertResponse>, ApiError> {
    let id = parse_tree_id(&id)?;
    if req.commitments.is_empty() {
        return Err(ApiError::BadRequest("no commitments given".to_string()));
    }
    let (range, root) = state
        .insert(&id, req.commitments, req.last_synced_block)
        .await?;
    Ok(Json(InsertResponse {
        first_index: range.start,
        leaf_count: range.end,
        root,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootResponse {
    pub id: String,
    #[serde(with = "serde_decimal")]
    pub root: Fr,
    pub height: usize,
    pub leaf_count: u64,
    pub last_synced_block: u64,
}

pub async fn tree_root(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RootResponse>, ApiError> {
    let id = parse_tree_id(&id)?;
    let summary = state.summary(&id).await?;
    Ok(Json(RootResponse {
        id: id.to_string(),
        root: summary.root,
        height: summary.height,
        leaf_count: summary.leaf_count,
        last_synced_block: summary.last_synced_block,
    }))
}

pub async fn merkle_proof(
    State(state): State<SharedState>,
    Path((id, index)): Path<(String, u64)>,
) -> Result<Json<MerkleProof>, ApiError> {
    let id = parse_tree_id(&id)?;
    Ok(Json(state.proof(&id, index).await?))
}

// ============ Spend proof ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRequest {
    pub note: DepositNote,
    pub merkle_proof: MerkleProof,
    pub params: SpendParams,
    /// When present, a ready-to-submit relayer payload is returned as well
    #[serde(default)]
    pub swap_params: Option<RelaySwapParams>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendResponse {
    pub proof: SnarkjsProof,
    /// Compressed arkworks encoding of the proof, 0x-prefixed
    pub proof_bytes: String,
    pub public_signals: Vec<String>,
    pub contract_proof: ContractProof,
    /// ABI-encoded proof for the swap hook
    pub hook_data: String,
    /// `known`, `unknown` or `unavailable`
    pub root_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_request: Option<RelayRequest>,
}

fn root_status_label(status: RootStatus) -> &'static str {
    match status {
        RootStatus::Known => "known",
        RootStatus::Unknown => "unknown",
        RootStatus::Unavailable => "unavailable",
    }
}

pub async fn prove_spend(
    State(state): State<SharedState>,
    Json(req): Json<SpendRequest>,
) -> Result<Json<SpendResponse>, ApiError> {
    let root_status = state.root_status(&req.merkle_proof.root);

    // If the client goes away, dropping this future cancels the proof run.
    let generated = state
        .prover
        .spawn(req.note, req.merkle_proof, req.params)
        .wait()
        .await?;
    let proof_bytes = generated.proof.serialize_proof()?;

    let signals = generated.public_signals();
    let relay_request = req
        .swap_params
        .map(|swap| RelayRequest::new(&generated.proof.proof, signals, swap));

    Ok(Json(SpendResponse {
        proof: generated.snarkjs(),
        proof_bytes: format!("0x{}", hex::encode(&proof_bytes)),
        public_signals: signals.iter().map(field_to_decimal).collect(),
        hook_data: generated.contract_proof.hook_data_hex()?,
        contract_proof: generated.contract_proof.clone(),
        root_status: root_status_label(root_status),
        relay_request,
    }))
}
