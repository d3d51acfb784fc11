//! API route definitions.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, SharedState};

/// Create API routes
pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Deposit notes
        .route("/api/note/create", post(handlers::create_note))
        // Commitment trees
        .route("/api/tree/:id/insert", post(handlers::insert_leaves))
        .route("/api/tree/:id/root", get(handlers::tree_root))
        .route("/api/tree/:id/proof/:index", get(handlers::merkle_proof))
        // Spend proofs
        .route("/api/prove/spend", post(handlers::prove_spend))
}
