//! API error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use swap_circuits::{NoteError, TreeError};
use swap_prover::{FormatError, ProveError, StoreError};

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error(transparent)]
    Prove(#[from] ProveError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Tree(TreeError::IndexOutOfBounds { .. }) => StatusCode::NOT_FOUND,
            ApiError::Tree(TreeError::CapacityExceeded { .. }) => StatusCode::CONFLICT,
            ApiError::Tree(TreeError::InvalidHeight(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Note(NoteError::Entropy(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Note(_) => StatusCode::BAD_REQUEST,
            ApiError::Prove(e) => match e {
                ProveError::NoteNotAnchored
                | ProveError::LeafMismatch
                | ProveError::IndexMismatch { .. }
                | ProveError::InvalidNote(_)
                | ProveError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                ProveError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Format(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
