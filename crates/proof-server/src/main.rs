//! HTTP API server for shielded-swap notes, trees and spend proofs.

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use rand::rngs::OsRng;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod handlers;
mod routes;
mod state;

use swap_circuits::PoseidonHasher;
use swap_prover::setup::{load_or_setup, CircuitKeyPair};
use swap_prover::{FileStore, SpendProver};

use crate::config::ServerConfig;
use crate::handlers::SharedState;
use crate::state::AppState;

/// Build the router around shared state.
pub fn app(state: SharedState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!(?config, "starting proof server");

    let hasher = PoseidonHasher::new()?;
    if !CircuitKeyPair::exists_in(&config.keys_dir) {
        info!(depth = config.tree_height, "running trusted setup (this may take a while)");
    }
    let (keys, _) = load_or_setup(&config.keys_dir, &mut OsRng, &hasher, config.tree_height)?;
    let prover = SpendProver::from_keys(hasher.clone(), keys);
    let store = FileStore::open(config.store_dir.clone())?;

    let state = Arc::new(AppState::new(
        hasher,
        prover,
        Arc::new(store),
        config.root_window,
    ));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
