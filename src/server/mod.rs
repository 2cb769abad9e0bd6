//! Reassembly endpoint: receives chunks, accumulates them in a temporary
//! file, and renames the file into place on the final send

mod error;
mod handlers;
mod store;

pub use error::{ChunkRejection, escape_html};
pub use store::TempNameStore;

use crate::config::ServerConfig;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared server state
pub struct ServerState {
    pub config: ServerConfig,
    pub store: TempNameStore,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            store: TempNameStore::default(),
        }
    }
}

/// Create the upload router. The body limit sits above the configured
/// chunk size so an oversize chunk is read in full and rejected with the
/// protocol's 403 instead of failing in the extractor.
pub fn create_router(state: Arc<ServerState>) -> Router {
    tracing::debug!(target: "server", "Creating upload router");

    let body_limit = (state.config.chunk_size as usize).saturating_mul(2).max(4096);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/upload", post(handlers::receive_chunk))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        // the endpoint is browser-facing; chunk requests may be cross-origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
