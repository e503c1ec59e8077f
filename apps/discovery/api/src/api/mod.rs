use axum::Router;
use domain_discovery::embedding::OllamaEmbeddingGateway;
use domain_discovery::handlers::{self, DiscoveryState};
use domain_discovery::{ReviewIngestCoordinator, SemanticSearchOrchestrator};
use std::sync::Arc;

use crate::state::AppState;

pub mod health;

/// Domain routes, nested under `/api` by the caller.
pub fn routes(state: &AppState) -> eyre::Result<Router> {
    let embedder = Arc::new(OllamaEmbeddingGateway::new(state.config.ollama.clone())?);

    let ingest = ReviewIngestCoordinator::new(state.geo.clone(), state.directory.clone())
        .with_conflict_retry(state.config.ingest.conflict_retry());
    let search = SemanticSearchOrchestrator::new(
        state.geo.clone(),
        embedder,
        state.index.clone(),
        state.config.search.clone(),
    );

    Ok(handlers::router(DiscoveryState { ingest, search }))
}
