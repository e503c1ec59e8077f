//! Readiness endpoint

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use axum_helpers::{HealthCheckFuture, run_health_checks};
use database::mongodb::check_health_detailed;
use mongodb::Client;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(readiness_check))
        .with_state(state)
}

fn ping(client: &Client) -> HealthCheckFuture<'_> {
    Box::pin(async move {
        let status = check_health_detailed(client).await;
        if status.healthy {
            Ok(())
        } else {
            Err(status.message.unwrap_or_else(|| "ping failed".to_string()))
        }
    })
}

/// 200 when the geo store, the user directory and the vector index all answer.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let index: HealthCheckFuture<'_> =
        Box::pin(async { state.index.health_check().await.map_err(|e| e.to_string()) });

    run_health_checks(vec![
        ("geo_store", ping(&state.geo_client)),
        ("directory", ping(&state.directory_client)),
        ("vector_index", index),
    ])
    .await
}
