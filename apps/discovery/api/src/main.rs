use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::mongodb::connect_from_config_with_retry;
use domain_discovery::mongodb::{MongoDirectoryStore, MongoGeoStore};
use domain_discovery::qdrant::QdrantVectorIndex;
use domain_discovery::VectorIndex;
use eyre::WrapErr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!(database = %config.geo.database(), "connecting to geo store");
    let geo_client = connect_from_config_with_retry(&config.geo, None)
        .await
        .wrap_err("geo store unreachable")?;
    let geo = MongoGeoStore::new(geo_client.clone(), config.geo.database());
    geo.init_indexes().await?;

    info!(database = %config.directory.database(), "connecting to user directory");
    let directory_client = connect_from_config_with_retry(&config.directory, None)
        .await
        .wrap_err("user directory unreachable")?;
    let directory = MongoDirectoryStore::new(&directory_client.database(config.directory.database()));
    directory.init_indexes().await?;

    let index = QdrantVectorIndex::new(&config.qdrant)?;
    index
        .ensure_collection()
        .await
        .wrap_err("failed to prepare vector collection")?;
    info!(collection = %config.qdrant.collection, "vector index ready");

    let state = AppState {
        config,
        geo_client,
        directory_client,
        geo: Arc::new(geo),
        directory: Arc::new(directory),
        index: Arc::new(index),
    };

    let api_routes = api::routes(&state)?;
    let app = axum_helpers::create_router::<openapi::ApiDoc>(api_routes)?
        .merge(health_router(state.config.app))
        .merge(api::health::router(state.clone()));

    info!(name = state.config.app.name, version = state.config.app.version, "starting discovery API");

    let server = state.config.server.clone();
    create_production_app(app, &server, Duration::from_secs(30), async move {
        info!("closing MongoDB connections");
        drop(state);
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("discovery API shutdown complete");
    Ok(())
}
