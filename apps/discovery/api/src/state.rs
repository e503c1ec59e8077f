use domain_discovery::mongodb::{MongoDirectoryStore, MongoGeoStore};
use domain_discovery::qdrant::QdrantVectorIndex;
use mongodb::Client;
use std::sync::Arc;

use crate::config::Config;

/// Connected backends, shared by the domain services and the readiness check.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub geo_client: Client,
    pub directory_client: Client,
    pub geo: Arc<MongoGeoStore>,
    pub directory: Arc<MongoDirectoryStore>,
    pub index: Arc<QdrantVectorIndex>,
}
