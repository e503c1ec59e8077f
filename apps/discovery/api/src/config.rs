use core_config::{AppInfo, FromEnv, app_info, server::ServerConfig};
use database::mongodb::MongoConfig;
use domain_discovery::embedding::OllamaConfig;
use domain_discovery::qdrant::QdrantConfig;
use domain_discovery::{IngestConfig, SearchConfig};

pub use core_config::Environment;

/// Settings for the discovery API.
///
/// The geo store and the user directory are separate deployments: `MONGODB_*`
/// for businesses and reviews, `DIRECTORY_MONGODB_*` for users.
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub server: ServerConfig,
    pub geo: MongoConfig,
    pub directory: MongoConfig,
    pub qdrant: QdrantConfig,
    pub ollama: OllamaConfig,
    pub ingest: IngestConfig,
    pub search: SearchConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        Ok(Self {
            app: app_info!(),
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            geo: MongoConfig::from_env()?,
            directory: MongoConfig::from_env_with_prefix("DIRECTORY")?,
            qdrant: QdrantConfig::from_env()?,
            ollama: OllamaConfig::from_env()?,
            ingest: IngestConfig::from_env()?,
            search: SearchConfig::from_env()?,
        })
    }
}
