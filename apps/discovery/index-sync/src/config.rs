use core_config::FromEnv;
use database::mongodb::MongoConfig;
use domain_discovery::SyncConfig;
use domain_discovery::embedding::OllamaConfig;
use domain_discovery::qdrant::QdrantConfig;

pub use core_config::Environment;

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub geo: MongoConfig,
    pub qdrant: QdrantConfig,
    pub ollama: OllamaConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        Ok(Self {
            environment: Environment::from_env(),
            geo: MongoConfig::from_env()?,
            qdrant: QdrantConfig::from_env()?,
            ollama: OllamaConfig::from_env()?,
            sync: SyncConfig::from_env()?,
        })
    }
}
