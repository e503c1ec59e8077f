use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::store::EmbeddingGateway;

/// Ollama embedding endpoint settings.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            timeout_secs: 60,
        }
    }
}

impl FromEnv for OllamaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: env_or_default("OLLAMA_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            model: env_or_default("EMBEDDING_MODEL", &defaults.model),
            timeout_secs: env_parse("OLLAMA_TIMEOUT_SECS", defaults.timeout_secs)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeddings from a local Ollama server.
pub struct OllamaEmbeddingGateway {
    client: Client,
    config: OllamaConfig,
}

impl OllamaEmbeddingGateway {
    pub fn new(config: OllamaConfig) -> DiscoveryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.config.base_url)
    }
}

#[async_trait]
impl EmbeddingGateway for OllamaEmbeddingGateway {
    #[instrument(skip(self, texts), fields(model = %self.config.model, count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> DiscoveryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let response = self
            .client
            .post(self.endpoint())
            .json(&EmbedRequest {
                model: &self.config.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Embedding(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbedResponse = response.json().await?;
        if body.embeddings.len() != texts.len() {
            return Err(DiscoveryError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        debug!(dimension = body.embeddings.first().map(Vec::len), "texts embedded");
        Ok(body.embeddings)
    }
}
