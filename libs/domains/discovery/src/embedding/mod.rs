mod ollama;

pub use ollama::{OllamaConfig, OllamaEmbeddingGateway};
