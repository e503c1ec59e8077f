//! Local-business discovery: the review write path, vector index synchronization
//! and geofiltered semantic search.
//!
//! The services in this crate depend only on the store traits in [`store`]; the
//! [`mongodb`], [`qdrant`] and [`embedding`] modules hold the production adapters.

pub mod config;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod mongodb;
pub mod qdrant;
pub mod search;
pub mod store;
pub mod sync;

pub use config::{IngestConfig, SearchConfig, SyncConfig};
pub use error::{DiscoveryError, DiscoveryResult};
pub use handlers::{ApiDoc, DiscoveryState};
pub use ingest::ReviewIngestCoordinator;
pub use models::*;
pub use search::SemanticSearchOrchestrator;
pub use store::{CheckpointStore, DirectoryStore, EmbeddingGateway, GeoStore, VectorIndex};
pub use sync::{BackfillReport, BackfillRunner, ResumeStrategy, StreamStats, StreamingIndexer};
