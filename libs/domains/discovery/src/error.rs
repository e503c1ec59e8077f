use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Business not found: {0}")]
    BusinessNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The review transaction was aborted; nothing was persisted
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// A concurrent writer touched the same business; safe to retry
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Backfill stopped; restart it to continue from `resume_from`
    #[error("Index sync stalled after {processed} records (resume from {resume_from}): {reason}")]
    SyncStall {
        processed: u64,
        resume_from: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

impl DiscoveryError {
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, DiscoveryError::WriteConflict(_))
    }
}

impl From<mongodb::error::Error> for DiscoveryError {
    fn from(err: mongodb::error::Error) -> Self {
        DiscoveryError::Database(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for DiscoveryError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        DiscoveryError::Database(format!("Failed to decode document: {}", err))
    }
}

impl From<database::DatabaseError> for DiscoveryError {
    fn from(err: database::DatabaseError) -> Self {
        DiscoveryError::Database(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for DiscoveryError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        DiscoveryError::VectorIndex(err.to_string())
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        DiscoveryError::Embedding(err.to_string())
    }
}

impl From<validator::ValidationErrors> for DiscoveryError {
    fn from(err: validator::ValidationErrors) -> Self {
        DiscoveryError::Validation(err.to_string())
    }
}

impl From<core_config::ConfigError> for DiscoveryError {
    fn from(err: core_config::ConfigError) -> Self {
        DiscoveryError::Config(err.to_string())
    }
}

/// Convert DiscoveryError to AppError for standardized HTTP error responses
impl From<DiscoveryError> for AppError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Validation(msg) => AppError::BadRequest(msg),
            DiscoveryError::BusinessNotFound(id) => {
                AppError::NotFound(format!("Business {} not found", id))
            }
            DiscoveryError::UserNotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            DiscoveryError::WriteConflict(msg) => AppError::Conflict(format!(
                "Business is receiving too many concurrent reviews, retry later: {}",
                msg
            )),
            DiscoveryError::Transaction(msg) => {
                AppError::InternalServerError(format!("Review was not saved: {}", msg))
            }
            DiscoveryError::Embedding(msg) => {
                AppError::UpstreamUnavailable(format!("Embedding service: {}", msg))
            }
            DiscoveryError::VectorIndex(msg) => {
                AppError::UpstreamUnavailable(format!("Vector index: {}", msg))
            }
            DiscoveryError::Database(msg) => AppError::ServiceUnavailable(msg),
            err @ DiscoveryError::SyncStall { .. } => AppError::InternalServerError(err.to_string()),
            DiscoveryError::Config(msg) | DiscoveryError::Internal(msg) => {
                AppError::InternalServerError(msg)
            }
        }
    }
}

impl IntoResponse for DiscoveryError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
