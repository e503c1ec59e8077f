use core_config::{ConfigError, FromEnv, env_parse};
use database::common::RetryConfig;
use std::time::Duration;

use crate::sync::ResumeStrategy;

/// Write path settings.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Retries after a write conflict on the business aggregate
    pub max_conflict_retries: u32,
    pub conflict_backoff_ms: u64,
}

impl IngestConfig {
    pub fn conflict_retry(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_conflict_retries)
            .with_initial_delay(self.conflict_backoff_ms)
            .with_max_delay(self.conflict_backoff_ms.saturating_mul(20))
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            conflict_backoff_ms: 20,
        }
    }
}

impl FromEnv for IngestConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_conflict_retries: env_parse(
                "INGEST_MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            )?,
            conflict_backoff_ms: env_parse("INGEST_CONFLICT_BACKOFF_MS", defaults.conflict_backoff_ms)?,
        })
    }
}

/// Semantic search settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Review hits returned per query
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 20 }
    }
}

impl FromEnv for SearchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            top_k: at_least_one("SEARCH_TOP_K", env_parse("SEARCH_TOP_K", defaults.top_k)?)?,
        })
    }
}

/// Index sync settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub batch_size: usize,
    /// Fixed pause between backfill batches
    pub pace: Duration,
    pub resume_strategy: ResumeStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            pace: Duration::from_millis(500),
            resume_strategy: ResumeStrategy::Checkpoint,
        }
    }
}

impl FromEnv for SyncConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            batch_size: at_least_one(
                "SYNC_BATCH_SIZE",
                env_parse("SYNC_BATCH_SIZE", defaults.batch_size)?,
            )?,
            pace: Duration::from_millis(env_parse("SYNC_PACE_MS", 500u64)?),
            resume_strategy: env_parse("SYNC_RESUME_STRATEGY", defaults.resume_strategy)?,
        })
    }
}

fn at_least_one(key: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::ParseError {
            key: key.to_string(),
            details: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}
