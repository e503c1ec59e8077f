use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use super::ResumeStrategy;
use crate::config::SyncConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{EmbeddingRecord, Review, ReviewCursor, SyncCheckpoint};
use crate::store::{CheckpointStore, EmbeddingGateway, GeoStore, VectorIndex};

/// Checkpoint key of the backfill cursor.
pub const BACKFILL_CHECKPOINT: &str = "backfill";

/// Outcome of one backfill run plus a comparison of both stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillReport {
    pub strategy: String,
    pub resumed_from: String,
    pub scanned: u64,
    pub indexed: u64,
    pub skipped_empty: u64,
    /// Records in the vector index after the run
    pub index_count: u64,
    /// Reviews in the geo store after the run
    pub source_count: u64,
    /// Stopped by a shutdown signal before reaching the end of the scan
    pub interrupted: bool,
}

impl BackfillReport {
    /// Reviews without a vector record. Includes reviews skipped for empty text.
    pub fn gap(&self) -> u64 {
        self.source_count.saturating_sub(self.index_count)
    }
}

/// Resumable batch scan of every review into the vector index.
pub struct BackfillRunner {
    geo: Arc<dyn GeoStore>,
    embedder: Arc<dyn EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: SyncConfig,
}

impl BackfillRunner {
    pub fn new(
        geo: Arc<dyn GeoStore>,
        embedder: Arc<dyn EmbeddingGateway>,
        index: Arc<dyn VectorIndex>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            geo,
            embedder,
            index,
            checkpoints,
            config,
        }
    }

    /// Scan until the review collection is exhausted or `shutdown` flips to true.
    ///
    /// One embedding call per batch. A failed embedding or insert stops the run
    /// with [`DiscoveryError::SyncStall`]; the cursor still points at the failed
    /// batch, so the next run retries it.
    #[instrument(skip_all, fields(strategy = %self.config.resume_strategy, batch_size = self.config.batch_size))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DiscoveryResult<BackfillReport> {
        self.index.ensure_collection().await?;

        let (mut cursor, mut checkpoint) = self.starting_point().await?;
        let resumed_from = cursor.to_string();
        info!(resume_from = %resumed_from, "starting backfill");

        let mut scanned = 0u64;
        let mut indexed = 0u64;
        let mut skipped_empty = 0u64;
        let mut interrupted = false;

        loop {
            if *shutdown.borrow() {
                interrupted = true;
                break;
            }

            let batch = self.geo.scan_reviews(&cursor, self.config.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();

            let with_text: Vec<&Review> = batch
                .iter()
                .map(|stored| &stored.review)
                .filter(|r| r.has_text())
                .collect();
            skipped_empty += (batch_len - with_text.len()) as u64;

            if !with_text.is_empty() {
                let records = self
                    .embed_batch(&with_text)
                    .await
                    .map_err(|e| self.stall(indexed, &cursor, e))?;
                let count = records.len() as u64;
                self.index
                    .insert(records)
                    .await
                    .map_err(|e| self.stall(indexed, &cursor, e))?;
                indexed += count;
            }
            scanned += batch_len as u64;

            cursor = match cursor {
                ReviewCursor::Offset(offset) => ReviewCursor::Offset(offset + batch_len as u64),
                ReviewCursor::After(_) => {
                    ReviewCursor::After(batch.last().map(|stored| stored.position.clone()))
                }
            };

            if let ReviewCursor::After(last) = &cursor {
                checkpoint.last_position = last.clone();
                checkpoint.processed += batch_len as u64;
                self.checkpoints
                    .save(BACKFILL_CHECKPOINT, &checkpoint)
                    .await?;
            }

            info!(scanned, indexed, skipped_empty, cursor = %cursor, "batch indexed");

            if batch_len < self.config.batch_size {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        interrupted = true;
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.pace) => {}
            }
        }

        let report = BackfillReport {
            strategy: self.config.resume_strategy.to_string(),
            resumed_from,
            scanned,
            indexed,
            skipped_empty,
            index_count: self.index.count().await?,
            source_count: self.geo.count_reviews().await?,
            interrupted,
        };

        if report.gap() > skipped_empty && !interrupted {
            warn!(
                gap = report.gap(),
                index_count = report.index_count,
                source_count = report.source_count,
                "vector index is missing reviews"
            );
        } else {
            info!(
                index_count = report.index_count,
                source_count = report.source_count,
                interrupted,
                "backfill finished"
            );
        }

        Ok(report)
    }

    async fn starting_point(&self) -> DiscoveryResult<(ReviewCursor, SyncCheckpoint)> {
        match self.config.resume_strategy {
            ResumeStrategy::Checkpoint => {
                let checkpoint = self
                    .checkpoints
                    .load(BACKFILL_CHECKPOINT)
                    .await?
                    .unwrap_or_default();
                Ok((
                    ReviewCursor::After(checkpoint.last_position.clone()),
                    checkpoint,
                ))
            }
            ResumeStrategy::IndexCount => {
                let offset = self.index.count().await?;
                Ok((ReviewCursor::Offset(offset), SyncCheckpoint::default()))
            }
        }
    }

    async fn embed_batch(&self, reviews: &[&Review]) -> DiscoveryResult<Vec<EmbeddingRecord>> {
        let texts: Vec<String> = reviews.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != reviews.len() {
            return Err(DiscoveryError::Embedding(format!(
                "expected {} vectors, got {}",
                reviews.len(),
                vectors.len()
            )));
        }
        Ok(reviews
            .iter()
            .zip(vectors)
            .map(|(review, vector)| EmbeddingRecord::from_review(review, vector))
            .collect())
    }

    fn stall(&self, processed: u64, cursor: &ReviewCursor, err: DiscoveryError) -> DiscoveryError {
        DiscoveryError::SyncStall {
            processed,
            resume_from: cursor.to_string(),
            reason: err.to_string(),
        }
    }
}
