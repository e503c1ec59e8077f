use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{ChangeEvent, ChangeOperation, EmbeddingRecord, Review, SyncCheckpoint};
use crate::store::{CheckpointStore, EmbeddingGateway, GeoStore, VectorIndex};

/// Checkpoint key of the change feed resume token.
pub const STREAM_CHECKPOINT: &str = "stream";

/// Collection whose inserts are indexed.
const REVIEWS_COLLECTION: &str = "reviews";

/// Feed errors tolerated in a row before the indexer gives up.
const MAX_CONSECUTIVE_FEED_ERRORS: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStats {
    pub events: u64,
    pub indexed: u64,
    /// Review inserts that failed to embed or index and were not retried
    pub dropped: u64,
    pub ignored: u64,
}

/// Follows the geo store change feed and indexes each new review.
///
/// Events are handled one at a time in feed order. A review that fails to embed
/// or index is logged and dropped; the feed position moves past it either way.
pub struct StreamingIndexer {
    geo: Arc<dyn GeoStore>,
    embedder: Arc<dyn EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl StreamingIndexer {
    pub fn new(
        geo: Arc<dyn GeoStore>,
        embedder: Arc<dyn EmbeddingGateway>,
        index: Arc<dyn VectorIndex>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            geo,
            embedder,
            index,
            checkpoints,
        }
    }

    /// Run until `shutdown` flips to true.
    ///
    /// A feed that ends on its own, or fails more than
    /// `MAX_CONSECUTIVE_FEED_ERRORS` times in a row, is an error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DiscoveryResult<StreamStats> {
        self.index.ensure_collection().await?;

        let mut checkpoint = self
            .checkpoints
            .load(STREAM_CHECKPOINT)
            .await?
            .unwrap_or_default();
        info!(
            resuming = checkpoint.resume_token.is_some(),
            processed = checkpoint.processed,
            "starting change feed indexer"
        );

        let mut feed = self.geo.watch_changes(checkpoint.resume_token.clone()).await?;
        let mut stats = StreamStats::default();
        let mut feed_errors = 0u32;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping indexer");
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = feed.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    feed_errors = 0;
                    self.handle(&event, &mut stats).await;
                    self.advance(&mut checkpoint, event).await;
                }
                Some(Err(e)) => {
                    feed_errors += 1;
                    error!(error = %e, consecutive = feed_errors, "change feed error");
                    if feed_errors > MAX_CONSECUTIVE_FEED_ERRORS {
                        return Err(DiscoveryError::Database(format!(
                            "change feed failed {} times in a row: {}",
                            feed_errors, e
                        )));
                    }
                }
                None => {
                    error!(events = stats.events, "change feed closed unexpectedly");
                    return Err(DiscoveryError::Database(
                        "change feed closed unexpectedly".into(),
                    ));
                }
            }
        }

        info!(
            events = stats.events,
            indexed = stats.indexed,
            dropped = stats.dropped,
            "change feed indexer stopped"
        );
        Ok(stats)
    }

    async fn handle(&self, event: &ChangeEvent, stats: &mut StreamStats) {
        stats.events += 1;

        let review = match (&event.operation, event.collection.as_str(), &event.review) {
            (ChangeOperation::Insert, REVIEWS_COLLECTION, Some(review)) => review,
            _ => {
                stats.ignored += 1;
                return;
            }
        };

        if !review.has_text() {
            debug!(review_id = %review.review_id, "review has no text, skipping");
            stats.ignored += 1;
            return;
        }

        match self.index_review(review).await {
            Ok(()) => {
                stats.indexed += 1;
                debug!(review_id = %review.review_id, "review indexed");
            }
            Err(e) => {
                stats.dropped += 1;
                warn!(review_id = %review.review_id, error = %e, "dropping review from index");
            }
        }
    }

    async fn index_review(&self, review: &Review) -> DiscoveryResult<()> {
        let vector = self
            .embedder
            .embed(std::slice::from_ref(&review.text))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::Embedding("no vector returned".into()))?;
        self.index
            .insert(vec![EmbeddingRecord::from_review(review, vector)])
            .await
    }

    async fn advance(&self, checkpoint: &mut SyncCheckpoint, event: ChangeEvent) {
        checkpoint.resume_token = Some(event.resume_token);
        checkpoint.processed += 1;
        if let Err(e) = self.checkpoints.save(STREAM_CHECKPOINT, checkpoint).await {
            warn!(error = %e, "failed to persist change feed position");
        }
    }
}
