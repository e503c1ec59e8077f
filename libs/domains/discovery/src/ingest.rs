use chrono::Utc;
use database::common::{RetryConfig, retry_if};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::config::IngestConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{CreateReview, IngestOutcome, Review};
use crate::store::{DirectoryStore, GeoStore};

/// Write path for new reviews.
///
/// The review insert and the business aggregate update commit together in the
/// geo store. The reviewer's counter lives in a separate deployment and is
/// bumped afterwards on a best-effort basis.
#[derive(Clone)]
pub struct ReviewIngestCoordinator {
    geo: Arc<dyn GeoStore>,
    directory: Arc<dyn DirectoryStore>,
    conflict_retry: RetryConfig,
}

impl ReviewIngestCoordinator {
    pub fn new(geo: Arc<dyn GeoStore>, directory: Arc<dyn DirectoryStore>) -> Self {
        Self {
            geo,
            directory,
            conflict_retry: IngestConfig::default().conflict_retry(),
        }
    }

    pub fn with_conflict_retry(mut self, retry: RetryConfig) -> Self {
        self.conflict_retry = retry;
        self
    }

    /// Validate and persist a review, returning it with the updated aggregate.
    ///
    /// Fails before any write when the business or user is unknown. A failed
    /// directory update does not fail the call; it is logged and reported in
    /// [`IngestOutcome::directory_updated`].
    #[instrument(skip(self, input), fields(business_id = %input.business_id, user_id = %input.user_id))]
    pub async fn submit(&self, input: CreateReview) -> DiscoveryResult<IngestOutcome> {
        input.validate()?;

        let business = self
            .geo
            .find_business(&input.business_id)
            .await?
            .ok_or_else(|| DiscoveryError::BusinessNotFound(input.business_id.clone()))?;

        if self.directory.find_user(&input.user_id).await?.is_none() {
            return Err(DiscoveryError::UserNotFound(input.user_id));
        }

        let review = Review::from_submission(input, &business, Utc::now());

        let aggregate = retry_if(
            || self.geo.commit_review(&review),
            self.conflict_retry.clone(),
            DiscoveryError::is_write_conflict,
        )
        .await?;

        info!(
            review_id = %review.review_id,
            review_count = aggregate.review_count,
            stars = aggregate.stars,
            "review committed"
        );

        let directory_updated = match self.directory.increment_review_count(&review.user_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    review_id = %review.review_id,
                    user_id = %review.user_id,
                    error = %e,
                    "review committed but user review count was not updated"
                );
                false
            }
        };

        Ok(IngestOutcome {
            review,
            aggregate,
            directory_updated,
        })
    }
}
