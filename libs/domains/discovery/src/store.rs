//! Boundaries of the discovery core. Services hold these as `Arc<dyn _>`.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::DiscoveryResult;
use crate::models::{
    Business, BusinessAggregate, BusinessSummary, ChangeEvent, EmbeddingRecord, GeoQuery,
    ResumeToken, Review, ReviewCursor, StoredReview, SyncCheckpoint, User, VectorHit,
};

pub type ChangeFeed = BoxStream<'static, DiscoveryResult<ChangeEvent>>;

/// Geo-indexed store of businesses and reviews.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoStore: Send + Sync {
    async fn find_business(&self, business_id: &str) -> DiscoveryResult<Option<Business>>;

    /// Insert `review` and fold its stars into the business aggregate, atomically.
    ///
    /// Either both writes commit or neither does. Returns the aggregate as of
    /// this commit. Fails with `WriteConflict` when a concurrent transaction won
    /// the race for the same business.
    async fn commit_review(&self, review: &Review) -> DiscoveryResult<BusinessAggregate>;

    /// Businesses within `query.radius_meters` of the center, nearest first.
    async fn businesses_near(&self, query: &GeoQuery) -> DiscoveryResult<Vec<BusinessSummary>>;

    async fn count_reviews(&self) -> DiscoveryResult<u64>;

    /// Up to `limit` reviews in insertion order, starting at `cursor`.
    async fn scan_reviews(
        &self,
        cursor: &ReviewCursor,
        limit: usize,
    ) -> DiscoveryResult<Vec<StoredReview>>;

    /// Ordered change notifications, continuing after `resume` when given.
    async fn watch_changes(&self, resume: Option<ResumeToken>) -> DiscoveryResult<ChangeFeed>;
}

/// Independently deployed user directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> DiscoveryResult<Option<User>>;

    async fn increment_review_count(&self, user_id: &str) -> DiscoveryResult<()>;
}

/// Text to fixed-length vector conversion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> DiscoveryResult<Vec<Vec<f32>>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist yet.
    async fn ensure_collection(&self) -> DiscoveryResult<()>;

    async fn insert(&self, records: Vec<EmbeddingRecord>) -> DiscoveryResult<()>;

    async fn count(&self) -> DiscoveryResult<u64>;

    /// The `limit` records closest to `vector` whose business is in `business_ids`,
    /// ascending by distance.
    async fn nearest(
        &self,
        vector: Vec<f32>,
        limit: usize,
        business_ids: &[String],
    ) -> DiscoveryResult<Vec<VectorHit>>;
}

/// Durable sync progress, keyed by sync mode name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, name: &str) -> DiscoveryResult<Option<SyncCheckpoint>>;

    async fn save(&self, name: &str, checkpoint: &SyncCheckpoint) -> DiscoveryResult<()>;
}
