//! In-memory stand-ins for the four leaf stores plus the checkpoint store.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use domain_discovery::store::ChangeFeed;
use domain_discovery::{
    Business, BusinessAggregate, BusinessSummary, ChangeEvent, ChangeOperation, CheckpointStore,
    DirectoryStore, DiscoveryError, DiscoveryResult, EmbeddingGateway, EmbeddingRecord, GeoPoint,
    GeoQuery, GeoStore, ResumeToken, Review, ReviewCursor, StoredReview, SyncCheckpoint, User,
    VectorHit, VectorIndex,
};
use test_utils::haversine_meters;

pub const TUCSON: (f64, f64) = (-110.9747, 32.2226);

pub fn business(id: &str, name: &str, at: (f64, f64), review_count: i64, stars: f64) -> Business {
    Business {
        business_id: id.to_string(),
        name: name.to_string(),
        address: Some(format!("{} Main St", review_count)),
        city: Some("Tucson".to_string()),
        state: Some("AZ".to_string()),
        postal_code: Some("85701".to_string()),
        location: GeoPoint::new(at.0, at.1),
        stars,
        review_count,
        is_open: Some(1),
        categories: Some("Restaurants".to_string()),
        attributes: None,
        hours: None,
    }
}

pub fn user(id: &str) -> User {
    User {
        user_id: id.to_string(),
        name: format!("User {}", id),
        email: None,
        review_count: 0,
        yelping_since: None,
        useful: 0,
        funny: 0,
        cool: 0,
        fans: 0,
        average_stars: None,
    }
}

pub fn review(id: &str, business_id: &str, text: &str) -> Review {
    Review {
        review_id: id.to_string(),
        business_id: business_id.to_string(),
        user_id: "u1".to_string(),
        stars: 4.0,
        text: text.to_string(),
        date: "2024-01-01 12:00:00".to_string(),
        useful: 0,
        funny: 0,
        cool: 0,
        state: Some("AZ".to_string()),
        location: None,
    }
}

struct BusinessRow {
    business: Business,
    version: u64,
}

/// Geo store with optimistic concurrency on the business aggregate.
///
/// `commit_review` reads the aggregate, yields, then fails with a write conflict
/// if another commit landed on the same business in between. Reviews are kept
/// in insertion order; their position is the zero-padded insertion sequence.
#[derive(Default)]
pub struct InMemoryGeoStore {
    businesses: Mutex<HashMap<String, BusinessRow>>,
    reviews: Mutex<BTreeMap<String, Review>>,
    changes: Mutex<Vec<ChangeEvent>>,
    pub conflicts: AtomicUsize,
    /// End the change feed after replaying, instead of waiting for more
    pub close_feed: AtomicBool,
    /// Errors the change feed yields before any recorded change
    pub feed_errors: AtomicUsize,
}

impl InMemoryGeoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_business(&self, business: Business) {
        self.businesses.lock().unwrap().insert(
            business.business_id.clone(),
            BusinessRow {
                business,
                version: 0,
            },
        );
    }

    /// Load a review without going through the write path or the change feed.
    pub fn load_review(&self, review: Review) {
        let mut reviews = self.reviews.lock().unwrap();
        let position = format!("{:06}", reviews.len());
        reviews.insert(position, review);
    }

    /// Store position of a review, as handed out by `scan_reviews`.
    pub fn position_of(&self, review_id: &str) -> Option<String> {
        self.reviews
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| r.review_id == review_id)
            .map(|(position, _)| position.clone())
    }

    pub fn business(&self, id: &str) -> Business {
        self.businesses.lock().unwrap()[id].business.clone()
    }

    pub fn review_count(&self) -> usize {
        self.reviews.lock().unwrap().len()
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.reviews.lock().unwrap().values().cloned().collect()
    }

    fn record(&self, operation: ChangeOperation, collection: &str, review: Option<Review>) {
        let mut changes = self.changes.lock().unwrap();
        let position = changes.len();
        changes.push(ChangeEvent {
            operation,
            collection: collection.to_string(),
            review,
            resume_token: ResumeToken(position.to_string()),
        });
    }
}

#[async_trait]
impl GeoStore for InMemoryGeoStore {
    async fn find_business(&self, business_id: &str) -> DiscoveryResult<Option<Business>> {
        Ok(self
            .businesses
            .lock()
            .unwrap()
            .get(business_id)
            .map(|row| row.business.clone()))
    }

    async fn commit_review(&self, review: &Review) -> DiscoveryResult<BusinessAggregate> {
        let (aggregate, version) = {
            let businesses = self.businesses.lock().unwrap();
            let row = businesses
                .get(&review.business_id)
                .ok_or_else(|| DiscoveryError::BusinessNotFound(review.business_id.clone()))?;
            (row.business.aggregate(), row.version)
        };

        tokio::task::yield_now().await;

        let updated = aggregate.with_review(review.stars);
        {
            let mut businesses = self.businesses.lock().unwrap();
            let row = businesses
                .get_mut(&review.business_id)
                .ok_or_else(|| DiscoveryError::BusinessNotFound(review.business_id.clone()))?;
            if row.version != version {
                self.conflicts.fetch_add(1, Ordering::SeqCst);
                return Err(DiscoveryError::WriteConflict(review.business_id.clone()));
            }
            row.version += 1;
            row.business.review_count = updated.review_count;
            row.business.stars = updated.stars;
            self.load_review(review.clone());
        }

        self.record(ChangeOperation::Insert, "reviews", Some(review.clone()));
        self.record(ChangeOperation::Update, "businesses", None);
        Ok(updated)
    }

    async fn businesses_near(&self, query: &GeoQuery) -> DiscoveryResult<Vec<BusinessSummary>> {
        let center = (query.center.longitude(), query.center.latitude());
        let mut found: Vec<BusinessSummary> = self
            .businesses
            .lock()
            .unwrap()
            .values()
            .filter_map(|row| {
                let b = &row.business;
                let distance =
                    haversine_meters(center, (b.location.longitude(), b.location.latitude()));
                (distance <= query.radius_meters).then(|| BusinessSummary {
                    business_id: b.business_id.clone(),
                    name: b.name.clone(),
                    address: b.address.clone(),
                    city: b.city.clone(),
                    stars: b.stars,
                    review_count: b.review_count,
                    categories: b.categories.clone(),
                    distance_meters: distance,
                })
            })
            .collect();
        found.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn count_reviews(&self) -> DiscoveryResult<u64> {
        Ok(self.reviews.lock().unwrap().len() as u64)
    }

    async fn scan_reviews(
        &self,
        cursor: &ReviewCursor,
        limit: usize,
    ) -> DiscoveryResult<Vec<StoredReview>> {
        let reviews = self.reviews.lock().unwrap();
        let stored = |(position, review): (&String, &Review)| StoredReview {
            position: position.clone(),
            review: review.clone(),
        };
        let page = match cursor {
            ReviewCursor::Offset(skip) => reviews
                .iter()
                .skip(*skip as usize)
                .take(limit)
                .map(stored)
                .collect(),
            ReviewCursor::After(None) => reviews.iter().take(limit).map(stored).collect(),
            ReviewCursor::After(Some(last)) => reviews
                .range::<String, _>((
                    std::ops::Bound::Excluded(last.clone()),
                    std::ops::Bound::Unbounded,
                ))
                .take(limit)
                .map(stored)
                .collect(),
        };
        Ok(page)
    }

    /// Yields `feed_errors` errors, replays recorded changes after `resume`,
    /// then stays open unless `close_feed` is set.
    async fn watch_changes(&self, resume: Option<ResumeToken>) -> DiscoveryResult<ChangeFeed> {
        let start = match resume {
            Some(token) => token
                .0
                .parse::<usize>()
                .map_err(|e| DiscoveryError::Database(e.to_string()))?
                + 1,
            None => 0,
        };
        let failures = self.feed_errors.load(Ordering::SeqCst);
        let mut events: Vec<DiscoveryResult<ChangeEvent>> = (0..failures)
            .map(|_| Err(DiscoveryError::Database("cursor killed".into())))
            .collect();
        events.extend(
            self.changes
                .lock()
                .unwrap()
                .iter()
                .skip(start)
                .cloned()
                .map(Ok),
        );
        let replay = futures::stream::iter(events);
        if self.close_feed.load(Ordering::SeqCst) {
            Ok(replay.boxed())
        } else {
            Ok(replay.chain(futures::stream::pending()).boxed())
        }
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: Mutex<HashMap<String, User>>,
    /// Simulates the directory deployment going away after lookups succeed
    pub fail_increments: AtomicBool,
}

impl InMemoryDirectory {
    pub fn with_users(ids: &[&str]) -> Self {
        let directory = Self::default();
        for id in ids {
            directory
                .users
                .lock()
                .unwrap()
                .insert(id.to_string(), user(id));
        }
        directory
    }

    pub fn review_count(&self, user_id: &str) -> i64 {
        self.users.lock().unwrap()[user_id].review_count
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    async fn find_user(&self, user_id: &str) -> DiscoveryResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn increment_review_count(&self, user_id: &str) -> DiscoveryResult<()> {
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Database("directory unreachable".into()));
        }
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| DiscoveryError::UserNotFound(user_id.to_string()))?;
        user.review_count += 1;
        Ok(())
    }
}

const DIMENSION: usize = 64;

/// Bag-of-words hashing embedder. Texts sharing words land close together.
#[derive(Default)]
pub struct HashingEmbedder {
    pub calls: AtomicUsize,
    /// Fail the call with this 1-based number
    pub fail_on_call: Mutex<Option<usize>>,
}

impl HashingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSION];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let slot = word
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619))
                as usize
                % DIMENSION;
            v[slot] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingGateway for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> DiscoveryResult<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_call.lock().unwrap() == Some(call) {
            return Err(DiscoveryError::Embedding("model unavailable".into()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Vector index keyed by review id, so re-inserting a review overwrites it.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    records: Mutex<HashMap<String, EmbeddingRecord>>,
    pub searches: AtomicUsize,
}

impl InMemoryVectorIndex {
    pub fn contains(&self, review_id: &str) -> bool {
        self.records.lock().unwrap().contains_key(review_id)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn ensure_collection(&self) -> DiscoveryResult<()> {
        Ok(())
    }

    async fn insert(&self, records: Vec<EmbeddingRecord>) -> DiscoveryResult<()> {
        let mut stored = self.records.lock().unwrap();
        for record in records {
            stored.insert(record.review_id.clone(), record);
        }
        Ok(())
    }

    async fn count(&self) -> DiscoveryResult<u64> {
        Ok(self.records.lock().unwrap().len() as u64)
    }

    async fn nearest(
        &self,
        vector: Vec<f32>,
        limit: usize,
        business_ids: &[String],
    ) -> DiscoveryResult<Vec<VectorHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let mut hits: Vec<VectorHit> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| business_ids.contains(&r.business_id))
            .map(|r| VectorHit {
                review_id: r.review_id.clone(),
                business_id: r.business_id.clone(),
                text: r.text.clone(),
                distance: cosine_distance(&vector, &r.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[derive(Default)]
pub struct InMemoryCheckpoints {
    saved: Mutex<HashMap<String, SyncCheckpoint>>,
}

impl InMemoryCheckpoints {
    pub fn get(&self, name: &str) -> Option<SyncCheckpoint> {
        self.saved.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpoints {
    async fn load(&self, name: &str) -> DiscoveryResult<Option<SyncCheckpoint>> {
        Ok(self.get(name))
    }

    async fn save(&self, name: &str, checkpoint: &SyncCheckpoint) -> DiscoveryResult<()> {
        self.saved
            .lock()
            .unwrap()
            .insert(name.to_string(), checkpoint.clone());
        Ok(())
    }
}
