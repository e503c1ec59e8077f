//! MongoDB adapter tests against a real replica set.

use async_trait::async_trait;
use database::common::RetryConfig;
use domain_discovery::mongodb::{MongoCheckpointStore, MongoDirectoryStore, MongoGeoStore};
use domain_discovery::store::ChangeFeed;
use domain_discovery::{
    Business, BusinessAggregate, BusinessSummary, ChangeOperation, CheckpointStore, CreateReview,
    DirectoryStore, DiscoveryError, DiscoveryResult, GeoPoint, GeoQuery, GeoStore, ResumeToken,
    Review, ReviewCursor, ReviewIngestCoordinator, StoredReview, SyncCheckpoint, User,
};
use futures::StreamExt;
use mongodb::bson::doc;
use std::sync::{Arc, Mutex};
use test_utils::assertions::assert_close;
use test_utils::{TestDataBuilder, TestMongo, offset_point};

const CENTER: (f64, f64) = (-110.9747, 32.2226);

fn business(id: &str, at: (f64, f64), review_count: i64, stars: f64) -> Business {
    Business {
        business_id: id.to_string(),
        name: format!("Business {}", id),
        address: None,
        city: Some("Tucson".to_string()),
        state: Some("AZ".to_string()),
        postal_code: None,
        location: GeoPoint::new(at.0, at.1),
        stars,
        review_count,
        is_open: Some(1),
        categories: Some("Food".to_string()),
        attributes: None,
        hours: None,
    }
}

fn user(id: &str) -> User {
    User {
        user_id: id.to_string(),
        name: "Dana".to_string(),
        email: None,
        review_count: 7,
        yelping_since: None,
        useful: 0,
        funny: 0,
        cool: 0,
        fans: 0,
        average_stars: None,
    }
}

fn review(id: &str, stars: f64) -> Review {
    Review {
        review_id: id.to_string(),
        business_id: "b1".to_string(),
        user_id: "u1".to_string(),
        stars,
        text: format!("text {}", id),
        date: "2024-01-01 00:00:00".to_string(),
        useful: 0,
        funny: 0,
        cool: 0,
        state: None,
        location: None,
    }
}

/// Geo store that remembers every failed commit.
struct RecordingGeoStore {
    inner: MongoGeoStore,
    commit_errors: Mutex<Vec<String>>,
}

#[async_trait]
impl GeoStore for RecordingGeoStore {
    async fn find_business(&self, business_id: &str) -> DiscoveryResult<Option<Business>> {
        self.inner.find_business(business_id).await
    }

    async fn commit_review(&self, review: &Review) -> DiscoveryResult<BusinessAggregate> {
        let result = self.inner.commit_review(review).await;
        if let Err(e) = &result {
            let kind = match e {
                DiscoveryError::WriteConflict(_) => "write conflict".to_string(),
                other => other.to_string(),
            };
            self.commit_errors.lock().unwrap().push(kind);
        }
        result
    }

    async fn businesses_near(&self, query: &GeoQuery) -> DiscoveryResult<Vec<BusinessSummary>> {
        self.inner.businesses_near(query).await
    }

    async fn count_reviews(&self) -> DiscoveryResult<u64> {
        self.inner.count_reviews().await
    }

    async fn scan_reviews(
        &self,
        cursor: &ReviewCursor,
        limit: usize,
    ) -> DiscoveryResult<Vec<StoredReview>> {
        self.inner.scan_reviews(cursor, limit).await
    }

    async fn watch_changes(&self, resume: Option<ResumeToken>) -> DiscoveryResult<ChangeFeed> {
        self.inner.watch_changes(resume).await
    }
}

async fn setup(mongo: &TestMongo, test: &str) -> (MongoGeoStore, MongoDirectoryStore) {
    let builder = TestDataBuilder::from_test_name(test);
    let db_name = builder.name("geo", "db");
    let geo = MongoGeoStore::new(mongo.client(), &db_name);
    let db = geo.database().clone();
    db.create_collection("reviews").await.unwrap();
    db.create_collection("businesses").await.unwrap();
    geo.init_indexes().await.unwrap();

    let directory_db = mongo.database(&builder.name("directory", "db"));
    let directory = MongoDirectoryStore::new(&directory_db);
    directory.init_indexes().await.unwrap();
    directory_db
        .collection::<User>("users")
        .insert_one(user("u1"))
        .await
        .unwrap();

    (geo, directory)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn commit_review_updates_aggregate_atomically() {
    let mongo = TestMongo::new().await;
    let (geo, directory) = setup(&mongo, "commit_review_updates_aggregate_atomically").await;
    geo.database()
        .collection::<Business>("businesses")
        .insert_one(business("b1", CENTER, 10, 4.0))
        .await
        .unwrap();

    let coordinator = ReviewIngestCoordinator::new(Arc::new(geo.clone()), Arc::new(directory.clone()));
    let outcome = coordinator
        .submit(domain_discovery::CreateReview {
            business_id: "b1".to_string(),
            user_id: "u1".to_string(),
            stars: 5.0,
            text: "excellent".to_string(),
            useful: 0,
            funny: 0,
            cool: 0,
            date: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.aggregate.review_count, 11);
    assert_eq!(outcome.aggregate.stars, 4.09);
    assert!(outcome.directory_updated);

    let stored = geo.find_business("b1").await.unwrap().unwrap();
    assert_eq!(stored.review_count, 11);
    assert_eq!(geo.count_reviews().await.unwrap(), 1);
    assert_eq!(directory.find_user("u1").await.unwrap().unwrap().review_count, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires Docker
async fn concurrent_submissions_retry_write_conflicts() {
    const SUBMISSIONS: usize = 16;

    let mongo = TestMongo::new().await;
    let (geo, directory) = setup(&mongo, "concurrent_submissions_retry_write_conflicts").await;
    geo.database()
        .collection::<Business>("businesses")
        .insert_one(business("b1", CENTER, 0, 0.0))
        .await
        .unwrap();

    let recording = Arc::new(RecordingGeoStore {
        inner: geo.clone(),
        commit_errors: Mutex::new(Vec::new()),
    });
    let coordinator = ReviewIngestCoordinator::new(recording.clone(), Arc::new(directory.clone()))
        .with_conflict_retry(
            RetryConfig::new()
                .with_max_retries(100)
                .with_initial_delay(1)
                .with_max_delay(20),
        );

    let start = Arc::new(tokio::sync::Barrier::new(SUBMISSIONS));
    let handles: Vec<_> = (0..SUBMISSIONS)
        .map(|i| {
            let coordinator = coordinator.clone();
            let start = start.clone();
            tokio::spawn(async move {
                start.wait().await;
                coordinator
                    .submit(CreateReview {
                        business_id: "b1".to_string(),
                        user_id: "u1".to_string(),
                        stars: 1.0 + (i % 5) as f64,
                        text: format!("visit {}", i),
                        useful: 0,
                        funny: 0,
                        cool: 0,
                        date: None,
                    })
                    .await
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    // Commits serialize: each one extends the aggregate its predecessor left.
    outcomes.sort_by_key(|o| o.aggregate.review_count);
    let counts: Vec<i64> = outcomes.iter().map(|o| o.aggregate.review_count).collect();
    assert_eq!(counts, (1..=SUBMISSIONS as i64).collect::<Vec<_>>());
    let mut previous = BusinessAggregate {
        review_count: 0,
        stars: 0.0,
    };
    for outcome in &outcomes {
        let expected = previous.with_review(outcome.review.stars);
        assert_close(outcome.aggregate.stars, expected.stars, 0.011, "running mean");
        previous = outcome.aggregate;
    }

    let total: f64 = outcomes.iter().map(|o| o.review.stars).sum();
    let stored = geo.find_business("b1").await.unwrap().unwrap();
    assert_eq!(stored.review_count, SUBMISSIONS as i64);
    assert_eq!(stored.stars, previous.stars);
    assert_close(stored.stars, total / SUBMISSIONS as f64, 0.05, "final mean");
    assert_eq!(geo.count_reviews().await.unwrap(), SUBMISSIONS as u64);
    assert_eq!(
        directory.find_user("u1").await.unwrap().unwrap().review_count,
        7 + SUBMISSIONS as i64
    );

    let errors = recording.commit_errors.lock().unwrap().clone();
    assert!(!errors.is_empty(), "concurrent commits never conflicted");
    assert!(
        errors.iter().all(|e| e == "write conflict"),
        "unexpected commit errors: {:?}",
        errors
    );
}

#[tokio::test]
#[ignore] // Requires Docker
async fn commit_review_for_missing_business_rolls_back() {
    let mongo = TestMongo::new().await;
    let (geo, _) = setup(&mongo, "commit_review_for_missing_business_rolls_back").await;

    let review = domain_discovery::Review {
        review_id: "r1".to_string(),
        business_id: "ghost".to_string(),
        user_id: "u1".to_string(),
        stars: 3.0,
        text: "hm".to_string(),
        date: "2024-01-01 00:00:00".to_string(),
        useful: 0,
        funny: 0,
        cool: 0,
        state: None,
        location: None,
    };

    assert!(geo.commit_review(&review).await.is_err());
    assert_eq!(geo.count_reviews().await.unwrap(), 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn businesses_near_filters_and_sorts() {
    let mongo = TestMongo::new().await;
    let (geo, _) = setup(&mongo, "businesses_near_filters_and_sorts").await;
    let businesses = geo.database().collection::<Business>("businesses");
    businesses
        .insert_many(vec![
            business("mid", offset_point(CENTER.0, CENTER.1, 1500.0, 0.0), 0, 0.0),
            business("near", offset_point(CENTER.0, CENTER.1, 200.0, 0.0), 0, 0.0),
            business("far", offset_point(CENTER.0, CENTER.1, 9000.0, 0.0), 0, 0.0),
        ])
        .await
        .unwrap();

    let found = geo
        .businesses_near(&GeoQuery {
            center: GeoPoint::new(CENTER.0, CENTER.1),
            radius_meters: 5000.0,
            limit: Some(10),
        })
        .await
        .unwrap();

    let ids: Vec<&str> = found.iter().map(|b| b.business_id.as_str()).collect();
    assert_eq!(ids, vec!["near", "mid"]);
    assert!((found[0].distance_meters - 200.0).abs() < 5.0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn scan_and_change_feed() {
    let mongo = TestMongo::new().await;
    let (geo, _) = setup(&mongo, "scan_and_change_feed").await;
    geo.database()
        .collection::<Business>("businesses")
        .insert_one(business("b1", CENTER, 0, 0.0))
        .await
        .unwrap();

    let mut feed = geo.watch_changes(None).await.unwrap();

    // Insertion order disagrees with id order.
    for id in ["r2", "r0", "r1"] {
        geo.commit_review(&review(id, 4.0)).await.unwrap();
    }

    let all = geo.scan_reviews(&ReviewCursor::After(None), 10).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|s| s.review.review_id.as_str()).collect();
    assert_eq!(ids, vec!["r2", "r0", "r1"]);

    let page = geo
        .scan_reviews(&ReviewCursor::After(Some(all[0].position.clone())), 10)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].review.review_id, "r0");

    let skipped = geo.scan_reviews(&ReviewCursor::Offset(2), 10).await.unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].review.review_id, "r1");

    let first = feed.next().await.unwrap().unwrap();
    assert_eq!(first.operation, ChangeOperation::Insert);
    assert_eq!(first.collection, "reviews");
    assert_eq!(first.review.unwrap().review_id, "r2");

    // Resuming after the first event skips it.
    let mut resumed = geo.watch_changes(Some(first.resume_token)).await.unwrap();
    let next = resumed.next().await.unwrap().unwrap();
    assert_eq!(next.collection, "businesses");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn checkpoints_round_trip() {
    let mongo = TestMongo::new().await;
    let store = MongoCheckpointStore::new(&mongo.database("checkpoints_round_trip"));

    assert!(store.load("backfill").await.unwrap().is_none());

    let checkpoint = SyncCheckpoint {
        last_position: Some("65f0c1d2e3a4b5c6d7e8f901".to_string()),
        resume_token: None,
        processed: 42,
    };
    store.save("backfill", &checkpoint).await.unwrap();
    store.save("backfill", &checkpoint).await.unwrap();

    assert_eq!(store.load("backfill").await.unwrap(), Some(checkpoint));
    let count = mongo
        .database("checkpoints_round_trip")
        .collection::<mongodb::bson::Document>("sync_checkpoints")
        .count_documents(doc! {})
        .await
        .unwrap();
    assert_eq!(count, 1);
}
