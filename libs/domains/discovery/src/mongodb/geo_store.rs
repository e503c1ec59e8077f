use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::{self, Bson, Document, doc, oid::ObjectId},
    change_stream::event::{ChangeStreamEvent, OperationType, ResumeToken as MongoResumeToken},
    error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{
        Acknowledgment, IndexOptions, ReadConcern, ReadPreference, ReturnDocument,
        SelectionCriteria, TransactionOptions, WriteConcern,
    },
};
use tracing::{debug, info, instrument, warn};

use super::collections;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{
    Business, BusinessAggregate, BusinessSummary, ChangeEvent, ChangeOperation, GeoQuery,
    ResumeToken, Review, ReviewCursor, StoredReview,
};
use crate::store::{ChangeFeed, GeoStore};

/// Commit attempts when the server cannot say whether a commit landed.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Geo store on a MongoDB replica set.
///
/// Reviews are written in multi-document transactions pinned to the primary;
/// proximity reads follow the client's read preference.
#[derive(Clone)]
pub struct MongoGeoStore {
    client: Client,
    db: Database,
    businesses: Collection<Business>,
    reviews: Collection<Review>,
}

impl MongoGeoStore {
    pub fn new(client: Client, database: &str) -> Self {
        let db = client.database(database);
        Self {
            businesses: db.collection(collections::BUSINESSES),
            reviews: db.collection(collections::REVIEWS),
            client,
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create the geo and lookup indexes. Safe to run on every start.
    pub async fn init_indexes(&self) -> DiscoveryResult<()> {
        let business_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "location": "2dsphere" })
                .options(
                    IndexOptions::builder()
                        .name("idx_location_2dsphere".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "business_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("idx_business_id_unique".to_string())
                        .build(),
                )
                .build(),
        ];
        self.businesses.create_indexes(business_indexes).await?;

        let review_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "review_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("idx_review_id_unique".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "business_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("idx_business_id".to_string())
                        .build(),
                )
                .build(),
        ];
        self.reviews.create_indexes(review_indexes).await?;

        info!("geo store indexes created");
        Ok(())
    }

    async fn write_review(
        &self,
        session: &mut ClientSession,
        review: &Review,
    ) -> DiscoveryResult<BusinessAggregate> {
        self.reviews
            .insert_one(review)
            .session(&mut *session)
            .await
            .map_err(transaction_error)?;

        let business = self
            .businesses
            .find_one_and_update(
                doc! { "business_id": &review.business_id },
                vec![aggregate_update(review.stars)],
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await
            .map_err(transaction_error)?
            .ok_or_else(|| DiscoveryError::BusinessNotFound(review.business_id.clone()))?;

        Ok(business.aggregate())
    }

    async fn commit(&self, session: &mut ClientSession) -> DiscoveryResult<()> {
        let mut attempt = 1;
        loop {
            match session.commit_transaction().await {
                Ok(()) => return Ok(()),
                Err(e)
                    if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    debug!(attempt, error = %e, "commit result unknown, retrying commit");
                    attempt += 1;
                }
                Err(e) => return Err(transaction_error(e)),
            }
        }
    }
}

fn transaction_options() -> TransactionOptions {
    TransactionOptions::builder()
        .read_concern(ReadConcern::snapshot())
        .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
        .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
        .build()
}

/// Transient transaction failures are write conflicts the caller may retry.
fn transaction_error(err: MongoError) -> DiscoveryError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        DiscoveryError::WriteConflict(err.to_string())
    } else {
        DiscoveryError::Transaction(err.to_string())
    }
}

/// Pipeline update folding one rating into `stars` and `review_count`.
///
/// Both fields are computed from the values before the update, in one atomic
/// document write.
fn aggregate_update(stars: f64) -> Document {
    let count = doc! { "$ifNull": ["$review_count", 0] };
    let current = doc! { "$ifNull": ["$stars", 0] };
    doc! {
        "$set": {
            "stars": {
                "$round": [
                    {
                        "$divide": [
                            { "$add": [{ "$multiply": [current, count.clone()] }, stars] },
                            { "$add": [count.clone(), 1] },
                        ]
                    },
                    2,
                ]
            },
            "review_count": { "$add": [count, 1] },
        }
    }
}

fn geo_near_pipeline(query: &GeoQuery) -> Vec<Document> {
    let mut pipeline = vec![doc! {
        "$geoNear": {
            "near": {
                "type": "Point",
                "coordinates": [query.center.longitude(), query.center.latitude()],
            },
            "distanceField": "distance_meters",
            "maxDistance": query.radius_meters,
            "spherical": true,
            "key": "location",
        }
    }];
    if let Some(limit) = query.limit {
        pipeline.push(doc! { "$limit": limit as i64 });
    }
    pipeline.push(doc! {
        "$project": {
            "_id": 0,
            "business_id": 1,
            "name": 1,
            "address": 1,
            "city": 1,
            "stars": 1,
            "review_count": 1,
            "categories": 1,
            "distance_meters": 1,
        }
    });
    pipeline
}

/// Scans walk `_id`. Driver-generated ObjectIds lead with the insert time, so
/// a review committed after a scan position sorts after it, whatever its
/// `review_id` looks like.
fn scan_filter(cursor: &ReviewCursor) -> DiscoveryResult<(Document, u64)> {
    Ok(match cursor {
        ReviewCursor::Offset(skip) => (doc! {}, *skip),
        ReviewCursor::After(Some(position)) => {
            let last = ObjectId::parse_str(position).map_err(|e| {
                DiscoveryError::Database(format!("Invalid scan position '{}': {}", position, e))
            })?;
            (doc! { "_id": { "$gt": last } }, 0)
        }
        ReviewCursor::After(None) => (doc! {}, 0),
    })
}

fn to_stored_review(mut document: Document) -> DiscoveryResult<StoredReview> {
    let position = document
        .get_object_id("_id")
        .map_err(|e| DiscoveryError::Database(format!("Review without ObjectId _id: {}", e)))?
        .to_hex();
    document.remove("_id");
    Ok(StoredReview {
        position,
        review: bson::from_document(document)?,
    })
}

/// Resume tokens travel as relaxed extended JSON.
fn encode_token(token: &MongoResumeToken) -> DiscoveryResult<ResumeToken> {
    let bson = bson::to_bson(token)
        .map_err(|e| DiscoveryError::Database(format!("Failed to encode resume token: {}", e)))?;
    Ok(ResumeToken(bson.into_relaxed_extjson().to_string()))
}

fn decode_token(token: &ResumeToken) -> DiscoveryResult<MongoResumeToken> {
    let json: serde_json::Value = serde_json::from_str(&token.0)
        .map_err(|e| DiscoveryError::Database(format!("Invalid resume token: {}", e)))?;
    let bson = Bson::try_from(json)
        .map_err(|e| DiscoveryError::Database(format!("Invalid resume token: {}", e)))?;
    Ok(bson::from_bson(bson)?)
}

fn to_change_event(event: ChangeStreamEvent<Document>) -> DiscoveryResult<ChangeEvent> {
    let operation = match event.operation_type {
        OperationType::Insert => ChangeOperation::Insert,
        OperationType::Update => ChangeOperation::Update,
        OperationType::Replace => ChangeOperation::Replace,
        OperationType::Delete => ChangeOperation::Delete,
        other => ChangeOperation::Other(format!("{:?}", other)),
    };
    let collection = event.ns.and_then(|ns| ns.coll).unwrap_or_default();

    let review = match (&operation, event.full_document) {
        (ChangeOperation::Insert, Some(document)) if collection == collections::REVIEWS => {
            match bson::from_document::<Review>(document) {
                Ok(review) => Some(review),
                Err(e) => {
                    warn!(error = %e, "inserted review does not decode");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(ChangeEvent {
        operation,
        collection,
        review,
        resume_token: encode_token(&event.id)?,
    })
}

#[async_trait]
impl GeoStore for MongoGeoStore {
    #[instrument(skip(self))]
    async fn find_business(&self, business_id: &str) -> DiscoveryResult<Option<Business>> {
        Ok(self
            .businesses
            .find_one(doc! { "business_id": business_id })
            .await?)
    }

    #[instrument(skip(self, review), fields(review_id = %review.review_id, business_id = %review.business_id))]
    async fn commit_review(&self, review: &Review) -> DiscoveryResult<BusinessAggregate> {
        let mut session = self.client.start_session().await?;
        session
            .start_transaction()
            .with_options(transaction_options())
            .await
            .map_err(transaction_error)?;

        match self.write_review(&mut session, review).await {
            Ok(aggregate) => {
                self.commit(&mut session).await?;
                Ok(aggregate)
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    warn!(error = %abort, "failed to abort review transaction");
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn businesses_near(&self, query: &GeoQuery) -> DiscoveryResult<Vec<BusinessSummary>> {
        let cursor = self.businesses.aggregate(geo_near_pipeline(query)).await?;
        let businesses: Vec<BusinessSummary> =
            cursor.with_type::<BusinessSummary>().try_collect().await?;
        debug!(count = businesses.len(), "businesses in radius");
        Ok(businesses)
    }

    #[instrument(skip(self))]
    async fn count_reviews(&self) -> DiscoveryResult<u64> {
        Ok(self.reviews.count_documents(doc! {}).await?)
    }

    #[instrument(skip(self))]
    async fn scan_reviews(
        &self,
        cursor: &ReviewCursor,
        limit: usize,
    ) -> DiscoveryResult<Vec<StoredReview>> {
        let (filter, skip) = scan_filter(cursor)?;
        let documents: Vec<Document> = self
            .reviews
            .clone_with_type::<Document>()
            .find(filter)
            .sort(doc! { "_id": 1 })
            .skip(skip)
            .limit(limit as i64)
            .await?
            .try_collect()
            .await?;
        documents.into_iter().map(to_stored_review).collect()
    }

    #[instrument(skip(self))]
    async fn watch_changes(&self, resume: Option<ResumeToken>) -> DiscoveryResult<ChangeFeed> {
        let resume_after = resume.as_ref().map(decode_token).transpose()?;
        let stream = self.db.watch().resume_after(resume_after).await?;
        info!(resumed = resume.is_some(), "watching geo store changes");

        Ok(stream
            .map(|item| item.map_err(DiscoveryError::from).and_then(to_change_event))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    #[test]
    fn test_aggregate_update_reads_prior_values() {
        let update = aggregate_update(5.0);
        let set = update.get_document("$set").unwrap();
        assert!(set.contains_key("stars"));
        assert_eq!(
            set.get_document("review_count").unwrap(),
            &doc! { "$add": [{ "$ifNull": ["$review_count", 0] }, 1] }
        );
    }

    #[test]
    fn test_geo_near_pipeline() {
        let pipeline = geo_near_pipeline(&GeoQuery {
            center: GeoPoint::new(-110.97, 32.22),
            radius_meters: 5000.0,
            limit: Some(50),
        });

        assert_eq!(pipeline.len(), 3);
        let geo_near = pipeline[0].get_document("$geoNear").unwrap();
        assert_eq!(geo_near.get_f64("maxDistance").unwrap(), 5000.0);
        assert!(geo_near.get_bool("spherical").unwrap());
        assert_eq!(
            geo_near.get_document("near").unwrap().get_array("coordinates").unwrap(),
            &vec![Bson::Double(-110.97), Bson::Double(32.22)]
        );
        assert_eq!(pipeline[1].get_i64("$limit").unwrap(), 50);
    }

    #[test]
    fn test_geo_near_pipeline_without_limit_keeps_whole_radius() {
        let pipeline = geo_near_pipeline(&GeoQuery {
            center: GeoPoint::new(-110.97, 32.22),
            radius_meters: 5000.0,
            limit: None,
        });

        assert_eq!(pipeline.len(), 2);
        assert!(pipeline.iter().all(|stage| !stage.contains_key("$limit")));
        assert!(pipeline[1].contains_key("$project"));
    }

    #[test]
    fn test_scan_filter_walks_object_ids() {
        assert_eq!(scan_filter(&ReviewCursor::Offset(30)).unwrap(), (doc! {}, 30));
        assert_eq!(scan_filter(&ReviewCursor::After(None)).unwrap(), (doc! {}, 0));

        let last = ObjectId::new();
        assert_eq!(
            scan_filter(&ReviewCursor::After(Some(last.to_hex()))).unwrap(),
            (doc! { "_id": { "$gt": last } }, 0)
        );
    }

    #[test]
    fn test_scan_filter_rejects_review_ids() {
        let err = scan_filter(&ReviewCursor::After(Some("saUsX_uimxRlCVr67Z4Jig".into())))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Database(_)));
    }

    #[test]
    fn test_stored_review_takes_position_from_object_id() {
        let id = ObjectId::new();
        let document = doc! {
            "_id": id,
            "review_id": "KU_O5udG6zpxOg-VcAEodg",
            "business_id": "b1",
            "user_id": "u1",
            "stars": 5.0,
            "text": "great",
            "date": "2018-07-07 22:09:11",
        };

        let stored = to_stored_review(document).unwrap();

        assert_eq!(stored.position, id.to_hex());
        assert_eq!(stored.review.review_id, "KU_O5udG6zpxOg-VcAEodg");
    }
}
