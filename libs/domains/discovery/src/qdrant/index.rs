use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    Distance, FieldType, Filter, PointId, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder, value::Kind,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::QdrantConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{EmbeddingRecord, VectorHit};
use crate::store::VectorIndex;

/// Point id of a review's embedding.
///
/// Review ids that are UUIDs are used as is; other ids map to a name-based
/// UUIDv5, so indexing the same review twice overwrites one point.
pub fn point_id(review_id: &str) -> Uuid {
    Uuid::parse_str(review_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, review_id.as_bytes()))
}

/// Review embeddings in a Qdrant collection, cosine distance.
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantVectorIndex {
    pub fn new(config: &QdrantConfig) -> DiscoveryResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| DiscoveryError::VectorIndex(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: config.dimension,
        })
    }

    pub async fn health_check(&self) -> DiscoveryResult<()> {
        self.client.health_check().await?;
        Ok(())
    }
}

fn to_point(record: EmbeddingRecord) -> PointStruct {
    let payload: HashMap<String, QdrantValue> = HashMap::from([
        ("review_id".to_string(), QdrantValue::from(record.review_id.clone())),
        ("business_id".to_string(), QdrantValue::from(record.business_id)),
        ("text".to_string(), QdrantValue::from(record.text)),
    ]);
    PointStruct::new(
        PointId::from(point_id(&record.review_id).to_string()),
        record.vector,
        payload,
    )
}

fn payload_str(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Cosine similarity score to distance, smaller is closer.
fn to_hit(payload: &HashMap<String, QdrantValue>, score: f32) -> DiscoveryResult<VectorHit> {
    let field = |key: &str| {
        payload_str(payload, key)
            .ok_or_else(|| DiscoveryError::VectorIndex(format!("point payload missing '{}'", key)))
    };
    Ok(VectorHit {
        review_id: field("review_id")?,
        business_id: field("business_id")?,
        text: payload_str(payload, "text").unwrap_or_default(),
        distance: 1.0 - score,
    })
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn ensure_collection(&self) -> DiscoveryResult<()> {
        if self.client.collection_exists(&self.collection).await? {
            debug!("collection already exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine)),
            )
            .await?;
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                "business_id",
                FieldType::Keyword,
            ))
            .await?;

        info!(dimension = self.dimension, "vector collection created");
        Ok(())
    }

    #[instrument(skip(self, records), fields(collection = %self.collection, count = records.len()))]
    async fn insert(&self, records: Vec<EmbeddingRecord>) -> DiscoveryResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let points: Vec<PointStruct> = records.into_iter().map(to_point).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn count(&self) -> DiscoveryResult<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    #[instrument(skip(self, vector, business_ids), fields(collection = %self.collection, candidates = business_ids.len()))]
    async fn nearest(
        &self,
        vector: Vec<f32>,
        limit: usize,
        business_ids: &[String],
    ) -> DiscoveryResult<Vec<VectorHit>> {
        if business_ids.is_empty() {
            return Ok(Vec::new());
        }

        let builder = SearchPointsBuilder::new(&self.collection, vector, limit as u64)
            .filter(Filter::must([Condition::matches(
                "business_id",
                business_ids.to_vec(),
            )]))
            .with_payload(true);

        let response = self.client.search_points(builder).await?;
        response
            .result
            .iter()
            .map(|point| to_hit(&point.payload, point.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable() {
        assert_eq!(point_id("-MhfebM0QIsKt87iDN-FNw"), point_id("-MhfebM0QIsKt87iDN-FNw"));
        assert_ne!(point_id("a"), point_id("b"));

        let uuid = Uuid::now_v7();
        assert_eq!(point_id(&uuid.to_string()), uuid);
    }

    #[test]
    fn test_to_hit_converts_score() {
        let payload = HashMap::from([
            ("review_id".to_string(), QdrantValue::from("r1".to_string())),
            ("business_id".to_string(), QdrantValue::from("b1".to_string())),
            ("text".to_string(), QdrantValue::from("friendly staff".to_string())),
        ]);

        let hit = to_hit(&payload, 0.75).unwrap();
        assert_eq!(hit.business_id, "b1");
        assert_eq!(hit.text, "friendly staff");
        assert!((hit.distance - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_to_hit_requires_ids() {
        let payload = HashMap::from([("text".to_string(), QdrantValue::from("x".to_string()))]);
        assert!(to_hit(&payload, 0.5).is_err());
    }

    #[test]
    fn test_to_point_payload() {
        let point = to_point(EmbeddingRecord {
            review_id: "r1".into(),
            business_id: "b1".into(),
            text: "tasty".into(),
            vector: vec![0.1, 0.2],
        });
        assert_eq!(payload_str(&point.payload, "business_id").as_deref(), Some("b1"));
        assert_eq!(payload_str(&point.payload, "review_id").as_deref(), Some("r1"));
    }
}
