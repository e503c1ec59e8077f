use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::SearchConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{BusinessSummary, GeoQuery, SemanticHit, SemanticSearchRequest};
use crate::store::{EmbeddingGateway, GeoStore, VectorIndex};

/// Geofiltered semantic search over review text.
///
/// Read only. Dropping the future at any await point leaves nothing behind.
#[derive(Clone)]
pub struct SemanticSearchOrchestrator {
    geo: Arc<dyn GeoStore>,
    embedder: Arc<dyn EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
    config: SearchConfig,
}

impl SemanticSearchOrchestrator {
    pub fn new(
        geo: Arc<dyn GeoStore>,
        embedder: Arc<dyn EmbeddingGateway>,
        index: Arc<dyn VectorIndex>,
        config: SearchConfig,
    ) -> Self {
        Self {
            geo,
            embedder,
            index,
            config,
        }
    }

    /// Reviews semantically closest to `request.query`, restricted to every
    /// business inside the radius, ascending by distance.
    #[instrument(skip(self, request), fields(radius_meters = request.radius_meters))]
    pub async fn search(
        &self,
        request: SemanticSearchRequest,
    ) -> DiscoveryResult<Vec<SemanticHit>> {
        if request.query.trim().is_empty() {
            return Err(DiscoveryError::Validation("query must not be empty".into()));
        }

        let businesses = self
            .geo
            .businesses_near(&GeoQuery {
                center: request.center,
                radius_meters: request.radius_meters,
                limit: None,
            })
            .await?;

        if businesses.is_empty() {
            debug!("no businesses in radius");
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(&[request.query])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::Embedding("no vector returned for query".into()))?;

        let business_ids: Vec<String> = businesses.iter().map(|b| b.business_id.clone()).collect();
        let hits = self
            .index
            .nearest(vector, self.config.top_k, &business_ids)
            .await?;

        let by_id: HashMap<&str, &BusinessSummary> = businesses
            .iter()
            .map(|b| (b.business_id.as_str(), b))
            .collect();

        let mut results: Vec<SemanticHit> = hits
            .into_iter()
            .filter_map(|hit| {
                let business = by_id.get(hit.business_id.as_str()).copied()?;
                Some(SemanticHit::join(hit, business))
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!(
            candidates = businesses.len(),
            hits = results.len(),
            "semantic search complete"
        );
        Ok(results)
    }

    /// Businesses within the radius, nearest first.
    #[instrument(skip(self))]
    pub async fn nearby(&self, query: GeoQuery) -> DiscoveryResult<Vec<BusinessSummary>> {
        self.geo.businesses_near(&query).await
    }
}
