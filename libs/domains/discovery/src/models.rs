use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Timestamp format used for review dates.
pub const REVIEW_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Round to two decimals, the precision of `Business::stars`.
///
/// Ties go to the even digit, as MongoDB's `$round` does.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum GeoJsonType {
    Point,
}

/// GeoJSON point, `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: GeoJsonType,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeoJsonType::Point,
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Business {
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub location: GeoPoint,
    #[serde(default)]
    pub stars: f64,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub is_open: Option<i32>,
    /// Comma separated, as in the source dataset
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<serde_json::Value>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub hours: Option<serde_json::Value>,
}

impl Business {
    pub fn aggregate(&self) -> BusinessAggregate {
        BusinessAggregate {
            review_count: self.review_count,
            stars: self.stars,
        }
    }
}

/// Rating state of a business that every committed review moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BusinessAggregate {
    pub review_count: i64,
    pub stars: f64,
}

impl BusinessAggregate {
    /// Fold one more review into the running average.
    ///
    /// ```
    /// use domain_discovery::BusinessAggregate;
    ///
    /// let before = BusinessAggregate { review_count: 10, stars: 4.0 };
    /// let after = before.with_review(5.0);
    /// assert_eq!(after.review_count, 11);
    /// assert_eq!(after.stars, 4.09);
    /// ```
    pub fn with_review(&self, stars: f64) -> Self {
        let count = self.review_count.max(0);
        let new_count = count + 1;
        Self {
            review_count: new_count,
            stars: round2((self.stars * count as f64 + stars) / new_count as f64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub yelping_since: Option<String>,
    #[serde(default)]
    pub useful: i64,
    #[serde(default)]
    pub funny: i64,
    #[serde(default)]
    pub cool: i64,
    #[serde(default)]
    pub fans: i64,
    #[serde(default)]
    pub average_stars: Option<f64>,
}

/// Review submission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    #[validate(length(min = 1, message = "business_id must not be empty"))]
    pub business_id: String,
    #[validate(length(min = 1, message = "user_id must not be empty"))]
    pub user_id: String,
    #[validate(range(min = 1.0, max = 5.0, message = "stars must be between 1 and 5"))]
    pub stars: f64,
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
    #[serde(default)]
    pub useful: u32,
    #[serde(default)]
    pub funny: u32,
    #[serde(default)]
    pub cool: u32,
    /// Defaults to the submission time, `YYYY-MM-DD HH:MM:SS` UTC
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub review_id: String,
    pub business_id: String,
    pub user_id: String,
    pub stars: f64,
    pub text: String,
    pub date: String,
    #[serde(default)]
    pub useful: u32,
    #[serde(default)]
    pub funny: u32,
    #[serde(default)]
    pub cool: u32,
    /// Copied from the business at write time
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl Review {
    /// Materialize a submission against the business it reviews.
    ///
    /// New review ids are UUIDv7. Imported reviews keep their source ids, so
    /// ids carry no ordering.
    pub fn from_submission(input: CreateReview, business: &Business, now: DateTime<Utc>) -> Self {
        Self {
            review_id: Uuid::now_v7().to_string(),
            date: input
                .date
                .unwrap_or_else(|| now.format(REVIEW_DATE_FORMAT).to_string()),
            business_id: input.business_id,
            user_id: input.user_id,
            stars: input.stars,
            text: input.text,
            useful: input.useful,
            funny: input.funny,
            cool: input.cool,
            state: business.state.clone(),
            location: Some(business.location.clone()),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// What the write path reports back about a committed review.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub review: Review,
    pub aggregate: BusinessAggregate,
    /// `false` when the directory counter update failed after commit
    pub directory_updated: bool,
}

/// Unit of the vector index: one embedded review.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub review_id: String,
    pub business_id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn from_review(review: &Review, vector: Vec<f32>) -> Self {
        Self {
            review_id: review.review_id.clone(),
            business_id: review.business_id.clone(),
            text: review.text.clone(),
            vector,
        }
    }
}

/// Nearest-neighbor hit. Smaller distance means more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub review_id: String,
    pub business_id: String,
    pub text: String,
    pub distance: f32,
}

/// Spherical proximity query.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoQuery {
    pub center: GeoPoint,
    pub radius_meters: f64,
    /// Nearest businesses kept when more fall inside the radius; `None` keeps all
    pub limit: Option<usize>,
}

/// Display projection of a business returned by proximity queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BusinessSummary {
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub stars: f64,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub categories: Option<String>,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticSearchRequest {
    pub query: String,
    pub center: GeoPoint,
    pub radius_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SemanticHit {
    pub review_text: String,
    pub business_id: String,
    pub business_name: String,
    pub business_city: Option<String>,
    pub business_address: Option<String>,
    pub business_stars: f64,
    pub business_review_count: i64,
    pub business_categories: Option<String>,
    /// Cosine distance between query and review, ascending order
    pub distance: f32,
}

impl SemanticHit {
    pub fn join(hit: VectorHit, business: &BusinessSummary) -> Self {
        Self {
            review_text: hit.text,
            business_id: hit.business_id,
            business_name: business.name.clone(),
            business_city: business.city.clone(),
            business_address: business.address.clone(),
            business_stars: business.stars,
            business_review_count: business.review_count,
            business_categories: business.categories.clone(),
            distance: hit.distance,
        }
    }
}

/// `GET /search/semantic` parameters.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SemanticSearchParams {
    /// Free-text description of what to look for
    #[validate(length(min = 1, message = "query must not be empty"))]
    pub query: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub long: f64,
    #[serde(default = "default_radius_meters")]
    #[validate(range(min = 1, max = 100_000))]
    pub radius_meters: u32,
}

fn default_radius_meters() -> u32 {
    5000
}

impl From<SemanticSearchParams> for SemanticSearchRequest {
    fn from(params: SemanticSearchParams) -> Self {
        Self {
            query: params.query,
            center: GeoPoint::new(params.long, params.lat),
            radius_meters: params.radius_meters as f64,
        }
    }
}

/// `GET /businesses/search/location` parameters.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationSearchParams {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    #[validate(range(min = 0.1, max = 100.0))]
    pub radius_km: f64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
}

fn default_radius_km() -> f64 {
    5.0
}

fn default_limit() -> usize {
    20
}

impl From<LocationSearchParams> for GeoQuery {
    fn from(params: LocationSearchParams) -> Self {
        Self {
            center: GeoPoint::new(params.longitude, params.latitude),
            radius_meters: params.radius_km * 1000.0,
            limit: Some(params.limit),
        }
    }
}

/// Where a review scan starts.
///
/// Scans walk reviews in storage insertion order, never by `review_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCursor {
    /// Skip this many reviews in insertion order
    Offset(u64),
    /// Reviews stored strictly after this position; `None` is the beginning
    After(Option<String>),
}

impl std::fmt::Display for ReviewCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewCursor::Offset(n) => write!(f, "offset {}", n),
            ReviewCursor::After(Some(position)) => write!(f, "after position {}", position),
            ReviewCursor::After(None) => f.write_str("the beginning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOperation {
    Insert,
    Update,
    Replace,
    Delete,
    Other(String),
}

/// Opaque change feed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken(pub String);

/// One change feed notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub operation: ChangeOperation,
    pub collection: String,
    /// Decoded full document, present for review inserts
    pub review: Option<Review>,
    pub resume_token: ResumeToken,
}

/// A scanned review with its store position.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReview {
    /// Opaque, store-assigned; feeds `ReviewCursor::After`
    pub position: String,
    pub review: Review,
}

/// Durable progress of one sync mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncCheckpoint {
    /// Store position of the last backfilled review
    pub last_position: Option<String>,
    pub resume_token: Option<ResumeToken>,
    pub processed: u64,
}
