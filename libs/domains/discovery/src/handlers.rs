use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{ErrorResponse, ValidatedJson, ValidatedQuery};
use utoipa::OpenApi;

use crate::error::DiscoveryResult;
use crate::ingest::ReviewIngestCoordinator;
use crate::models::{
    BusinessSummary, CreateReview, GeoJsonType, GeoPoint, LocationSearchParams, Review,
    SemanticHit, SemanticSearchParams,
};
use crate::search::SemanticSearchOrchestrator;

const TAG_REVIEWS: &str = "reviews";
const TAG_SEARCH: &str = "search";

/// OpenAPI documentation for the discovery API
#[derive(OpenApi)]
#[openapi(
    paths(create_review, semantic_search, location_search),
    components(schemas(
        CreateReview,
        Review,
        GeoPoint,
        GeoJsonType,
        SemanticHit,
        BusinessSummary,
        ErrorResponse
    )),
    tags(
        (name = TAG_REVIEWS, description = "Review submission"),
        (name = TAG_SEARCH, description = "Geofiltered business and review search")
    )
)]
pub struct ApiDoc;

/// Services behind the HTTP routes.
#[derive(Clone)]
pub struct DiscoveryState {
    pub ingest: ReviewIngestCoordinator,
    pub search: SemanticSearchOrchestrator,
}

pub fn router(state: DiscoveryState) -> Router {
    Router::new()
        .route("/reviews", post(create_review))
        .route("/search/semantic", get(semantic_search))
        .route("/businesses/search/location", get(location_search))
        .with_state(state)
}

/// Submit a review
///
/// Responds once the review and the business rating are committed.
#[utoipa::path(
    post,
    path = "/reviews",
    tag = TAG_REVIEWS,
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Invalid review", body = ErrorResponse),
        (status = 404, description = "Business or user not found", body = ErrorResponse),
        (status = 409, description = "Concurrent update, retry", body = ErrorResponse),
        (status = 500, description = "Transaction failed", body = ErrorResponse)
    )
)]
async fn create_review(
    State(state): State<DiscoveryState>,
    ValidatedJson(input): ValidatedJson<CreateReview>,
) -> DiscoveryResult<impl IntoResponse> {
    let outcome = state.ingest.submit(input).await?;
    Ok((StatusCode::CREATED, Json(outcome.review)))
}

/// Semantic review search near a point
#[utoipa::path(
    get,
    path = "/search/semantic",
    tag = TAG_SEARCH,
    params(SemanticSearchParams),
    responses(
        (status = 200, description = "Matching reviews, closest first", body = Vec<SemanticHit>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 503, description = "Embedding or vector service unavailable", body = ErrorResponse)
    )
)]
async fn semantic_search(
    State(state): State<DiscoveryState>,
    ValidatedQuery(params): ValidatedQuery<SemanticSearchParams>,
) -> DiscoveryResult<Json<Vec<SemanticHit>>> {
    let hits = state.search.search(params.into()).await?;
    Ok(Json(hits))
}

/// Businesses near a point
#[utoipa::path(
    get,
    path = "/businesses/search/location",
    tag = TAG_SEARCH,
    params(LocationSearchParams),
    responses(
        (status = 200, description = "Businesses within the radius, nearest first", body = Vec<BusinessSummary>),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
async fn location_search(
    State(state): State<DiscoveryState>,
    ValidatedQuery(params): ValidatedQuery<LocationSearchParams>,
) -> DiscoveryResult<Json<Vec<BusinessSummary>>> {
    let businesses = state.search.nearby(params.into()).await?;
    Ok(Json(businesses))
}
