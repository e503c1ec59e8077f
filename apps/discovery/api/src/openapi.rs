//! OpenAPI documentation configuration

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Discovery API",
        version = "0.1.0",
        description = "Review submission and geofiltered semantic search over local businesses",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api", api = domain_discovery::ApiDoc)
    )
)]
pub struct ApiDoc;
