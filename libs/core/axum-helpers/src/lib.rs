//! # Axum Helpers
//!
//! Shared HTTP plumbing for the discovery services.
//!
//! - **[`server`]**: documented router, health/readiness, graceful shutdown
//! - **[`errors`]**: [`AppError`] and the JSON error body with stable codes
//! - **[`extractors`]**: validating JSON and query extractors

pub mod errors;
pub mod extractors;
pub mod server;

pub use errors::{AppError, ErrorCode, ErrorResponse};
pub use extractors::{ValidatedJson, ValidatedQuery};
pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_production_app,
    create_router, health_router, run_health_checks, shutdown_signal,
};
