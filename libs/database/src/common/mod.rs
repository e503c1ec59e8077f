//! Utilities shared by every store adapter

pub mod error;
pub mod retry;

pub use error::{DatabaseError, DatabaseResult};
pub use retry::{RetryConfig, retry, retry_if, retry_with_backoff};
