//! Shared test utilities for domain testing
//!
//! - `TestMongo`: MongoDB replica set container with automatic cleanup (feature: "mongo")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! #[ignore] // Requires Docker
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let db = mongo.database(&builder.name("db", "main"));
//!     let business_id = builder.id("business", 1);
//! }
//! ```

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

use uuid::Uuid;

/// Mean Earth radius used by spherical distance helpers, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// This is the recommended way to create a builder for consistent test data.
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_submit_review");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic UUID for the `n`th entity of this test
    pub fn uuid(&self, n: u64) -> Uuid {
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&self.seed.to_le_bytes());
        uuid_bytes[8..16].copy_from_slice(&n.to_le_bytes());
        Uuid::from_bytes(uuid_bytes)
    }

    /// Dataset-style string id, e.g. `business-<seed>-3`
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.id("business", 3), "business-7-3");
    /// ```
    pub fn id(&self, prefix: &str, n: u64) -> String {
        format!("{}-{}-{}", prefix, self.seed, n)
    }

    /// Generate a unique name for testing
    ///
    /// # Arguments
    ///
    /// * `prefix` - The type of resource (e.g., "db", "collection")
    /// * `suffix` - A unique identifier within the test (e.g., "main", "backup")
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

/// Point `north_m` meters north and `east_m` meters east of `(longitude, latitude)`.
///
/// Small-offset approximation, accurate to well under a meter for a few kilometers.
pub fn offset_point(longitude: f64, latitude: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    let d_lat = (north_m / EARTH_RADIUS_METERS).to_degrees();
    let d_lng = (east_m / (EARTH_RADIUS_METERS * latitude.to_radians().cos())).to_degrees();
    (longitude + d_lng, latitude + d_lat)
}

/// Great-circle distance between two `(longitude, latitude)` points, in meters.
pub fn haversine_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lng1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lng2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that two floats agree to within `tolerance`
    pub fn assert_close(actual: f64, expected: f64, tolerance: f64, context: &str) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "{}: expected {} (+/- {}), got {}",
            context,
            expected,
            tolerance,
            actual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::new(42);
        let builder2 = TestDataBuilder::new(42);

        assert_eq!(builder1.uuid(1), builder2.uuid(1));
        assert_ne!(builder1.uuid(1), builder1.uuid(2));
        assert_eq!(builder1.id("user", 1), builder2.id("user", 1));
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        // Different test names should generate different data
        assert_ne!(builder1.uuid(0), builder2.uuid(0));
    }

    #[test]
    fn test_offset_point_distance() {
        let origin = (-110.97, 32.22);
        let moved = offset_point(origin.0, origin.1, 3000.0, 4000.0);
        assertions::assert_close(haversine_meters(origin, moved), 5000.0, 5.0, "offset");
    }

    #[test]
    fn test_haversine_zero() {
        assert_eq!(haversine_meters((10.0, 20.0), (10.0, 20.0)), 0.0);
    }
}
