//! Connection management and storage helpers shared by the discovery services.
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB connector, configuration and health checks
//! - `config` - `core_config::FromEnv` implementations for the configuration types
//!
//! ```ignore
//! use database::mongodb::{MongoConfig, connect_from_config};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017/?replicaSet=rs0", "yelp_data");
//! let client = connect_from_config(&config).await?;
//! let businesses = client.database(config.database()).collection::<Document>("businesses");
//! ```

pub mod common;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{DatabaseError, DatabaseResult};
