//! MongoDB adapters: the geo store (businesses and reviews), the user directory
//! and the sync checkpoint store.

mod checkpoint;
mod directory;
mod geo_store;

pub use checkpoint::MongoCheckpointStore;
pub use directory::MongoDirectoryStore;
pub use geo_store::MongoGeoStore;

/// Collection names shared by the adapters.
pub mod collections {
    pub const BUSINESSES: &str = "businesses";
    pub const REVIEWS: &str = "reviews";
    pub const USERS: &str = "users";
    pub const SYNC_CHECKPOINTS: &str = "sync_checkpoints";
}
