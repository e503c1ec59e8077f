mod config;
mod index;

pub use config::QdrantConfig;
pub use index::{QdrantVectorIndex, point_id};
