use async_trait::async_trait;
use mongodb::{
    Collection, Database,
    bson::{DateTime, doc},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::collections;
use crate::error::DiscoveryResult;
use crate::models::{ResumeToken, SyncCheckpoint};
use crate::store::CheckpointStore;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointDocument {
    #[serde(rename = "_id")]
    name: String,
    last_position: Option<String>,
    resume_token: Option<String>,
    processed: i64,
    updated_at: DateTime,
}

impl From<CheckpointDocument> for SyncCheckpoint {
    fn from(doc: CheckpointDocument) -> Self {
        Self {
            last_position: doc.last_position,
            resume_token: doc.resume_token.map(ResumeToken),
            processed: doc.processed.max(0) as u64,
        }
    }
}

/// Sync progress in the geo store's `sync_checkpoints` collection, one document
/// per sync mode.
#[derive(Clone)]
pub struct MongoCheckpointStore {
    checkpoints: Collection<CheckpointDocument>,
}

impl MongoCheckpointStore {
    pub fn new(db: &Database) -> Self {
        Self {
            checkpoints: db.collection(collections::SYNC_CHECKPOINTS),
        }
    }
}

#[async_trait]
impl CheckpointStore for MongoCheckpointStore {
    #[instrument(skip(self))]
    async fn load(&self, name: &str) -> DiscoveryResult<Option<SyncCheckpoint>> {
        let found = self.checkpoints.find_one(doc! { "_id": name }).await?;
        Ok(found.map(SyncCheckpoint::from))
    }

    #[instrument(skip(self, checkpoint), fields(processed = checkpoint.processed))]
    async fn save(&self, name: &str, checkpoint: &SyncCheckpoint) -> DiscoveryResult<()> {
        let document = CheckpointDocument {
            name: name.to_string(),
            last_position: checkpoint.last_position.clone(),
            resume_token: checkpoint.resume_token.as_ref().map(|t| t.0.clone()),
            processed: i64::try_from(checkpoint.processed).unwrap_or(i64::MAX),
            updated_at: DateTime::now(),
        };
        self.checkpoints
            .replace_one(doc! { "_id": name }, &document)
            .upsert(true)
            .await?;
        Ok(())
    }
}
