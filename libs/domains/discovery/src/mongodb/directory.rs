use async_trait::async_trait;
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tracing::{info, instrument};

use super::collections;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::User;
use crate::store::DirectoryStore;

/// User directory on its own MongoDB deployment.
#[derive(Clone)]
pub struct MongoDirectoryStore {
    users: Collection<User>,
}

impl MongoDirectoryStore {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection(collections::USERS),
        }
    }

    pub async fn init_indexes(&self) -> DiscoveryResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("idx_user_id_unique".to_string())
                    .build(),
            )
            .build();
        self.users.create_index(index).await?;
        info!("directory indexes created");
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for MongoDirectoryStore {
    #[instrument(skip(self))]
    async fn find_user(&self, user_id: &str) -> DiscoveryResult<Option<User>> {
        Ok(self.users.find_one(doc! { "user_id": user_id }).await?)
    }

    #[instrument(skip(self))]
    async fn increment_review_count(&self, user_id: &str) -> DiscoveryResult<()> {
        let result = self
            .users
            .update_one(
                doc! { "user_id": user_id },
                doc! { "$inc": { "review_count": 1 } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(DiscoveryError::UserNotFound(user_id.to_string()));
        }
        Ok(())
    }
}
