use mongodb::bson::doc;
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria, WriteConcern};
use mongodb::Client;
use std::time::Duration;
use tracing::info;

use super::{MongoConfig, ReadPreferenceMode};
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry, retry_with_backoff};

fn read_preference(mode: ReadPreferenceMode) -> ReadPreference {
    match mode {
        ReadPreferenceMode::Primary => ReadPreference::Primary,
        ReadPreferenceMode::PrimaryPreferred => ReadPreference::PrimaryPreferred { options: None },
        ReadPreferenceMode::Secondary => ReadPreference::Secondary { options: None },
        ReadPreferenceMode::SecondaryPreferred => {
            ReadPreference::SecondaryPreferred { options: None }
        }
        ReadPreferenceMode::Nearest => ReadPreference::Nearest { options: None },
    }
}

/// Build a client from `config` and verify it with a `ping` against `admin`.
///
/// ```ignore
/// let geo = connect_from_config(&MongoConfig::from_env()?).await?;
/// let directory = connect_from_config(&MongoConfig::from_env_with_prefix("DIRECTORY")?).await?;
/// ```
pub async fn connect_from_config(config: &MongoConfig) -> DatabaseResult<Client> {
    info!(
        database = %config.database,
        read_preference = %config.read_preference,
        "connecting to MongoDB"
    );

    let mut options = ClientOptions::parse(&config.url).await?;
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));
    options.selection_criteria = Some(SelectionCriteria::ReadPreference(read_preference(
        config.read_preference,
    )));
    if config.majority_writes {
        options.write_concern = Some(WriteConcern::majority());
    }
    if let Some(ref app_name) = config.app_name {
        options.app_name = Some(app_name.clone());
    }

    let client = Client::with_options(options)?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!(database = %config.database, "connected to MongoDB");
    Ok(client)
}

/// [`connect_from_config`] with exponential backoff, for services that start
/// alongside their database.
pub async fn connect_from_config_with_retry(
    config: &MongoConfig,
    retry_config: Option<RetryConfig>,
) -> DatabaseResult<Client> {
    match retry_config {
        Some(retry_config) => retry_with_backoff(|| connect_from_config(config), retry_config).await,
        None => retry(|| connect_from_config(config)).await,
    }
}
