use std::fmt;
use std::str::FromStr;

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_parse};

/// Read routing applied to the client's default selection criteria.
///
/// Transactions always pin the primary regardless of this setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadPreferenceMode {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl FromStr for ReadPreferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "primary" => Ok(Self::Primary),
            "primarypreferred" => Ok(Self::PrimaryPreferred),
            "secondary" => Ok(Self::Secondary),
            "secondarypreferred" => Ok(Self::SecondaryPreferred),
            "nearest" => Ok(Self::Nearest),
            other => Err(format!("unknown read preference '{other}'")),
        }
    }
}

impl fmt::Display for ReadPreferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::PrimaryPreferred => "primaryPreferred",
            Self::Secondary => "secondary",
            Self::SecondaryPreferred => "secondaryPreferred",
            Self::Nearest => "nearest",
        };
        f.write_str(name)
    }
}

/// Connection settings for one MongoDB deployment.
///
/// The discovery services talk to two deployments (the geo store and the user
/// directory), so every environment variable can be namespaced with a prefix,
/// see [`MongoConfig::from_env_with_prefix`].
#[derive(Clone, Debug)]
pub struct MongoConfig {
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    pub url: String,
    pub database: String,
    pub app_name: Option<String>,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
    pub read_preference: ReadPreferenceMode,
    /// Acknowledge writes only once a majority of the replica set has them
    pub majority_writes: bool,
}

impl MongoConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_database(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::new(url)
        }
    }

    pub fn with_pool_size(mut self, max_pool_size: u32, min_pool_size: u32) -> Self {
        self.max_pool_size = max_pool_size;
        self.min_pool_size = min_pool_size;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_read_preference(mut self, mode: ReadPreferenceMode) -> Self {
        self.read_preference = mode;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "yelp_data".to_string(),
            app_name: None,
            max_pool_size: 50,
            min_pool_size: 10,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
            read_preference: ReadPreferenceMode::Primary,
            majority_writes: true,
        }
    }
}

#[cfg(feature = "config")]
impl MongoConfig {
    /// Load settings from `{PREFIX}_MONGODB_*` variables.
    ///
    /// - `{PREFIX}_MONGODB_URL` (required)
    /// - `{PREFIX}_MONGODB_DATABASE` (default: `yelp_data`)
    /// - `{PREFIX}_MONGODB_APP_NAME`
    /// - `{PREFIX}_MONGODB_MAX_POOL_SIZE` (default: 50)
    /// - `{PREFIX}_MONGODB_MIN_POOL_SIZE` (default: 10)
    /// - `{PREFIX}_MONGODB_CONNECT_TIMEOUT_SECS` (default: 10)
    /// - `{PREFIX}_MONGODB_SERVER_SELECTION_TIMEOUT_SECS` (default: 30)
    /// - `{PREFIX}_MONGODB_READ_PREFERENCE` (default: `primary`)
    /// - `{PREFIX}_MONGODB_MAJORITY_WRITES` (default: true)
    ///
    /// An empty prefix reads the bare `MONGODB_*` names.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let url_key = prefixed(prefix, "URL");
        let url = std::env::var(&url_key).map_err(|_| ConfigError::MissingEnvVar(url_key))?;
        Self::load(prefix, url)
    }

    fn load(prefix: &str, url: String) -> Result<Self, ConfigError> {
        let key = |name: &str| prefixed(prefix, name);
        let defaults = Self::default();

        Ok(Self {
            url,
            database: std::env::var(key("DATABASE")).unwrap_or(defaults.database),
            app_name: std::env::var(key("APP_NAME")).ok(),
            max_pool_size: env_parse(&key("MAX_POOL_SIZE"), defaults.max_pool_size)?,
            min_pool_size: env_parse(&key("MIN_POOL_SIZE"), defaults.min_pool_size)?,
            connect_timeout_secs: env_parse(
                &key("CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout_secs,
            )?,
            server_selection_timeout_secs: env_parse(
                &key("SERVER_SELECTION_TIMEOUT_SECS"),
                defaults.server_selection_timeout_secs,
            )?,
            read_preference: env_parse(&key("READ_PREFERENCE"), defaults.read_preference)?,
            majority_writes: env_parse(&key("MAJORITY_WRITES"), defaults.majority_writes)?,
        })
    }
}

#[cfg(feature = "config")]
fn prefixed(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        format!("MONGODB_{name}")
    } else {
        format!("{prefix}_MONGODB_{name}")
    }
}

/// `MONGODB_URL` (falling back to `MONGO_URL`) plus the unprefixed `MONGODB_*` settings.
#[cfg(feature = "config")]
impl FromEnv for MongoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("MONGODB_URL")
            .or_else(|_| std::env::var("MONGO_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("MONGODB_URL or MONGO_URL".to_string()))?;
        Self::load("", url)
    }
}
