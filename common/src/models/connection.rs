//! Connection configuration models.
//!
//! A connection is described by a loosely-typed configuration map (one entry
//! of the connections YAML file). Each backend validates that the keys it
//! needs are present, then deserializes the map into one of the typed
//! parameter structs below.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::{AppError, AppResult};

/// Raw per-connection configuration map.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Key holding the connection type tag.
pub const TYPE_KEY: &str = "type";

/// Backend kind behind a connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// MySQL database.
    MySql,
    /// PostgreSQL database.
    Postgres,
    /// SQLite database (file or in-memory).
    Sqlite,
    /// MongoDB document store.
    MongoDb,
    /// Redis key-value store.
    Redis,
}

impl ConnectionKind {
    /// Type tag used in configuration files.
    pub fn tag(&self) -> &'static str {
        match self {
            ConnectionKind::MySql => "mysql",
            ConnectionKind::Postgres => "postgres",
            ConnectionKind::Sqlite => "sqlite",
            ConnectionKind::MongoDb => "mongodb",
            ConnectionKind::Redis => "redis",
        }
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// TLS material. Only used when all three paths are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SslConfig {
    /// Client private key path.
    pub key: Option<String>,
    /// Client certificate path.
    pub cert: Option<String>,
    /// CA certificate path.
    pub ca: Option<String>,
}

/// Complete TLS material, borrowed from an [`SslConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsPaths<'a> {
    pub key: &'a str,
    pub cert: &'a str,
    pub ca: &'a str,
}

impl SslConfig {
    /// Returns the paths only when key, cert and CA are all supplied.
    pub fn complete(&self) -> Option<TlsPaths<'_>> {
        match (&self.key, &self.cert, &self.ca) {
            (Some(key), Some(cert), Some(ca)) => Some(TlsPaths { key, cert, ca }),
            _ => None,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// Pool tuning shared by every backend. Both keys are optional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct PoolSettings {
    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, message = "max_connections must be at least 1"))]
    pub max_connections: u32,
    /// Connect / acquire timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl PoolSettings {
    /// Connect timeout as a [`std::time::Duration`].
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_mysql_driver() -> String {
    "mysql+pymysql".to_string()
}

/// Accepts a string, number or bool and keeps its textual form, so unquoted
/// YAML scalars such as `password: 123456` are usable as strings.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "invalid type: {}, expected a string or number",
            other
        ))),
    }
}

fn optional_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => scalar_string(value).map(Some).map_err(D::Error::custom),
    }
}

/// Parameters of a networked relational database (MySQL, PostgreSQL).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RelationalParams {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    #[validate(length(min = 1, message = "Host must not be empty"))]
    pub host: String,
    pub port: u16,
    #[validate(length(min = 1, message = "Database must not be empty"))]
    #[serde(deserialize_with = "scalar_string")]
    pub database: String,
    #[serde(deserialize_with = "scalar_string")]
    pub username: String,
    #[serde(deserialize_with = "scalar_string")]
    pub password: String,
    /// URI scheme used in the connection string (MySQL only).
    #[serde(default = "default_mysql_driver")]
    pub driver: String,
    #[serde(default)]
    pub ssl: SslConfig,
    #[serde(flatten)]
    #[validate(nested)]
    pub pool: PoolSettings,
}

/// Parameters of an embedded relational database (SQLite).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmbeddedParams {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    /// Database file path, or `:memory:`.
    #[validate(length(min = 1, message = "Database must not be empty"))]
    #[serde(deserialize_with = "scalar_string")]
    pub database: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub pool: PoolSettings,
}

/// Parameters of a MongoDB deployment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DocumentParams {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    #[validate(length(min = 1, message = "Host must not be empty"))]
    pub host: String,
    pub port: u16,
    #[serde(deserialize_with = "scalar_string")]
    pub username: String,
    #[serde(deserialize_with = "scalar_string")]
    pub password: String,
    /// Default database for document data sources.
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub database: Option<String>,
    #[serde(default)]
    pub ssl: SslConfig,
    #[serde(flatten)]
    #[validate(nested)]
    pub pool: PoolSettings,
}

/// Parameters of a Redis server.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct KeyValueParams {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    #[validate(length(min = 1, message = "Host must not be empty"))]
    pub host: String,
    pub port: u16,
    pub database_index: u32,
    #[serde(deserialize_with = "scalar_string")]
    pub password: String,
    #[serde(default)]
    pub ssl: SslConfig,
    #[serde(flatten)]
    #[validate(nested)]
    pub pool: PoolSettings,
}

/// Fails with [`AppError::MissingConfigurationKey`] naming every required key
/// absent from `config`, in the order they are listed in `required`.
pub fn validate_config_keys(config: &ConfigMap, required: &[&str]) -> AppResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !config.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::missing_keys(missing))
    }
}

/// Checks required keys, deserializes the map and runs value validation.
pub fn parse_params<T>(config: &ConfigMap, required: &[&str]) -> AppResult<T>
where
    T: DeserializeOwned + Validate,
{
    validate_config_keys(config, required)?;
    let params: T = serde_json::from_value(serde_json::Value::Object(config.clone()))
        .map_err(|e| AppError::InvalidConfiguration(e.to_string()))?;
    params
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(params)
}

/// Connection item for API responses (excludes credentials).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ConnectionItem {
    /// Connection name.
    pub name: String,
    /// Backend kind.
    pub kind: ConnectionKind,
    /// Host (networked backends).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port (networked backends).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Database name, file or index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Whether TLS material is fully configured.
    pub tls: bool,
    /// Whether a live client is held.
    pub connected: bool,
}
