use std::any::Any;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use common::models::connection::parse_params;
use common::models::{ConfigMap, ConnectionItem, ConnectionKind, EmbeddedParams};
use common::AppResult;

use super::relational::SqlState;
use super::{impl_sql_connection, Connection, FromConfig, SqlConnection};
use crate::sql::SqlPool;

/// Database name selecting a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// SQLite connection over a database file, or an in-memory database.
///
/// The pool holds a single connection that is never recycled, so an
/// in-memory database lives exactly as long as the connection stays open.
#[derive(Debug)]
pub struct SqliteConnection {
    params: EmbeddedParams,
    state: SqlState,
}

impl SqliteConnection {
    pub fn params(&self) -> &EmbeddedParams {
        &self.params
    }

    pub fn is_in_memory(&self) -> bool {
        self.params.database == IN_MEMORY
    }

    fn connect_options(&self) -> AppResult<SqliteConnectOptions> {
        if self.is_in_memory() {
            return Ok(SqliteConnectOptions::from_str("sqlite::memory:")?);
        }
        Ok(SqliteConnectOptions::new()
            .filename(&self.params.database)
            .create_if_missing(true))
    }
}

impl FromConfig for SqliteConnection {
    const REQUIRED_KEYS: &'static [&'static str] = &["name", "database"];

    fn from_config(config: &ConfigMap) -> AppResult<Self> {
        Ok(Self {
            params: parse_params(config, Self::REQUIRED_KEYS)?,
            state: SqlState::default(),
        })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn name(&self) -> &str {
        &self.params.name
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Sqlite
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn describe(&self) -> ConnectionItem {
        ConnectionItem {
            name: self.params.name.clone(),
            kind: self.kind(),
            host: None,
            port: None,
            database: Some(self.params.database.clone()),
            tls: false,
            connected: self.is_connected(),
        }
    }

    async fn connect(&mut self) -> AppResult<()> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.params.pool.connect_timeout())
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(self.connect_options()?)
            .await?;
        self.state
            .attach(&self.params.name, SqlPool::Sqlite(pool))
            .await
    }

    async fn disconnect(&mut self) -> AppResult<()> {
        self.state.detach(&self.params.name).await;
        Ok(())
    }

    async fn check_health(&self) -> bool {
        self.state.check_health(&self.params.name).await
    }

    /// `sqlite:///<database>`
    fn create_connection_string(&self) -> String {
        format!("sqlite:///{}", self.params.database)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_sql(&self) -> Option<&dyn SqlConnection> {
        Some(self)
    }

    fn as_sql_mut(&mut self) -> Option<&mut dyn SqlConnection> {
        Some(self)
    }
}

impl_sql_connection!(SqliteConnection);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{ColumnDefinition, ColumnType, TableDefinition};
    use common::AppError;
    use serde_json::json;

    fn memory() -> SqliteConnection {
        SqliteConnection::from_config(&json!({"name": "mem", "database": ":memory:"})
            .as_object()
            .cloned()
            .unwrap())
        .unwrap()
    }

    #[test]
    fn test_connection_string() {
        assert_eq!(memory().create_connection_string(), "sqlite:///:memory:");
        assert!(memory().is_in_memory());
    }

    #[test]
    fn test_missing_database() {
        let err = SqliteConnection::from_config(&json!({"name": "x"}).as_object().cloned().unwrap())
            .unwrap_err();
        assert!(matches!(err, AppError::MissingConfigurationKey(keys) if keys == vec!["database"]));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mut conn = memory();
        assert!(!conn.check_health().await);

        conn.connect().await.unwrap();
        assert!(conn.is_connected());
        assert!(conn.check_health().await);
        assert!(conn.describe().connected);
        assert!(conn.engine().unwrap().schema().is_empty());

        conn.disconnect().await.unwrap();
        assert!(!conn.is_connected());
        assert!(!conn.check_health().await);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_user_defined_models_are_created_and_reflected() {
        let mut conn = memory();
        conn.register_model(
            TableDefinition::new("phones")
                .column(
                    ColumnDefinition::new("id", ColumnType::Integer)
                        .primary_key()
                        .auto_increment(),
                )
                .column(ColumnDefinition::new("model", ColumnType::String(255)).not_null())
                .column(ColumnDefinition::new("version", ColumnType::Integer)),
        )
        .unwrap();
        conn.connect().await.unwrap();
        conn.create_all_user_defined_models().await.unwrap();

        let schema = conn.engine().unwrap().schema();
        let phones = schema.table("phones").unwrap();
        assert_eq!(phones.primary_key, vec!["id"]);
        assert!(phones.column("id").unwrap().auto_increment);
        assert!(!phones.column("model").unwrap().nullable);
        assert!(phones.column("version").unwrap().nullable);

        // idempotent
        conn.create_all_user_defined_models().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_replaces_engine() {
        let mut conn = memory();
        conn.connect().await.unwrap();
        conn.connect().await.unwrap();
        assert!(conn.check_health().await);
    }
}
