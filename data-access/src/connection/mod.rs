//! Connections to the supported backends.
//!
//! Every backend implements [`Connection`]: it is built from a configuration
//! map, derives its connection string from those parameters, and can be
//! connected, health-checked and disconnected. Relational backends also
//! implement [`SqlConnection`], which exposes the reflected schema and the
//! user-defined table registry.

mod mongodb;
mod mysql;
mod postgres;
mod redis;
mod relational;
mod sqlite;

use std::any::Any;
use std::fmt::Debug;

use async_trait::async_trait;

use common::models::{ConfigMap, ConnectionItem, ConnectionKind};
use common::AppResult;

use crate::sql::{SqlEngine, TableDefinition};

pub use self::mongodb::MongoDbConnection;
pub use self::mysql::MySqlConnection;
pub use self::postgres::PostgresConnection;
pub use self::redis::RedisConnection;
pub use self::sqlite::SqliteConnection;

/// Construction from a raw configuration map.
pub trait FromConfig: Sized {
    /// Keys that must be present in the map.
    const REQUIRED_KEYS: &'static [&'static str];

    /// Validates and stores parameters. Does not open any network connection.
    ///
    /// # Errors
    /// `AppError::MissingConfigurationKey` naming exactly the absent
    /// required keys, or a validation error for unusable values.
    fn from_config(config: &ConfigMap) -> AppResult<Self>;
}

/// A configured connection to one backend.
///
/// Lifecycle: created disconnected, `connect` acquires a live client
/// (replacing any previous one), `disconnect` releases it. Methods that need
/// a client fail with `AppError::NotConnected` while disconnected.
#[async_trait]
pub trait Connection: Debug + Send + Sync {
    /// Configured connection name.
    fn name(&self) -> &str;

    fn kind(&self) -> ConnectionKind;

    fn is_connected(&self) -> bool;

    /// Credential-free summary.
    fn describe(&self) -> ConnectionItem;

    /// Establishes the live client.
    async fn connect(&mut self) -> AppResult<()>;

    /// Releases the live client. A no-op when not connected.
    async fn disconnect(&mut self) -> AppResult<()>;

    /// Round-trips a trivial request. Never fails: any error, including not
    /// being connected, yields `false`.
    async fn check_health(&self) -> bool;

    /// Connection string derived purely from the stored parameters.
    fn create_connection_string(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    /// Relational view of this connection, if it has one.
    fn as_sql(&self) -> Option<&dyn SqlConnection> {
        None
    }

    fn as_sql_mut(&mut self) -> Option<&mut dyn SqlConnection> {
        None
    }
}

/// Relational connection with schema reflection and user-defined tables.
#[async_trait]
pub trait SqlConnection: Connection {
    /// Live engine.
    ///
    /// # Errors
    /// `AppError::NotConnected` while disconnected.
    fn engine(&self) -> AppResult<&SqlEngine>;

    /// Queues a table definition for `create_all_user_defined_models`.
    /// Re-registering a name replaces the earlier definition.
    fn register_model(&mut self, definition: TableDefinition) -> AppResult<()>;

    /// Registered table definitions.
    fn models(&self) -> &[TableDefinition];

    /// Creates every registered table that does not exist yet, then
    /// re-reflects the schema.
    async fn create_all_user_defined_models(&mut self) -> AppResult<()>;

    /// Re-reflects the schema.
    async fn refresh_schema(&mut self) -> AppResult<()>;
}

/// Implements [`SqlConnection`] by delegating to the `state` field.
macro_rules! impl_sql_connection {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::connection::SqlConnection for $ty {
            fn engine(&self) -> common::AppResult<&$crate::sql::SqlEngine> {
                self.state.engine(&self.params.name)
            }

            fn register_model(
                &mut self,
                definition: $crate::sql::TableDefinition,
            ) -> common::AppResult<()> {
                self.state.register_model(definition)
            }

            fn models(&self) -> &[$crate::sql::TableDefinition] {
                self.state.models()
            }

            async fn create_all_user_defined_models(&mut self) -> common::AppResult<()> {
                self.state.create_all(&self.params.name).await
            }

            async fn refresh_schema(&mut self) -> common::AppResult<()> {
                self.state.refresh_schema(&self.params.name).await
            }
        }
    };
}

pub(crate) use impl_sql_connection;
