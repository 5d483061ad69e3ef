//! Data sources: operation facades over a borrowed connection.
//!
//! A data source owns no state of its own. It borrows one connection and
//! opens a fresh unit of work for every call.

mod mongodb;
mod redis;
mod sql;

use async_trait::async_trait;

use common::models::Record;
use common::AppResult;

use crate::connection::Connection;

pub use self::mongodb::MongoDataSource;
pub use self::redis::RedisDataSource;
pub use self::sql::{JoinedRecord, SqlDataSource};

/// Common surface of every data source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The connection this source operates on.
    fn connection(&self) -> &dyn Connection;

    fn name(&self) -> &str {
        self.connection().name()
    }

    async fn check_health(&self) -> bool {
        self.connection().check_health().await
    }
}

/// A data source whose entities (tables, collections) can be read whole.
#[async_trait]
pub trait RecordSource: DataSource {
    /// Every record of `entity`, optionally filtered by a backend-native
    /// predicate (a SQL boolean expression, or a JSON filter document).
    async fn fetch_records(&self, entity: &str, filter: Option<&str>) -> AppResult<Vec<Record>>;
}
