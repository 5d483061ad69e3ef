//! Relational plumbing shared by the MySQL, PostgreSQL and SQLite connections.
//!
//! A [`SqlEngine`] is what a relational connection holds while connected:
//! the pool plus the schema reflected from it. Every mutation runs in its own
//! transaction that commits on success and rolls back when dropped on error.

mod decode;
pub mod definition;
pub mod dialect;
pub mod schema;
pub mod statement;

use std::time::Instant;

use futures::TryStreamExt;
use serde_json::Value;
use sqlx::{Either, Executor, MySqlPool, PgPool, SqlitePool};

use common::models::QueryResult;
use common::AppResult;

pub use definition::{ColumnDefinition, ColumnType, TableDefinition};
pub use dialect::Dialect;
pub use schema::{ColumnSchema, SchemaRegistry, TableSchema};
pub use statement::{JoinKind, Statement, StatementBuilder};

use decode::{bind_params, collect_rows};

/// Connection pool for one of the relational backends.
#[derive(Clone, Debug)]
pub enum SqlPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Runs `$body` with `$pool` bound to the concrete pool and `$decode` bound
/// to the matching row decoder.
macro_rules! on_pool {
    ($self:expr, $pool:ident, $decode:ident => $body:expr) => {
        match $self {
            SqlPool::MySql($pool) => {
                let $decode = decode::mysql_row;
                $body
            }
            SqlPool::Postgres($pool) => {
                let $decode = decode::postgres_row;
                $body
            }
            SqlPool::Sqlite($pool) => {
                let $decode = decode::sqlite_row;
                $body
            }
        }
    };
    ($self:expr, $pool:ident => $body:expr) => {
        match $self {
            SqlPool::MySql($pool) => $body,
            SqlPool::Postgres($pool) => $body,
            SqlPool::Sqlite($pool) => $body,
        }
    };
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

impl SqlPool {
    pub fn dialect(&self) -> Dialect {
        match self {
            SqlPool::MySql(_) => Dialect::MySql,
            SqlPool::Postgres(_) => Dialect::Postgres,
            SqlPool::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Runs a row-returning statement on a pooled connection.
    pub async fn fetch(&self, sql: &str, params: &[Value]) -> AppResult<QueryResult> {
        let started = Instant::now();
        tracing::debug!(dialect = %self.dialect(), sql = %sql, params = params.len(), "fetch");
        let (columns, rows) = on_pool!(self, pool, decode_row => {
            let mut conn = pool.acquire().await?;
            let rows = bind_params(sqlx::query(sql), params)
                .fetch_all(&mut *conn)
                .await?;
            collect_rows(&rows, decode_row)?
        });
        Ok(QueryResult::rows(columns, rows).with_duration(elapsed_ms(started)))
    }

    /// Runs a row-returning mutation (`... RETURNING`) inside a transaction.
    pub async fn fetch_in_transaction(&self, sql: &str, params: &[Value]) -> AppResult<QueryResult> {
        let started = Instant::now();
        tracing::debug!(dialect = %self.dialect(), sql = %sql, params = params.len(), "fetch in transaction");
        let (columns, rows) = on_pool!(self, pool, decode_row => {
            let mut tx = pool.begin().await?;
            let rows = bind_params(sqlx::query(sql), params)
                .fetch_all(&mut *tx)
                .await?;
            tx.commit().await?;
            collect_rows(&rows, decode_row)?
        });
        Ok(QueryResult::rows(columns, rows).with_duration(elapsed_ms(started)))
    }

    /// Runs a statement inside a transaction and returns the affected row count.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> AppResult<u64> {
        tracing::debug!(dialect = %self.dialect(), sql = %sql, params = params.len(), "execute");
        let affected = on_pool!(self, pool => {
            let mut tx = pool.begin().await?;
            let done = bind_params(sqlx::query(sql), params)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            done.rows_affected()
        });
        Ok(affected)
    }

    /// Runs arbitrary SQL inside a transaction, keeping whatever it produces.
    ///
    /// Rows come back as a row result; a statement that yields none reports
    /// the affected row count instead.
    pub async fn run(&self, sql: &str, params: &[Value]) -> AppResult<QueryResult> {
        let started = Instant::now();
        tracing::debug!(dialect = %self.dialect(), sql = %sql, params = params.len(), "run");
        let (columns, rows, affected) = on_pool!(self, pool, decode_row => {
            let mut tx = pool.begin().await?;
            let mut rows = Vec::new();
            let mut affected = 0;
            {
                let mut results = (&mut *tx).fetch_many(bind_params(sqlx::query(sql), params));
                while let Some(step) = results.try_next().await? {
                    match step {
                        Either::Left(done) => affected += done.rows_affected(),
                        Either::Right(row) => rows.push(row),
                    }
                }
            }
            tx.commit().await?;
            let (columns, rows) = collect_rows(&rows, decode_row)?;
            (columns, rows, affected)
        });
        if rows.is_empty() {
            Ok(QueryResult::affected(affected, elapsed_ms(started)))
        } else {
            Ok(QueryResult::rows(columns, rows).with_duration(elapsed_ms(started)))
        }
    }

    /// Runs an INSERT inside a transaction and returns the generated key.
    ///
    /// MySQL reports it through `LAST_INSERT_ID()`; the other dialects read it
    /// from the statement's `RETURNING` clause.
    pub async fn insert(&self, sql: &str, params: &[Value]) -> AppResult<Option<Value>> {
        match self {
            SqlPool::MySql(pool) => {
                tracing::debug!(dialect = "mysql", sql = %sql, params = params.len(), "insert");
                let mut tx = pool.begin().await?;
                let done = bind_params(sqlx::query(sql), params)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(match done.last_insert_id() {
                    0 => None,
                    id => Some(Value::from(id)),
                })
            }
            SqlPool::Postgres(_) | SqlPool::Sqlite(_) => {
                Ok(self.fetch_in_transaction(sql, params).await?.into_scalar())
            }
        }
    }

    /// Round-trips `SELECT 1`.
    pub async fn ping(&self) -> AppResult<()> {
        on_pool!(self, pool => {
            sqlx::query("SELECT 1").execute(pool).await?;
        });
        Ok(())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        on_pool!(self, pool => pool.close().await)
    }
}

/// A live relational database: pool plus reflected schema.
#[derive(Debug)]
pub struct SqlEngine {
    pool: SqlPool,
    schema: SchemaRegistry,
}

impl SqlEngine {
    /// Wraps an open pool and reflects its schema.
    pub async fn open(pool: SqlPool) -> AppResult<Self> {
        let schema = reflect(&pool).await?;
        tracing::info!(dialect = %pool.dialect(), tables = schema.len(), "Schema reflected");
        Ok(Self { pool, schema })
    }

    pub fn pool(&self) -> &SqlPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Re-reads the catalog, picking up tables created since connect.
    pub async fn refresh_schema(&mut self) -> AppResult<()> {
        self.schema = reflect(&self.pool).await?;
        tracing::debug!(dialect = %self.dialect(), tables = self.schema.len(), "Schema refreshed");
        Ok(())
    }

    /// Creates a user-defined table if it does not exist.
    pub async fn create_table(&self, definition: &TableDefinition) -> AppResult<()> {
        definition.validate()?;
        let sql = definition.create_sql(self.dialect());
        self.pool.execute(&sql, &[]).await?;
        tracing::info!(table = %definition.name, "Table ensured");
        Ok(())
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.pool.ping().await
    }

    pub async fn close(&self) {
        self.pool.close().await
    }
}

async fn reflect(pool: &SqlPool) -> AppResult<SchemaRegistry> {
    let catalog = pool.fetch(pool.dialect().reflection_query(), &[]).await?;
    Ok(SchemaRegistry::from_catalog(catalog.records()))
}
