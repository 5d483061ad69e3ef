//! Relational data source over a reflected schema.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use common::models::{QueryResult, Record};
use common::{AppError, AppResult};

use super::{DataSource, RecordSource};
use crate::connection::{Connection, SqlConnection};
use crate::sql::statement::{self, JoinKind, StatementBuilder};
use crate::sql::{Dialect, SqlEngine, TableSchema};

/// One row of a join: the primary table's record and the secondary's.
///
/// A side is `None` when the outer join found no matching row for it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct JoinedRecord {
    #[schema(value_type = Option<Object>)]
    pub primary: Option<Record>,
    #[schema(value_type = Option<Object>)]
    pub secondary: Option<Record>,
}

/// CRUD, query and join operations over a relational connection.
///
/// Reads run on a pooled connection; every mutation runs in its own
/// transaction.
#[derive(Clone, Copy)]
pub struct SqlDataSource<'c> {
    connection: &'c dyn Connection,
    sql: &'c dyn SqlConnection,
}

impl<'c> SqlDataSource<'c> {
    /// Wraps a relational connection.
    ///
    /// # Errors
    /// `AppError::UnsupportedOperation` when the connection is not relational.
    pub fn new(connection: &'c dyn Connection) -> AppResult<Self> {
        let sql = connection.as_sql().ok_or_else(|| {
            AppError::UnsupportedOperation(format!(
                "{} connection {} is not relational",
                connection.kind(),
                connection.name()
            ))
        })?;
        Ok(Self { connection, sql })
    }

    fn engine(&self) -> AppResult<&'c SqlEngine> {
        self.sql.engine()
    }

    fn dialect(&self) -> AppResult<Dialect> {
        Ok(self.engine()?.dialect())
    }

    /// Reflected definition of a table.
    ///
    /// # Errors
    /// `AppError::UnknownTable` when the table was not reflected.
    pub fn get_model(&self, table: &str) -> AppResult<&'c TableSchema> {
        self.engine()?.schema().table(table)
    }

    /// Names of every reflected table.
    pub fn tables(&self) -> AppResult<Vec<&'c str>> {
        Ok(self.engine()?.schema().table_names())
    }

    fn builder(&self, table: &str) -> AppResult<StatementBuilder<'c>> {
        let engine = self.engine()?;
        Ok(StatementBuilder::new(engine.dialect(), engine.schema().table(table)?))
    }

    /// Inserts a record and returns its primary key value.
    ///
    /// The key comes from the record when it supplies a non-null one,
    /// otherwise from the database. Tables without a primary key yield `null`.
    pub async fn insert(&self, table: &str, data: &Record) -> AppResult<Value> {
        let engine = self.engine()?;
        let model = engine.schema().table(table)?;
        let stmt = StatementBuilder::new(engine.dialect(), model).insert(data)?;
        let generated = engine.pool().insert(&stmt.sql, &stmt.params).await?;

        let key = model
            .primary_key
            .first()
            .and_then(|pk| data.get(pk).cloned())
            .filter(|value| !value.is_null())
            .or(generated)
            .unwrap_or(Value::Null);
        tracing::debug!(table = %table, key = %key, "Record inserted");
        Ok(key)
    }

    /// Sets the given fields on the row with primary key `id`.
    ///
    /// Returns whether such a row exists. An empty `data` only checks
    /// existence.
    pub async fn update(
        &self,
        table: &str,
        id: impl Into<Value> + Send,
        data: &Record,
    ) -> AppResult<bool> {
        let id = id.into();
        if data.is_empty() {
            return self.exists(table, id).await;
        }
        let stmt = self.builder(table)?.update(id.clone(), data)?;
        let affected = self.engine()?.pool().execute(&stmt.sql, &stmt.params).await?;
        // MySQL counts changed rows, so an update writing identical values reports 0.
        if affected == 0 && self.dialect()? == Dialect::MySql {
            return self.exists(table, id).await;
        }
        Ok(affected > 0)
    }

    /// Deletes the row with primary key `id`. Returns whether a row was deleted.
    pub async fn remove(&self, table: &str, id: impl Into<Value> + Send) -> AppResult<bool> {
        let stmt = self.builder(table)?.delete(id.into())?;
        let affected = self.engine()?.pool().execute(&stmt.sql, &stmt.params).await?;
        Ok(affected > 0)
    }

    pub async fn exists(&self, table: &str, id: impl Into<Value> + Send) -> AppResult<bool> {
        let stmt = self.builder(table)?.exists(id.into())?;
        let result = self.engine()?.pool().fetch(&stmt.sql, &stmt.params).await?;
        Ok(result.row_count > 0)
    }

    /// Number of rows, optionally restricted by a raw SQL predicate.
    pub async fn count(&self, table: &str, filter: Option<&str>) -> AppResult<u64> {
        let stmt = self.builder(table)?.count(filter)?;
        let result = self.engine()?.pool().fetch(&stmt.sql, &stmt.params).await?;
        Ok(result
            .into_scalar()
            .and_then(|count| count.as_u64())
            .unwrap_or(0))
    }

    pub async fn find_by_id(
        &self,
        table: &str,
        id: impl Into<Value> + Send,
    ) -> AppResult<Option<Record>> {
        let model = self.get_model(table)?;
        let key = model.id_column()?;
        let stmt = self.builder(table)?.select_where(&key.name, id.into())?;
        let result = self.engine()?.pool().fetch(&stmt.sql, &stmt.params).await?;
        Ok(result.records().into_iter().next())
    }

    /// Every row, optionally restricted by a raw SQL predicate, in primary key order.
    pub async fn find_all(&self, table: &str, filter: Option<&str>) -> AppResult<Vec<Record>> {
        let stmt = self.builder(table)?.select_all(filter)?;
        let result = self.engine()?.pool().fetch(&stmt.sql, &stmt.params).await?;
        tracing::debug!(table = %table, rows = result.row_count, "Records fetched");
        Ok(result.records())
    }

    /// Rows whose `field` equals `value`.
    pub async fn find_by_field(
        &self,
        table: &str,
        field: &str,
        value: impl Into<Value> + Send,
    ) -> AppResult<Vec<Record>> {
        let stmt = self.builder(table)?.select_where(field, value.into())?;
        let result = self.engine()?.pool().fetch(&stmt.sql, &stmt.params).await?;
        Ok(result.records())
    }

    /// Executes raw SQL with positional parameters in a transaction.
    ///
    /// Statements that produce rows yield them; anything else yields the
    /// affected row count.
    pub async fn query(&self, sql: &str, params: &[Value]) -> AppResult<QueryResult> {
        self.engine()?.pool().run(sql, params).await
    }

    /// Joins two tables on a column both have, optionally filtered by a raw
    /// SQL predicate (columns may be qualified by table name).
    pub async fn join(
        &self,
        kind: JoinKind,
        primary: &str,
        secondary: &str,
        on_field: &str,
        filter: Option<&str>,
    ) -> AppResult<Vec<JoinedRecord>> {
        let engine = self.engine()?;
        let primary = engine.schema().table(primary)?;
        let secondary = engine.schema().table(secondary)?;
        let stmt = statement::join(engine.dialect(), kind, primary, secondary, on_field, filter)?;
        let result = engine.pool().fetch(&stmt.sql, &stmt.params).await?;

        let split = primary.columns.len();
        Ok(result
            .rows
            .into_iter()
            .map(|mut row| {
                let right = row.split_off(split.min(row.len()));
                JoinedRecord {
                    primary: side(primary, row),
                    secondary: side(secondary, right),
                }
            })
            .collect())
    }

    pub async fn inner_join(
        &self,
        primary: &str,
        secondary: &str,
        on_field: &str,
        filter: Option<&str>,
    ) -> AppResult<Vec<JoinedRecord>> {
        self.join(JoinKind::Inner, primary, secondary, on_field, filter)
            .await
    }

    pub async fn left_join(
        &self,
        primary: &str,
        secondary: &str,
        on_field: &str,
        filter: Option<&str>,
    ) -> AppResult<Vec<JoinedRecord>> {
        self.join(JoinKind::Left, primary, secondary, on_field, filter)
            .await
    }

    pub async fn right_join(
        &self,
        primary: &str,
        secondary: &str,
        on_field: &str,
        filter: Option<&str>,
    ) -> AppResult<Vec<JoinedRecord>> {
        self.join(JoinKind::Right, primary, secondary, on_field, filter)
            .await
    }
}

/// Zips one side of a joined row with its table's columns. An all-null side
/// is the missing side of an outer join.
fn side(table: &TableSchema, values: Vec<Value>) -> Option<Record> {
    if values.iter().all(Value::is_null) {
        return None;
    }
    Some(
        table
            .column_names()
            .map(str::to_string)
            .zip(values)
            .collect(),
    )
}

#[async_trait]
impl DataSource for SqlDataSource<'_> {
    fn connection(&self) -> &dyn Connection {
        self.connection
    }
}

#[async_trait]
impl RecordSource for SqlDataSource<'_> {
    async fn fetch_records(&self, entity: &str, filter: Option<&str>) -> AppResult<Vec<Record>> {
        self.find_all(entity, filter).await
    }
}
