//! SQL query result models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::Record;

/// Result of a SQL statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct QueryResult {
    /// Column information.
    pub columns: Vec<ColumnInfo>,

    /// Row data (each row is a vector of JSON values, aligned with `columns`).
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned.
    #[serde(default)]
    pub row_count: usize,

    /// Number of rows affected (for INSERT/UPDATE/DELETE).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,

    /// Execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: u64,
}

/// Column information in a query result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Driver-reported column type.
    pub data_type: String,

    /// Whether the column is nullable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a result carrying fetched rows.
    pub fn rows(columns: Vec<ColumnInfo>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            columns,
            row_count: rows.len(),
            rows,
            affected_rows: None,
            execution_time_ms: 0,
        }
    }

    /// Creates a query result with affected rows count (for non-SELECT queries).
    pub fn affected(affected: u64, execution_time_ms: u64) -> Self {
        Self {
            columns: vec![],
            rows: vec![],
            row_count: 0,
            affected_rows: Some(affected),
            execution_time_ms,
        }
    }

    /// Sets the execution time.
    pub fn with_duration(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Converts every row into a [`Record`] keyed by column name.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(column, value)| (column.name.clone(), value.clone()))
                    .collect()
            })
            .collect()
    }

    /// Consumes the result, returning the first cell of the first row.
    pub fn into_scalar(self) -> Option<serde_json::Value> {
        self.rows.into_iter().next().and_then(|row| row.into_iter().next())
    }
}
