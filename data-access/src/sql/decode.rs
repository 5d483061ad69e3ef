//! Row decoding into JSON values and parameter binding from JSON values.
//!
//! Records are dynamically shaped, so columns are decoded by the type name
//! the driver reports. Types without a dedicated arm fall back to text, then
//! raw bytes, then `null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::query::Query;
use sqlx::sqlite::SqliteRow;
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Database, Encode, Row, Type, TypeInfo, ValueRef};

use common::models::ColumnInfo;
use common::AppResult;

/// Binds JSON values to a query in order.
///
/// Integers bind as `i64`, other numbers as `f64`, `null` as a typed NULL and
/// arrays or objects as their JSON text.
pub(crate) fn bind_params<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    params: &[Value],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
{
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Column metadata of a result set, taken from its first row.
pub(crate) fn column_info<R: Row>(row: &R) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|column| ColumnInfo {
            name: column.name().to_string(),
            data_type: column.type_info().name().to_string(),
            nullable: None,
        })
        .collect()
}

/// Decodes all rows with a backend-specific row decoder.
pub(crate) fn collect_rows<R, F>(rows: &[R], decode: F) -> AppResult<(Vec<ColumnInfo>, Vec<Vec<Value>>)>
where
    R: Row,
    F: Fn(&R) -> AppResult<Vec<Value>>,
{
    let columns = rows.first().map(column_info).unwrap_or_default();
    let values = rows.iter().map(decode).collect::<AppResult<Vec<_>>>()?;
    Ok((columns, values))
}

fn bytes(raw: Vec<u8>) -> Value {
    Value::Array(raw.into_iter().map(Value::from).collect())
}

pub(crate) fn mysql_row(row: &MySqlRow) -> AppResult<Vec<Value>> {
    (0..row.len()).map(|idx| mysql_value(row, idx)).collect()
}

fn mysql_value(row: &MySqlRow, idx: usize) -> AppResult<Value> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }
    let decoded = match row.column(idx).type_info().name() {
        "BOOLEAN" => row.try_get::<bool, _>(idx).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(idx).map(Value::from)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<u64, _>(idx).map(Value::from),
        "FLOAT" => row.try_get::<f32, _>(idx).map(|f| Value::from(f as f64)),
        "DOUBLE" => row.try_get::<f64, _>(idx).map(Value::from),
        "DECIMAL" => row
            .try_get::<Decimal, _>(idx)
            .map(|d| Value::String(d.to_string())),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|d| Value::String(d.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|t| Value::String(t.to_string())),
        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|t| Value::String(t.to_rfc3339())),
        "JSON" => row.try_get::<Value, _>(idx),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => row.try_get::<Vec<u8>, _>(idx).map(bytes),
        _ => row.try_get_unchecked::<String, _>(idx).map(Value::String),
    };
    Ok(decoded.unwrap_or_else(|e| {
        tracing::debug!(column = idx, error = %e, "mysql typed decode failed, using fallback");
        mysql_fallback(row, idx)
    }))
}

fn mysql_fallback(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(text) = row.try_get_unchecked::<String, _>(idx) {
        return Value::String(text);
    }
    row.try_get_unchecked::<Vec<u8>, _>(idx)
        .map(bytes)
        .unwrap_or(Value::Null)
}

pub(crate) fn postgres_row(row: &PgRow) -> AppResult<Vec<Value>> {
    (0..row.len()).map(|idx| postgres_value(row, idx)).collect()
}

fn postgres_value(row: &PgRow, idx: usize) -> AppResult<Value> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }
    let decoded = match row.column(idx).type_info().name() {
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::Bool),
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|f| Value::from(f as f64)),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::from),
        "NUMERIC" => row
            .try_get::<Decimal, _>(idx)
            .map(|d| Value::String(d.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<String, _>(idx).map(Value::String)
        }
        "UUID" => row
            .try_get::<Uuid, _>(idx)
            .map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|d| Value::String(d.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|t| Value::String(t.to_rfc3339())),
        "BYTEA" => row.try_get::<Vec<u8>, _>(idx).map(bytes),
        _ => row.try_get_unchecked::<String, _>(idx).map(Value::String),
    };
    Ok(decoded.unwrap_or_else(|e| {
        tracing::debug!(column = idx, error = %e, "postgres typed decode failed, using null");
        Value::Null
    }))
}

pub(crate) fn sqlite_row(row: &SqliteRow) -> AppResult<Vec<Value>> {
    (0..row.len()).map(|idx| sqlite_value(row, idx)).collect()
}

/// SQLite values are decoded by their runtime storage class. An INTEGER in a
/// column declared BOOLEAN becomes a JSON boolean.
fn sqlite_value(row: &SqliteRow, idx: usize) -> AppResult<Value> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let declared = row.column(idx).type_info().name();
    let decoded = match storage.as_str() {
        "INTEGER" if declared == "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(idx)
            .map(|i| Value::Bool(i != 0)),
        "INTEGER" => row.try_get_unchecked::<i64, _>(idx).map(Value::from),
        "REAL" => row.try_get_unchecked::<f64, _>(idx).map(Value::from),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(idx).map(bytes),
        _ => row.try_get_unchecked::<String, _>(idx).map(Value::String),
    };
    Ok(decoded.unwrap_or_else(|e| {
        tracing::debug!(column = idx, error = %e, "sqlite decode failed, using null");
        Value::Null
    }))
}
