//! Reflected database schema.
//!
//! Built once per connect from the catalog query of the dialect, and rebuilt
//! after user-defined tables are created.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use common::models::Record;
use common::{AppError, AppResult};

/// One reflected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ColumnSchema {
    pub name: String,
    /// Catalog type name (`int`, `varchar`, `int4`, `INTEGER`, ...).
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// Value is generated by the database when omitted on insert.
    pub auto_increment: bool,
}

/// One reflected table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    /// Primary key column names, in column order. Empty when the table has none.
    pub primary_key: Vec<String>,
}

impl TableSchema {
    /// Looks up a column.
    ///
    /// # Errors
    /// `AppError::UnknownColumn` when the table has no such column.
    pub fn column(&self, name: &str) -> AppResult<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AppError::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// The single primary key column used by by-id operations.
    ///
    /// Composite keys resolve to their first column.
    ///
    /// # Errors
    /// `AppError::NoPrimaryKey` when the table has no primary key.
    pub fn id_column(&self) -> AppResult<&ColumnSchema> {
        let name = self
            .primary_key
            .first()
            .ok_or_else(|| AppError::NoPrimaryKey(self.name.clone()))?;
        self.column(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Every base table of the connected database, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaRegistry {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// Builds the registry from catalog rows. Rows must carry
    /// `table_name, column_name, data_type, is_nullable, is_primary_key, is_identity`.
    pub fn from_catalog(rows: Vec<Record>) -> Self {
        let mut tables: BTreeMap<String, TableSchema> = BTreeMap::new();
        for row in rows {
            let (Some(table_name), Some(column_name)) = (
                text(row.get("table_name")),
                text(row.get("column_name")),
            ) else {
                tracing::debug!(row = ?row, "skipping catalog row without names");
                continue;
            };
            let column = ColumnSchema {
                name: column_name,
                data_type: text(row.get("data_type")).unwrap_or_default(),
                nullable: truthy(row.get("is_nullable")),
                primary_key: truthy(row.get("is_primary_key")),
                auto_increment: truthy(row.get("is_identity")),
            };
            let table = tables
                .entry(table_name.clone())
                .or_insert_with(|| TableSchema {
                    name: table_name,
                    columns: Vec::new(),
                    primary_key: Vec::new(),
                });
            if column.primary_key {
                table.primary_key.push(column.name.clone());
            }
            table.columns.push(column);
        }
        Self { tables }
    }

    /// Looks up a table.
    ///
    /// # Errors
    /// `AppError::UnknownTable` when the table was not reflected.
    pub fn table(&self, name: &str) -> AppResult<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| AppError::UnknownTable(name.to_string()))
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Catalog flags arrive as booleans, integers or `YES`/`NO` depending on the backend.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "1" | "yes" | "true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(table: &str, column: &str, pk: Value, nullable: Value) -> Record {
        json!({
            "table_name": table,
            "column_name": column,
            "data_type": "int",
            "is_nullable": nullable,
            "is_primary_key": pk,
            "is_identity": 0,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_from_catalog_groups_by_table() {
        let registry = SchemaRegistry::from_catalog(vec![
            row("orders", "id", json!(1), json!(0)),
            row("orders", "customer_id", json!(0), json!("YES")),
            row("customers", "id", json!(true), json!(false)),
            row("audit", "note", json!(0), json!(1)),
        ]);
        assert_eq!(registry.table_names(), vec!["audit", "customers", "orders"]);

        let orders = registry.table("orders").unwrap();
        assert_eq!(orders.primary_key, vec!["id"]);
        assert!(orders.column("customer_id").unwrap().nullable);
        assert_eq!(orders.id_column().unwrap().name, "id");
    }

    #[test]
    fn test_lookup_errors() {
        let registry = SchemaRegistry::from_catalog(vec![row("audit", "note", json!(0), json!(1))]);
        assert!(matches!(registry.table("nope"), Err(AppError::UnknownTable(_))));

        let audit = registry.table("audit").unwrap();
        assert!(matches!(audit.id_column(), Err(AppError::NoPrimaryKey(_))));
        assert!(matches!(
            audit.column("missing"),
            Err(AppError::UnknownColumn { .. })
        ));
    }
}
