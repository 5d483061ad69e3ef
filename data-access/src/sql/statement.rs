//! Parameterized statement construction against reflected tables.
//!
//! Identifiers are always quoted and values always bound. Filter predicates
//! are raw SQL and pass through [`SqlValidator::validate_predicate`] first.

use serde_json::Value;

use common::models::Record;
use common::utils::SqlValidator;
use common::AppResult;

use super::schema::{ColumnSchema, TableSchema};
use super::Dialect;

/// SQL text plus its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT OUTER JOIN",
            JoinKind::Right => "RIGHT OUTER JOIN",
        }
    }
}

/// Builds statements for a single table.
pub struct StatementBuilder<'a> {
    dialect: Dialect,
    table: &'a TableSchema,
    params: Vec<Value>,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: Dialect, table: &'a TableSchema) -> Self {
        Self {
            dialect,
            table,
            params: Vec::new(),
        }
    }

    fn quoted_table(&self) -> String {
        self.dialect.quote_ident(&self.table.name)
    }

    fn bind(&mut self, column: &ColumnSchema, value: Value) -> String {
        self.params.push(value);
        self.dialect
            .placeholder(self.params.len(), Some(&column.data_type))
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }

    fn where_clause(filter: Option<&str>) -> AppResult<String> {
        match filter {
            Some(predicate) => {
                SqlValidator::validate_predicate(predicate)?;
                Ok(format!(" WHERE ({})", predicate))
            }
            None => Ok(String::new()),
        }
    }

    fn order_by_key(&self) -> String {
        if self.table.primary_key.is_empty() {
            return String::new();
        }
        let keys: Vec<String> = self
            .table
            .primary_key
            .iter()
            .map(|k| self.dialect.quote_ident(k))
            .collect();
        format!(" ORDER BY {}", keys.join(", "))
    }

    fn column_list(&self) -> String {
        self.table
            .column_names()
            .map(|c| self.dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `SELECT` every row, optionally filtered, ordered by primary key.
    pub fn select_all(self, filter: Option<&str>) -> AppResult<Statement> {
        let sql = format!(
            "SELECT {} FROM {}{}{}",
            self.column_list(),
            self.quoted_table(),
            Self::where_clause(filter)?,
            self.order_by_key()
        );
        Ok(self.finish(sql))
    }

    /// `SELECT` rows whose `column` equals `value`.
    pub fn select_where(mut self, column: &str, value: Value) -> AppResult<Statement> {
        let column = self.table.column(column)?;
        let placeholder = self.bind(column, value);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}{}",
            self.column_list(),
            self.quoted_table(),
            self.dialect.quote_ident(&column.name),
            placeholder,
            self.order_by_key()
        );
        Ok(self.finish(sql))
    }

    /// `SELECT COUNT(*)`, optionally filtered.
    pub fn count(self, filter: Option<&str>) -> AppResult<Statement> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            self.quoted_table(),
            Self::where_clause(filter)?
        );
        Ok(self.finish(sql))
    }

    /// Checks for a row with the given primary key.
    pub fn exists(mut self, id: Value) -> AppResult<Statement> {
        let key = self.table.id_column()?;
        let placeholder = self.bind(key, id);
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = {} LIMIT 1",
            self.quoted_table(),
            self.dialect.quote_ident(&key.name),
            placeholder
        );
        Ok(self.finish(sql))
    }

    /// `INSERT` the record's fields. Adds `RETURNING <pk>` where supported.
    ///
    /// # Errors
    /// `AppError::UnknownColumn` for fields the table does not have.
    pub fn insert(mut self, record: &Record) -> AppResult<Statement> {
        let mut columns = Vec::with_capacity(record.len());
        let mut placeholders = Vec::with_capacity(record.len());
        for (name, value) in record {
            let column = self.table.column(name)?;
            columns.push(self.dialect.quote_ident(&column.name));
            placeholders.push(self.bind(column, value.clone()));
        }

        let mut sql = if columns.is_empty() {
            self.dialect.empty_insert(&self.quoted_table())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.quoted_table(),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        if self.dialect.supports_returning() {
            if let Some(key) = self.table.primary_key.first() {
                sql.push_str(" RETURNING ");
                sql.push_str(&self.dialect.quote_ident(key));
            }
        }
        Ok(self.finish(sql))
    }

    /// `UPDATE` the row with the given primary key. `record` must not be empty.
    pub fn update(mut self, id: Value, record: &Record) -> AppResult<Statement> {
        let key = self.table.id_column()?;
        let mut assignments = Vec::with_capacity(record.len());
        for (name, value) in record {
            let column = self.table.column(name)?;
            let placeholder = self.bind(column, value.clone());
            assignments.push(format!(
                "{} = {}",
                self.dialect.quote_ident(&column.name),
                placeholder
            ));
        }
        let placeholder = self.bind(key, id);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.quoted_table(),
            assignments.join(", "),
            self.dialect.quote_ident(&key.name),
            placeholder
        );
        Ok(self.finish(sql))
    }

    /// `DELETE` the row with the given primary key.
    pub fn delete(mut self, id: Value) -> AppResult<Statement> {
        let key = self.table.id_column()?;
        let placeholder = self.bind(key, id);
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.quoted_table(),
            self.dialect.quote_ident(&key.name),
            placeholder
        );
        Ok(self.finish(sql))
    }
}

/// Builds a two-table join on a column name shared by both tables.
///
/// The primary table's columns come first in the select list, followed by
/// the secondary's, so rows can be split by position. Both tables are
/// referenced by their own names (the filter may qualify columns with them)
/// except on a self-join, where the secondary side is aliased `<name>_joined`.
pub fn join(
    dialect: Dialect,
    kind: JoinKind,
    primary: &TableSchema,
    secondary: &TableSchema,
    on_field: &str,
    filter: Option<&str>,
) -> AppResult<Statement> {
    primary.column(on_field)?;
    secondary.column(on_field)?;

    let primary_alias = dialect.quote_ident(&primary.name);
    let secondary_alias = if primary.name == secondary.name {
        dialect.quote_ident(&format!("{}_joined", secondary.name))
    } else {
        dialect.quote_ident(&secondary.name)
    };

    let select: Vec<String> = primary
        .column_names()
        .map(|c| format!("{}.{}", primary_alias, dialect.quote_ident(c)))
        .chain(
            secondary
                .column_names()
                .map(|c| format!("{}.{}", secondary_alias, dialect.quote_ident(c))),
        )
        .collect();

    let on = dialect.quote_ident(on_field);
    let sql = format!(
        "SELECT {} FROM {} AS {} {} {} AS {} ON {}.{} = {}.{}{}",
        select.join(", "),
        dialect.quote_ident(&primary.name),
        primary_alias,
        kind.keyword(),
        dialect.quote_ident(&secondary.name),
        secondary_alias,
        primary_alias,
        on,
        secondary_alias,
        on,
        StatementBuilder::where_clause(filter)?
    );
    Ok(Statement {
        sql,
        params: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AppError;
    use serde_json::json;

    fn table(name: &str, columns: &[(&str, &str)], key: Option<&str>) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| ColumnSchema {
                    name: n.to_string(),
                    data_type: t.to_string(),
                    nullable: Some(*n) != key,
                    primary_key: Some(*n) == key,
                    auto_increment: Some(*n) == key,
                })
                .collect(),
            primary_key: key.map(|k| vec![k.to_string()]).unwrap_or_default(),
        }
    }

    fn phones() -> TableSchema {
        table(
            "phones",
            &[("id", "int4"), ("model", "varchar"), ("version", "int4")],
            Some("id"),
        )
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_postgres_casts_and_returns_key() {
        let stmt = StatementBuilder::new(Dialect::Postgres, &phones())
            .insert(&record(json!({"model": "Pixel", "version": 7})))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"phones\" (\"model\", \"version\") VALUES ($1::\"varchar\", $2::\"int4\") RETURNING \"id\""
        );
        assert_eq!(stmt.params, vec![json!("Pixel"), json!(7)]);
    }

    #[test]
    fn test_insert_mysql_has_no_returning() {
        let stmt = StatementBuilder::new(Dialect::MySql, &phones())
            .insert(&record(json!({"model": "Pixel"})))
            .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `phones` (`model`) VALUES (?)");

        let empty = StatementBuilder::new(Dialect::MySql, &phones())
            .insert(&Record::new())
            .unwrap();
        assert_eq!(empty.sql, "INSERT INTO `phones` () VALUES ()");
    }

    #[test]
    fn test_insert_rejects_unknown_field() {
        let err = StatementBuilder::new(Dialect::Sqlite, &phones())
            .insert(&record(json!({"colour": "red"})))
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownColumn { .. }));
    }

    #[test]
    fn test_update_binds_key_last() {
        let stmt = StatementBuilder::new(Dialect::Sqlite, &phones())
            .update(json!(3), &record(json!({"version": 8})))
            .unwrap();
        assert_eq!(stmt.sql, "UPDATE \"phones\" SET \"version\" = ? WHERE \"id\" = ?");
        assert_eq!(stmt.params, vec![json!(8), json!(3)]);
    }

    #[test]
    fn test_by_id_requires_primary_key() {
        let log = table("log", &[("line", "text")], None);
        let err = StatementBuilder::new(Dialect::Sqlite, &log)
            .delete(json!(1))
            .unwrap_err();
        assert!(matches!(err, AppError::NoPrimaryKey(_)));
        assert!(StatementBuilder::new(Dialect::Sqlite, &log)
            .select_all(None)
            .is_ok());
    }

    #[test]
    fn test_select_all_with_filter() {
        let stmt = StatementBuilder::new(Dialect::MySql, &phones())
            .select_all(Some("version > 3"))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `id`, `model`, `version` FROM `phones` WHERE (version > 3) ORDER BY `id`"
        );
        assert!(StatementBuilder::new(Dialect::MySql, &phones())
            .select_all(Some("1=1; DROP TABLE phones"))
            .is_err());
    }

    #[test]
    fn test_join_selects_both_sides() {
        let customers = table("customers", &[("id", "INTEGER"), ("name", "TEXT")], Some("id"));
        let orders = table("orders", &[("id", "INTEGER"), ("amount", "REAL")], Some("id"));
        let stmt = join(
            Dialect::Sqlite,
            JoinKind::Left,
            &customers,
            &orders,
            "id",
            Some("orders.amount > 30"),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT \"customers\".\"id\", \"customers\".\"name\", \"orders\".\"id\", \"orders\".\"amount\" \
             FROM \"customers\" AS \"customers\" LEFT OUTER JOIN \"orders\" AS \"orders\" \
             ON \"customers\".\"id\" = \"orders\".\"id\" WHERE (orders.amount > 30)"
        );
    }

    #[test]
    fn test_join_requires_field_on_both_sides() {
        let customers = table("customers", &[("id", "INTEGER"), ("name", "TEXT")], Some("id"));
        let orders = table("orders", &[("id", "INTEGER")], Some("id"));
        let err = join(Dialect::Sqlite, JoinKind::Inner, &customers, &orders, "name", None)
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownColumn { .. }));
    }

    #[test]
    fn test_self_join_aliases_secondary() {
        let nodes = table("nodes", &[("id", "INTEGER")], Some("id"));
        let stmt = join(Dialect::Sqlite, JoinKind::Inner, &nodes, &nodes, "id", None).unwrap();
        assert!(stmt.sql.contains("INNER JOIN \"nodes\" AS \"nodes_joined\""));
    }
}
