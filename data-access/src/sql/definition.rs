//! User-defined table models, rendered to `CREATE TABLE` per dialect.

use serde::{Deserialize, Serialize};

use common::utils::SqlValidator;
use common::{AppError, AppResult};

use super::Dialect;

/// Portable column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInteger,
    /// Variable-length string with a maximum length.
    String(u32),
    Text,
    Boolean,
    Float,
    Double,
    /// Fixed-point number with precision and scale.
    Decimal(u8, u8),
    Date,
    Timestamp,
    Json,
}

impl ColumnType {
    fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInteger)
    }

    /// Type name in the given dialect.
    pub fn sql(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::Integer, Dialect::MySql) => "INT".into(),
            (ColumnType::Integer, _) => "INTEGER".into(),
            (ColumnType::BigInteger, Dialect::Sqlite) => "INTEGER".into(),
            (ColumnType::BigInteger, _) => "BIGINT".into(),
            (ColumnType::String(len), _) => format!("VARCHAR({})", len),
            (ColumnType::Text, _) => "TEXT".into(),
            (ColumnType::Boolean, _) => "BOOLEAN".into(),
            (ColumnType::Float, Dialect::MySql) => "FLOAT".into(),
            (ColumnType::Float, _) => "REAL".into(),
            (ColumnType::Double, Dialect::MySql) => "DOUBLE".into(),
            (ColumnType::Double, Dialect::Postgres) => "DOUBLE PRECISION".into(),
            (ColumnType::Double, Dialect::Sqlite) => "REAL".into(),
            (ColumnType::Decimal(precision, scale), _) => {
                format!("DECIMAL({}, {})", precision, scale)
            }
            (ColumnType::Date, _) => "DATE".into(),
            (ColumnType::Timestamp, Dialect::Postgres) => "TIMESTAMP".into(),
            (ColumnType::Timestamp, _) => "DATETIME".into(),
            (ColumnType::Json, Dialect::MySql) => "JSON".into(),
            (ColumnType::Json, Dialect::Postgres) => "JSONB".into(),
            (ColumnType::Json, Dialect::Sqlite) => "TEXT".into(),
        }
    }
}

/// One column of a user-defined table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDefinition {
    /// Nullable, non-key column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            auto_increment: false,
            nullable: true,
        }
    }

    /// Marks the column as (part of) the primary key. Implies NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column as database-generated.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A user-defined table registered on a relational connection and created
/// by `create_all_user_defined_models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    fn primary_key(&self) -> Vec<&ColumnDefinition> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Checks names and key constraints.
    ///
    /// # Errors
    /// `AppError::Validation` for bad identifiers, an empty or duplicated
    /// column list, or an auto-increment column that is not the sole
    /// integer primary key.
    pub fn validate(&self) -> AppResult<()> {
        SqlValidator::validate_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(AppError::Validation(format!(
                "table {} has no columns",
                self.name
            )));
        }
        for (idx, column) in self.columns.iter().enumerate() {
            SqlValidator::validate_identifier(&column.name)?;
            if self.columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(AppError::Validation(format!(
                    "duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }
        let key = self.primary_key();
        for column in self.columns.iter().filter(|c| c.auto_increment) {
            if !column.primary_key || key.len() != 1 || !column.column_type.is_integer() {
                return Err(AppError::Validation(format!(
                    "auto-increment column {} must be the only integer primary key of {}",
                    column.name, self.name
                )));
            }
        }
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the dialect.
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let key = self.primary_key();
        let inline_key = dialect == Dialect::Sqlite && key.len() == 1 && key[0].auto_increment;

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|column| column_sql(column, dialect, inline_key))
            .collect();
        if !key.is_empty() && !inline_key {
            let names: Vec<String> = key.iter().map(|c| dialect.quote_ident(&c.name)).collect();
            parts.push(format!("PRIMARY KEY ({})", names.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote_ident(&self.name),
            parts.join(", ")
        )
    }
}

fn column_sql(column: &ColumnDefinition, dialect: Dialect, inline_key: bool) -> String {
    let name = dialect.quote_ident(&column.name);
    if column.auto_increment {
        return match dialect {
            Dialect::MySql => format!(
                "{} {} NOT NULL AUTO_INCREMENT",
                name,
                column.column_type.sql(dialect)
            ),
            Dialect::Postgres => {
                let serial = match column.column_type {
                    ColumnType::BigInteger => "BIGSERIAL",
                    _ => "SERIAL",
                };
                format!("{} {} NOT NULL", name, serial)
            }
            Dialect::Sqlite if inline_key => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name),
            Dialect::Sqlite => format!("{} INTEGER NOT NULL", name),
        };
    }
    let null = if column.nullable { "NULL" } else { "NOT NULL" };
    format!("{} {} {}", name, column.column_type.sql(dialect), null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phones() -> TableDefinition {
        TableDefinition::new("phones")
            .column(
                ColumnDefinition::new("id", ColumnType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnDefinition::new("model", ColumnType::String(255)).not_null())
            .column(ColumnDefinition::new("version", ColumnType::Integer))
    }

    #[test]
    fn test_create_sql_per_dialect() {
        assert_eq!(
            phones().create_sql(Dialect::MySql),
            "CREATE TABLE IF NOT EXISTS `phones` (`id` INT NOT NULL AUTO_INCREMENT, \
             `model` VARCHAR(255) NOT NULL, `version` INT NULL, PRIMARY KEY (`id`))"
        );
        assert_eq!(
            phones().create_sql(Dialect::Postgres),
            "CREATE TABLE IF NOT EXISTS \"phones\" (\"id\" SERIAL NOT NULL, \
             \"model\" VARCHAR(255) NOT NULL, \"version\" INTEGER NULL, PRIMARY KEY (\"id\"))"
        );
        assert_eq!(
            phones().create_sql(Dialect::Sqlite),
            "CREATE TABLE IF NOT EXISTS \"phones\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"model\" VARCHAR(255) NOT NULL, \"version\" INTEGER NULL)"
        );
    }

    #[test]
    fn test_composite_key_without_auto_increment() {
        let sql = TableDefinition::new("links")
            .column(ColumnDefinition::new("a", ColumnType::Integer).primary_key())
            .column(ColumnDefinition::new("b", ColumnType::Integer).primary_key())
            .create_sql(Dialect::Sqlite);
        assert!(sql.ends_with("PRIMARY KEY (\"a\", \"b\"))"));
    }

    #[test]
    fn test_validate() {
        assert!(phones().validate().is_ok());
        assert!(TableDefinition::new("empty").validate().is_err());

        let duplicated = phones().column(ColumnDefinition::new("model", ColumnType::Text));
        assert!(duplicated.validate().is_err());

        let bad_serial = TableDefinition::new("t")
            .column(ColumnDefinition::new("id", ColumnType::Text).primary_key().auto_increment());
        assert!(bad_serial.validate().is_err());
    }
}
