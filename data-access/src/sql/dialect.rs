//! SQL dialect differences between the supported relational backends.

/// Relational dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

/// Catalog query for MySQL. Every column is cast so the decoded values are
/// plain strings and integers regardless of server collation.
const MYSQL_REFLECTION: &str = r#"
SELECT CAST(c.TABLE_NAME AS CHAR) AS table_name,
       CAST(c.COLUMN_NAME AS CHAR) AS column_name,
       CAST(c.DATA_TYPE AS CHAR) AS data_type,
       CAST(IF(c.IS_NULLABLE = 'YES', 1, 0) AS SIGNED) AS is_nullable,
       CAST(IF(c.COLUMN_KEY = 'PRI', 1, 0) AS SIGNED) AS is_primary_key,
       CAST(IF(c.EXTRA LIKE '%auto_increment%', 1, 0) AS SIGNED) AS is_identity
FROM INFORMATION_SCHEMA.COLUMNS c
JOIN INFORMATION_SCHEMA.TABLES t
  ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
WHERE c.TABLE_SCHEMA = DATABASE() AND t.TABLE_TYPE = 'BASE TABLE'
ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#;

const POSTGRES_REFLECTION: &str = r#"
SELECT c.table_name::text AS table_name,
       c.column_name::text AS column_name,
       c.udt_name::text AS data_type,
       (c.is_nullable = 'YES') AS is_nullable,
       EXISTS (
           SELECT 1
           FROM information_schema.table_constraints tc
           JOIN information_schema.key_column_usage kcu
             ON kcu.constraint_name = tc.constraint_name
            AND kcu.table_schema = tc.table_schema
            AND kcu.table_name = tc.table_name
           WHERE tc.constraint_type = 'PRIMARY KEY'
             AND tc.table_schema = c.table_schema
             AND tc.table_name = c.table_name
             AND kcu.column_name = c.column_name
       ) AS is_primary_key,
       COALESCE(c.column_default LIKE 'nextval(%' OR c.is_identity = 'YES', FALSE) AS is_identity
FROM information_schema.columns c
JOIN information_schema.tables t
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE c.table_schema = current_schema() AND t.table_type = 'BASE TABLE'
ORDER BY c.table_name, c.ordinal_position
"#;

const SQLITE_REFLECTION: &str = r#"
SELECT m.name AS table_name,
       p.name AS column_name,
       p.type AS data_type,
       CASE WHEN p."notnull" = 0 AND p.pk = 0 THEN 1 ELSE 0 END AS is_nullable,
       CASE WHEN p.pk > 0 THEN 1 ELSE 0 END AS is_primary_key,
       CASE WHEN p.pk = 1 AND upper(p.type) = 'INTEGER'
             AND (SELECT COUNT(*) FROM pragma_table_info(m.name) k WHERE k.pk > 0) = 1
            THEN 1 ELSE 0 END AS is_identity
FROM sqlite_master m
JOIN pragma_table_info(m.name) p
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
ORDER BY m.name, p.cid
"#;

impl Dialect {
    /// Quotes an identifier, doubling embedded quote characters.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Placeholder for the `index`-th bound parameter (1-based).
    ///
    /// Postgres placeholders carry an explicit cast to the column's type so
    /// that loosely typed JSON values bind against any column.
    pub fn placeholder(&self, index: usize, cast: Option<&str>) -> String {
        match (self, cast) {
            (Dialect::Postgres, Some(type_name)) => {
                format!("${}::{}", index, self.quote_ident(type_name))
            }
            (Dialect::Postgres, None) => format!("${}", index),
            (Dialect::MySql | Dialect::Sqlite, _) => "?".to_string(),
        }
    }

    /// Whether `INSERT ... RETURNING` is available.
    pub fn supports_returning(&self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }

    /// Insert statement for a row with no explicit values.
    pub fn empty_insert(&self, quoted_table: &str) -> String {
        match self {
            Dialect::MySql => format!("INSERT INTO {} () VALUES ()", quoted_table),
            Dialect::Postgres | Dialect::Sqlite => {
                format!("INSERT INTO {} DEFAULT VALUES", quoted_table)
            }
        }
    }

    /// Catalog query listing every column of every base table, returning
    /// `table_name, column_name, data_type, is_nullable, is_primary_key, is_identity`.
    pub fn reflection_query(&self) -> &'static str {
        match self {
            Dialect::MySql => MYSQL_REFLECTION,
            Dialect::Postgres => POSTGRES_REFLECTION,
            Dialect::Sqlite => SQLITE_REFLECTION,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(Dialect::MySql.quote_ident("a`b"), "`a``b`");
        assert_eq!(Dialect::Postgres.quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Sqlite.quote_ident("phones"), "\"phones\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::MySql.placeholder(3, Some("int")), "?");
        assert_eq!(Dialect::Postgres.placeholder(2, Some("int4")), "$2::\"int4\"");
        assert_eq!(Dialect::Postgres.placeholder(1, None), "$1");
    }

    #[test]
    fn test_empty_insert() {
        assert_eq!(Dialect::MySql.empty_insert("`t`"), "INSERT INTO `t` () VALUES ()");
        assert_eq!(Dialect::Sqlite.empty_insert("\"t\""), "INSERT INTO \"t\" DEFAULT VALUES");
    }
}
