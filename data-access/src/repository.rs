//! Naive union of one table from each of two data sources.

use common::models::DataFrame;
use common::AppResult;

use crate::datasource::RecordSource;

/// Reads `primary_table` from `primary` and `secondary_table` from
/// `secondary`, then stacks the rows.
pub struct MultiSourceRepository<'a> {
    primary: &'a dyn RecordSource,
    primary_table: String,
    secondary: &'a dyn RecordSource,
    secondary_table: String,
}

impl<'a> MultiSourceRepository<'a> {
    pub fn new(
        primary: &'a dyn RecordSource,
        primary_table: impl Into<String>,
        secondary: &'a dyn RecordSource,
        secondary_table: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            primary_table: primary_table.into(),
            secondary,
            secondary_table: secondary_table.into(),
        }
    }

    /// Every row of both tables, primary first. Columns are the union of
    /// both sides; fields one side lacks are null. No deduplication.
    pub async fn get_combined_data(&self) -> AppResult<DataFrame> {
        let left = self.primary.fetch_records(&self.primary_table, None).await?;
        let right = self
            .secondary
            .fetch_records(&self.secondary_table, None)
            .await?;
        let combined = DataFrame::concat([
            DataFrame::from_records(&left),
            DataFrame::from_records(&right),
        ]);
        tracing::info!(
            primary = %self.primary.name(),
            secondary = %self.secondary.name(),
            rows = combined.len(),
            columns = combined.columns.len(),
            "Combined data fetched"
        );
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, FromConfig, SqlConnection, SqliteConnection};
    use crate::datasource::SqlDataSource;
    use common::models::ConfigMap;
    use common::AppError;
    use serde_json::{json, Value};

    fn config(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    async fn seeded(name: &str, statements: &[&str]) -> SqliteConnection {
        let mut conn =
            SqliteConnection::from_config(&config(json!({"name": name, "database": ":memory:"})))
                .unwrap();
        conn.connect().await.unwrap();
        {
            let ds = SqlDataSource::new(&conn).unwrap();
            for sql in statements {
                ds.query(sql, &[]).await.unwrap();
            }
        }
        conn.refresh_schema().await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_combined_row_count_is_sum() {
        let left = seeded(
            "left",
            &[
                "CREATE TABLE phones (id INTEGER PRIMARY KEY, model TEXT)",
                "INSERT INTO phones (id, model) VALUES (1, 'Pixel'), (2, 'Galaxy')",
            ],
        )
        .await;
        let right = seeded(
            "right",
            &[
                "CREATE TABLE devices (id INTEGER PRIMARY KEY, model TEXT, vendor TEXT)",
                "INSERT INTO devices (id, model, vendor) VALUES \
                 (3, 'iPhone', 'Apple'), (4, 'Xperia', 'Sony'), (5, 'Moto', 'Motorola')",
            ],
        )
        .await;

        let primary = SqlDataSource::new(&left).unwrap();
        let secondary = SqlDataSource::new(&right).unwrap();
        let repo = MultiSourceRepository::new(&primary, "phones", &secondary, "devices");
        let frame = repo.get_combined_data().await.unwrap();

        assert_eq!(frame.len(), 5);
        assert_eq!(frame.columns, vec!["id", "model", "vendor"]);
        assert_eq!(frame.column("vendor").unwrap()[0], &Value::Null);
        assert_eq!(frame.column("model").unwrap()[4], &json!("Moto"));
    }

    #[tokio::test]
    async fn test_overlapping_rows_are_kept() {
        let conn = seeded(
            "same",
            &[
                "CREATE TABLE phones (id INTEGER PRIMARY KEY, model TEXT)",
                "INSERT INTO phones (id, model) VALUES (1, 'Pixel')",
            ],
        )
        .await;
        let ds = SqlDataSource::new(&conn).unwrap();
        let frame = MultiSourceRepository::new(&ds, "phones", &ds, "phones")
            .get_combined_data()
            .await
            .unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.rows[0], frame.rows[1]);
    }

    #[tokio::test]
    async fn test_missing_table_propagates() {
        let conn = seeded("one", &[]).await;
        let ds = SqlDataSource::new(&conn).unwrap();
        let repo = MultiSourceRepository::new(&ds, "phones", &ds, "devices");
        assert!(matches!(
            repo.get_combined_data().await,
            Err(AppError::UnknownTable(_))
        ));
    }
}
