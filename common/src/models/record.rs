//! Dynamically-keyed records and the tabular frame built from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A row whose shape is only known at runtime. Keys keep insertion order.
pub type Record = serde_json::Map<String, Value>;

/// Row-oriented table with a union of columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DataFrame {
    /// Column names, in first-seen order.
    pub columns: Vec<String>,
    /// Rows aligned with `columns`; absent fields are `null`.
    pub rows: Vec<Vec<Value>>,
}

impl DataFrame {
    /// Builds a frame from records. Columns are the union of all record keys.
    pub fn from_records(records: &[Record]) -> Self {
        let mut frame = Self::default();
        for record in records {
            frame.push_record(record);
        }
        frame
    }

    /// Appends a record, widening the frame with any new columns.
    pub fn push_record(&mut self, record: &Record) {
        for key in record.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
            }
        }
        let row = self
            .columns
            .iter()
            .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        self.rows.push(row);
    }

    /// Row-wise concatenation. No deduplication or key-based merge.
    pub fn concat<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = DataFrame>,
    {
        let mut combined = Self::default();
        for frame in frames {
            for record in frame.records() {
                combined.push_record(&record);
            }
        }
        combined
    }

    /// Rows as records. Null cells are kept.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, or `None` if the column does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_records_unions_columns() {
        let frame = DataFrame::from_records(&[
            record(json!({"id": 1, "model": "Pixel"})),
            record(json!({"id": 2, "version": 7})),
        ]);
        assert_eq!(frame.columns, vec!["id", "model", "version"]);
        assert_eq!(frame.rows[0], vec![json!(1), json!("Pixel"), Value::Null]);
        assert_eq!(frame.rows[1], vec![json!(2), Value::Null, json!(7)]);
    }

    #[test]
    fn test_concat_sums_rows_without_dedup() {
        let left = DataFrame::from_records(&[record(json!({"id": 1})), record(json!({"id": 2}))]);
        let right = DataFrame::from_records(&[record(json!({"id": 1, "name": "dup"}))]);
        let combined = DataFrame::concat([left, right]);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.column("id").unwrap(), vec![&json!(1), &json!(2), &json!(1)]);
        assert_eq!(combined.column("name").unwrap()[0], &Value::Null);
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        assert!(DataFrame::concat(Vec::new()).is_empty());
    }
}
