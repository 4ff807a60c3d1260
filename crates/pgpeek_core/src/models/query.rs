//! Query result models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How SQL NULL is rendered once values are coerced to strings.
pub const NULL_TEXT: &str = "NULL";

/// A JSON object mapping column name to value, in column order.
pub type Record = Map<String, Value>;

/// Raw rows as returned by a [`DatabaseClient`](crate::services::DatabaseClient):
/// every value in Postgres text form, `None` for NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRows {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// One entry per row, aligned with `columns`.
    pub rows: Vec<Vec<Option<String>>>,
}

impl TextRows {
    /// Create a row set.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the first column, skipping NULLs.
    pub fn first_column(&self) -> Vec<String> {
        self.rows.iter().filter_map(|row| row.first().cloned().flatten()).collect()
    }
}

/// String-coerced result of reading one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Table the rows came from.
    pub table: String,
    /// Column names; derived from the first row, empty when there are no rows.
    pub columns: Vec<String>,
    /// Rows aligned with `columns`.
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    /// An empty result for `table`.
    pub fn empty(table: impl Into<String>) -> Self {
        Self { table: table.into(), columns: Vec::new(), rows: Vec::new() }
    }

    /// Coerce raw text rows into a result.
    ///
    /// Fails if a row does not have one value per column.
    pub fn from_text_rows(table: impl Into<String>, raw: TextRows) -> Result<Self, String> {
        let table = table.into();
        if raw.rows.is_empty() {
            return Ok(Self::empty(table));
        }

        let width = raw.columns.len();
        let mut rows = Vec::with_capacity(raw.rows.len());
        for (index, row) in raw.rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(format!(
                    "row {index} has {} values but the result has {width} columns",
                    row.len()
                ));
            }
            rows.push(
                row.into_iter().map(|v| v.unwrap_or_else(|| NULL_TEXT.to_string())).collect(),
            );
        }

        Ok(Self { table, columns: raw.columns, rows })
    }

    /// Rebuild a result from ordered records; columns come from the first record.
    pub fn from_records(table: impl Into<String>, records: &[Record]) -> Result<Self, String> {
        let table = table.into();
        let Some(first) = records.first() else {
            return Ok(Self::empty(table));
        };

        let columns: Vec<String> = first.keys().cloned().collect();
        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let mut row = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = record
                    .get(column)
                    .ok_or_else(|| format!("record {index} is missing column '{column}'"))?;
                row.push(value_to_text(value));
            }
            if record.len() != columns.len() {
                return Err(format!("record {index} has unexpected columns"));
            }
            rows.push(row);
        }

        Ok(Self { table, columns, rows })
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as ordered `column -> string` objects.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), Value::String(value.clone())))
                    .collect()
            })
            .collect()
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => NULL_TEXT.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> TextRows {
        TextRows::new(
            vec!["id".into(), "name".into(), "battery_soc".into()],
            vec![
                vec![Some("1".into()), Some("alpha".into()), Some("87.5".into())],
                vec![Some("2".into()), None, Some("12".into())],
            ],
        )
    }

    #[test]
    fn test_from_text_rows_coerces_null() {
        let result = QueryResult::from_text_rows("bots", raw()).unwrap();
        assert_eq!(result.columns, vec!["id", "name", "battery_soc"]);
        assert_eq!(result.rows[1], vec!["2", "NULL", "12"]);
    }

    #[test]
    fn test_empty_rows_have_no_columns() {
        let raw = TextRows::new(vec!["id".into()], Vec::new());
        let result = QueryResult::from_text_rows("bots", raw).unwrap();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let raw = TextRows::new(vec!["a".into(), "b".into()], vec![vec![Some("1".into())]]);
        assert!(QueryResult::from_text_rows("t", raw).is_err());
    }

    #[test]
    fn test_records_keep_column_order() {
        let result = QueryResult::from_text_rows("bots", raw()).unwrap();
        let records = result.records();
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["id", "name", "battery_soc"]);
        assert_eq!(records[0]["battery_soc"], Value::String("87.5".into()));

        let rebuilt = QueryResult::from_records("bots", &records).unwrap();
        assert_eq!(rebuilt, result);
    }

    #[test]
    fn test_from_records_rejects_missing_column() {
        let mut a = Record::new();
        a.insert("id".into(), Value::String("1".into()));
        a.insert("name".into(), Value::String("x".into()));
        let mut b = Record::new();
        b.insert("id".into(), Value::String("2".into()));
        assert!(QueryResult::from_records("t", &[a, b]).is_err());
    }
}
