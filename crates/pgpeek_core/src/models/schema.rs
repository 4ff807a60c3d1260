//! Schema snapshot models.

use serde::{Deserialize, Serialize};

const NUMERIC_TYPES: &[&str] = &["integer", "bigint", "numeric", "double precision", "real"];
const TIME_TYPES: &[&str] = &["timestamp", "date"];
const CATEGORICAL_TYPES: &[&str] = &["character varying", "text", "char"];

/// A column as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared data type (e.g., "integer", "character varying").
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnInfo {
    /// Create a column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self { name: name.into(), data_type: data_type.into() }
    }

    fn is_any_of(&self, types: &[&str]) -> bool {
        types.iter().any(|t| self.data_type.contains(t))
    }
}

/// A base table and its columns in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Columns, ordered by ordinal position.
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Create a table.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self { name: name.into(), columns }
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns with a numeric type, usable as chart values.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.names_matching(NUMERIC_TYPES)
    }

    /// Columns with a date or timestamp type, usable as chart axes.
    pub fn time_columns(&self) -> Vec<&str> {
        self.names_matching(TIME_TYPES)
    }

    /// Text-like columns, usable as series labels.
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.names_matching(CATEGORICAL_TYPES)
    }

    fn names_matching(&self, types: &[&str]) -> Vec<&str> {
        self.columns.iter().filter(|c| c.is_any_of(types)).map(|c| c.name.as_str()).collect()
    }
}

/// Find a table in a snapshot by name.
pub fn find_table<'a>(tables: &'a [TableInfo], name: &str) -> Option<&'a TableInfo> {
    tables.iter().find(|t| t.name == name)
}
