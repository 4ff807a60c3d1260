//! Whole-database export format.

use crate::models::query::{QueryResult, Record};
use crate::models::schema::{ColumnInfo, TableInfo};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One exported table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExport {
    /// Declared columns.
    pub schema: Vec<ColumnInfo>,
    /// Rows as ordered string records.
    pub data: Vec<Record>,
}

/// A table left out of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTable {
    /// Table name.
    pub table: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Every readable table of one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    /// When the export was taken.
    pub exported_at: DateTime<Utc>,
    /// Exported tables keyed by name.
    pub tables: BTreeMap<String, TableExport>,
    /// Tables whose query failed.
    #[serde(default)]
    pub skipped: Vec<SkippedTable>,
}

impl ExportBundle {
    /// Create an empty bundle.
    pub fn new(exported_at: DateTime<Utc>) -> Self {
        Self { exported_at, tables: BTreeMap::new(), skipped: Vec::new() }
    }

    /// Add a table's rows.
    pub fn insert(&mut self, table: &TableInfo, result: &QueryResult) {
        self.tables.insert(
            table.name.clone(),
            TableExport { schema: table.columns.clone(), data: result.records() },
        );
    }

    /// Record a table that could not be read.
    pub fn skip(&mut self, table: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedTable { table: table.into(), reason: reason.into() });
    }

    /// Whether no table made it into the export.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Schema snapshot described by the bundle.
    pub fn table_infos(&self) -> Vec<TableInfo> {
        self.tables
            .iter()
            .map(|(name, export)| TableInfo::new(name.clone(), export.schema.clone()))
            .collect()
    }

    /// Rebuild the per-table results.
    pub fn results(&self) -> Result<BTreeMap<String, QueryResult>, String> {
        self.tables
            .iter()
            .map(|(name, export)| {
                QueryResult::from_records(name.clone(), &export.data)
                    .map(|result| (name.clone(), result))
                    .map_err(|e| format!("table '{name}': {e}"))
            })
            .collect()
    }
}
