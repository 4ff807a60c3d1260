//! Data models for pgpeek.
//!
//! - `environment` - Environment (connection profile)
//! - `schema` - TableInfo, ColumnInfo
//! - `query` - TextRows, QueryResult
//! - `export` - ExportBundle
//! - `chart` - ChartKind, ChartData

pub mod chart;
pub mod environment;
pub mod export;
pub mod query;
pub mod schema;

pub use chart::{ChartData, ChartKind, ChartSource};
pub use environment::Environment;
pub use export::{ExportBundle, SkippedTable, TableExport};
pub use query::{QueryResult, Record, TextRows, NULL_TEXT};
pub use schema::{ColumnInfo, TableInfo};
