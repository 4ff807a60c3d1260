//! Table reads and whole-database export.
//!
//! Only catalog-sourced table names reach [`QueryService::fetch_table`]; the
//! name is still quoted as an identifier before it is interpolated.

use crate::error::{PeekError, PeekResult};
use crate::models::{ExportBundle, QueryResult, TableInfo};
use crate::services::connection::ConnectionHandle;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Instant;

/// Quote `name` as a Postgres identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The statement used to read a whole table.
pub fn select_all_sql(table: &str) -> String {
    format!("SELECT * FROM {}", quote_ident(table))
}

/// Contents of an export file, ready to replace the session's view.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedExport {
    pub exported_at: DateTime<Utc>,
    /// Schema snapshot, ordered by table name.
    pub tables: Vec<TableInfo>,
    pub results: BTreeMap<String, QueryResult>,
}

/// Service for reading table contents.
pub struct QueryService;

impl QueryService {
    /// Read every row of `table`, coercing each value to a string.
    ///
    /// Returns the full result set or an error, never a partial one.
    pub async fn fetch_table(conn: &ConnectionHandle, table: &str) -> PeekResult<QueryResult> {
        let start = Instant::now();
        let raw = conn.query(&select_all_sql(table), &[]).await.map_err(into_query_error)?;
        let result = QueryResult::from_text_rows(table, raw).map_err(PeekError::query)?;

        tracing::debug!(
            table = table,
            rows = result.row_count(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Table fetched"
        );
        Ok(result)
    }

    /// Read every table in `tables` over one connection.
    ///
    /// A table whose query fails is logged and recorded in `skipped`; the
    /// export continues with the next table.
    pub async fn export_all(
        conn: &ConnectionHandle,
        tables: &[TableInfo],
        exported_at: DateTime<Utc>,
    ) -> ExportBundle {
        let mut bundle = ExportBundle::new(exported_at);

        for table in tables {
            match Self::fetch_table(conn, &table.name).await {
                Ok(result) => bundle.insert(table, &result),
                Err(e) => {
                    tracing::warn!(table = %table.name, error = %e, "Skipping table in export");
                    bundle.skip(table.name.clone(), e.to_string());
                }
            }
        }

        tracing::info!(
            environment = %conn.environment(),
            exported = bundle.tables.len(),
            skipped = bundle.skipped.len(),
            "Export finished"
        );
        bundle
    }

    /// Serialize an export as pretty JSON.
    pub fn bundle_to_json(bundle: &ExportBundle) -> PeekResult<String> {
        Ok(serde_json::to_string_pretty(bundle)?)
    }

    /// Parse an export file and rebuild its tables and results.
    pub fn import_bundle(json: &str) -> PeekResult<ImportedExport> {
        let bundle: ExportBundle = serde_json::from_str(json)
            .map_err(|e| PeekError::validation(format!("Invalid export file: {e}")))?;
        let results = bundle
            .results()
            .map_err(|e| PeekError::validation(format!("Invalid export file: {e}")))?;

        Ok(ImportedExport { exported_at: bundle.exported_at, tables: bundle.table_infos(), results })
    }
}

fn into_query_error(err: PeekError) -> PeekError {
    match err {
        err @ PeekError::Query { .. } => err,
        other => PeekError::query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::schema::SchemaService;
    use crate::test_support::{connect_to, FakeDatabase};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("bots"), "\"bots\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(select_all_sql("Mixed Case"), "SELECT * FROM \"Mixed Case\"");
    }

    #[tokio::test]
    async fn test_fetch_table_coerces_values() {
        let (conn, connector) = connect_to(FakeDatabase::robotics()).await;
        let result = QueryService::fetch_table(&conn, "bots").await.unwrap();

        assert_eq!(result.columns, vec!["id", "name", "battery_soc", "state"]);
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.rows[2], vec!["3", "NULL", "12.5", "CHARGING"]);
        assert_eq!(connector.executed().last().map(String::as_str), Some("SELECT * FROM \"bots\""));
    }

    #[tokio::test]
    async fn test_fetch_unknown_table_is_query_error() {
        let (conn, _connector) = connect_to(FakeDatabase::robotics()).await;
        let err = QueryService::fetch_table(&conn, "missing").await.unwrap_err();
        assert!(matches!(err, PeekError::Query { .. }));
    }

    #[tokio::test]
    async fn test_export_skips_failing_table() {
        let db = FakeDatabase::robotics().fail_reads_of("faults");
        let (conn, _connector) = connect_to(db).await;
        let tables = SchemaService::fetch(&conn).await.unwrap();

        let bundle = QueryService::export_all(&conn, &tables, now()).await;
        conn.close();

        assert_eq!(bundle.tables.keys().collect::<Vec<_>>(), vec!["bots", "jobs"]);
        assert_eq!(bundle.skipped.len(), 1);
        assert_eq!(bundle.skipped[0].table, "faults");
        assert_eq!(bundle.tables["bots"].data.len(), 3);
        assert_eq!(bundle.tables["bots"].schema.len(), 4);
    }

    #[tokio::test]
    async fn test_export_empty_only_when_everything_fails() {
        let db = FakeDatabase::robotics()
            .fail_reads_of("bots")
            .fail_reads_of("faults")
            .fail_reads_of("jobs");
        let (conn, _connector) = connect_to(db).await;
        let tables = SchemaService::fetch(&conn).await.unwrap();

        let bundle = QueryService::export_all(&conn, &tables, now()).await;
        assert!(bundle.is_empty());
        assert_eq!(bundle.skipped.len(), 3);
    }

    #[tokio::test]
    async fn test_import_restores_export() {
        let (conn, _connector) = connect_to(FakeDatabase::robotics()).await;
        let tables = SchemaService::fetch(&conn).await.unwrap();
        let bundle = QueryService::export_all(&conn, &tables, now()).await;
        let bots = QueryService::fetch_table(&conn, "bots").await.unwrap();
        conn.close();

        let json = QueryService::bundle_to_json(&bundle).unwrap();
        let imported = QueryService::import_bundle(&json).unwrap();

        assert_eq!(imported.exported_at, now());
        assert_eq!(imported.tables, tables);
        assert_eq!(imported.results["bots"], bots);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let err = QueryService::import_bundle("{\"tables\": 3}").unwrap_err();
        assert!(matches!(err, PeekError::Validation { .. }));
    }

    #[test]
    fn test_export_json_shape() {
        let mut bundle = ExportBundle::new(now());
        let table = TableInfo::new("t", vec![crate::models::ColumnInfo::new("a", "integer")]);
        let result = QueryResult {
            table: "t".into(),
            columns: vec!["a".into()],
            rows: vec![vec!["1".into()]],
        };
        bundle.insert(&table, &result);

        let json: serde_json::Value =
            serde_json::from_str(&QueryService::bundle_to_json(&bundle).unwrap()).unwrap();
        assert_eq!(json["tables"]["t"]["schema"][0]["type"], "integer");
        assert_eq!(json["tables"]["t"]["data"][0]["a"], "1");
    }
}
