//! Schema introspection service.
//!
//! Lists the base tables of the `public` schema and their columns from
//! `information_schema`. Views and system schemas are never returned.

use crate::error::{PeekError, PeekResult};
use crate::models::{ColumnInfo, TableInfo};
use crate::services::connection::ConnectionHandle;

/// Base tables of `public`, in the order the catalog returns them.
pub(crate) const TABLES_SQL: &str = r#"
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
"#;

/// Columns of one `public` table.
pub(crate) const COLUMNS_SQL: &str = r#"
    SELECT column_name::text AS column_name, data_type::text AS data_type
    FROM information_schema.columns
    WHERE table_schema = 'public' AND table_name = $1::text
    ORDER BY ordinal_position
"#;

/// Schema introspection service.
pub struct SchemaService;

impl SchemaService {
    /// Fetch every base table with its columns.
    ///
    /// All or nothing: the first failing catalog query aborts the fetch and
    /// nothing collected so far is returned.
    pub async fn fetch(conn: &ConnectionHandle) -> PeekResult<Vec<TableInfo>> {
        let names = Self::load_table_names(conn).await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = Self::load_columns(conn, &name).await?;
            tables.push(TableInfo::new(name, columns));
        }

        tracing::info!(
            environment = %conn.environment(),
            tables = tables.len(),
            "Schema fetched"
        );
        Ok(tables)
    }

    /// Names of the base tables in `public`.
    pub async fn load_table_names(conn: &ConnectionHandle) -> PeekResult<Vec<String>> {
        let rows = conn.query(TABLES_SQL, &[]).await.map_err(into_schema_error)?;
        Ok(rows.first_column())
    }

    /// Columns of `table`, ordered by position.
    pub async fn load_columns(conn: &ConnectionHandle, table: &str) -> PeekResult<Vec<ColumnInfo>> {
        let rows = conn.query(COLUMNS_SQL, &[table]).await.map_err(into_schema_error)?;

        rows.rows
            .into_iter()
            .map(|row| match row.as_slice() {
                [Some(name), Some(data_type), ..] => Ok(ColumnInfo::new(name.clone(), data_type.clone())),
                _ => Err(PeekError::schema_fetch(format!(
                    "unexpected catalog row for table '{table}'"
                ))),
            })
            .collect()
    }
}

fn into_schema_error(err: PeekError) -> PeekError {
    match err {
        PeekError::Query { message, .. } => PeekError::schema_fetch(message),
        err @ PeekError::SchemaFetch { .. } => err,
        other => PeekError::schema_fetch(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connect_to, FakeDatabase};

    #[tokio::test]
    async fn test_fetch_lists_tables_and_columns() {
        let (conn, _connector) = connect_to(FakeDatabase::robotics()).await;
        let tables = SchemaService::fetch(&conn).await.unwrap();
        conn.close();

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["bots", "faults", "jobs"]);

        let bots = &tables[0];
        assert_eq!(bots.column_names(), vec!["id", "name", "battery_soc", "state"]);
        assert_eq!(bots.columns[2].data_type, "double precision");
    }

    #[tokio::test]
    async fn test_fetch_empty_database() {
        let (conn, _connector) = connect_to(FakeDatabase::new()).await;
        let tables = SchemaService::fetch(&conn).await.unwrap();
        assert!(tables.is_empty());
    }

    #[tokio::test]
    async fn test_column_failure_aborts_whole_fetch() {
        let db = FakeDatabase::robotics().fail_columns_of("jobs");
        let (conn, _connector) = connect_to(db).await;

        let err = SchemaService::fetch(&conn).await.unwrap_err();
        match err {
            PeekError::SchemaFetch { message } => assert!(message.contains("jobs")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_catalog_failure_is_schema_error() {
        let db = FakeDatabase::robotics().fail_catalog();
        let (conn, _connector) = connect_to(db).await;
        let err = SchemaService::fetch(&conn).await.unwrap_err();
        assert!(matches!(err, PeekError::SchemaFetch { .. }));
    }
}
