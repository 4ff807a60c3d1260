//! Per-session state.
//!
//! [`DashboardSession`] owns everything one operator session needs: the
//! credential store, the connection resolver, the current schema snapshot,
//! the selected table and its rows, the last error and the pending notices.
//! Operations take `&mut self`, so two of them never overlap on one session.
//!
//! Every operation catches its own failure: the error is recorded in
//! [`last_error`](DashboardSession::last_error), a notice is queued, and the
//! error is also returned to the caller. Nothing is retried.

use crate::config::CoreConfig;
use crate::error::{ErrorInfo, PeekError, PeekResult};
use crate::models::schema::find_table;
use crate::models::{ChartData, ChartKind, Environment, ExportBundle, QueryResult, TableInfo};
use crate::services::query::ImportedExport;
use crate::services::visualization;
use crate::services::{
    ConnectionResolver, CredentialStore, QueryService, SchemaService, SqliteStore,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A short message for the operator (a toast in a graphical front end).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }
}

/// State of one operator session.
pub struct DashboardSession {
    credentials: CredentialStore,
    resolver: ConnectionResolver,
    /// Last schema snapshot; replaced wholesale, cleared on failure
    tables: Vec<TableInfo>,
    selected_table: Option<String>,
    last_result: Option<QueryResult>,
    /// Rows of an imported export; table reads are served from here while set
    imported: Option<BTreeMap<String, QueryResult>>,
    last_error: Option<ErrorInfo>,
    notices: Vec<Notice>,
}

impl DashboardSession {
    pub fn new(credentials: CredentialStore, resolver: ConnectionResolver) -> Self {
        Self {
            credentials,
            resolver,
            tables: Vec::new(),
            selected_table: None,
            last_result: None,
            imported: None,
            last_error: None,
            notices: Vec::new(),
        }
    }

    /// Session backed by the SQLite store in `config.data_dir`.
    pub fn open(config: &CoreConfig) -> PeekResult<Self> {
        let store = Arc::new(SqliteStore::open(&config.data_dir)?);
        let credentials = CredentialStore::load(store)?;
        let resolver = ConnectionResolver::from_config(config);

        tracing::info!(data_dir = %config.data_dir.display(), "Session opened");
        Ok(Self::new(credentials, resolver))
    }

    // ========== Accessors ==========

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Current schema snapshot.
    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn selected_table(&self) -> Option<&str> {
        self.selected_table.as_deref()
    }

    /// Snapshot entry of the selected table.
    pub fn selected_table_info(&self) -> Option<&TableInfo> {
        self.selected_table.as_deref().and_then(|name| find_table(&self.tables, name))
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// Whether the snapshot came from an imported export.
    pub fn is_imported(&self) -> bool {
        self.imported.is_some()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Remove and return the queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ========== Environments ==========

    /// Create or replace an environment.
    pub fn save_environment(&mut self, environment: Environment) -> PeekResult<()> {
        let name = environment.name.clone();
        match self.credentials.save_environment(environment) {
            Ok(()) => {
                self.notify(NoticeLevel::Info, format!("Saved environment: {name}"));
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Switch environments. The snapshot and selection belong to the old one
    /// and are dropped; call [`fetch_schema`](Self::fetch_schema) to reload.
    pub fn set_active_environment(&mut self, name: &str) -> PeekResult<()> {
        if let Err(e) = self.credentials.set_active(name) {
            return Err(self.fail(e));
        }
        self.reset_view();
        Ok(())
    }

    /// Delete an environment; returns whether it existed.
    pub fn delete_environment(&mut self, name: &str) -> PeekResult<bool> {
        let was_active = self.credentials.active_name() == Some(name);
        match self.credentials.delete_environment(name) {
            Ok(removed) => {
                if was_active {
                    self.reset_view();
                }
                if removed {
                    self.notify(NoticeLevel::Info, format!("Deleted environment: {name}"));
                }
                Ok(removed)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    // ========== Operations ==========

    /// Reload the schema snapshot of the active environment.
    ///
    /// On failure the previous snapshot is not kept.
    pub async fn fetch_schema(&mut self) -> PeekResult<Vec<TableInfo>> {
        self.imported = None;
        match self.load_schema().await {
            Ok(tables) => {
                self.tables = tables.clone();
                self.last_error = None;
                if self.selected_table_info().is_none() {
                    self.selected_table = None;
                    self.last_result = None;
                }
                Ok(tables)
            }
            Err(e) => {
                self.clear_snapshot();
                Err(self.fail(e))
            }
        }
    }

    /// Read all rows of a table from the current snapshot.
    pub async fn fetch_table(&mut self, name: &str) -> PeekResult<QueryResult> {
        self.last_result = None;
        match self.read_table(name).await {
            Ok(result) => {
                self.last_result = Some(result.clone());
                self.last_error = None;
                Ok(result)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Select a table and read its rows.
    ///
    /// Names missing from the snapshot leave the selection unchanged.
    pub async fn select_table(&mut self, name: &str) -> PeekResult<QueryResult> {
        if find_table(&self.tables, name).is_some() {
            self.selected_table = Some(name.to_string());
        }
        self.fetch_table(name).await
    }

    /// Export every table of the active environment over one connection.
    ///
    /// The schema is re-read on that connection and replaces the snapshot.
    /// Tables that fail to read are skipped, each with a warning notice.
    pub async fn export_all(&mut self, now: DateTime<Utc>) -> PeekResult<ExportBundle> {
        self.imported = None;
        let (tables, bundle) = match self.export_active(now).await {
            Ok(exported) => exported,
            Err(e) => {
                self.clear_snapshot();
                return Err(self.fail(e));
            }
        };
        self.tables = tables;
        self.last_error = None;

        for skipped in &bundle.skipped {
            self.notify(
                NoticeLevel::Warning,
                format!("Skipped table {}: {}", skipped.table, skipped.reason),
            );
        }
        if bundle.is_empty() && !bundle.skipped.is_empty() {
            self.notify(NoticeLevel::Warning, "Export is empty: every table failed");
        } else {
            self.notify(
                NoticeLevel::Info,
                format!("Exported {} tables", bundle.tables.len()),
            );
        }
        Ok(bundle)
    }

    /// Replace the snapshot and rows with those of an export file.
    pub fn import_export(&mut self, json: &str) -> PeekResult<ImportedExport> {
        let imported = match QueryService::import_bundle(json) {
            Ok(imported) => imported,
            Err(e) => return Err(self.fail(e)),
        };

        self.tables = imported.tables.clone();
        self.imported = Some(imported.results.clone());
        self.selected_table = None;
        self.last_result = None;
        self.last_error = None;
        self.notify(
            NoticeLevel::Info,
            format!(
                "Imported {} tables exported at {}",
                imported.tables.len(),
                imported.exported_at.format("%Y-%m-%d %H:%M:%S")
            ),
        );
        tracing::info!(tables = imported.tables.len(), "Export imported");
        Ok(imported)
    }

    /// Chart input from the last result, or sample data if there is none.
    pub fn chart(&self, kind: ChartKind, now: DateTime<Utc>) -> ChartData {
        visualization::chart_data(kind, self.last_result.as_ref(), now)
    }

    // ========== Internals ==========

    async fn load_schema(&self) -> PeekResult<Vec<TableInfo>> {
        let env = self.credentials.get_active_environment()?;
        let conn = self.resolver.connect(&env).await?;
        let result = SchemaService::fetch(&conn).await;
        conn.close();
        result
    }

    async fn read_table(&self, name: &str) -> PeekResult<QueryResult> {
        if find_table(&self.tables, name).is_none() {
            return Err(PeekError::query(format!("Unknown table: {name}")));
        }
        if let Some(imported) = &self.imported {
            return Ok(imported.get(name).cloned().unwrap_or_else(|| QueryResult::empty(name)));
        }

        let env = self.credentials.get_active_environment()?;
        let conn = self.resolver.connect(&env).await?;
        let result = QueryService::fetch_table(&conn, name).await;
        conn.close();
        result
    }

    async fn export_active(&self, now: DateTime<Utc>) -> PeekResult<(Vec<TableInfo>, ExportBundle)> {
        let env = self.credentials.get_active_environment()?;
        let conn = self.resolver.connect(&env).await?;
        let tables = match SchemaService::fetch(&conn).await {
            Ok(tables) => tables,
            Err(e) => {
                conn.close();
                return Err(e);
            }
        };
        let bundle = QueryService::export_all(&conn, &tables, now).await;
        conn.close();
        Ok((tables, bundle))
    }

    fn clear_snapshot(&mut self) {
        self.tables.clear();
        self.selected_table = None;
        self.last_result = None;
    }

    fn reset_view(&mut self) {
        self.clear_snapshot();
        self.imported = None;
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice::new(level, message));
    }

    /// Record `err` as the session's last error and queue a notice.
    fn fail(&mut self, err: PeekError) -> PeekError {
        tracing::error!(category = err.category(), error = %err, "Operation failed");
        let info = err.to_error_info();
        self.notify(NoticeLevel::Error, info.message.clone());
        self.last_error = Some(info);
        err
    }
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("credentials", &self.credentials)
            .field("tables", &self.tables.len())
            .field("selected_table", &self.selected_table)
            .field("imported", &self.imported.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}
