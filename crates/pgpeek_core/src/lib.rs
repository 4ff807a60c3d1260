//! Core of pgpeek, a read-only Postgres inspection tool.
//!
//! - **error**: Error taxonomy shared by every component
//! - **config**: Timeouts, data directory and log filter
//! - **models**: Environments, schema snapshots, query results, exports, charts
//! - **services**: Credential store, SSH tunnels, connections, schema, queries, charts
//! - **state**: Per-session context driving the operations
//! - **logging**: Structured logging setup

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CoreConfig;
pub use error::{ConnectFailure, ErrorInfo, PeekError, PeekResult};
pub use models::{
    ChartData, ChartKind, ChartSource, ColumnInfo, Environment, ExportBundle, QueryResult,
    TableInfo,
};
pub use services::{ConnectionResolver, CredentialStore, QueryService, SchemaService};
pub use state::{DashboardSession, Notice, NoticeLevel};
