//! Backend services for pgpeek.
//!
//! - `storage` - Key/value persistence (SQLite or in-memory)
//! - `credentials` - Named environments and the active selection
//! - `ssh_tunnel` - SSH key parsing and local port forwarding
//! - `connection` - Environment -> tunnel -> database session
//! - `schema` - Table and column listing
//! - `query` - Table reads, export and import
//! - `visualization` - Chart input and sample data

pub mod connection;
pub mod credentials;
pub mod query;
pub mod schema;
pub mod ssh_tunnel;
pub mod storage;
pub mod visualization;

pub use connection::{
    ConnectOptions, ConnectParams, ConnectionHandle, ConnectionResolver, DatabaseClient,
    DatabaseConnector, PostgresConnector,
};
pub use credentials::CredentialStore;
pub use query::{ImportedExport, QueryService};
pub use schema::SchemaService;
pub use ssh_tunnel::{
    parse_private_key, KeyAlgorithm, SshTunnelService, TunnelHandle, TunnelOpener, TunnelRegistry,
};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
