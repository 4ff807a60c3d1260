//! Local key/value storage.
//!
//! Holds the persisted state of the credential store (the encoded
//! environment list and the active environment name). Providers are
//! pluggable through [`KeyValueStore`]:
//!
//! - [`SqliteStore`]: a SQLite file in the data directory
//! - [`MemoryStore`]: session-only, lost when the process exits
//!
//! # Data Directory Locations
//!
//! - **macOS**: `~/Library/Application Support/pgpeek`
//! - **Windows**: `%APPDATA%\pgpeek`
//! - **Linux**: `~/.local/share/pgpeek`
//! - **Debug builds**: `./pgpeek_data` in current directory

use crate::error::{PeekError, PeekResult};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name of the SQLite store inside the data directory.
const STORE_FILE: &str = "pgpeek.db";

/// Get the default data directory for the application.
pub fn default_data_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from("./pgpeek_data")
    }

    #[cfg(not(debug_assertions))]
    {
        dirs::data_dir().map(|d| d.join("pgpeek")).unwrap_or_else(|| PathBuf::from("./pgpeek_data"))
    }
}

/// Initialize the data directory, creating it if needed.
pub fn init_data_dir(path: &Path) -> PeekResult<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PeekError::storage(
                format!("Data path exists but is not a directory: {}", path.display()),
                Some("Select a different location or remove the existing file"),
            ));
        }
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| {
        PeekError::storage(
            format!("Failed to create data directory '{}': {}", path.display(), e),
            Some("Check permissions or select a different location"),
        )
    })?;

    tracing::info!(path = %path.display(), "Created data directory");
    Ok(())
}

/// Trait for key/value storage providers.
pub trait KeyValueStore: Send + Sync {
    /// Get a value.
    fn get(&self, key: &str) -> PeekResult<Option<String>>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> PeekResult<()>;

    /// Delete a value. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> PeekResult<()>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// SQLite-backed storage.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    /// Thread-safe SQLite connection
    connection: Mutex<Connection>,
    /// Database file path
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store in the given data directory.
    pub fn open(data_dir: &Path) -> PeekResult<Self> {
        init_data_dir(data_dir)?;
        Self::open_with_path(data_dir.join(STORE_FILE))
    }

    /// Open the store at a specific database path.
    pub fn open_with_path(path: PathBuf) -> PeekResult<Self> {
        let connection = Connection::open(&path).map_err(|e| {
            PeekError::storage(
                format!("Failed to open database '{}': {}", path.display(), e),
                Some("The database file may be corrupted. Try deleting it to start fresh."),
            )
        })?;

        Self::configure_connection(&connection)?;
        Self::migrate(&connection)?;

        tracing::info!(path = %path.display(), "Local storage opened");
        Ok(Self { connection: Mutex::new(connection), path })
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn configure_connection(conn: &Connection) -> PeekResult<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )
        .map_err(|e| PeekError::storage(format!("Failed to configure database: {e}"), None))
    }

    fn migrate(conn: &Connection) -> PeekResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            ) STRICT;
            ",
        )
        .map_err(|e| PeekError::storage(format!("Failed to create kv_store table: {e}"), None))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> PeekResult<Option<String>> {
        let conn = self.connection.lock();
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> PeekResult<()> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| PeekError::storage(format!("Failed to store '{key}': {e}"), None))?;
        tracing::debug!(key = key, "Value stored in sqlite");
        Ok(())
    }

    fn delete(&self, key: &str) -> PeekResult<()> {
        let conn = self.connection.lock();
        conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(|e| PeekError::storage(format!("Failed to delete '{key}': {e}"), None))?;
        tracing::debug!(key = key, "Value deleted from sqlite");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "SqliteStore"
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

/// In-memory session storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PeekResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PeekResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> PeekResult<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MemoryStore"
    }
}
