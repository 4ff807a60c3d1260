//! Runtime configuration.
//!
//! Defaults, then `PGPEEK_*` environment variables, then whatever the caller
//! sets explicitly (the CLI applies its flags last).

use crate::error::{PeekError, PeekResult};

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PGPEEK_DATA_DIR";
/// Environment variable overriding the database connect timeout (seconds).
pub const CONNECT_TIMEOUT_ENV: &str = "PGPEEK_CONNECT_TIMEOUT_SECS";
/// Environment variable overriding the SSH connect timeout (seconds).
pub const SSH_TIMEOUT_ENV: &str = "PGPEEK_SSH_TIMEOUT_SECS";
/// Environment variable overriding the application name sent to Postgres.
pub const APP_NAME_ENV: &str = "PGPEEK_APP_NAME";
/// Environment variable holding a tracing filter.
pub const LOG_ENV: &str = "PGPEEK_LOG";

/// Default database connect timeout. Short, so unreachable hosts fail fast.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default SSH connect timeout.
pub const DEFAULT_SSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Directory holding the local store and logs.
    pub data_dir: PathBuf,
    /// Upper bound for opening a database connection.
    pub connect_timeout: Duration,
    /// Upper bound for opening the SSH session.
    pub ssh_connect_timeout: Duration,
    /// Application name reported to Postgres.
    pub application_name: String,
    /// Optional tracing filter.
    pub log_filter: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: crate::services::storage::default_data_dir(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ssh_connect_timeout: DEFAULT_SSH_CONNECT_TIMEOUT,
            application_name: "pgpeek".to_string(),
            log_filter: None,
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> PeekResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PeekResult<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(CONNECT_TIMEOUT_ENV) {
            config.connect_timeout = parse_secs(CONNECT_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(SSH_TIMEOUT_ENV) {
            config.ssh_connect_timeout = parse_secs(SSH_TIMEOUT_ENV, &raw)?;
        }
        if let Some(name) = lookup(APP_NAME_ENV).filter(|v| !v.trim().is_empty()) {
            config.application_name = name;
        }
        config.log_filter = lookup(LOG_ENV).filter(|v| !v.trim().is_empty());

        Ok(config)
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the database connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Log directory inside the data directory.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_secs(key: &str, raw: &str) -> PeekResult<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(PeekError::config(format!("{key} must be greater than zero"))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(PeekError::config(format!("{key} is not a number of seconds: {e}"))),
    }
}
