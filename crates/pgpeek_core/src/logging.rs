//! tracing setup: a daily log file plus stderr.
//!
//! stdout belongs to command output, so nothing here ever writes to it. With
//! the file available stderr only shows warnings; without it stderr gets
//! everything the filter lets through.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[cfg(debug_assertions)]
const DEFAULT_FILTER: &str = "debug,pgpeek=trace,pgpeek_core=trace,tokio_postgres=warn,russh=warn";
#[cfg(not(debug_assertions))]
const DEFAULT_FILTER: &str = "info,tokio_postgres=warn,russh=warn";

pub struct LogConfig {
    pub log_dir: PathBuf,
    /// Directives that win over `RUST_LOG`, usually from `PGPEEK_LOG`.
    pub filter: Option<String>,
}

impl LogConfig {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir, filter: None }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Keeps the file writer alive; dropping it flushes the log file.
pub struct LoggingGuard(Option<WorkerGuard>);

/// Install the global subscriber. A second call leaves the first one in place.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    let directives = filter_directives(config.filter.as_deref(), std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("Warning: ignoring log filter {directives:?}: {e}");
        EnvFilter::new(DEFAULT_FILTER)
    });

    let (file_layer, guard) = match open_log_file(&config.log_dir) {
        Ok((writer, guard)) => (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard)),
        Err(e) => {
            eprintln!("Warning: no log file in {}: {e}", config.log_dir.display());
            (None, None)
        }
    };
    let stderr_level = if file_layer.is_some() { LevelFilter::WARN } else { LevelFilter::TRACE };
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .with_filter(stderr_level);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    LoggingGuard(guard)
}

/// Explicit directives, then `RUST_LOG`, then the build default.
fn filter_directives(explicit: Option<&str>, rust_log: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(rust_log)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn open_log_file(dir: &Path) -> Result<(NonBlocking, WorkerGuard), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("pgpeek")
        .filename_suffix("log")
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}
