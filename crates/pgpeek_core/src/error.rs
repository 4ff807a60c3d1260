//! Error types for pgpeek.
//!
//! Every failure the core can report is a [`PeekError`]. Operations on the
//! session catch these at the boundary and turn them into a recorded error
//! plus a notice; nothing here is retried automatically.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type PeekResult<T> = Result<T, PeekError>;

/// Why a database connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The SSH tunnel in front of the database could not be opened.
    Tunnel,
    /// The connect call did not finish within the configured timeout.
    Timeout,
    /// The server rejected the credentials.
    Authentication,
    /// Host unknown, refused or otherwise unreachable.
    Unreachable,
    /// Anything the classifier does not recognize.
    Other,
}

impl ConnectFailure {
    /// Short label for display and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tunnel => "tunnel",
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
            Self::Unreachable => "unreachable",
            Self::Other => "other",
        }
    }

    /// Classify a driver error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("password authentication failed")
            || lower.contains("authentication")
            || lower.contains("no pg_hba.conf entry")
        {
            Self::Authentication
        } else if lower.contains("refused")
            || lower.contains("unreachable")
            || lower.contains("failed to lookup")
            || lower.contains("name or service not known")
            || lower.contains("no route")
        {
            Self::Unreachable
        } else {
            Self::Other
        }
    }
}

/// Main error type for pgpeek.
#[derive(Debug, Error)]
pub enum PeekError {
    /// The SSH private key matched none of the supported algorithms.
    #[error("Invalid SSH key: {message}")]
    InvalidKeyFormat {
        /// What was wrong with the key text.
        message: String,
    },

    /// SSH transport, authentication or port forwarding failed.
    #[error("SSH tunnel error: {message}")]
    Tunnel {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database unreachable, rejected credentials or timed out.
    #[error("Failed to connect: {message}")]
    Connection {
        /// First line of the underlying message.
        message: String,
        /// Classification of the failure.
        kind: ConnectFailure,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No environment is selected, or the selected one no longer exists.
    #[error("No active environment: {message}")]
    NoActiveEnvironment {
        /// Human-readable error message.
        message: String,
    },

    /// A catalog query failed while listing tables or columns.
    #[error("An error occurred while fetching the schema: {message}")]
    SchemaFetch {
        /// Underlying message.
        message: String,
    },

    /// A data query failed.
    #[error("Failed to fetch data: {message}")]
    Query {
        /// Postgres error message.
        message: String,
        /// Postgres error code (e.g., "42P01").
        code: Option<String>,
        /// Additional detail from Postgres.
        detail: Option<String>,
        /// Postgres hint.
        hint: Option<String>,
    },

    /// Local persistence failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Input rejected before any I/O.
    #[error("Invalid input: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// Configuration error.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl PeekError {
    // ========== Constructors ==========

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKeyFormat { message: message.into() }
    }

    /// Create a tunnel error.
    pub fn tunnel(message: impl Into<String>) -> Self {
        Self::Tunnel { message: message.into(), source: None }
    }

    /// Create a tunnel error with source.
    pub fn tunnel_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Tunnel { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a connection error. The message is cut to its first line.
    pub fn connection(message: impl AsRef<str>, kind: ConnectFailure) -> Self {
        Self::Connection { message: first_line(message.as_ref()), kind, source: None }
    }

    /// Create a connection error, classifying the message.
    pub fn connection_classified(message: impl AsRef<str>) -> Self {
        let message = first_line(message.as_ref());
        let kind = ConnectFailure::classify(&message);
        Self::Connection { message, kind, source: None }
    }

    /// Create a connection error from a failed tokio-postgres connect.
    ///
    /// The server's own message wins when there is one; otherwise the error
    /// chain is flattened so the OS-level cause ("Connection refused") survives.
    pub fn connect_failed(err: tokio_postgres::Error) -> Self {
        let message = match err.as_db_error() {
            Some(db_err) => db_err.message().to_string(),
            None => error_chain(&err),
        };
        let message = first_line(&message);
        let kind = ConnectFailure::classify(&message);
        Self::Connection { message, kind, source: Some(Box::new(err)) }
    }

    /// Create a no-active-environment error.
    pub fn no_active_environment(message: impl Into<String>) -> Self {
        Self::NoActiveEnvironment { message: message.into() }
    }

    /// Create a schema fetch error.
    pub fn schema_fetch(message: impl Into<String>) -> Self {
        Self::SchemaFetch { message: message.into() }
    }

    /// Create a query error without Postgres details.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query { message: message.into(), code: None, detail: None, hint: None }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self::Storage { message: message.into(), hint: hint.map(String::from), source: None }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    // ========== Methods ==========

    /// Whether this error happened before a usable connection existed.
    ///
    /// These are the failures the operation contract reports as
    /// `ConnectionError`.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyFormat { .. }
                | Self::Tunnel { .. }
                | Self::Connection { .. }
                | Self::NoActiveEnvironment { .. }
        )
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidKeyFormat { .. } => "SSH Key",
            Self::Tunnel { .. } => "SSH",
            Self::Connection { .. } => "Connection",
            Self::NoActiveEnvironment { .. } => "Environment",
            Self::SchemaFetch { .. } => "Schema",
            Self::Query { .. } => "Query",
            Self::Storage { .. } => "Storage",
            Self::Validation { .. } => "Validation",
            Self::Config { .. } => "Config",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InvalidKeyFormat { .. } => {
                Some("Paste an unencrypted RSA, Ed25519 or ECDSA private key")
            }
            Self::Tunnel { .. } => Some("Check the SSH host, user and key"),
            Self::Connection { kind, .. } => Some(match kind {
                ConnectFailure::Tunnel => "Check the SSH host, user and key",
                ConnectFailure::Timeout => "Check that the host is reachable from here",
                ConnectFailure::Authentication => "Check username and password",
                ConnectFailure::Unreachable => "Check that the database server is running",
                ConnectFailure::Other => "Check the environment settings",
            }),
            Self::NoActiveEnvironment { .. } => Some("Select or create an environment"),
            Self::SchemaFetch { .. } => None,
            Self::Query { hint, .. } => hint.as_deref(),
            Self::Storage { hint, .. } => hint.as_deref(),
            Self::Validation { .. } => None,
            Self::Config { .. } => None,
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Get Postgres error code (if applicable).
    pub fn pg_code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Convert to user-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        let technical_detail = match self {
            Self::Query { code, detail, .. } => {
                let mut parts = Vec::new();
                if let Some(code) = code {
                    parts.push(format!("Code: {code}"));
                }
                if let Some(detail) = detail {
                    parts.push(format!("Detail: {detail}"));
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            Self::Connection { kind, .. } => Some(format!("Failure: {}", kind.as_str())),
            _ => None,
        };

        ErrorInfo {
            error_type: format!("{} Error", self.category()),
            message: self.to_string(),
            hint: self.hint().map(String::from),
            technical_detail,
        }
    }
}

/// User-displayable error information.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorInfo {
    /// Category name (e.g., "Connection Error").
    pub error_type: String,
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
    /// Technical detail for a "details" expansion.
    pub technical_detail: Option<String>,
}

/// First line of a possibly multi-line driver message.
pub fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim_end().to_string()
}

/// `err` followed by each of its sources, joined with ": ".
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

// ========== Error Conversions ==========

/// Convert a tokio_postgres error raised by a query.
///
/// Connection-level faults are mapped by the resolver itself, so everything
/// arriving here is reported as a query failure.
impl From<tokio_postgres::Error> for PeekError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            return PeekError::Query {
                message: db_err.message().to_string(),
                code: Some(db_err.code().code().to_string()),
                detail: db_err.detail().map(String::from),
                hint: db_err.hint().map(String::from),
            };
        }

        if err.is_closed() {
            return PeekError::query("Connection closed");
        }

        PeekError::query(first_line(&err.to_string()))
    }
}

/// Convert from rusqlite::Error to PeekError.
impl From<rusqlite::Error> for PeekError {
    fn from(err: rusqlite::Error) -> Self {
        PeekError::Storage {
            message: err.to_string(),
            hint: Some("The local database may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from std::io::Error to PeekError.
impl From<std::io::Error> for PeekError {
    fn from(err: std::io::Error) -> Self {
        PeekError::Storage {
            message: err.to_string(),
            hint: Some("Check file permissions and disk space".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from serde_json::Error to PeekError.
impl From<serde_json::Error> for PeekError {
    fn from(err: serde_json::Error) -> Self {
        PeekError::Storage {
            message: format!("JSON error: {err}"),
            hint: Some("Data may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from base64::DecodeError to PeekError.
impl From<base64::DecodeError> for PeekError {
    fn from(err: base64::DecodeError) -> Self {
        PeekError::Storage {
            message: format!("Base64 error: {err}"),
            hint: Some("Data may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}
