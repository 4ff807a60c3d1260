//! Environment (connection profile) model.

use serde::{Deserialize, Serialize};

/// Default Postgres port.
pub const DEFAULT_PORT: u16 = 5432;
/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A named database connection profile with optional SSH tunnel settings.
///
/// Field names are the persisted format; do not rename them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Unique name; identity of the environment
    pub name: String,
    /// Database host as seen from the SSH server (or directly, without SSH)
    #[serde(default = "default_host")]
    pub host: String,
    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name
    #[serde(default)]
    pub database: String,
    /// Login username
    #[serde(default)]
    pub username: String,
    /// Login password
    #[serde(default)]
    pub password: String,
    /// SSH server host; a tunnel is used when this is set
    #[serde(default)]
    pub ssh_host: Option<String>,
    /// SSH server port
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// SSH username
    #[serde(default)]
    pub ssh_user: Option<String>,
    /// PEM / OpenSSH encoded private key text
    #[serde(default)]
    pub ssh_key: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Environment {
    /// Create an environment without SSH settings.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            username: username.into(),
            password: String::new(),
            ssh_host: None,
            ssh_port: DEFAULT_SSH_PORT,
            ssh_user: None,
            ssh_key: None,
        }
    }

    /// Set the database port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Route the connection through an SSH tunnel.
    pub fn with_ssh(
        mut self,
        host: impl Into<String>,
        user: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.ssh_host = Some(host.into());
        self.ssh_user = Some(user.into());
        self.ssh_key = Some(key.into());
        self
    }

    /// Set the SSH port.
    pub fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    /// Whether connections to this environment go through an SSH tunnel.
    pub fn uses_ssh(&self) -> bool {
        non_blank(self.ssh_host.as_deref()).is_some()
    }

    /// SSH host, if set and not blank.
    pub fn ssh_host(&self) -> Option<&str> {
        non_blank(self.ssh_host.as_deref())
    }

    /// SSH user, if set and not blank.
    pub fn ssh_user(&self) -> Option<&str> {
        non_blank(self.ssh_user.as_deref())
    }

    /// SSH key text, if set and not blank.
    pub fn ssh_key(&self) -> Option<&str> {
        non_blank(self.ssh_key.as_deref())
    }

    /// Validate the profile before it is stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Environment name cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("Invalid port number".to_string());
        }
        if self.uses_ssh() && self.ssh_port == 0 {
            return Err("Invalid SSH port number".to_string());
        }
        Ok(())
    }

    /// Display form of the target (without password).
    pub fn display_url(&self) -> String {
        match self.ssh_host() {
            Some(ssh_host) => format!(
                "postgresql://{}@{}:{}/{} via ssh://{}@{}:{}",
                self.username,
                self.host,
                self.port,
                self.database,
                self.ssh_user().unwrap_or_default(),
                ssh_host,
                self.ssh_port
            ),
            None => format!(
                "postgresql://{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            ),
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ssh_host", &self.ssh_host)
            .field("ssh_port", &self.ssh_port)
            .field("ssh_user", &self.ssh_user)
            .field("ssh_key", &self.ssh_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
