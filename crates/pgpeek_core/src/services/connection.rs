//! Connection resolution: environment -> (optional SSH tunnel) -> database session.
//!
//! Every operation opens its own connection through [`ConnectionResolver::connect`]
//! and releases it when done. There is no pooling: a [`ConnectionHandle`] owns
//! exactly one database session plus the tunnel it runs through, and releasing
//! the handle closes both.

use crate::config::CoreConfig;
use crate::error::{first_line, ConnectFailure, PeekError, PeekResult};
use crate::models::{Environment, TextRows};
use crate::services::ssh_tunnel::{SshTunnelService, TunnelHandle, TunnelOpener};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, SimpleQueryMessage};

/// Settings applied to every connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Upper bound on establishing the database session
    pub connect_timeout: Duration,
    /// Reported to the server as `application_name`
    pub application_name: String,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: crate::config::DEFAULT_CONNECT_TIMEOUT,
            application_name: "pgpeek".to_string(),
        }
    }
}

impl ConnectOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            application_name: config.application_name.clone(),
        }
    }
}

/// Resolved connection target handed to a [`DatabaseConnector`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub application_name: String,
}

impl ConnectParams {
    /// Parameters for `env`, targeting `host:port`.
    pub fn for_target(env: &Environment, host: &str, port: u16, options: &ConnectOptions) -> Self {
        Self {
            host: host.to_string(),
            port,
            database: env.database.clone(),
            username: env.username.clone(),
            password: env.password.clone(),
            connect_timeout: options.connect_timeout,
            application_name: options.application_name.clone(),
        }
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// An open database session.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Run a read query and return every value in text form.
    async fn query(&self, sql: &str, params: &[&str]) -> PeekResult<TextRows>;

    /// Close the session. Called at most once.
    fn close(&mut self);
}

/// Opens database sessions.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> PeekResult<Box<dyn DatabaseClient>>;
}

// ========== tokio-postgres ==========

/// Connector for real Postgres servers (no TLS).
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

#[async_trait]
impl DatabaseConnector for PostgresConnector {
    async fn connect(&self, params: &ConnectParams) -> PeekResult<Box<dyn DatabaseClient>> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&params.host);
        pg_config.port(params.port);
        pg_config.dbname(&params.database);
        pg_config.user(&params.username);
        pg_config.password(&params.password);
        pg_config.application_name(&params.application_name);
        pg_config.connect_timeout(params.connect_timeout);

        let (client, connection) =
            tokio::time::timeout(params.connect_timeout, pg_config.connect(NoTls))
                .await
                .map_err(|_| {
                    PeekError::connection(
                        format!("timeout expired after {}s", params.connect_timeout.as_secs()),
                        ConnectFailure::Timeout,
                    )
                })?
                .map_err(PeekError::connect_failed)?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "Database connection closed with error");
            }
        });

        tracing::debug!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            "Database session opened"
        );
        Ok(Box::new(PostgresClient { client: Some(client), driver: Some(driver) }))
    }
}

/// How long a closing session's driver gets to send Terminate.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// A tokio-postgres session and its connection driver task.
pub struct PostgresClient {
    client: Option<tokio_postgres::Client>,
    driver: Option<JoinHandle<()>>,
}

impl PostgresClient {
    fn client(&self) -> PeekResult<&tokio_postgres::Client> {
        self.client.as_ref().ok_or_else(|| PeekError::query("Connection closed"))
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn query(&self, sql: &str, params: &[&str]) -> PeekResult<TextRows> {
        let client = self.client()?;

        if params.is_empty() {
            // Simple protocol: the server sends every value as text.
            let messages = client.simple_query(sql).await?;
            let mut result = TextRows::default();
            for message in messages {
                if let SimpleQueryMessage::Row(row) = message {
                    if result.columns.is_empty() {
                        result.columns =
                            row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    result.rows.push((0..row.len()).map(|i| row.get(i).map(String::from)).collect());
                }
            }
            return Ok(result);
        }

        let bound: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = client.query(sql, &bound).await?;

        let mut result = TextRows::default();
        if let Some(first) = rows.first() {
            result.columns = first.columns().iter().map(|c| c.name().to_string()).collect();
        }
        for row in &rows {
            let mut values = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                values.push(row.try_get::<_, Option<String>>(i)?);
            }
            result.rows.push(values);
        }
        Ok(result)
    }

    fn close(&mut self) {
        // Dropping the client lets the driver send Terminate and exit.
        self.client.take();
        let Some(driver) = self.driver.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let abort = driver.abort_handle();
                    if tokio::time::timeout(CLOSE_GRACE, driver).await.is_err() {
                        tracing::debug!("Database driver did not finish, aborting");
                        abort.abort();
                    }
                });
            }
            Err(_) => driver.abort(),
        }
    }
}

impl Drop for PostgresClient {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

// ========== Handles ==========

/// One database session, plus the tunnel it runs through.
///
/// Released exactly once: by [`close`](Self::close), or on drop if the owner
/// never got that far.
pub struct ConnectionHandle {
    environment: String,
    client: Option<Box<dyn DatabaseClient>>,
    tunnel: Option<TunnelHandle>,
}

impl ConnectionHandle {
    pub fn new(
        environment: impl Into<String>,
        client: Box<dyn DatabaseClient>,
        tunnel: Option<TunnelHandle>,
    ) -> Self {
        Self { environment: environment.into(), client: Some(client), tunnel }
    }

    /// Name of the environment this connection belongs to.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_tunneled(&self) -> bool {
        self.tunnel.is_some()
    }

    /// Local port of the tunnel, when there is one.
    pub fn tunnel_port(&self) -> Option<u16> {
        self.tunnel.as_ref().map(|t| t.local_port)
    }

    /// Run a read query.
    pub async fn query(&self, sql: &str, params: &[&str]) -> PeekResult<TextRows> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PeekError::internal("connection used after release"))?;
        client.query(sql, params).await
    }

    /// Close the session, then stop the tunnel.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close();
            tracing::debug!(environment = %self.environment, "Connection released");
        }
        if let Some(tunnel) = self.tunnel.take() {
            tunnel.stop();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("environment", &self.environment)
            .field("open", &self.client.is_some())
            .field("tunnel", &self.tunnel)
            .finish()
    }
}

// ========== Resolver ==========

/// Turns an environment into a live [`ConnectionHandle`].
#[derive(Clone)]
pub struct ConnectionResolver {
    tunnels: Arc<dyn TunnelOpener>,
    connector: Arc<dyn DatabaseConnector>,
    options: ConnectOptions,
}

impl ConnectionResolver {
    pub fn new(
        tunnels: Arc<dyn TunnelOpener>,
        connector: Arc<dyn DatabaseConnector>,
        options: ConnectOptions,
    ) -> Self {
        Self { tunnels, connector, options }
    }

    /// Resolver using russh tunnels and tokio-postgres.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            Arc::new(SshTunnelService::new(config.ssh_connect_timeout)),
            Arc::new(PostgresConnector),
            ConnectOptions::from_config(config),
        )
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Open a connection to `env`, tunneling through SSH when configured.
    ///
    /// Any tunnel started here is stopped again if the database connect fails.
    pub async fn connect(&self, env: &Environment) -> PeekResult<ConnectionHandle> {
        let tunnel = if env.uses_ssh() {
            match self.tunnels.open(env).await {
                Ok(tunnel) => Some(tunnel),
                Err(e @ PeekError::InvalidKeyFormat { .. }) => {
                    tracing::warn!(environment = %env.name, error = %e, "Rejected SSH key");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(environment = %env.name, error = %e, "SSH tunnel failed");
                    return Err(PeekError::Connection {
                        message: first_line(&e.to_string()),
                        kind: ConnectFailure::Tunnel,
                        source: Some(Box::new(e)),
                    });
                }
            }
        } else {
            None
        };

        let params = match &tunnel {
            Some(t) => ConnectParams::for_target(env, &t.local_host, t.local_port, &self.options),
            None => ConnectParams::for_target(env, &env.host, env.port, &self.options),
        };

        match self.connector.connect(&params).await {
            Ok(client) => {
                tracing::info!(
                    environment = %env.name,
                    database = %env.database,
                    tunneled = tunnel.is_some(),
                    "Connected"
                );
                Ok(ConnectionHandle::new(env.name.clone(), client, tunnel))
            }
            Err(e) => {
                if let Some(tunnel) = tunnel {
                    tunnel.stop();
                }
                let err = match e {
                    err @ PeekError::Connection { .. } => err,
                    other => PeekError::connection_classified(other.to_string()),
                };
                tracing::error!(environment = %env.name, error = %err, "Database connection failed");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for ConnectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionResolver").field("options", &self.options).finish()
    }
}
