//! In-memory stand-ins for Postgres and SSH, shared by the unit tests.

use crate::error::{PeekError, PeekResult};
use crate::models::{Environment, TextRows};
use crate::services::connection::{
    ConnectOptions, ConnectParams, ConnectionHandle, ConnectionResolver, DatabaseClient,
    DatabaseConnector,
};
use crate::services::query::select_all_sql;
use crate::services::schema::{COLUMNS_SQL, TABLES_SQL};
use crate::services::ssh_tunnel::{
    parse_private_key, TunnelHandle, TunnelOpener, TunnelRegistry, LOCAL_BIND_HOST,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const ED25519_KEY: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/id_ed25519"));

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    /// (column name, data type)
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl FakeTable {
    pub fn new(name: &str, columns: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|(n, t)| (n.to_string(), t.to_string())).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: &[Option<&str>]) -> Self {
        self.rows.push(values.iter().map(|v| v.map(String::from)).collect());
        self
    }
}

/// Tables in catalog order, plus injected failures.
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    pub tables: Vec<FakeTable>,
    failing_reads: HashSet<String>,
    failing_columns: HashSet<String>,
    catalog_fails: bool,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: FakeTable) -> Self {
        self.tables.push(table);
        self
    }

    /// bots, faults, jobs.
    pub fn robotics() -> Self {
        Self::new()
            .with_table(
                FakeTable::new(
                    "bots",
                    &[
                        ("id", "integer"),
                        ("name", "character varying"),
                        ("battery_soc", "double precision"),
                        ("state", "text"),
                    ],
                )
                .row(&[Some("1"), Some("alpha"), Some("87"), Some("IDLE")])
                .row(&[Some("2"), Some("beta"), Some("54.25"), Some("MOVING")])
                .row(&[Some("3"), None, Some("12.5"), Some("CHARGING")]),
            )
            .with_table(
                FakeTable::new("faults", &[("timestamp", "timestamp with time zone"), ("count", "integer")])
                    .row(&[Some("2024-05-01 00:00:00+00"), Some("4")]),
            )
            .with_table(FakeTable::new(
                "jobs",
                &[("timestamp", "timestamp without time zone"), ("completed", "integer"), ("failed", "integer")],
            ))
    }

    /// Six-column fleet table with five bots.
    pub fn fleet() -> Self {
        let columns = [
            ("id", "integer"),
            ("name", "text"),
            ("position_x", "double precision"),
            ("position_y", "double precision"),
            ("battery_soc", "integer"),
            ("state", "text"),
        ];
        let mut bots = FakeTable::new("bots", &columns);
        for (id, name, x, y, soc, state) in [
            ("1", "alpha", "1.5", "2.25", "99", "IDLE"),
            ("2", "beta", "10", "4", "45", "MOVING"),
            ("3", "gamma", "7.75", "0", "12", "CHARGING"),
            ("4", "delta", "3", "3", "100", "IDLE"),
            ("5", "epsilon", "0.5", "9", "0", "MOVING"),
        ] {
            bots = bots.row(&[Some(id), Some(name), Some(x), Some(y), Some(soc), Some(state)]);
        }
        Self::new().with_table(bots)
    }

    /// `SELECT * FROM <table>` fails.
    pub fn fail_reads_of(mut self, table: &str) -> Self {
        self.failing_reads.insert(table.to_string());
        self
    }

    /// Listing the columns of `table` fails.
    pub fn fail_columns_of(mut self, table: &str) -> Self {
        self.failing_columns.insert(table.to_string());
        self
    }

    /// Listing tables fails.
    pub fn fail_catalog(mut self) -> Self {
        self.catalog_fails = true;
        self
    }

    fn answer(&self, sql: &str, params: &[&str]) -> PeekResult<TextRows> {
        if sql == TABLES_SQL {
            if self.catalog_fails {
                return Err(PeekError::query("permission denied for schema information_schema"));
            }
            let rows = self.tables.iter().map(|t| vec![Some(t.name.clone())]).collect();
            return Ok(TextRows::new(vec!["table_name".into()], rows));
        }

        if sql == COLUMNS_SQL {
            let name = params.first().copied().unwrap_or_default();
            if self.failing_columns.contains(name) {
                return Err(PeekError::query(format!("could not read columns of {name}")));
            }
            let rows = self
                .tables
                .iter()
                .filter(|t| t.name == name)
                .flat_map(|t| t.columns.iter())
                .map(|(n, ty)| vec![Some(n.clone()), Some(ty.clone())])
                .collect();
            return Ok(TextRows::new(vec!["column_name".into(), "data_type".into()], rows));
        }

        for table in &self.tables {
            if sql == select_all_sql(&table.name) {
                if self.failing_reads.contains(&table.name) {
                    return Err(PeekError::Query {
                        message: format!("permission denied for table {}", table.name),
                        code: Some("42501".into()),
                        detail: None,
                        hint: None,
                    });
                }
                let columns = table.columns.iter().map(|(n, _)| n.clone()).collect();
                return Ok(TextRows::new(columns, table.rows.clone()));
            }
        }

        Err(PeekError::Query {
            message: "relation does not exist".into(),
            code: Some("42P01".into()),
            detail: None,
            hint: None,
        })
    }
}

/// Connector that hands out sessions on a [`FakeDatabase`].
#[derive(Debug)]
pub struct FakeConnector {
    db: Arc<FakeDatabase>,
    fail_with: Option<String>,
    attempts: AtomicUsize,
    open: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
    last_params: Mutex<Option<ConnectParams>>,
}

impl FakeConnector {
    pub fn new(db: FakeDatabase) -> Self {
        Self {
            db: Arc::new(db),
            fail_with: None,
            attempts: AtomicUsize::new(0),
            open: Arc::new(AtomicUsize::new(0)),
            executed: Arc::new(Mutex::new(Vec::new())),
            last_params: Mutex::new(None),
        }
    }

    /// Every connect attempt fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self { fail_with: Some(message.to_string()), ..Self::new(FakeDatabase::new()) }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn last_params(&self) -> Option<ConnectParams> {
        self.last_params.lock().clone()
    }
}

#[async_trait]
impl DatabaseConnector for FakeConnector {
    async fn connect(&self, params: &ConnectParams) -> PeekResult<Box<dyn DatabaseClient>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock() = Some(params.clone());

        if let Some(message) = &self.fail_with {
            return Err(PeekError::connection_classified(message));
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeClient {
            db: self.db.clone(),
            open: self.open.clone(),
            executed: self.executed.clone(),
            closed: false,
        }))
    }
}

struct FakeClient {
    db: Arc<FakeDatabase>,
    open: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

#[async_trait]
impl DatabaseClient for FakeClient {
    async fn query(&self, sql: &str, params: &[&str]) -> PeekResult<TextRows> {
        if self.closed {
            return Err(PeekError::query("Connection closed"));
        }
        self.executed.lock().push(sql.to_string());
        self.db.answer(sql, params)
    }

    fn close(&mut self) {
        assert!(!self.closed, "session closed twice");
        self.closed = true;
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Tunnel opener that validates the key like the real one, then pretends to
/// listen on a fixed local port.
#[derive(Debug)]
pub struct FakeTunnelOpener {
    registry: TunnelRegistry,
    local_port: u16,
    fail_with: Option<String>,
    opened: AtomicUsize,
}

impl FakeTunnelOpener {
    pub fn new(local_port: u16) -> Self {
        Self { registry: TunnelRegistry::new(), local_port, fail_with: None, opened: AtomicUsize::new(0) }
    }

    /// Every valid-key open fails with a transport error.
    pub fn failing(message: &str) -> Self {
        Self { fail_with: Some(message.to_string()), ..Self::new(0) }
    }

    pub fn registry(&self) -> &TunnelRegistry {
        &self.registry
    }

    /// Tunnels successfully opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelOpener for FakeTunnelOpener {
    async fn open(&self, env: &Environment) -> PeekResult<TunnelHandle> {
        let key = env.ssh_key().ok_or_else(|| PeekError::invalid_key("no private key provided"))?;
        parse_private_key(key)?;

        if let Some(message) = &self.fail_with {
            return Err(PeekError::tunnel(message.clone()));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(TunnelHandle::new(&self.registry, LOCAL_BIND_HOST, self.local_port, env.host.clone(), env.port))
    }
}

/// Open a direct connection to `db`.
pub async fn connect_to(db: FakeDatabase) -> (ConnectionHandle, Arc<FakeConnector>) {
    let connector = Arc::new(FakeConnector::new(db));
    let resolver = ConnectionResolver::new(
        Arc::new(FakeTunnelOpener::new(0)),
        connector.clone(),
        ConnectOptions::default(),
    );
    let env = Environment::new("test", "localhost", "test_db", "postgres");
    let handle = resolver.connect(&env).await.unwrap();
    (handle, connector)
}
