//! pgpeek - read-only Postgres dashboard.
//!
//! Subcommands:
//! - `env` - Manage named environments (connection profiles)
//! - `schema` - List the tables of the active environment
//! - `table` - Show every row of one table
//! - `export` / `import` - Whole-database JSON snapshots
//! - `chart` - Chart input for faults, jobs or bots
//!
//! All output to stdout is JSON. Logs go to stderr and the log file.

use clap::{Args, Parser, Subcommand};
use pgpeek_core::logging::{init_logging, LogConfig};
use pgpeek_core::{ChartKind, CoreConfig, DashboardSession, Environment, PeekError, PeekResult};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// pgpeek - read-only Postgres dashboard with SSH tunnel support
#[derive(Parser)]
#[command(name = "pgpeek")]
#[command(version)]
struct Cli {
    /// Directory holding saved environments and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Database connect timeout in seconds
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage environments
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// List tables and columns of the active environment
    Schema,

    /// Show all rows of a table
    Table {
        /// Table name as listed by `schema`
        name: String,
    },

    /// Export every table as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Load an export file and list its tables
    Import {
        /// Export file written by `export`
        file: PathBuf,

        /// Also show the rows of this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Chart input; sample data unless a non-empty table is given
    Chart {
        /// faults, jobs or bots
        #[arg(value_parser = parse_chart_kind)]
        kind: ChartKind,

        /// Read rows from this table
        #[arg(long)]
        table: Option<String>,
    },
}

#[derive(Subcommand)]
enum EnvCommand {
    /// List environments
    List,
    /// Show one environment (secrets redacted)
    Show { name: String },
    /// Create or replace an environment
    Add(AddEnv),
    /// Make an environment active
    Use { name: String },
    /// Delete an environment
    Remove { name: String },
}

#[derive(Args)]
struct AddEnv {
    name: String,
    #[arg(long, default_value = "localhost")]
    host: String,
    #[arg(long, default_value_t = 5432)]
    port: u16,
    #[arg(long)]
    database: String,
    #[arg(long)]
    username: String,
    #[arg(long, default_value = "")]
    password: String,
    /// SSH server; enables tunneling
    #[arg(long)]
    ssh_host: Option<String>,
    #[arg(long, default_value_t = 22)]
    ssh_port: u16,
    #[arg(long)]
    ssh_user: Option<String>,
    /// File holding an unencrypted RSA, Ed25519 or ECDSA private key
    #[arg(long)]
    ssh_key_file: Option<PathBuf>,
}

fn parse_chart_kind(s: &str) -> Result<ChartKind, String> {
    ChartKind::parse(s).ok_or_else(|| format!("unknown chart '{s}' (expected faults, jobs or bots)"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => return print_error(&e, &[]),
    };
    if let Some(dir) = cli.data_dir.clone() {
        config = config.with_data_dir(dir);
    }
    if let Some(secs) = cli.connect_timeout {
        if secs == 0 {
            return print_error(&PeekError::config("--connect-timeout must be greater than zero"), &[]);
        }
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }

    let mut log_config = LogConfig::new(config.log_dir());
    if let Some(filter) = &config.log_filter {
        log_config = log_config.with_filter(filter.clone());
    }
    let _logging_guard = init_logging(log_config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            return print_error(&PeekError::internal(format!("Failed to create tokio runtime: {e}")), &[])
        }
    };

    let mut session = match DashboardSession::open(&config) {
        Ok(session) => session,
        Err(e) => return print_error(&e, &[]),
    };

    let outcome = runtime.block_on(run(&mut session, cli.command));
    let notices = session.take_notices();
    match outcome {
        Ok(data) => {
            let notices = serde_json::to_value(&notices).unwrap_or(Value::Null);
            println!("{}", json!({ "ok": true, "data": data, "notices": notices }));
            ExitCode::SUCCESS
        }
        Err(e) => print_error(&e, &notices),
    }
}

async fn run(session: &mut DashboardSession, command: Commands) -> PeekResult<Value> {
    let now = chrono::Utc::now();
    match command {
        Commands::Env { command } => run_env(session, command),

        Commands::Schema => {
            let tables = session.fetch_schema().await?;
            Ok(serde_json::to_value(tables)?)
        }

        Commands::Table { name } => {
            session.fetch_schema().await?;
            let result = session.select_table(&name).await?;
            Ok(json!({ "table": result.table, "columns": result.columns, "rows": result.records() }))
        }

        Commands::Export { output } => {
            let bundle = session.export_all(now).await?;
            let text = pgpeek_core::QueryService::bundle_to_json(&bundle)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    tracing::info!(path = %path.display(), "Export written");
                    Ok(json!({
                        "path": path.display().to_string(),
                        "tables": bundle.tables.keys().collect::<Vec<_>>(),
                        "skipped": bundle.skipped,
                    }))
                }
                None => Ok(serde_json::from_str(&text)?),
            }
        }

        Commands::Import { file, table } => {
            let text = std::fs::read_to_string(&file)?;
            let imported = session.import_export(&text)?;
            let mut data = json!({
                "exported_at": imported.exported_at,
                "tables": imported.tables,
            });
            if let Some(name) = table {
                let result = session.select_table(&name).await?;
                data["rows"] = Value::Array(result.records().into_iter().map(Value::Object).collect());
            }
            Ok(data)
        }

        Commands::Chart { kind, table } => {
            if let Some(name) = table {
                session.fetch_schema().await?;
                session.select_table(&name).await?;
            }
            Ok(serde_json::to_value(session.chart(kind, now))?)
        }
    }
}

fn run_env(session: &mut DashboardSession, command: EnvCommand) -> PeekResult<Value> {
    match command {
        EnvCommand::List => {
            let active = session.credentials().active_name();
            let list: Vec<Value> = session
                .credentials()
                .environments()
                .iter()
                .map(|env| {
                    json!({
                        "name": env.name,
                        "target": env.display_url(),
                        "active": Some(env.name.as_str()) == active,
                    })
                })
                .collect();
            Ok(Value::Array(list))
        }

        EnvCommand::Show { name } => {
            let env = session
                .credentials()
                .get(&name)
                .ok_or_else(|| PeekError::validation(format!("Unknown environment: {name}")))?;
            redacted(env)
        }

        EnvCommand::Add(args) => {
            let mut env = Environment::new(args.name, args.host, args.database, args.username)
                .with_port(args.port)
                .with_password(args.password)
                .with_ssh_port(args.ssh_port);
            env.ssh_host = args.ssh_host;
            env.ssh_user = args.ssh_user;
            if let Some(path) = args.ssh_key_file {
                env.ssh_key = Some(std::fs::read_to_string(&path)?);
            }
            session.save_environment(env.clone())?;
            redacted(&env)
        }

        EnvCommand::Use { name } => {
            session.set_active_environment(&name)?;
            Ok(json!({ "active": name }))
        }

        EnvCommand::Remove { name } => {
            let removed = session.delete_environment(&name)?;
            Ok(json!({ "removed": removed, "active": session.credentials().active_name() }))
        }
    }
}

/// Environment as JSON with the password and key masked.
fn redacted(env: &Environment) -> PeekResult<Value> {
    let mut value = serde_json::to_value(env)?;
    if let Some(fields) = value.as_object_mut() {
        fields.insert("password".into(), json!(if env.password.is_empty() { "" } else { "********" }));
        if env.ssh_key.is_some() {
            fields.insert("ssh_key".into(), json!("<redacted>"));
        }
    }
    Ok(value)
}

fn print_error(err: &PeekError, notices: &[pgpeek_core::Notice]) -> ExitCode {
    let error = serde_json::to_value(err.to_error_info()).unwrap_or(Value::Null);
    let notices = serde_json::to_value(notices).unwrap_or(Value::Null);
    println!("{}", json!({ "ok": false, "error": error, "notices": notices }));
    ExitCode::FAILURE
}
