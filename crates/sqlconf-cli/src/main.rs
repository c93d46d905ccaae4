//! sqlconf CLI
//!
//! Renders the configuration stored behind a `sql://` URI, or shows how a
//! URI is parsed without touching the database.

use std::io::{self, Write};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use sqlconf_core::prelude::*;
use sqlconf_sqlite::SqliteGateway;

/// Rebuild FTP server configuration from SQL tables.
#[derive(Parser, Debug)]
#[command(name = "sqlconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the configuration and print it.
    Render {
        /// Configuration URI, e.g. sql:///etc/proftpd/conf.db?driver=sqlite
        #[arg(env = "SQLCONF_URI")]
        uri: String,
    },

    /// Show the parsed connection and table settings.
    Inspect {
        /// Configuration URI.
        #[arg(env = "SQLCONF_URI")]
        uri: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_ascii_lowercase()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Render { uri } => render(&uri),
        Commands::Inspect { uri, json } => inspect(&uri, json),
    }
}

fn render(uri: &str) -> anyhow::Result<()> {
    if !is_sql_uri(uri) {
        bail!("not a sql:// URI: {uri}");
    }

    let mut source = ConfigSource::new(SqliteGateway::new());
    let mut reader = source.open(uri).map_err(|e| {
        let kind = e.kind();
        anyhow::Error::new(e).context(format!("failed to load configuration ({kind:?} error)"))
    })?;
    debug!(lines = reader.remaining(), "Rendering configuration");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut line = String::new();
    while reader.read_line(&mut line) > 0 {
        out.write_all(line.as_bytes())?;
        line.clear();
    }
    out.flush()?;
    Ok(())
}

fn inspect(uri: &str, json: bool) -> anyhow::Result<()> {
    let state = LoaderState::from_uri(uri).context("failed to parse URI")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let target = state.target();
    let schema = state.schema();
    println!("server:   {}", target.server);
    println!("database: {}", target.database.as_deref().unwrap_or("-"));
    println!("username: {}", target.username.as_deref().unwrap_or("-"));
    println!(
        "password: {}",
        if target.password.is_some() { "********" } else { "-" }
    );
    println!("driver:   {}", state.driver().unwrap_or("sqlite3"));
    println!("dsn:      {}", target.dsn());

    let c = &schema.context;
    println!(
        "ctx:      {}({}, {}, {}, {}){}",
        c.table,
        c.id_column,
        c.parent_id_column,
        c.key_column,
        c.value_column,
        where_suffix(c.where_clause.as_deref())
    );
    if let Some(base) = c.base_id {
        println!("base_id:  {base}");
    }

    let d = &schema.directive;
    println!(
        "conf:     {}({}, {}, {}){}",
        d.table,
        d.id_column,
        d.key_column,
        d.value_column,
        where_suffix(d.where_clause.as_deref())
    );

    let m = &schema.mapping;
    println!(
        "map:      {}({}, {}){}",
        m.table,
        m.conf_id_column,
        m.ctx_id_column,
        where_suffix(m.where_clause.as_deref())
    );
    Ok(())
}

fn where_suffix(clause: Option<&str>) -> String {
    clause.map_or_else(String::new, |w| format!(" {w}"))
}
