//! p8-sql CLI
//!
//! Command-line interface for the SQLite connector.

use anyhow::Context;
use clap::{Parser, Subcommand};
use percolate_sqlite::{Params, Sqlite, SqliteConfig, Table};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_PATH: &str = "~/.p8/sqlite.db";

/// p8-sql - query, copy and inspect SQLite tables
#[derive(Parser)]
#[command(name = "p8-sql")]
#[command(about = "Batched queries and table provisioning for SQLite", long_about = None)]
#[command(version)]
struct Cli {
    /// Database path (overrides P8_SQLITE_PATH and the config file)
    #[arg(long, env = "P8_SQLITE_PATH")]
    db: Option<PathBuf>,

    /// JSON config file; `--db` and `--batch-size` still apply on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows fetched per batch
    #[arg(long, env = "P8_SQLITE_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Attach a database as a schema (SCHEMA=PATH)
    #[arg(long = "attach", value_name = "SCHEMA=PATH")]
    attach: Vec<String>,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SQL statement and print its rows
    Query {
        /// SQL statement
        sql: String,

        /// Print rows as JSON instead of CSV
        #[arg(long)]
        json: bool,

        /// Write rows to a CSV file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Copy a CSV file into a table
    ///
    /// Field types are inferred (integer, real, date, timestamp, boolean,
    /// text) and decide the column types of a newly created table.
    Copy {
        /// CSV file with a header row
        file: PathBuf,

        /// Destination table (`schema.table` or `table`)
        table: String,

        /// Policy when the table exists: fail, append, drop, truncate
        #[arg(long, default_value = "fail")]
        if_exists: String,

        /// Size text columns exactly instead of rounding up
        #[arg(long)]
        strict_length: bool,

        /// Read every field as text, creating only varchar columns
        #[arg(long)]
        as_text: bool,
    },

    /// Check whether a table exists
    Exists {
        /// Table name (`schema.table` or `table`)
        table: String,

        /// Also match views
        #[arg(long)]
        views: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let db = Sqlite::new(build_config(&cli)?)?;

    match cli.command {
        Commands::Query { sql, json, output } => {
            cmd_query(&db, &sql, json, output)?;
        }
        Commands::Copy {
            file,
            table,
            if_exists,
            strict_length,
            as_text,
        } => {
            cmd_copy(&db, &file, &table, &if_exists, strict_length, as_text)?;
        }
        Commands::Exists { table, views } => {
            let exists = db.table_exists(&table, views)?;
            println!("{}", exists);
            if !exists {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}

fn build_config(cli: &Cli) -> anyhow::Result<SqliteConfig> {
    let mut config = match &cli.config {
        Some(path) => SqliteConfig::load(&expand(path))
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SqliteConfig::new(expand(Path::new(DEFAULT_DB_PATH))),
    };
    if let Some(db) = &cli.db {
        config.path = expand(db);
    }
    if let Some(size) = cli.batch_size {
        config.batch_size = size;
    }
    for entry in &cli.attach {
        let (schema, path) = entry
            .split_once('=')
            .with_context(|| format!("Expected SCHEMA=PATH, got '{}'", entry))?;
        config = config.attach(schema, expand(Path::new(path)));
    }
    Ok(config)
}

fn cmd_query(db: &Sqlite, sql: &str, json: bool, output: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(table) = db.query(sql, &Params::None)? else {
        eprintln!("Statement executed (no result set)");
        return Ok(());
    };

    if let Some(path) = output {
        table.to_csv(&path)?;
        eprintln!("Wrote {} rows to {}", table.num_rows(), path.display());
    } else if json {
        println!("{}", serde_json::to_string_pretty(&table.to_json_records())?);
    } else {
        table.to_csv_writer(std::io::stdout().lock())?;
    }
    Ok(())
}

fn cmd_copy(
    db: &Sqlite,
    file: &Path,
    table: &str,
    if_exists: &str,
    strict_length: bool,
    as_text: bool,
) -> anyhow::Result<()> {
    let path = expand(file);
    let data = if as_text {
        Table::from_csv(&path)
    } else {
        Table::from_csv_typed(&path)
    }
    .with_context(|| format!("Failed to read {}", file.display()))?;
    let outcome = db.copy(&data, table, if_exists, strict_length)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
