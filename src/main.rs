//! `sql-model` CLI entry-point.
//!
//! Available sub-commands:
//! - `bootstrap` run the schema script.
//! - `select`    print matching rows as JSON.
//! - `count`     print the number of matching rows.
//! - `delete`    delete matching rows.
//!
//! The connection string comes from `DATABASE_URL_<ENV>` / `DATABASE_URL`
//! unless `--database-url` is given. `RUST_LOG` controls log output.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sql_model::model::DEFAULT_SCHEMA_SCRIPT;
use sql_model::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sql-model", about = "Table-level CRUD from the command line", version)]
struct Cli {
    /// Environment used to pick `DATABASE_URL_<ENV>`.
    #[arg(
        long,
        global = true,
        env = "APP_ENV",
        default_value = sql_model::config::DEFAULT_ENVIRONMENT
    )]
    env: String,

    /// Use this connection string instead of the environment.
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the schema script against the database.
    Bootstrap {
        #[arg(long, default_value = DEFAULT_SCHEMA_SCRIPT)]
        script: PathBuf,
    },
    /// Print rows as a JSON array.
    Select {
        table: String,
        /// Comma-separated projection.
        #[arg(long, value_delimiter = ',', default_value = "*")]
        fields: Vec<String>,
        /// `column=value` filter; repeat for AND.
        #[arg(long = "where", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Print `{"count": n}`.
    Count {
        table: String,
        #[arg(long = "where", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Delete matching rows and print `{"deleted": n}`.
    Delete {
        table: String,
        #[arg(long = "where", value_parser = parse_filter, required = true)]
        filters: Vec<(String, String)>,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (column, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected column=value, got {raw:?}"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in {raw:?}"));
    }
    Ok((column.to_string(), value.to_string()))
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<(), ModelError> {
    let config = match cli.database_url {
        Some(url) => DatabaseConfig::new(url),
        None => DatabaseConfig::from_env(&cli.env)?,
    };
    let (pool, supervisor) = ConnectionPool::connect(&config).await?;
    supervisor.terminate_on_fatal();

    match cli.command {
        Command::Bootstrap { script } => {
            info!(path = %script.display(), "bootstrapping schema");
            // Any identifier will do; bootstrap never touches the model's table.
            let model = Model::new(pool.clone(), "bootstrap")?.with_schema_script(script);
            model.bootstrap_tables().await?;
            info!("schema applied");
        }
        Command::Select {
            table,
            fields,
            filters,
        } => {
            let model = Model::new(pool.clone(), table)?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let filter: Constraints = filters.into_iter().collect();
            let rows = model.select_with_constraints(&fields, Some(&filter)).await?;
            print_json(&rows)?;
        }
        Command::Count { table, filters } => {
            let model = Model::new(pool.clone(), table)?;
            let filter: Constraints = filters.into_iter().collect();
            let count = model.count_all_with_constraints(&filter).await?;
            print_json(&serde_json::json!({ "count": count }))?;
        }
        Command::Delete { table, filters } => {
            let model = Model::new(pool.clone(), table)?;
            let filter: Constraints = filters.into_iter().collect();
            let deleted = model.delete(&filter).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
    }

    pool.close();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ModelError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| ModelError::ParameterError(format!("could not encode output: {e}")))?;
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
