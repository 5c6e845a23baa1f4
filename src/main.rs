//! dualdb command line.
//!
//! Runs one statement against the configured read/write-split database and
//! prints the result as JSON on stdout. Logs go to stderr.

use clap::{Args, Parser, Subcommand};
use dualdb::models::{DEFAULT_PAGE, DEFAULT_PER_PAGE};
use dualdb::{Database, DbConfig, DbError, PageRequest, SchemaRegistry, Statement};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "dualdb",
    about = "Run statements against a read/write-split database",
    version
)]
struct Cli {
    #[command(flatten)]
    db: DbConfig,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DB_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "DB_JSON_LOGS")]
    json_logs: bool,

    /// JSON schema file; without it rows are printed unhydrated
    #[arg(long, env = "DB_SCHEMA")]
    schema: Option<PathBuf>,

    /// Send reads to the read-write connection
    #[arg(long = "force-rw")]
    force_rw: bool,

    /// Print the rendered SQL instead of running it
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the first row
    FetchOne(StatementArgs),
    /// Fetch every row
    FetchAll(StatementArgs),
    /// Run a write or DDL statement
    Execute(StatementArgs),
    /// Count the rows a SELECT returns
    Count(StatementArgs),
    /// Fetch one page of a SELECT
    Paginate {
        #[command(flatten)]
        statement: StatementArgs,
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u64,
        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: u64,
    },
}

#[derive(Debug, Args)]
struct StatementArgs {
    /// SQL text with `?` placeholders
    #[arg(long)]
    sql: String,

    /// Positional parameter as JSON; bare text is taken as a string (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<JsonValue>,

    /// Contributing table, root first (repeatable)
    #[arg(long = "table")]
    tables: Vec<String>,
}

impl StatementArgs {
    fn statement(&self) -> Result<Statement, DbError> {
        Ok(Statement::from_json(&self.sql, &self.params)?.with_tables(self.tables.iter().cloned()))
    }
}

fn parse_param(raw: &str) -> Result<JsonValue, String> {
    Ok(serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string())))
}

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: &Cli, db: &Database, hydrate: bool) -> Result<(), Box<dyn std::error::Error>> {
    if cli.debug {
        let debug = db.debug();
        match &cli.command {
            Command::FetchOne(args) => println!("{}", debug.fetch_one(&args.statement()?)?),
            Command::FetchAll(args) => println!("{}", debug.fetch_all(&args.statement()?)?),
            Command::Execute(args) => println!("{}", debug.execute(&args.statement()?)?),
            Command::Count(args) => println!("{}", debug.count(&args.statement()?)?),
            Command::Paginate {
                statement,
                page,
                per_page,
            } => {
                let rendered = debug.paginate(&statement.statement()?, PageRequest::new(*page, *per_page))?;
                println!("{}\n{}", rendered.count_sql, rendered.page_sql);
            }
        }
        return Ok(());
    }

    match &cli.command {
        Command::FetchOne(args) => {
            let stmt = args.statement()?;
            if hydrate {
                print_json(&db.fetch_one(&stmt).await?)
            } else {
                print_json(&db.fetch_rows(&stmt).await?.into_iter().next())
            }
        }
        Command::FetchAll(args) => {
            let stmt = args.statement()?;
            if hydrate {
                print_json(&db.fetch_all(&stmt).await?)
            } else {
                print_json(&db.fetch_rows(&stmt).await?)
            }
        }
        Command::Execute(args) => print_json(&db.execute(&args.statement()?).await?),
        Command::Count(args) => print_json(&db.count(&args.statement()?).await?),
        Command::Paginate {
            statement,
            page,
            per_page,
        } => {
            let stmt = statement.statement()?;
            let request = PageRequest::new(*page, *per_page);
            if hydrate {
                print_json(&db.paginate(&stmt, request).await?)
            } else {
                print_json(&db.paginate_rows(&stmt, request).await?)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(&cli);

    let registry = match &cli.schema {
        Some(path) => SchemaRegistry::load(path)?,
        None => SchemaRegistry::new(),
    };
    info!(
        driver = %cli.db.driver,
        tables = registry.len(),
        "Starting dualdb v{}",
        env!("CARGO_PKG_VERSION")
    );

    let hydrate = cli.schema.is_some();
    let mut db = Database::from_config(&cli.db, registry)?;
    if cli.force_rw {
        db = db.force_read_write();
    }

    let result = run(&cli, &db, hydrate).await;
    db.close().await;

    if let Err(e) = result {
        match e.downcast_ref::<DbError>() {
            Some(db_err) => error!(
                code = db_err.code(),
                suggestion = db_err.suggestion().unwrap_or_default(),
                sql = db_err.sql().unwrap_or_default(),
                error = %db_err,
                "Statement failed"
            ),
            None => error!(error = %e, "Command failed"),
        }
        return Err(e);
    }

    Ok(())
}
