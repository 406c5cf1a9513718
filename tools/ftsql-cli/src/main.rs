///
/// ftsql CLI - Command-line front end for ftsql
///
/// Provides commands for working with schema manifests and databases:
/// - ftsql render <manifest>: Print the DDL a manifest declares
/// - ftsql apply <db> <manifest>: Create the manifest's tables in one transaction
/// - ftsql exec <db> <sql> [args...]: Run one statement with text arguments
/// - ftsql search <db> <table> <query>: Run a MATCH query, one JSON object per row
///
/// Logs go to stderr; `-v` raises the level (info, debug, trace). At debug
/// level every statement sent to SQLite is logged under `ftsql::sql`.
///

use clap::{ArgAction, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

use ftsql::{quote_identifier, Configuration, Database, Row, StatementArguments, Value};

#[derive(Parser)]
#[command(name = "ftsql")]
#[command(author, version, about = "Typed SQLite client with FTS3/FTS4 table builders", long_about = None)]
struct Cli {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CREATE VIRTUAL TABLE statements of a manifest
    Render {
        /// Schema manifest (TOML)
        manifest: PathBuf,
    },

    /// Create every table of a manifest in one transaction
    Apply {
        /// Database file
        database: PathBuf,

        /// Schema manifest (TOML)
        manifest: PathBuf,
    },

    /// Execute one statement and print the number of changed rows
    Exec {
        /// Database file
        database: PathBuf,

        /// SQL statement
        sql: String,

        /// Positional arguments, bound as text
        args: Vec<String>,
    },

    /// Run a full-text query and print matching rows as JSON
    Search {
        /// Database file
        database: PathBuf,

        /// Virtual table name
        table: String,

        /// MATCH expression
        query: String,

        /// Restrict the match to one column
        #[arg(long)]
        column: Option<String>,

        /// Maximum number of rows
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render { manifest } => render(&manifest),
        Commands::Apply { database, manifest } => apply(&database, &manifest),
        Commands::Exec { database, sql, args } => exec(&database, &sql, args),
        Commands::Search {
            database,
            table,
            query,
            column,
            limit,
        } => search(&database, &table, &query, column.as_deref(), limit),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn render(manifest: &Path) -> Result<()> {
    let manifest = ftsql::parse_manifest(manifest).into_diagnostic()?;
    for definition in manifest.definitions().into_diagnostic()? {
        println!("{};", definition.sql());
    }
    Ok(())
}

fn apply(database: &Path, manifest_path: &Path) -> Result<()> {
    let manifest = ftsql::parse_manifest(manifest_path).into_diagnostic()?;
    let db = Database::open(database, manifest.database.clone()).into_diagnostic()?;
    manifest.apply(&db).into_diagnostic()?;
    println!(
        "Created {} virtual table(s) in {}",
        manifest.virtual_tables.len(),
        database.display()
    );
    db.close().into_diagnostic()
}

fn exec(database: &Path, sql: &str, args: Vec<String>) -> Result<()> {
    let db = Database::open(database, Configuration::default()).into_diagnostic()?;
    let changes = db
        .execute(sql, StatementArguments::positional(args))
        .into_diagnostic()?;
    println!("{}", changes);
    db.close().into_diagnostic()
}

fn search_sql(table: &str, column: Option<&str>) -> String {
    let table = quote_identifier(table);
    let target = match column {
        Some(column) => quote_identifier(column),
        None => table.clone(),
    };
    format!("SELECT * FROM {} WHERE {} MATCH ? LIMIT ?", table, target)
}

fn search(
    database: &Path,
    table: &str,
    query: &str,
    column: Option<&str>,
    limit: u32,
) -> Result<()> {
    let db = Database::open(database, Configuration::default().read_only(true)).into_diagnostic()?;
    let sql = search_sql(table, column);
    debug!(sql = %sql, "search");
    let rows = db
        .fetch_rows(&sql, ftsql::args![query, limit])
        .into_diagnostic()?;
    for row in &rows {
        println!("{}", row_to_json(row));
    }
    db.close().into_diagnostic()
}

fn row_to_json(row: &Row) -> serde_json::Value {
    let object = row
        .columns()
        .iter()
        .zip(row.values())
        .map(|(column, value)| (column.clone(), value_to_json(value)))
        .collect();
    serde_json::Value::Object(object)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(r) => serde_json::Number::from_f64(*r)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(bytes) => serde_json::Value::from(bytes.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_search_sql() {
        assert_eq!(
            search_sql("books", None),
            "SELECT * FROM \"books\" WHERE \"books\" MATCH ? LIMIT ?"
        );
        assert_eq!(
            search_sql("books", Some("title")),
            "SELECT * FROM \"books\" WHERE \"title\" MATCH ? LIMIT ?"
        );
    }

    #[test]
    fn test_row_to_json() {
        let columns: Arc<[String]> = ["title", "year", "score", "note"]
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .into();
        let row = Row::new(
            columns,
            vec![
                Value::Text("Moby Dick".to_string()),
                Value::Integer(1851),
                Value::Real(4.5),
                Value::Null,
            ],
        );
        assert_eq!(
            row_to_json(&row).to_string(),
            r#"{"note":null,"score":4.5,"title":"Moby Dick","year":1851}"#
        );
    }

    #[test]
    fn test_cli_parses_search_options() {
        let cli = Cli::try_parse_from([
            "ftsql", "-vv", "search", "lib.sqlite", "books", "whale", "--column", "body", "--limit", "5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search { table, column, limit, .. } => {
                assert_eq!(table, "books");
                assert_eq!(column.as_deref(), Some("body"));
                assert_eq!(limit, 5);
            }
            _ => panic!("expected search command"),
        }
    }
}
