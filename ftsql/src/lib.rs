///
/// # ftsql - Typed SQLite client with FTS3/FTS4 table builders
///
/// This crate wraps a single SQLite connection with typed values, checked
/// argument binding, lazy cursors, scoped transactions and builders that
/// render `CREATE VIRTUAL TABLE` statements for the FTS3 and FTS4 modules.
///
/// ## Library Usage
///
/// ```rust,ignore
/// use ftsql::{args, Configuration, DatabaseQueue, Fts3, Fts3Tokenizer};
///
/// let queue = DatabaseQueue::open_in_memory(Configuration::default())?;
/// queue.in_database(|db| {
///     db.create_virtual_table("books", Fts3, |t| {
///         t.column("author").column("title").column("body");
///         t.tokenizer(Fts3Tokenizer::Porter);
///     })?;
///     db.execute(
///         "INSERT INTO books VALUES (?, ?, ?)",
///         args!["Melville", "Moby Dick", "Call me Ishmael."],
///     )?;
///     db.fetch_one::<i64>("SELECT COUNT(*) FROM books WHERE books MATCH ?", args!["ishmael"])
/// })?;
/// ```
///
/// ## Schema Manifests
///
/// Tables can also be declared in a TOML manifest and created in one
/// transaction; see `schema::manifest`.
///

pub mod arguments;
pub mod config;
pub mod cursor;
pub mod database;
pub mod error;
pub mod queue;
pub mod schema;
pub mod statement;
pub mod trace;
pub mod value;

pub use arguments::StatementArguments;
pub use config::{Configuration, NestedTransactions, TransactionKind};
pub use cursor::{Cursor, Row, RowIndex};
pub use database::{Database, Transaction};
pub use error::{ConfigError, DecodeError, Error, Result};
pub use queue::DatabaseQueue;
pub use schema::manifest::{parse_manifest, parse_manifest_str, SchemaManifest};
pub use schema::{
    quote_identifier, Fts3, Fts3TableDefinition, Fts3Tokenizer, Fts4, Fts4Column, Fts4Order,
    Fts4TableDefinition, Unicode61, VirtualTableDefinition, VirtualTableModule,
};
pub use statement::Statement;
pub use trace::{SqlLog, SqlSink, SqlSinkHandle};
pub use value::{FromValue, Value};
