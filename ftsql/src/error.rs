///
/// Client error types.
///
/// Client-side failures (argument arity, unknown named arguments, a closed
/// queue) are detected before anything is sent to SQLite. Engine failures
/// keep the original `rusqlite::Error` as their source, together with the SQL
/// text and the arguments that were bound, so the engine's own message and
/// extended result code reach the caller unmodified.
///

use std::path::PathBuf;
use thiserror::Error;

use crate::arguments::StatementArguments;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Statement `{sql}` expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        sql: String,
        expected: usize,
        actual: usize,
    },

    #[error("Statement `{sql}` has no parameter named '{name}'")]
    UnknownArgument { sql: String, name: String },

    #[error("Schema statement `{sql}` failed: {source}")]
    Schema {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Statement `{sql}` failed{}: {source}", format_arguments(.arguments))]
    Execution {
        sql: String,
        arguments: StatementArguments,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database connection is closed")]
    ConnectionClosed,

    #[error("Transaction was rolled back because a joined scope failed")]
    RollbackOnly,

    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to close database: {0}")]
    Close(#[source] rusqlite::Error),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn execution(
        sql: &str,
        arguments: &StatementArguments,
        source: rusqlite::Error,
    ) -> Self {
        Error::Execution {
            sql: sql.to_string(),
            arguments: arguments.clone(),
            source,
        }
    }

    /// Extended SQLite result code of an engine-reported failure.
    pub fn extended_code(&self) -> Option<i32> {
        match self {
            Error::Schema { source, .. }
            | Error::Execution { source, .. }
            | Error::Open { source, .. }
            | Error::Close(source) => sqlite_error_code(source),
            _ => None,
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::ArityMismatch { sql, .. }
            | Error::UnknownArgument { sql, .. }
            | Error::Schema { sql, .. }
            | Error::Execution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

fn sqlite_error_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => Some(err.extended_code),
        rusqlite::Error::SqlInputError { error, .. } => Some(error.extended_code),
        _ => None,
    }
}

fn format_arguments(arguments: &StatementArguments) -> String {
    if arguments.is_empty() {
        String::new()
    } else {
        format!(" with arguments {}", arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Cannot decode NULL as {target}")]
    UnexpectedNull { target: &'static str },

    #[error("Cannot decode {found} as {target}")]
    TypeMismatch {
        target: &'static str,
        found: &'static str,
    },

    #[error("Value {value} is out of range for {target}")]
    OutOfRange { target: &'static str, value: String },

    #[error("Column {column} holds text that is not valid UTF-8")]
    InvalidUtf8 { column: usize },

    #[error("No column at index {index} (row has {count} column(s))")]
    ColumnIndexOutOfRange { index: usize, count: usize },

    #[error("No column named '{name}'")]
    ColumnNotFound { name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid virtual table '{table}': {reason}")]
    InvalidTable { table: String, reason: String },
}
