///
/// Execution & Transaction Manager
///
/// `Database` owns exactly one SQLite connection. It is `Send` but not
/// `Sync`, so statements on one connection always run one at a time; share it
/// across threads through `DatabaseQueue`.
///
/// Every statement goes straight to the engine: schema changes and writes are
/// visible to the next statement on the same connection, and nothing about
/// engine state is cached client side apart from compiled statements.
///
/// Transactions:
/// - `in_transaction` commits when the body returns `Ok`, rolls back and
///   returns the body's error otherwise
/// - `transaction` returns a guard; `commit`/`rollback` consume it, and a
///   guard dropped without either rolls back
/// - a scope opened while a transaction is active joins it (or becomes a
///   savepoint, depending on `Configuration::nested_transactions`)
/// - a joined scope that rolls back marks the whole transaction rollback-only;
///   the outer commit then rolls back and fails with `Error::RollbackOnly`
///
/// Savepoint names are unique within one transaction. A savepoint already
/// released by an enclosing scope is skipped when its own guard finishes.
///

use std::cell::{Cell, RefCell};
use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::arguments::StatementArguments;
use crate::config::{Configuration, NestedTransactions, TransactionKind};
use crate::cursor::Row;
use crate::error::{Error, Result};
use crate::statement::Statement;
use crate::value::FromValue;

pub struct Database {
    conn: Connection,
    config: Configuration,
    savepoints: RefCell<Vec<String>>,
    savepoint_seq: Cell<usize>,
    rollback_only: Cell<bool>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>, config: Configuration) -> Result<Self> {
        let path = path.as_ref();
        let flags = if config.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };
        let conn = Connection::open_with_flags(path, flags).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), read_only = config.read_only, "opened database");
        Self::configure(conn, config)
    }

    pub fn open_in_memory(config: Configuration) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::Open {
            path: ":memory:".into(),
            source,
        })?;
        info!("opened in-memory database");
        Self::configure(conn, config)
    }

    fn configure(conn: Connection, config: Configuration) -> Result<Self> {
        conn.set_prepared_statement_cache_capacity(config.statement_cache_capacity);
        let db = Self {
            conn,
            config,
            savepoints: RefCell::new(Vec::new()),
            savepoint_seq: Cell::new(0),
            rollback_only: Cell::new(false),
        };
        if let Some(ms) = db.config.busy_timeout_ms {
            db.conn
                .busy_timeout(std::time::Duration::from_millis(ms))
                .map_err(|e| Error::execution("PRAGMA busy_timeout", &StatementArguments::default(), e))?;
        }
        let pragma = if db.config.foreign_keys {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        };
        // Connection setup is not published to the sink.
        debug!(target: "ftsql::sql", sql = pragma, "configure");
        db.conn
            .execute_batch(pragma)
            .map_err(|e| Error::execution(pragma, &StatementArguments::default(), e))?;
        Ok(db)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Closes the connection, finalizing every cached statement.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Close(e))?;
        info!("closed database");
        Ok(())
    }

    pub(crate) fn publish(&self, sql: &str) {
        debug!(target: "ftsql::sql", sql, "execute");
        if let Some(sink) = &self.config.sql_sink {
            sink.record(sql);
        }
    }

    /// Compiles `sql`, reusing a cached statement when one is available.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        self.prepare_for(sql, &StatementArguments::default())
    }

    /// Compile errors carry the arguments the statement was about to run with.
    fn prepare_for(&self, sql: &str, arguments: &StatementArguments) -> Result<Statement<'_>> {
        let raw = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| Error::execution(sql, arguments, e))?;
        Ok(Statement::new(raw, sql, self.config.sql_sink.as_ref()))
    }

    /// Executes one statement and returns the number of changed rows.
    pub fn execute(&self, sql: &str, arguments: impl Into<StatementArguments>) -> Result<usize> {
        let arguments: StatementArguments = arguments.into();
        self.prepare_for(sql, &arguments)?.execute(arguments)
    }

    /// Executes `;`-separated statements that take no arguments.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.publish(sql);
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::execution(sql, &StatementArguments::default(), e))
    }

    pub(crate) fn execute_schema(&self, sql: &str) -> Result<()> {
        self.publish(sql);
        self.conn
            .execute_batch(sql)
            .map_err(|source| Error::Schema {
                sql: sql.to_string(),
                source,
            })
    }

    /// First column of the first row, `None` when there is no row or the
    /// column is NULL.
    pub fn fetch_one<T: FromValue>(
        &self,
        sql: &str,
        arguments: impl Into<StatementArguments>,
    ) -> Result<Option<T>> {
        let arguments: StatementArguments = arguments.into();
        let mut stmt = self.prepare_for(sql, &arguments)?;
        let mut cursor = stmt.query(arguments)?;
        match cursor.next_row()? {
            Some(row) => Ok(row.get::<Option<T>>(0)?),
            None => Ok(None),
        }
    }

    /// First column of every row.
    pub fn fetch_all<T: FromValue>(
        &self,
        sql: &str,
        arguments: impl Into<StatementArguments>,
    ) -> Result<Vec<T>> {
        let arguments: StatementArguments = arguments.into();
        let mut stmt = self.prepare_for(sql, &arguments)?;
        let cursor = stmt.query(arguments)?;
        let mut values = Vec::new();
        for row in cursor {
            values.push(row?.get::<T>(0)?);
        }
        Ok(values)
    }

    pub fn fetch_one_row(
        &self,
        sql: &str,
        arguments: impl Into<StatementArguments>,
    ) -> Result<Option<Row>> {
        let arguments: StatementArguments = arguments.into();
        let mut stmt = self.prepare_for(sql, &arguments)?;
        let mut cursor = stmt.query(arguments)?;
        cursor.next_row()
    }

    pub fn fetch_rows(
        &self,
        sql: &str,
        arguments: impl Into<StatementArguments>,
    ) -> Result<Vec<Row>> {
        let arguments: StatementArguments = arguments.into();
        let mut stmt = self.prepare_for(sql, &arguments)?;
        let cursor = stmt.query(arguments)?;
        cursor.collect()
    }

    pub fn changes(&self) -> u64 {
        self.conn.changes()
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    pub fn is_in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    pub fn transaction(&self) -> Result<Transaction<'_>> {
        self.transaction_with_kind(self.config.default_transaction_kind)
    }

    pub fn transaction_with_kind(&self, kind: TransactionKind) -> Result<Transaction<'_>> {
        let scope = if !self.is_in_transaction() {
            self.run_control(kind.begin_sql())?;
            self.reset_transaction_state();
            Scope::Outer
        } else {
            match self.config.nested_transactions {
                NestedTransactions::Reuse => Scope::Joined,
                NestedTransactions::Savepoint => {
                    let seq = self.savepoint_seq.get() + 1;
                    let name = format!("ftsql_savepoint_{}", seq);
                    self.run_control(&format!("SAVEPOINT {}", name))?;
                    self.savepoint_seq.set(seq);
                    self.savepoints.borrow_mut().push(name.clone());
                    Scope::Savepoint(name)
                }
            }
        };

        Ok(Transaction {
            db: self,
            scope,
            finished: false,
        })
    }

    /// Runs `body` in a transaction: commits on `Ok`, rolls back on `Err`.
    pub fn in_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&Database) -> Result<T, E>,
        E: From<Error>,
    {
        let tx = self.transaction()?;
        match body(self) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                warn!("transaction body failed, rolling back");
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "rollback after failed transaction body failed");
                }
                Err(e)
            }
        }
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count = self.fetch_one::<i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            crate::args![name],
        )?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn reset_transaction_state(&self) {
        self.savepoints.borrow_mut().clear();
        self.savepoint_seq.set(0);
        self.rollback_only.set(false);
    }

    /// Removes `name` and every savepoint opened after it. False when the
    /// savepoint was already released.
    fn pop_savepoint(&self, name: &str) -> bool {
        let mut savepoints = self.savepoints.borrow_mut();
        match savepoints.iter().position(|s| s == name) {
            Some(i) => {
                savepoints.truncate(i);
                true
            }
            None => false,
        }
    }

    fn run_control(&self, sql: &str) -> Result<()> {
        self.publish(sql);
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::execution(sql, &StatementArguments::default(), e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Outer,
    Joined,
    Savepoint(String),
}

/// Transaction scope guard with exactly one outcome.
pub struct Transaction<'db> {
    db: &'db Database,
    scope: Scope,
    finished: bool,
}

impl<'db> Transaction<'db> {
    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// True when this scope joined an already active transaction.
    pub fn is_joined(&self) -> bool {
        self.scope == Scope::Joined
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        match &self.scope {
            Scope::Outer => {
                if self.db.rollback_only.get() {
                    warn!("transaction marked rollback-only, rolling back instead of committing");
                    self.rollback_scope()?;
                    return Err(Error::RollbackOnly);
                }
                let committed = self.db.run_control("COMMIT TRANSACTION");
                if let Err(e) = committed {
                    if self.db.is_in_transaction() {
                        if let Err(rollback) = self.db.run_control("ROLLBACK TRANSACTION") {
                            warn!(error = %rollback, "rollback after failed commit failed");
                        }
                    }
                    self.db.reset_transaction_state();
                    return Err(e);
                }
                self.db.reset_transaction_state();
                Ok(())
            }
            Scope::Joined => Ok(()),
            Scope::Savepoint(name) => {
                if !self.db.pop_savepoint(name) {
                    return Ok(());
                }
                self.db.run_control(&format!("RELEASE SAVEPOINT {}", name))
            }
        }
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.rollback_scope()
    }

    fn rollback_scope(&self) -> Result<()> {
        match &self.scope {
            Scope::Outer => {
                self.db.reset_transaction_state();
                // The engine may already have rolled back on its own.
                if self.db.is_in_transaction() {
                    self.db.run_control("ROLLBACK TRANSACTION")
                } else {
                    Ok(())
                }
            }
            Scope::Joined => {
                self.db.rollback_only.set(true);
                Ok(())
            }
            Scope::Savepoint(name) => {
                if !self.db.pop_savepoint(name) || !self.db.is_in_transaction() {
                    return Ok(());
                }
                self.db.run_control(&format!("ROLLBACK TRANSACTION TO SAVEPOINT {}", name))?;
                self.db.run_control(&format!("RELEASE SAVEPOINT {}", name))
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            if let Err(e) = self.rollback_scope() {
                warn!(error = %e, "rollback of unfinished transaction failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::trace::SqlLog;

    fn memory_db(log: &SqlLog) -> Database {
        Database::open_in_memory(Configuration::default().with_sql_sink(log.handle()))
            .expect("Failed to open database")
    }

    #[test]
    fn test_execute_and_fetch() {
        let log = SqlLog::new();
        let db = memory_db(&log);
        db.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        assert_eq!(db.execute("INSERT INTO t (name) VALUES (?)", args!["abc"]).unwrap(), 1);
        assert_eq!(db.last_insert_rowid(), 1);
        assert_eq!(db.changes(), 1);

        let name: Option<String> = db.fetch_one("SELECT name FROM t WHERE id = ?", args![1_i64]).unwrap();
        assert_eq!(name.as_deref(), Some("abc"));
        assert!(log.contains("INSERT INTO t (name) VALUES (?)"));
    }

    #[test]
    fn test_open_publishes_nothing() {
        let log = SqlLog::new();
        let db = memory_db(&log);
        assert!(log.statements().is_empty());
        db.execute_batch("CREATE TABLE t (v)").unwrap();
        assert_eq!(log.statements(), vec!["CREATE TABLE t (v)".to_string()]);
    }

    #[test]
    fn test_arity_mismatch_never_reaches_engine() {
        let log = SqlLog::new();
        let db = memory_db(&log);
        db.execute_batch("CREATE TABLE t (a, b)").unwrap();
        log.clear();

        let err = db
            .execute("INSERT INTO t VALUES (?, ?)", args!["only one"])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert!(log.statements().is_empty());
        assert_eq!(db.fetch_one::<i64>("SELECT COUNT(*) FROM t", args![]).unwrap(), Some(0));
    }

    #[test]
    fn test_savepoint_scope_rolls_back_alone() {
        let log = SqlLog::new();
        let db = Database::open_in_memory(
            Configuration::default()
                .with_sql_sink(log.handle())
                .with_nested_transactions(NestedTransactions::Savepoint),
        )
        .unwrap();
        db.execute_batch("CREATE TABLE t (v)").unwrap();

        db.in_transaction(|db| -> Result<()> {
            db.execute("INSERT INTO t VALUES (?)", args!["outer"])?;
            let inner: Result<()> = db.in_transaction(|db| {
                db.execute("INSERT INTO t VALUES (?)", args!["inner"])?;
                Err(Error::ConnectionClosed)
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        let values: Vec<String> = db.fetch_all("SELECT v FROM t", args![]).unwrap();
        assert_eq!(values, vec!["outer".to_string()]);
        assert!(log.contains("SAVEPOINT ftsql_savepoint_1"));
        assert!(log.contains("ROLLBACK TRANSACTION TO SAVEPOINT ftsql_savepoint_1"));
        assert!(log.contains("COMMIT TRANSACTION"));
    }

    #[test]
    fn test_dropped_guard_rolls_back() {
        let log = SqlLog::new();
        let db = memory_db(&log);
        db.execute_batch("CREATE TABLE t (v)").unwrap();
        {
            let tx = db.transaction().unwrap();
            tx.database().execute("INSERT INTO t VALUES (?)", args![1_i64]).unwrap();
        }
        assert!(!db.is_in_transaction());
        assert_eq!(db.fetch_one::<i64>("SELECT COUNT(*) FROM t", args![]).unwrap(), Some(0));
        assert_eq!(log.last().as_deref(), Some("SELECT COUNT(*) FROM t"));
        assert!(log.contains("ROLLBACK TRANSACTION"));
    }
}
