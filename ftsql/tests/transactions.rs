///
/// # Execution, Transaction and Cursor Tests
///
/// End-to-end behavior of a connection: transaction outcomes as seen through
/// the SQL log, queue serialization, lazy cursors and typed decoding.
///

use ftsql::{
    args, Configuration, Database, DatabaseQueue, DecodeError, Error, NestedTransactions, SqlLog,
    StatementArguments, TransactionKind, Value,
};
use tempfile::TempDir;

fn open_logged() -> (Database, SqlLog) {
    let log = SqlLog::new();
    let db = Database::open_in_memory(Configuration::default().with_sql_sink(log.handle()))
        .expect("Failed to open database");
    db.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT UNIQUE)")
        .expect("Failed to create table");
    log.clear();
    (db, log)
}

fn count_items(db: &Database) -> i64 {
    db.fetch_one::<i64>("SELECT COUNT(*) FROM items", args![])
        .unwrap()
        .unwrap()
}

#[test]
fn test_failed_body_rolls_back_everything() {
    let (db, log) = open_logged();
    let result: ftsql::Result<()> = db.in_transaction(|db| {
        db.execute("INSERT INTO items (name) VALUES (?)", args!["a"])?;
        db.execute("INSERT INTO items (name) VALUES (?)", args!["a"])?;
        Ok(())
    });

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
    assert_eq!(err.sql(), Some("INSERT INTO items (name) VALUES (?)"));
    assert!(err.to_string().contains("with arguments [\"a\"]"));
    assert_eq!(count_items(&db), 0);
    assert!(!db.is_in_transaction());
    assert_eq!(
        log.statements(),
        vec![
            "BEGIN DEFERRED TRANSACTION".to_string(),
            "INSERT INTO items (name) VALUES (?)".to_string(),
            "INSERT INTO items (name) VALUES (?)".to_string(),
            "ROLLBACK TRANSACTION".to_string(),
            "SELECT COUNT(*) FROM items".to_string(),
        ]
    );
}

#[test]
fn test_successful_body_commits() {
    let (db, log) = open_logged();
    let id = db
        .in_transaction(|db| -> ftsql::Result<i64> {
            db.execute("INSERT INTO items (name) VALUES (?)", args!["a"])?;
            Ok(db.last_insert_rowid())
        })
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(count_items(&db), 1);
    assert!(log.contains("COMMIT TRANSACTION"));
}

#[derive(Debug)]
enum AppError {
    Db(Error),
    Rejected,
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError::Db(e)
    }
}

#[test]
fn test_application_error_rolls_back() {
    let (db, _log) = open_logged();
    let result = db.in_transaction(|db| -> Result<(), AppError> {
        db.execute("INSERT INTO items (name) VALUES (?)", args!["a"])?;
        Err(AppError::Rejected)
    });
    assert!(matches!(result, Err(AppError::Rejected)));
    assert_eq!(count_items(&db), 0);
}

#[test]
fn test_nested_scope_joins_outer_transaction() {
    let (db, log) = open_logged();
    db.in_transaction(|db| -> ftsql::Result<()> {
        db.execute("INSERT INTO items (name) VALUES (?)", args!["outer"])?;
        let inner = db.transaction()?;
        assert!(inner.is_joined());
        inner.database().execute("INSERT INTO items (name) VALUES (?)", args!["inner"])?;
        inner.commit()?;
        Ok(())
    })
    .unwrap();

    let begins = log
        .statements()
        .iter()
        .filter(|s| s.starts_with("BEGIN"))
        .count();
    assert_eq!(begins, 1);
    assert_eq!(count_items(&db), 2);
}

#[test]
fn test_joined_scope_failure_rolls_back_outer() {
    let (db, _log) = open_logged();
    let result: ftsql::Result<()> = db.in_transaction(|db| {
        db.execute("INSERT INTO items (name) VALUES (?)", args!["outer"])?;
        db.in_transaction(|db| {
            db.execute("INSERT INTO items (name) VALUES (?)", args!["outer"])?;
            Ok(())
        })
    });
    assert!(result.is_err());
    assert_eq!(count_items(&db), 0);
}

#[test]
fn test_handled_joined_failure_still_rolls_back() {
    let (db, log) = open_logged();
    let result: ftsql::Result<()> = db.in_transaction(|db| {
        db.execute("INSERT INTO items (name) VALUES (?)", args!["outer"])?;
        let inner = db.in_transaction(|db| -> Result<(), AppError> {
            db.execute("INSERT INTO items (name) VALUES (?)", args!["inner"])?;
            Err(AppError::Rejected)
        });
        assert!(matches!(inner, Err(AppError::Rejected)));
        Ok(())
    });

    assert!(matches!(result, Err(Error::RollbackOnly)));
    assert_eq!(count_items(&db), 0);
    assert!(!log.contains("COMMIT TRANSACTION"));
    assert!(log.contains("ROLLBACK TRANSACTION"));

    // The next transaction is not affected.
    db.in_transaction(|db| db.execute("INSERT INTO items (name) VALUES (?)", args!["later"]))
        .unwrap();
    assert_eq!(count_items(&db), 1);
}

#[test]
fn test_body_error_survives_failed_rollback() {
    let db = Database::open_in_memory(
        Configuration::default().with_nested_transactions(NestedTransactions::Savepoint),
    )
    .unwrap();
    db.execute_batch("CREATE TABLE t (v)").unwrap();

    db.in_transaction(|db| -> ftsql::Result<()> {
        let inner = db.in_transaction(|db| -> Result<(), AppError> {
            db.execute("INSERT INTO t VALUES (?)", args![1_i64])?;
            // Releasing the savepoint by hand makes the scope's rollback fail.
            db.execute_batch("RELEASE SAVEPOINT ftsql_savepoint_1")?;
            Err(AppError::Rejected)
        });
        assert!(matches!(inner, Err(AppError::Rejected)));
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_failed_commit_rolls_back() {
    let (db, log) = open_logged();
    db.execute_batch(
        "CREATE TABLE parent (id INTEGER PRIMARY KEY);
         CREATE TABLE child (parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED)",
    )
    .unwrap();
    log.clear();

    let err = db
        .in_transaction(|db| db.execute("INSERT INTO child VALUES (?)", args![99_i64]))
        .unwrap_err();
    assert_eq!(err.sql(), Some("COMMIT TRANSACTION"));
    assert!(err.extended_code().is_some());
    assert!(!db.is_in_transaction());
    assert_eq!(
        log.statements(),
        vec![
            "BEGIN DEFERRED TRANSACTION".to_string(),
            "INSERT INTO child VALUES (?)".to_string(),
            "COMMIT TRANSACTION".to_string(),
            "ROLLBACK TRANSACTION".to_string(),
        ]
    );
    assert_eq!(
        db.fetch_one::<i64>("SELECT COUNT(*) FROM child", args![]).unwrap(),
        Some(0)
    );
}

#[test]
fn test_savepoint_guards_finished_out_of_order() {
    let log = SqlLog::new();
    let db = Database::open_in_memory(
        Configuration::default()
            .with_sql_sink(log.handle())
            .with_nested_transactions(NestedTransactions::Savepoint),
    )
    .unwrap();
    db.execute_batch("CREATE TABLE t (v)").unwrap();

    let outer = db.transaction().unwrap();
    let first = db.transaction().unwrap();
    let second = db.transaction().unwrap();
    // Rolling back the first savepoint also releases the second.
    first.rollback().unwrap();
    let third = db.transaction().unwrap();
    db.execute("INSERT INTO t VALUES (?)", args!["kept"]).unwrap();
    drop(second);
    third.commit().unwrap();
    outer.commit().unwrap();

    let values: Vec<String> = db.fetch_all("SELECT v FROM t", args![]).unwrap();
    assert_eq!(values, vec!["kept".to_string()]);
    assert!(log.contains("SAVEPOINT ftsql_savepoint_3"));
    assert!(log.contains("RELEASE SAVEPOINT ftsql_savepoint_3"));
    assert!(!log.contains("ROLLBACK TRANSACTION TO SAVEPOINT ftsql_savepoint_2"));
}

#[test]
fn test_savepoints_when_configured() {
    let log = SqlLog::new();
    let db = Database::open_in_memory(
        Configuration::default()
            .with_sql_sink(log.handle())
            .with_nested_transactions(NestedTransactions::Savepoint)
            .with_transaction_kind(TransactionKind::Immediate),
    )
    .unwrap();
    db.execute_batch("CREATE TABLE t (v)").unwrap();

    db.in_transaction(|db| -> ftsql::Result<()> {
        db.execute("INSERT INTO t VALUES (?)", args![1_i64])?;
        db.in_transaction(|db| db.execute("INSERT INTO t VALUES (?)", args![2_i64]))?;
        Ok(())
    })
    .unwrap();

    assert!(log.contains("BEGIN IMMEDIATE TRANSACTION"));
    assert!(log.contains("SAVEPOINT ftsql_savepoint_1"));
    assert!(log.contains("RELEASE SAVEPOINT ftsql_savepoint_1"));
    let values: Vec<i64> = db.fetch_all("SELECT v FROM t ORDER BY v", args![]).unwrap();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn test_explicit_rollback() {
    let (db, log) = open_logged();
    let tx = db.transaction_with_kind(TransactionKind::Exclusive).unwrap();
    tx.database()
        .execute("INSERT INTO items (name) VALUES (?)", args!["a"])
        .unwrap();
    tx.rollback().unwrap();
    assert_eq!(count_items(&db), 0);
    assert!(log.contains("BEGIN EXCLUSIVE TRANSACTION"));
    assert!(log.contains("ROLLBACK TRANSACTION"));
}

#[test]
fn test_named_arguments() {
    let (db, _log) = open_logged();
    db.execute(
        "INSERT INTO items (id, name) VALUES (:id, :name)",
        StatementArguments::named([("name", Value::from("a")), (":id", Value::from(5_i64))]),
    )
    .unwrap();
    let name: Option<String> = db
        .fetch_one(
            "SELECT name FROM items WHERE id = :id",
            StatementArguments::named([("id", 5_i64)]),
        )
        .unwrap();
    assert_eq!(name.as_deref(), Some("a"));

    let err = db
        .execute(
            "SELECT name FROM items WHERE id = :id",
            StatementArguments::named([("key", 5_i64)]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnknownArgument { ref name, .. } if name == ":key"));
}

#[test]
fn test_reused_statement_starts_from_clean_bindings() {
    let (db, _log) = open_logged();
    let mut stmt = db.prepare("INSERT INTO items (name) VALUES (?)").unwrap();
    assert_eq!(stmt.parameter_count(), 1);
    assert!(!stmt.is_read_only());
    stmt.execute(args!["a"]).unwrap();
    stmt.execute(args!["b"]).unwrap();
    assert!(matches!(
        stmt.execute(args![]),
        Err(Error::ArityMismatch { expected: 1, actual: 0, .. })
    ));
    drop(stmt);
    assert_eq!(count_items(&db), 2);
    assert_eq!(db.changes(), 1);
}

#[test]
fn test_cursor_is_lazy_and_fused() {
    let (db, _log) = open_logged();
    for name in ["a", "b", "c"] {
        db.execute("INSERT INTO items (name) VALUES (?)", args![name]).unwrap();
    }

    let mut stmt = db.prepare("SELECT id, name FROM items ORDER BY id").unwrap();
    assert_eq!(stmt.column_names(), ["id", "name"]);
    let mut cursor = stmt.query(args![]).unwrap();
    let first = cursor.next().unwrap().unwrap();
    assert_eq!(first.get::<i64>("id").unwrap(), 1);
    assert_eq!(first.get::<String>(1).unwrap(), "a");
    assert_eq!(first.get::<String>("NAME").unwrap(), "a");

    let rest: Vec<String> = cursor
        .by_ref()
        .map(|row| row.unwrap().get::<String>("name").unwrap())
        .collect();
    assert_eq!(rest, vec!["b".to_string(), "c".to_string()]);
    assert!(cursor.next().is_none());
    assert!(cursor.next().is_none());
}

#[test]
fn test_cursor_stops_after_decode_error() {
    let (db, _log) = open_logged();
    let mut stmt = db
        .prepare("SELECT CAST(x'ff' AS TEXT) UNION ALL SELECT 'a'")
        .unwrap();
    let mut cursor = stmt.query(args![]).unwrap();
    assert!(matches!(
        cursor.next(),
        Some(Err(Error::Decode(DecodeError::InvalidUtf8 { column: 0 })))
    ));
    assert!(cursor.next().is_none());
}

#[test]
fn test_compile_error_carries_arguments() {
    let (db, _log) = open_logged();
    let err = db
        .execute("INSERT INTO missing VALUES (?)", args!["x"])
        .unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
    assert_eq!(err.sql(), Some("INSERT INTO missing VALUES (?)"));
    assert!(err.to_string().contains("with arguments [\"x\"]"));
    assert!(err.extended_code().is_some());

    let err = db
        .fetch_one::<i64>("SELECT id FROM missing WHERE id = ?", args![1_i64])
        .unwrap_err();
    assert!(err.to_string().contains("with arguments [1]"));
}

#[test]
fn test_empty_result_set() {
    let (db, _log) = open_logged();
    assert_eq!(db.fetch_one::<String>("SELECT name FROM items", args![]).unwrap(), None);
    assert!(db.fetch_one_row("SELECT name FROM items", args![]).unwrap().is_none());
    assert!(db.fetch_rows("SELECT name FROM items", args![]).unwrap().is_empty());
}

#[test]
fn test_null_zero_and_empty_text_stay_distinct() {
    let (db, _log) = open_logged();
    let row = db
        .fetch_one_row("SELECT NULL, 0, '', x'', 2.5", args![])
        .unwrap()
        .unwrap();
    assert_eq!(
        row.values(),
        &[
            Value::Null,
            Value::Integer(0),
            Value::Text(String::new()),
            Value::Blob(Vec::new()),
            Value::Real(2.5),
        ]
    );
    assert_eq!(row.get::<Option<i64>>(0).unwrap(), None);
    assert_eq!(
        row.get::<i64>(0).unwrap_err(),
        DecodeError::UnexpectedNull { target: "i64" }
    );
    assert!(matches!(
        row.get::<i64>(2).unwrap_err(),
        DecodeError::TypeMismatch { .. }
    ));
    assert_eq!(row.get::<f64>(1).unwrap(), 0.0);
    assert!(matches!(
        row.get::<Value>(9).unwrap_err(),
        DecodeError::ColumnIndexOutOfRange { index: 9, count: 5 }
    ));
}

#[test]
fn test_values_keep_their_storage_class() {
    let (db, _log) = open_logged();
    db.execute_batch("CREATE TABLE anything (v)").unwrap();
    db.execute(
        "INSERT INTO anything VALUES (?), (?), (?), (?), (?)",
        args![Value::Null, 42_i64, 1.5_f64, "text", vec![0_u8, 1, 2]],
    )
    .unwrap();
    let types: Vec<String> = db
        .fetch_all("SELECT typeof(v) FROM anything ORDER BY rowid", args![])
        .unwrap();
    assert_eq!(types, vec!["null", "integer", "real", "text", "blob"]);
}

#[test]
fn test_queue_closes_once() {
    let queue = DatabaseQueue::open_in_memory(Configuration::default()).unwrap();
    queue.close().unwrap();
    assert!(matches!(
        queue.in_database(|db| db.execute_batch("SELECT 1")),
        Err(Error::ConnectionClosed)
    ));
}

#[test]
fn test_file_database_persists_committed_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("library.sqlite");

    let queue = DatabaseQueue::open(&path, Configuration::default()).unwrap();
    queue
        .in_transaction(|db| -> ftsql::Result<()> {
            db.create_virtual_table("books", ftsql::Fts3, |t| {
                t.column("title");
            })?;
            db.execute("INSERT INTO books VALUES (?)", args!["Moby Dick"])?;
            Ok(())
        })
        .unwrap();
    queue.close().unwrap();

    let db = Database::open(&path, Configuration::default().read_only(true)).unwrap();
    assert!(db.table_exists("books").unwrap());
    let title: Option<String> = db
        .fetch_one("SELECT title FROM books WHERE books MATCH ?", args!["moby"])
        .unwrap();
    assert_eq!(title.as_deref(), Some("Moby Dick"));
    assert!(db.execute("INSERT INTO books VALUES (?)", args!["x"]).is_err());
    db.close().unwrap();
}
