///
/// SQL event sink.
///
/// A connection configured with a sink publishes the text of every statement
/// it sends to SQLite: rendered DDL, bound statements (as written, with their
/// placeholders) and transaction control statements. Pragmas issued while
/// the connection is being opened are not published, so the first recorded
/// statement is always one the caller asked for. `SqlLog` is the recording
/// sink used by tests to assert on exact SQL text.
///

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

pub trait SqlSink: Send + Sync {
    fn record(&self, sql: &str);
}

/// Shared handle to a sink, stored in `Configuration`.
#[derive(Clone)]
pub struct SqlSinkHandle(Arc<dyn SqlSink>);

impl SqlSinkHandle {
    pub fn new(sink: impl SqlSink + 'static) -> Self {
        SqlSinkHandle(Arc::new(sink))
    }

    pub(crate) fn record(&self, sql: &str) {
        self.0.record(sql);
    }
}

impl fmt::Debug for SqlSinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SqlSinkHandle")
    }
}

/// In-memory statement recorder. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct SqlLog {
    statements: Arc<Mutex<Vec<String>>>,
}

impl SqlLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.statements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn contains(&self, sql: &str) -> bool {
        self.lock().iter().any(|s| s == sql)
    }

    pub fn last(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn handle(&self) -> SqlSinkHandle {
        SqlSinkHandle::new(self.clone())
    }
}

impl SqlSink for SqlLog {
    fn record(&self, sql: &str) {
        self.lock().push(sql.to_string());
    }
}
