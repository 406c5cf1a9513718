///
/// Serialized access to one connection.
///
/// `DatabaseQueue` wraps a single `Database` behind a mutex: closures passed to
/// `in_database` and `in_transaction` run one at a time, in lock order, on
/// whichever thread calls them. After `close` every call fails with
/// `Error::ConnectionClosed` without touching the engine.
///

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::config::Configuration;
use crate::database::Database;
use crate::error::{Error, Result};

pub struct DatabaseQueue {
    db: Mutex<Option<Database>>,
}

impl DatabaseQueue {
    pub fn open(path: impl AsRef<Path>, config: Configuration) -> Result<Self> {
        Ok(Self::from_database(Database::open(path, config)?))
    }

    pub fn open_in_memory(config: Configuration) -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory(config)?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Mutex::new(Some(db)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Database>> {
        self.db
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `body` outside of any explicit transaction (unless the body
    /// opens one).
    pub fn in_database<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&Database) -> Result<T, E>,
        E: From<Error>,
    {
        let guard = self.lock();
        let db = guard.as_ref().ok_or(Error::ConnectionClosed)?;
        body(db)
    }

    /// Runs `body` in a transaction that commits on `Ok` and rolls back on `Err`.
    pub fn in_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&Database) -> Result<T, E>,
        E: From<Error>,
    {
        let guard = self.lock();
        let db = guard.as_ref().ok_or(Error::ConnectionClosed)?;
        db.in_transaction(body)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Closes the connection. Closing an already closed queue is a no-op.
    pub fn close(&self) -> Result<()> {
        match self.lock().take() {
            Some(db) => db.close(),
            None => Ok(()),
        }
    }
}
