///
/// Statement Binder
///
/// A `Statement` is one compiled SQL string, taken from the connection's
/// statement cache and returned to it on drop. Every execute/query cycle
/// starts from cleared bindings, so a reused statement behaves exactly like a
/// freshly prepared one.
///
/// Arity is checked client side before any binding happens: positional
/// arguments must match the placeholder count, and every named argument must
/// name an existing placeholder. Values are bound with their own storage
/// class; nothing is converted on the way in.
///

use std::sync::Arc;

use rusqlite::CachedStatement;
use tracing::debug;

use crate::arguments::StatementArguments;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::trace::SqlSinkHandle;

pub struct Statement<'db> {
    raw: CachedStatement<'db>,
    sql: String,
    columns: Arc<[String]>,
    sink: Option<&'db SqlSinkHandle>,
    arguments: StatementArguments,
}

impl<'db> Statement<'db> {
    pub(crate) fn new(
        raw: CachedStatement<'db>,
        sql: &str,
        sink: Option<&'db SqlSinkHandle>,
    ) -> Self {
        let columns: Arc<[String]> = raw
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();
        Self {
            raw,
            sql: sql.to_string(),
            columns,
            sink,
            arguments: StatementArguments::default(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_count(&self) -> usize {
        self.raw.parameter_count()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn is_read_only(&self) -> bool {
        self.raw.readonly()
    }

    /// Runs the statement to completion and returns the number of changed rows.
    pub fn execute(&mut self, arguments: impl Into<StatementArguments>) -> Result<usize> {
        self.bind(arguments.into())?;
        self.publish();
        self.raw
            .raw_execute()
            .map_err(|e| Error::execution(&self.sql, &self.arguments, e))
    }

    /// Binds the arguments and returns a cursor over the result rows.
    pub fn query(&mut self, arguments: impl Into<StatementArguments>) -> Result<Cursor<'_>> {
        self.bind(arguments.into())?;
        self.publish();
        let rows = self.raw.raw_query();
        Ok(Cursor::new(
            rows,
            self.columns.clone(),
            &self.sql,
            &self.arguments,
        ))
    }

    fn publish(&self) {
        debug!(target: "ftsql::sql", sql = %self.sql, arguments = %self.arguments, "execute");
        if let Some(sink) = self.sink {
            sink.record(&self.sql);
        }
    }

    fn bind(&mut self, arguments: StatementArguments) -> Result<()> {
        let expected = self.raw.parameter_count();
        self.raw.clear_bindings();

        match &arguments {
            StatementArguments::Positional(values) => {
                if values.len() != expected {
                    return Err(Error::ArityMismatch {
                        sql: self.sql.clone(),
                        expected,
                        actual: values.len(),
                    });
                }
                for (i, value) in values.iter().enumerate() {
                    self.raw
                        .raw_bind_parameter(i + 1, value)
                        .map_err(|e| Error::execution(&self.sql, &arguments, e))?;
                }
            }
            StatementArguments::Named(values) => {
                if values.len() != expected {
                    return Err(Error::ArityMismatch {
                        sql: self.sql.clone(),
                        expected,
                        actual: values.len(),
                    });
                }
                let mut indices = Vec::with_capacity(values.len());
                for name in values.keys() {
                    let index = self
                        .raw
                        .parameter_index(name)
                        .map_err(|e| Error::execution(&self.sql, &arguments, e))?
                        .ok_or_else(|| Error::UnknownArgument {
                            sql: self.sql.clone(),
                            name: name.clone(),
                        })?;
                    indices.push(index);
                }
                for (index, value) in indices.into_iter().zip(values.values()) {
                    self.raw
                        .raw_bind_parameter(index, value)
                        .map_err(|e| Error::execution(&self.sql, &arguments, e))?;
                }
            }
        }

        self.arguments = arguments;
        Ok(())
    }
}
