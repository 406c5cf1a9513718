///
/// Result Cursor
///
/// A `Cursor` pulls rows from SQLite one step at a time. It borrows the
/// statement that produced it, so it cannot outlive the statement or the
/// connection, and it is fused: once the engine reports the end of the result
/// set, or an error, every later `next()` returns `None`.
///
/// Each `Row` is decoded eagerly into owned `Value`s when the cursor steps,
/// which keeps rows usable after the cursor moves on.
///

use std::sync::Arc;

use crate::arguments::StatementArguments;
use crate::error::{DecodeError, Error, Result};
use crate::value::{FromValue, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

/// Column lookup by ordinal or by name.
pub trait RowIndex {
    fn index(&self, row: &Row) -> Result<usize, DecodeError>;
}

impl RowIndex for usize {
    fn index(&self, row: &Row) -> Result<usize, DecodeError> {
        if *self < row.values.len() {
            Ok(*self)
        } else {
            Err(DecodeError::ColumnIndexOutOfRange {
                index: *self,
                count: row.values.len(),
            })
        }
    }
}

impl RowIndex for &str {
    fn index(&self, row: &Row) -> Result<usize, DecodeError> {
        row.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(self))
            .ok_or_else(|| DecodeError::ColumnNotFound {
                name: self.to_string(),
            })
    }
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get<T: FromValue>(&self, index: impl RowIndex) -> Result<T, DecodeError> {
        let i = index.index(self)?;
        T::from_value(&self.values[i])
    }

    pub fn value(&self, index: impl RowIndex) -> Result<&Value, DecodeError> {
        let i = index.index(self)?;
        Ok(&self.values[i])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

pub struct Cursor<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    columns: Arc<[String]>,
    sql: &'stmt str,
    arguments: &'stmt StatementArguments,
    done: bool,
}

impl<'stmt> Cursor<'stmt> {
    pub(crate) fn new(
        rows: rusqlite::Rows<'stmt>,
        columns: Arc<[String]>,
        sql: &'stmt str,
        arguments: &'stmt StatementArguments,
    ) -> Self {
        Self {
            rows,
            columns,
            sql,
            arguments,
            done: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Steps the statement and decodes the next row.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }

        let step = self.rows.next();
        let raw = match step {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.done = true;
                return Ok(None);
            }
            Err(e) => {
                self.done = true;
                return Err(Error::execution(self.sql, self.arguments, e));
            }
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for i in 0..self.columns.len() {
            let value = raw
                .get_ref(i)
                .map_err(|e| Error::execution(self.sql, self.arguments, e))
                .and_then(|column| Ok(Value::from_engine(column, i)?));
            match value {
                Ok(value) => values.push(value),
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }

        Ok(Some(Row::new(self.columns.clone(), values)))
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl std::iter::FusedIterator for Cursor<'_> {}
