///
/// Value Codec
///
/// `Value` is the tagged union every bound argument is coerced into before it
/// reaches SQLite, and the representation every fetched column is decoded
/// into. The five tags mirror SQLite's storage classes exactly, so a value
/// keeps its tag in both directions: a text argument is bound as text, NULL
/// stays distinct from `0` and from the empty string.
///
/// Decoding into host types goes through `FromValue`:
/// - NULL decodes only into `Option<T>` (as `None`) or `Value`
/// - text never decodes as a number, and numbers never decode as text
/// - integers widen into `f64`; reals narrow into integers only when integral
///   and in range
///

use std::fmt;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Storage class name as SQLite's `typeof()` reports it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn decode<T: FromValue>(&self) -> Result<T, DecodeError> {
        T::from_value(self)
    }

    /// Converts a column read from the engine. Text that is not valid UTF-8
    /// is rejected rather than repaired.
    pub(crate) fn from_engine(value: ValueRef<'_>, column: usize) -> Result<Self, DecodeError> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { column })?
                    .to_string(),
            ),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{:?}", r),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(r) => ValueRef::Real(*r),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(if v { 1 } else { 0 })
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Decoding of a single column value into a host type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, DecodeError>;
}

fn mismatch<T>(target: &'static str, value: &Value) -> Result<T, DecodeError> {
    match value {
        Value::Null => Err(DecodeError::UnexpectedNull { target }),
        other => Err(DecodeError::TypeMismatch {
            target,
            found: other.type_name(),
        }),
    }
}

fn integral_real(target: &'static str, r: f64) -> Result<i64, DecodeError> {
    if r.fract() == 0.0 && r >= i64::MIN as f64 && r < i64::MAX as f64 {
        Ok(r as i64)
    } else {
        Err(DecodeError::OutOfRange {
            target,
            value: r.to_string(),
        })
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(i) => Ok(*i),
            Value::Real(r) => integral_real("i64", *r),
            other => mismatch("i64", other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let wide = match value {
            Value::Integer(i) => *i,
            Value::Real(r) => integral_real("i32", *r)?,
            other => return mismatch("i32", other),
        };
        i32::try_from(wide).map_err(|_| DecodeError::OutOfRange {
            target: "i32",
            value: wide.to_string(),
        })
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let wide = match value {
            Value::Integer(i) => *i,
            Value::Real(r) => integral_real("u32", *r)?,
            other => return mismatch("u32", other),
        };
        u32::try_from(wide).map_err(|_| DecodeError::OutOfRange {
            target: "u32",
            value: wide.to_string(),
        })
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(i) => Ok(*i != 0),
            Value::Real(r) => Ok(*r != 0.0),
            other => mismatch("bool", other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Real(r) => Ok(*r),
            Value::Integer(i) => Ok(*i as f64),
            other => mismatch("f64", other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => mismatch("String", other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => mismatch("Vec<u8>", other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
