///
/// Statement arguments.
///
/// Arguments are either positional, bound to `?`/`?NNN` placeholders in the
/// order given, or named, bound to `:name`, `@name` or `$name` placeholders.
/// Every argument has already been coerced into a `Value`, so its storage
/// class is fixed before binding.
///

use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::value::Value;

/// Builds positional `StatementArguments` from values convertible into `Value`.
///
/// ```rust,ignore
/// db.execute("INSERT INTO books VALUES (?, ?, ?)", args!["Melville", "Moby Dick", "Call me Ishmael."])?;
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::StatementArguments::default()
    };
    ($($val:expr),+ $(,)?) => {
        $crate::StatementArguments::positional([$($crate::Value::from($val)),+])
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementArguments {
    Positional(SmallVec<[Value; 4]>),
    Named(IndexMap<String, Value>),
}

impl Default for StatementArguments {
    fn default() -> Self {
        StatementArguments::Positional(SmallVec::new())
    }
}

impl StatementArguments {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        StatementArguments::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Named arguments. Names carry their sigil (`:name`, `@name`, `$name`);
    /// a bare name is taken as `:name`.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        StatementArguments::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (normalize_name(k.into()), v.into()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            StatementArguments::Positional(values) => values.len(),
            StatementArguments::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_name(name: String) -> String {
    if name.starts_with([':', '@', '$']) {
        name
    } else {
        format!(":{}", name)
    }
}

impl fmt::Display for StatementArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementArguments::Positional(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            StatementArguments::Named(values) => {
                write!(f, "[")?;
                for (i, (name, value)) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<Vec<Value>> for StatementArguments {
    fn from(values: Vec<Value>) -> Self {
        StatementArguments::Positional(SmallVec::from_vec(values))
    }
}

impl From<&[Value]> for StatementArguments {
    fn from(values: &[Value]) -> Self {
        StatementArguments::Positional(values.iter().cloned().collect())
    }
}

impl<const N: usize> From<[Value; N]> for StatementArguments {
    fn from(values: [Value; N]) -> Self {
        StatementArguments::Positional(values.into_iter().collect())
    }
}

impl From<IndexMap<String, Value>> for StatementArguments {
    fn from(values: IndexMap<String, Value>) -> Self {
        StatementArguments::named(values)
    }
}
