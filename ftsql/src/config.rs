///
/// # Connection Configuration
///
/// `Configuration` is applied when a connection opens. Every field has a
/// default, so an empty `[database]` table in a schema manifest is valid.
///
/// ## Example
///
/// ```toml
/// [database]
/// read_only = false
/// foreign_keys = true
/// busy_timeout_ms = 5000
/// statement_cache_capacity = 32
/// default_transaction_kind = "immediate"
/// nested_transactions = "savepoint"
/// ```
///
/// ## Nested transactions
///
/// SQLite has no nested BEGIN. With `reuse` (the default) a transaction scope
/// opened while another is active joins the outer transaction: nothing is
/// sent to the engine, and the outer scope decides the outcome. With
/// `savepoint` the inner scope becomes a SAVEPOINT that is released on success
/// and rolled back to on failure.
///

use serde::{Deserialize, Serialize};

use crate::trace::SqlSinkHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionKind {
    pub(crate) fn begin_sql(self) -> &'static str {
        match self {
            TransactionKind::Deferred => "BEGIN DEFERRED TRANSACTION",
            TransactionKind::Immediate => "BEGIN IMMEDIATE TRANSACTION",
            TransactionKind::Exclusive => "BEGIN EXCLUSIVE TRANSACTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NestedTransactions {
    #[default]
    Reuse,
    Savepoint,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    pub read_only: bool,
    pub foreign_keys: bool,
    pub busy_timeout_ms: Option<u64>,
    pub statement_cache_capacity: usize,
    pub default_transaction_kind: TransactionKind,
    pub nested_transactions: NestedTransactions,
    #[serde(skip)]
    pub sql_sink: Option<SqlSinkHandle>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            read_only: false,
            foreign_keys: true,
            busy_timeout_ms: None,
            statement_cache_capacity: 16,
            default_transaction_kind: TransactionKind::Deferred,
            nested_transactions: NestedTransactions::Reuse,
            sql_sink: None,
        }
    }
}

impl Configuration {
    pub fn with_sql_sink(mut self, sink: SqlSinkHandle) -> Self {
        self.sql_sink = Some(sink);
        self
    }

    pub fn with_nested_transactions(mut self, nested: NestedTransactions) -> Self {
        self.nested_transactions = nested;
        self
    }

    pub fn with_transaction_kind(mut self, kind: TransactionKind) -> Self {
        self.default_transaction_kind = kind;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
