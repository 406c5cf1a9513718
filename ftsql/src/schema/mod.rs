///
/// # Schema/DDL Builder
///
/// Virtual tables are declared through a module value (`Fts3`, `Fts4`) and a
/// configuration closure that fills the module's definition type:
///
/// ```rust,ignore
/// db.create_virtual_table("books", Fts3, |t| {
///     t.column("author").column("title").column("body");
///     t.tokenizer(Fts3Tokenizer::Porter);
/// })?;
/// // CREATE VIRTUAL TABLE "books" USING fts3(author, title, body, tokenize=porter)
/// ```
///
/// The closure receives the definition by exclusive reference; once it
/// returns, the definition is rendered into a `VirtualTableDefinition` whose
/// SQL text no longer changes.
///
/// ## Rendering
///
/// `CREATE VIRTUAL TABLE [IF NOT EXISTS] "<name>" USING <module>[(<arguments>)]`
///
/// Arguments keep declaration order and are joined with `", "`. The
/// parentheses are omitted when there are no arguments. The table name is
/// always quoted. The builder does not validate module or tokenizer names:
/// SQLite rejects what it does not support, and that failure surfaces as
/// `Error::Schema`.
///

mod fts3;
mod fts4;
pub mod manifest;

pub use fts3::{Fts3, Fts3TableDefinition, Fts3Tokenizer, Unicode61};
pub use fts4::{Fts4, Fts4Column, Fts4Order, Fts4TableDefinition};

use smallvec::SmallVec;

use crate::database::Database;
use crate::error::Result;

pub type ModuleArguments = SmallVec<[String; 8]>;

/// A virtual table module known to the builder.
pub trait VirtualTableModule {
    type Definition: Default;

    fn module_name(&self) -> &str;

    /// Renders the module arguments, in order, from a finished definition.
    fn module_arguments(&self, definition: &Self::Definition) -> ModuleArguments;
}

/// Quotes an SQL identifier, doubling embedded double quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a module or tokenizer argument value the same way.
pub(crate) fn quote_argument(value: &str) -> String {
    quote_identifier(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTableDefinition {
    name: String,
    if_not_exists: bool,
    module: String,
    arguments: Vec<String>,
}

impl VirtualTableDefinition {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            if_not_exists: false,
            module: module.into(),
            arguments: Vec::new(),
        }
    }

    /// Runs `configure` on a fresh module definition and freezes the result.
    pub fn build<M, F>(name: impl Into<String>, module: &M, configure: F) -> Self
    where
        M: VirtualTableModule,
        F: FnOnce(&mut M::Definition),
    {
        let mut definition = M::Definition::default();
        configure(&mut definition);
        Self {
            name: name.into(),
            if_not_exists: false,
            module: module.module_name().to_string(),
            arguments: module.module_arguments(&definition).into_vec(),
        }
    }

    pub fn if_not_exists(mut self, if_not_exists: bool) -> Self {
        self.if_not_exists = if_not_exists;
        self
    }

    pub fn argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn sql(&self) -> String {
        let mut sql = String::from("CREATE VIRTUAL TABLE ");
        if self.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&quote_identifier(&self.name));
        sql.push_str(" USING ");
        sql.push_str(&self.module);
        if !self.arguments.is_empty() {
            sql.push('(');
            sql.push_str(&self.arguments.join(", "));
            sql.push(')');
        }
        sql
    }
}

impl Database {
    /// Creates a virtual table; fails if a table with that name exists.
    pub fn create_virtual_table<M, F>(&self, name: &str, module: M, configure: F) -> Result<()>
    where
        M: VirtualTableModule,
        F: FnOnce(&mut M::Definition),
    {
        self.create(&VirtualTableDefinition::build(name, &module, configure))
    }

    /// Creates a virtual table unless a table with that name already exists.
    pub fn create_virtual_table_if_not_exists<M, F>(
        &self,
        name: &str,
        module: M,
        configure: F,
    ) -> Result<()>
    where
        M: VirtualTableModule,
        F: FnOnce(&mut M::Definition),
    {
        self.create(&VirtualTableDefinition::build(name, &module, configure).if_not_exists(true))
    }

    pub fn create(&self, definition: &VirtualTableDefinition) -> Result<()> {
        self.execute_schema(&definition.sql())
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.execute_schema(&format!("DROP TABLE {}", quote_identifier(name)))
    }
}
