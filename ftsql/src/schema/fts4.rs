///
/// FTS4 module.
///
/// FTS4 accepts the FTS3 arguments plus `key=value` options. Columns are
/// rendered first, then options in a fixed order:
/// tokenize, content, compress, uncompress, languageid, matchinfo,
/// notindexed (once per not-indexed column), prefix, order.
///

use std::collections::BTreeSet;

use super::fts3::Fts3Tokenizer;
use super::{quote_argument, ModuleArguments, VirtualTableModule};

#[derive(Debug, Clone, Copy, Default)]
pub struct Fts4;

impl VirtualTableModule for Fts4 {
    type Definition = Fts4TableDefinition;

    fn module_name(&self) -> &str {
        "fts4"
    }

    fn module_arguments(&self, definition: &Fts4TableDefinition) -> ModuleArguments {
        let mut arguments: ModuleArguments =
            definition.columns.iter().map(|c| c.name.clone()).collect();

        if let Some(tokenizer) = &definition.tokenizer {
            arguments.push(format!("tokenize={}", tokenizer.render()));
        }
        if let Some(content) = &definition.content {
            arguments.push(format!("content={}", quote_argument(content)));
        }
        if let Some(compress) = &definition.compress {
            arguments.push(format!("compress={}", quote_argument(compress)));
        }
        if let Some(uncompress) = &definition.uncompress {
            arguments.push(format!("uncompress={}", quote_argument(uncompress)));
        }
        if let Some(language_id) = &definition.language_id {
            arguments.push(format!("languageid={}", quote_argument(language_id)));
        }
        if definition.fts3_matchinfo {
            arguments.push("matchinfo=fts3".to_string());
        }
        for column in definition.columns.iter().filter(|c| c.not_indexed) {
            arguments.push(format!("notindexed={}", column.name));
        }
        if !definition.prefixes.is_empty() {
            let lengths: Vec<String> = definition.prefixes.iter().map(u32::to_string).collect();
            arguments.push(format!("prefix={}", quote_argument(&lengths.join(","))));
        }
        if let Some(order) = definition.order {
            arguments.push(format!("order={}", order.as_str()));
        }
        arguments
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fts4Order {
    Asc,
    Desc,
}

impl Fts4Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Fts4Order::Asc => "asc",
            Fts4Order::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fts4Column {
    name: String,
    not_indexed: bool,
}

impl Fts4Column {
    /// Stored but excluded from the full-text index.
    pub fn not_indexed(&mut self) -> &mut Self {
        self.not_indexed = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fts4TableDefinition {
    columns: Vec<Fts4Column>,
    tokenizer: Option<Fts3Tokenizer>,
    content: Option<String>,
    compress: Option<String>,
    uncompress: Option<String>,
    language_id: Option<String>,
    fts3_matchinfo: bool,
    prefixes: BTreeSet<u32>,
    order: Option<Fts4Order>,
}

impl Fts4TableDefinition {
    pub fn column(&mut self, name: impl Into<String>) -> &mut Fts4Column {
        self.columns.push(Fts4Column {
            name: name.into(),
            not_indexed: false,
        });
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    pub fn tokenizer(&mut self, tokenizer: impl Into<Fts3Tokenizer>) -> &mut Self {
        self.tokenizer = Some(tokenizer.into());
        self
    }

    /// External content table. An empty name makes the table contentless.
    pub fn content(&mut self, table: impl Into<String>) -> &mut Self {
        self.content = Some(table.into());
        self
    }

    pub fn compress(&mut self, function: impl Into<String>) -> &mut Self {
        self.compress = Some(function.into());
        self
    }

    pub fn uncompress(&mut self, function: impl Into<String>) -> &mut Self {
        self.uncompress = Some(function.into());
        self
    }

    /// Hidden integer column selecting the language of each row.
    pub fn language_id(&mut self, column: impl Into<String>) -> &mut Self {
        self.language_id = Some(column.into());
        self
    }

    pub fn fts3_matchinfo(&mut self) -> &mut Self {
        self.fts3_matchinfo = true;
        self
    }

    pub fn prefixes(&mut self, lengths: impl IntoIterator<Item = u32>) -> &mut Self {
        self.prefixes.extend(lengths);
        self
    }

    pub fn order(&mut self, order: Fts4Order) -> &mut Self {
        self.order = Some(order);
        self
    }

    pub fn columns(&self) -> &[Fts4Column] {
        &self.columns
    }
}
