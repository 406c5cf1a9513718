///
/// # Schema Manifests
///
/// A schema manifest is a TOML file declaring connection settings and the
/// virtual tables a database should contain. Tables are created in the order
/// they appear in the file.
///
/// ## Example
///
/// ```toml
/// [database]
/// busy_timeout_ms = 5000
///
/// [virtual_table.documents]
/// module = "fts3"
/// tokenizer = { kind = "unicode61", remove_diacritics = false, separators = "X" }
///
/// [virtual_table.books]
/// module = "fts4"
/// if_not_exists = true
/// columns = ["author", "title", "body"]
/// tokenizer = "porter"
/// not_indexed = ["author"]
/// prefix = [2, 4]
/// ```
///
/// ## Tokenizers
///
/// A tokenizer is either a bare name (`"simple"`, `"porter"`, `"unicode61"`)
/// or a table with a `kind` and, for `unicode61` only, `remove_diacritics`,
/// `separators` and `token_characters` (each a string of characters).
///
/// ## Validation
///
/// Converting a manifest into `VirtualTableDefinition`s rejects unknown
/// modules and tokenizers, unicode61 options on other tokenizers, FTS4-only
/// options on FTS3 tables, and `not_indexed` entries naming undeclared
/// columns. Everything else is left for SQLite to accept or reject.
///

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Configuration;
use crate::database::Database;
use crate::error::{ConfigError, Result};

use super::{Fts3, Fts3Tokenizer, Fts4, Fts4Order, Unicode61, VirtualTableDefinition};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SchemaManifest {
    #[serde(default)]
    pub database: Configuration,
    #[serde(default, rename = "virtual_table")]
    pub virtual_tables: IndexMap<String, VirtualTableSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualTableSpec {
    pub module: String,
    #[serde(default)]
    pub if_not_exists: bool,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub tokenizer: Option<TokenizerSpec>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub compress: Option<String>,
    #[serde(default)]
    pub uncompress: Option<String>,
    #[serde(default)]
    pub language_id: Option<String>,
    #[serde(default)]
    pub matchinfo: Option<String>,
    #[serde(default)]
    pub not_indexed: Vec<String>,
    #[serde(default)]
    pub prefix: Vec<u32>,
    #[serde(default)]
    pub order: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TokenizerSpec {
    Name(String),
    Detailed(DetailedTokenizer),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedTokenizer {
    pub kind: String,
    #[serde(default)]
    pub remove_diacritics: Option<bool>,
    #[serde(default)]
    pub separators: Option<String>,
    #[serde(default)]
    pub token_characters: Option<String>,
}

pub fn parse_manifest(path: &Path) -> Result<SchemaManifest, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest_str(&content)
}

pub fn parse_manifest_str(content: &str) -> Result<SchemaManifest, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn invalid(table: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidTable {
        table: table.to_string(),
        reason: reason.into(),
    }
}

impl SchemaManifest {
    pub fn definitions(&self) -> Result<Vec<VirtualTableDefinition>, ConfigError> {
        self.virtual_tables
            .iter()
            .map(|(name, spec)| spec.definition(name))
            .collect()
    }

    /// Creates every declared table in a single transaction.
    pub fn apply(&self, db: &Database) -> Result<()> {
        let definitions = self.definitions()?;
        db.in_transaction(|db| {
            for definition in &definitions {
                db.create(definition)?;
                info!(table = definition.name(), module = definition.module(), "created virtual table");
            }
            Ok(())
        })
    }
}

impl TokenizerSpec {
    fn tokenizer(&self, table: &str) -> Result<Fts3Tokenizer, ConfigError> {
        match self {
            TokenizerSpec::Name(name) => tokenizer_named(table, name),
            TokenizerSpec::Detailed(detailed) => {
                let has_options = detailed.remove_diacritics.is_some()
                    || detailed.separators.is_some()
                    || detailed.token_characters.is_some();
                if detailed.kind != "unicode61" {
                    if has_options {
                        return Err(invalid(
                            table,
                            format!("tokenizer '{}' takes no options", detailed.kind),
                        ));
                    }
                    return tokenizer_named(table, &detailed.kind);
                }

                let mut options = Unicode61::default();
                if let Some(remove) = detailed.remove_diacritics {
                    options = options.remove_diacritics(remove);
                }
                if let Some(separators) = &detailed.separators {
                    options = options.separators(separators.chars());
                }
                if let Some(characters) = &detailed.token_characters {
                    options = options.token_characters(characters.chars());
                }
                Ok(Fts3Tokenizer::Unicode61(options))
            }
        }
    }
}

fn tokenizer_named(table: &str, name: &str) -> Result<Fts3Tokenizer, ConfigError> {
    match name {
        "simple" => Ok(Fts3Tokenizer::Simple),
        "porter" => Ok(Fts3Tokenizer::Porter),
        "unicode61" => Ok(Fts3Tokenizer::unicode61()),
        other => Err(invalid(table, format!("unknown tokenizer '{}'", other))),
    }
}

impl VirtualTableSpec {
    fn has_fts4_options(&self) -> bool {
        self.content.is_some()
            || self.compress.is_some()
            || self.uncompress.is_some()
            || self.language_id.is_some()
            || self.matchinfo.is_some()
            || !self.not_indexed.is_empty()
            || !self.prefix.is_empty()
            || self.order.is_some()
    }

    pub fn definition(&self, name: &str) -> Result<VirtualTableDefinition, ConfigError> {
        if name.is_empty() {
            return Err(invalid(name, "table name must not be empty"));
        }

        let tokenizer = self
            .tokenizer
            .as_ref()
            .map(|spec| spec.tokenizer(name))
            .transpose()?;

        let definition = match self.module.as_str() {
            "fts3" => {
                if self.has_fts4_options() {
                    return Err(invalid(name, "fts3 tables accept only columns and a tokenizer"));
                }
                VirtualTableDefinition::build(name, &Fts3, |t| {
                    for column in &self.columns {
                        t.column(column.as_str());
                    }
                    if let Some(tokenizer) = tokenizer {
                        t.tokenizer(tokenizer);
                    }
                })
            }
            "fts4" => {
                if let Some(missing) = self.not_indexed.iter().find(|c| !self.columns.contains(c)) {
                    return Err(invalid(
                        name,
                        format!("not_indexed column '{}' is not declared", missing),
                    ));
                }
                let order = match self.order.as_deref() {
                    None => None,
                    Some(o) if o.eq_ignore_ascii_case("asc") => Some(Fts4Order::Asc),
                    Some(o) if o.eq_ignore_ascii_case("desc") => Some(Fts4Order::Desc),
                    Some(o) => return Err(invalid(name, format!("unknown order '{}'", o))),
                };
                let fts3_matchinfo = match self.matchinfo.as_deref() {
                    None => false,
                    Some("fts3") => true,
                    Some(other) => {
                        return Err(invalid(name, format!("unknown matchinfo '{}'", other)));
                    }
                };
                VirtualTableDefinition::build(name, &Fts4, |t| {
                    for column in &self.columns {
                        let declared = t.column(column.as_str());
                        if self.not_indexed.contains(column) {
                            declared.not_indexed();
                        }
                    }
                    if let Some(tokenizer) = tokenizer {
                        t.tokenizer(tokenizer);
                    }
                    if let Some(content) = &self.content {
                        t.content(content.as_str());
                    }
                    if let Some(compress) = &self.compress {
                        t.compress(compress.as_str());
                    }
                    if let Some(uncompress) = &self.uncompress {
                        t.uncompress(uncompress.as_str());
                    }
                    if let Some(language_id) = &self.language_id {
                        t.language_id(language_id.as_str());
                    }
                    if fts3_matchinfo {
                        t.fts3_matchinfo();
                    }
                    t.prefixes(self.prefix.iter().copied());
                    if let Some(order) = order {
                        t.order(order);
                    }
                })
            }
            other => return Err(invalid(name, format!("unknown module '{}'", other))),
        };

        Ok(definition.if_not_exists(self.if_not_exists))
    }
}
