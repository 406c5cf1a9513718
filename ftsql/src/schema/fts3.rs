///
/// FTS3 module and tokenizers.
///
/// FTS3 arguments are the column names, in declaration order, followed by an
/// optional `tokenize=` argument. Tokenizer parameters follow the tokenizer
/// name, each quoted as its own token:
///
///   tokenize=unicode61 "remove_diacritics=0" "separators=X" "tokenchars=.-"
///
/// Character sets (separators, token characters) render their members sorted
/// by code point.
///

use std::collections::BTreeSet;

use smallvec::SmallVec;

use super::{quote_argument, ModuleArguments, VirtualTableModule};

#[derive(Debug, Clone, Copy, Default)]
pub struct Fts3;

impl VirtualTableModule for Fts3 {
    type Definition = Fts3TableDefinition;

    fn module_name(&self) -> &str {
        "fts3"
    }

    fn module_arguments(&self, definition: &Fts3TableDefinition) -> ModuleArguments {
        let mut arguments: ModuleArguments = definition.columns.iter().cloned().collect();
        if let Some(tokenizer) = &definition.tokenizer {
            arguments.push(format!("tokenize={}", tokenizer.render()));
        }
        arguments
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fts3TableDefinition {
    columns: Vec<String>,
    tokenizer: Option<Fts3Tokenizer>,
}

impl Fts3TableDefinition {
    pub fn column(&mut self, name: impl Into<String>) -> &mut Self {
        self.columns.push(name.into());
        self
    }

    pub fn tokenizer(&mut self, tokenizer: impl Into<Fts3Tokenizer>) -> &mut Self {
        self.tokenizer = Some(tokenizer.into());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Tokenizers compiled into SQLite's FTS3/FTS4 modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fts3Tokenizer {
    /// ASCII case folding, splits on non-alphanumeric ASCII.
    Simple,
    /// Porter stemming over the simple tokenizer.
    Porter,
    Unicode61(Unicode61),
}

impl Fts3Tokenizer {
    pub fn unicode61() -> Self {
        Fts3Tokenizer::Unicode61(Unicode61::default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Fts3Tokenizer::Simple => "simple",
            Fts3Tokenizer::Porter => "porter",
            Fts3Tokenizer::Unicode61(_) => "unicode61",
        }
    }

    pub fn arguments(&self) -> SmallVec<[String; 4]> {
        match self {
            Fts3Tokenizer::Unicode61(options) => options.arguments(),
            _ => SmallVec::new(),
        }
    }

    /// Tokenizer name followed by its quoted arguments.
    pub fn render(&self) -> String {
        let mut rendered = self.name().to_string();
        for argument in self.arguments() {
            rendered.push(' ');
            rendered.push_str(&quote_argument(&argument));
        }
        rendered
    }
}

impl From<Unicode61> for Fts3Tokenizer {
    fn from(options: Unicode61) -> Self {
        Fts3Tokenizer::Unicode61(options)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unicode61 {
    remove_diacritics: bool,
    separators: BTreeSet<char>,
    token_characters: BTreeSet<char>,
}

impl Default for Unicode61 {
    fn default() -> Self {
        Self {
            remove_diacritics: true,
            separators: BTreeSet::new(),
            token_characters: BTreeSet::new(),
        }
    }
}

impl Unicode61 {
    pub fn remove_diacritics(mut self, remove: bool) -> Self {
        self.remove_diacritics = remove;
        self
    }

    /// Additional characters treated as separators.
    pub fn separators(mut self, separators: impl IntoIterator<Item = char>) -> Self {
        self.separators.extend(separators);
        self
    }

    /// Additional characters treated as part of tokens.
    pub fn token_characters(mut self, characters: impl IntoIterator<Item = char>) -> Self {
        self.token_characters.extend(characters);
        self
    }

    fn arguments(&self) -> SmallVec<[String; 4]> {
        let mut arguments = SmallVec::new();
        if !self.remove_diacritics {
            arguments.push("remove_diacritics=0".to_string());
        }
        if !self.separators.is_empty() {
            let set: String = self.separators.iter().collect();
            arguments.push(format!("separators={}", set));
        }
        if !self.token_characters.is_empty() {
            let set: String = self.token_characters.iter().collect();
            arguments.push(format!("tokenchars={}", set));
        }
        arguments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VirtualTableDefinition;

    fn render(configure: impl FnOnce(&mut Fts3TableDefinition)) -> String {
        VirtualTableDefinition::build("documents", &Fts3, configure).sql()
    }

    #[test]
    fn test_render_tokenizers() {
        assert_eq!(
            render(|t| {
                t.tokenizer(Fts3Tokenizer::Simple);
            }),
            "CREATE VIRTUAL TABLE \"documents\" USING fts3(tokenize=simple)"
        );
        assert_eq!(
            render(|t| {
                t.tokenizer(Fts3Tokenizer::Porter);
            }),
            "CREATE VIRTUAL TABLE \"documents\" USING fts3(tokenize=porter)"
        );
        assert_eq!(
            render(|t| {
                t.tokenizer(Fts3Tokenizer::unicode61());
            }),
            "CREATE VIRTUAL TABLE \"documents\" USING fts3(tokenize=unicode61)"
        );
    }

    #[test]
    fn test_render_unicode61_options() {
        insta::assert_snapshot!(
            render(|t| {
                t.tokenizer(Unicode61::default().remove_diacritics(false));
            }),
            @r#"CREATE VIRTUAL TABLE "documents" USING fts3(tokenize=unicode61 "remove_diacritics=0")"#
        );
        insta::assert_snapshot!(
            render(|t| {
                t.tokenizer(Unicode61::default().separators(['X']));
            }),
            @r#"CREATE VIRTUAL TABLE "documents" USING fts3(tokenize=unicode61 "separators=X")"#
        );
        insta::assert_snapshot!(
            render(|t| {
                t.tokenizer(
                    Unicode61::default()
                        .remove_diacritics(false)
                        .separators(['X'])
                        .token_characters(".-".chars()),
                );
            }),
            @r#"CREATE VIRTUAL TABLE "documents" USING fts3(tokenize=unicode61 "remove_diacritics=0" "separators=X" "tokenchars=-.")"#
        );
    }

    #[test]
    fn test_character_sets_ignore_input_order() {
        let a = render(|t| {
            t.tokenizer(Unicode61::default().token_characters(".-".chars()));
        });
        let b = render(|t| {
            t.tokenizer(Unicode61::default().token_characters("-.".chars()));
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_quotes_inside_tokenizer_arguments() {
        let tokenizer = Fts3Tokenizer::from(Unicode61::default().separators(['"']));
        assert_eq!(tokenizer.render(), "unicode61 \"separators=\"\"\"");
    }

    #[test]
    fn test_columns_then_tokenizer() {
        let sql = render(|t| {
            t.column("author").column("title").column("body");
        });
        assert_eq!(sql, "CREATE VIRTUAL TABLE \"documents\" USING fts3(author, title, body)");

        let sql = render(|t| {
            t.tokenizer(Fts3Tokenizer::Porter);
            t.column("author");
        });
        assert_eq!(sql, "CREATE VIRTUAL TABLE \"documents\" USING fts3(author, tokenize=porter)");
    }
}
