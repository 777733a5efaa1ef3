pub mod automaton;
pub mod config;
pub mod error;
pub mod grammar;
mod operator_stack;
pub mod parser;
pub mod pattern;
pub mod pattern_set;
pub mod regex_parser;
pub mod state_graph;
pub mod tokenizer;

pub use config::Config;
pub use error::{
    DefinitionError, DefinitionErrorKind, GrammarError, GrammarErrorKind, ParseError, PatternError,
    TokenizeError,
};
pub use grammar::Grammar;
pub use parser::{ParseNode, Parser};
pub use pattern::Pattern;
pub use pattern_set::PatternSet;
pub use tokenizer::{Token, TokenList, TokenSource, Tokenizer};

use automaton::Owner;

/// A named regular expression as written in a definition file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSpec {
    name: String,
    pattern: String,
    internal: bool,
    position: usize,
}

impl TokenSpec {
    pub fn new(name: String, pattern: String) -> Self {
        Self {
            name,
            pattern,
            internal: false,
            position: 0,
        }
    }

    /// Internal patterns are only reachable through embedding.
    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    /// Definition order. Lower positions win when patterns tie.
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn owner(&self) -> Owner {
        Owner {
            position: self.position,
            name: self.name.clone(),
        }
    }

    pub(crate) fn extend_pattern(&mut self, alternative: &str) {
        self.pattern = format!("{} | {}", self.pattern, alternative);
    }
}
