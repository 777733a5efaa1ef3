use std::fmt;

use crate::grammar::{RuleId, TerminalId};

/// What a symbol on a rule's right-hand side refers to.
///
/// Symbols are `Unknown` while the grammar text is read and resolved once
/// every rule name is known.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SymbolKind {
    Unknown,
    Token(TerminalId),
    Rule(RuleId),
    /// Matches nothing. Produced by an empty group `()`.
    Epsilon,
}

/// A single symbol in a rule alternative.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct GrammarState {
    name: String,
    kind: SymbolKind,
}

impl GrammarState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SymbolKind::Unknown,
        }
    }

    pub fn epsilon() -> Self {
        Self {
            name: String::new(),
            kind: SymbolKind::Epsilon,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn is_epsilon(&self) -> bool {
        self.kind == SymbolKind::Epsilon
    }

    pub fn rule(&self) -> Option<RuleId> {
        match self.kind {
            SymbolKind::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn terminal(&self) -> Option<TerminalId> {
        match self.kind {
            SymbolKind::Token(terminal) => Some(terminal),
            _ => None,
        }
    }

    pub(crate) fn resolve(&mut self, kind: SymbolKind) {
        if self.kind == SymbolKind::Unknown {
            self.kind = kind;
        }
    }
}

impl fmt::Display for GrammarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SymbolKind::Epsilon => write!(f, "ε"),
            _ => write!(f, "{}", self.name),
        }
    }
}
