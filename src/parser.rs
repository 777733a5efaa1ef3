use std::fmt;

use log::{debug, trace};

use crate::{
    error::ParseError,
    grammar::{
        Grammar,
        state::{GrammarState, SymbolKind},
    },
    tokenizer::{Token, TokenSource},
};

/// A node of the parse tree. Leaves carry the matched lexeme.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseNode {
    name: String,
    value: Option<String>,
    multi_child: bool,
    children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn rule(name: &str, multi_child: bool) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            multi_child,
            children: vec![],
        }
    }

    pub fn leaf(token: &Token) -> Self {
        Self {
            name: token.name.clone(),
            value: Some(token.lexeme.clone()),
            multi_child: false,
            children: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lexeme of a leaf. `None` for rule nodes.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_multi_child(&self) -> bool {
        self.multi_child
    }

    pub fn children(&self) -> &[ParseNode] {
        &self.children
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:width$}{}", "", self.name, width = depth * 2)?;
        if let Some(value) = &self.value {
            write!(f, " {value:?}")?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ParseNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

enum Step<'g> {
    Expect(&'g GrammarState),
    /// Closes the innermost open rule node.
    Finish,
}

/// Table driven LL(1) parser. Rules are expanded on an explicit stack, so
/// deeply nested input does not grow the call stack.
pub struct Parser<'g> {
    grammar: &'g Grammar,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Parses the whole of `tokens`, up to and including end-of-file.
    pub fn parse(&self, tokens: &mut dyn TokenSource) -> Result<ParseNode, ParseError> {
        let grammar = self.grammar;
        let mut stack = vec![
            Step::Expect(grammar.eof_state()),
            Step::Expect(grammar.start_state()),
        ];
        let mut open: Vec<ParseNode> = vec![];
        let mut root = None;
        let mut lookahead = tokens.next_token()?;

        while let Some(step) = stack.pop() {
            let state = match step {
                Step::Finish => {
                    if let Some(node) = open.pop() {
                        close(node, &mut open, &mut root);
                    }
                    continue;
                }
                Step::Expect(state) => state,
            };

            match state.kind() {
                SymbolKind::Token(terminal) => {
                    if lookahead.name != state.name() {
                        return Err(ParseError::TokenMismatch {
                            expected: state.name().to_string(),
                            found: lookahead.name,
                            lexeme: lookahead.lexeme,
                            line: lookahead.line,
                        });
                    }
                    if terminal == grammar.eof() {
                        break;
                    }
                    trace!("matched {lookahead} on line {}", lookahead.line);
                    if let Some(parent) = open.last_mut() {
                        parent.children.push(ParseNode::leaf(&lookahead));
                    }
                    lookahead = tokens.next_token()?;
                }
                SymbolKind::Rule(rule) => {
                    let alt = grammar
                        .terminal_id(&lookahead.name)
                        .and_then(|terminal| grammar.lookup(rule, terminal));
                    let Some(alt) = alt else {
                        return Err(ParseError::UnexpectedToken {
                            rule: state.name().to_string(),
                            found: lookahead.name,
                            lexeme: lookahead.lexeme,
                            line: lookahead.line,
                        });
                    };
                    let alternative = grammar.alternative(alt);
                    trace!("expand {alternative} on {lookahead}");

                    if !alternative.is_subrule() {
                        open.push(ParseNode::rule(alternative.name(), alternative.is_multi_child()));
                        stack.push(Step::Finish);
                    }
                    stack.extend(alternative.symbols().rev().map(Step::Expect));
                }
                SymbolKind::Unknown | SymbolKind::Epsilon => {}
            }
        }

        while let Some(node) = open.pop() {
            close(node, &mut open, &mut root);
        }
        let root = root.ok_or(ParseError::NoTree)?;
        debug!(
            "parsed {:?}: {} top-level children",
            root.name(),
            root.children().len()
        );
        Ok(root)
    }
}

/// Attaches a finished node to its parent. A multi-child node with a single
/// child is replaced by that child, and a non-root node without children is
/// dropped.
fn close(mut node: ParseNode, open: &mut Vec<ParseNode>, root: &mut Option<ParseNode>) {
    let Some(parent) = open.last_mut() else {
        *root = Some(node);
        return;
    };
    match node.children.len() {
        0 => trace!("dropped empty {}", node.name),
        1 if node.multi_child => parent.children.append(&mut node.children),
        _ => parent.children.push(node),
    }
}
