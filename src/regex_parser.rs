mod lexer;

use std::collections::BTreeSet;

use crate::{
    automaton::{NEGATION_FIRST, NEGATION_LAST, Nfa, NfaStateId, Symbol},
    error::PatternError,
    operator_stack::{self, Evaluate, OperatorStack},
    regex_parser::lexer::{Lexer, Token},
    state_graph::StateGraph,
};

/// Resolves `:name:` references while a regex is compiled.
pub trait EmbedLookup {
    fn embedded(&self, name: &str) -> Option<&Nfa>;
}

impl EmbedLookup for () {
    fn embedded(&self, _name: &str) -> Option<&Nfa> {
        None
    }
}

/// Compiles a regex into a Thompson NFA whose graph runs from the entry state
/// to the exit state. The exit state is not marked accepting.
///
/// Spaces and tabs in `regex` are ignored.
pub fn build_nfa(regex: &str, lookup: &dyn EmbedLookup) -> Result<Nfa, PatternError> {
    let regex: String = regex.chars().filter(|&ch| ch != ' ' && ch != '\t').collect();
    if regex.is_empty() {
        return Err(PatternError::EmptyRegex);
    }
    RegexParser::new(&regex, lookup).parse()
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Operator {
    Concat,
    Alt,
    Star,
    Plus,
    Optional,
}

impl operator_stack::Operator for Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::Star | Operator::Plus | Operator::Optional => 3,
            Operator::Concat => 2,
            Operator::Alt => 1,
        }
    }
}

impl Operator {
    fn symbol(self) -> char {
        match self {
            Operator::Concat => '.',
            Operator::Alt => '|',
            Operator::Star => '*',
            Operator::Plus => '+',
            Operator::Optional => '?',
        }
    }
}

type Fragments = OperatorStack<StateGraph<NfaStateId>, Operator>;

#[derive(Default)]
struct CharClass {
    negated: bool,
    members: BTreeSet<Symbol>,
}

struct RegexParser<'a> {
    lexer: Lexer,
    lookup: &'a dyn EmbedLookup,
    nfa: Nfa,
    stack: Fragments,
    class: Option<CharClass>,
}

impl<'a> RegexParser<'a> {
    fn new(regex: &str, lookup: &'a dyn EmbedLookup) -> Self {
        Self {
            lexer: Lexer::new(regex),
            lookup,
            nfa: Nfa::new(),
            stack: OperatorStack::new(),
            class: None,
        }
    }

    fn parse(mut self) -> Result<Nfa, PatternError> {
        loop {
            let token = self.lexer.next()?;
            match &token {
                Token::End => break,
                Token::Char(ch) => self.push_symbol(Symbol::Char(*ch)),
                Token::Any => self.push_symbol(Symbol::Any),
                Token::LeftBracket => self.class = Some(CharClass::default()),
                Token::Caret => {
                    if let Some(class) = &mut self.class {
                        class.negated = true;
                    }
                }
                Token::RightBracket => self.close_class()?,
                Token::LeftParen => self.stack.open_group(),
                Token::RightParen => self.close_group()?,
                Token::Star => self.push_operator(Operator::Star)?,
                Token::Plus => self.push_operator(Operator::Plus)?,
                Token::Question => self.push_operator(Operator::Optional)?,
                Token::Or => self.push_operator(Operator::Alt)?,
                Token::Embed(name) => {
                    let lookup = self.lookup;
                    let source = lookup
                        .embedded(name)
                        .ok_or_else(|| PatternError::UndefinedEmbed(name.clone()))?;
                    let copy = self.nfa.copy_graph(source);
                    self.stack.push_operand(copy);
                }
            }

            if self.class.is_none() && token.ends_operand() && self.lexer.peek()?.starts_operand() {
                self.push_operator(Operator::Concat)?;
            }
        }

        let Self { mut nfa, stack, .. } = self;
        let mut fragments = stack.finish(&mut nfa)?;
        let graph = fragments.pop().ok_or(PatternError::EmptyRegex)?;
        if !fragments.is_empty() {
            return Err(PatternError::MissingOperand(Operator::Concat.symbol()));
        }
        nfa.set_graph(graph);
        Ok(nfa)
    }

    fn push_symbol(&mut self, symbol: Symbol) {
        match &mut self.class {
            Some(class) => {
                class.members.insert(symbol);
            }
            None => {
                let first = self.nfa.add_state();
                let last = self.nfa.add_state();
                self.nfa.add_transition(first, symbol, last);
                self.stack.push_operand([first, last].into_iter().collect());
            }
        }
    }

    fn close_class(&mut self) -> Result<(), PatternError> {
        let Some(class) = self.class.take() else {
            return Err(PatternError::UnopenedClass);
        };
        if class.members.is_empty() {
            return Err(PatternError::EmptyClass);
        }
        let symbols: BTreeSet<Symbol> = if class.negated {
            if class.members.contains(&Symbol::Any) {
                BTreeSet::new()
            } else {
                (NEGATION_FIRST..=NEGATION_LAST)
                    .map(|code| Symbol::Char(char::from(code)))
                    .filter(|symbol| !class.members.contains(symbol))
                    .collect()
            }
        } else {
            class.members
        };
        if symbols.is_empty() {
            return Err(PatternError::EmptyClass);
        }

        let first = self.nfa.add_state();
        let last = self.nfa.add_state();
        for symbol in symbols {
            self.nfa.add_transition(first, symbol, last);
        }
        self.stack.push_operand([first, last].into_iter().collect());
        Ok(())
    }

    fn close_group(&mut self) -> Result<(), PatternError> {
        let depth = self.stack.close_group(&mut self.nfa)?;
        if self.stack.len() <= depth {
            return Err(PatternError::EmptyGroup);
        }
        Ok(())
    }

    fn push_operator(&mut self, op: Operator) -> Result<(), PatternError> {
        self.stack.push_operator(&mut self.nfa, op)
    }
}

impl Evaluate<StateGraph<NfaStateId>, Operator> for Nfa {
    type Error = PatternError;

    fn evaluate(&mut self, stack: &mut Fragments, op: Operator) -> Result<(), PatternError> {
        let missing = || PatternError::MissingOperand(op.symbol());
        let result = match op {
            Operator::Concat | Operator::Alt => {
                let right = stack.pop_operand().ok_or_else(missing)?;
                let left = stack.pop_operand().ok_or_else(missing)?;
                if op == Operator::Concat {
                    concat(self, left, right)
                } else {
                    alternate(self, left, right)
                }
            }
            Operator::Star | Operator::Plus | Operator::Optional => {
                let graph = stack.pop_operand().ok_or_else(missing)?;
                repeat(self, graph, op != Operator::Plus, op != Operator::Optional)
            }
        };
        stack.push_operand(result);
        Ok(())
    }

    fn unopened_group(&self) -> PatternError {
        PatternError::UnopenedGroup
    }

    fn unterminated_group(&self) -> PatternError {
        PatternError::UnterminatedGroup
    }
}

fn concat(
    nfa: &mut Nfa,
    mut left: StateGraph<NfaStateId>,
    right: StateGraph<NfaStateId>,
) -> StateGraph<NfaStateId> {
    if let (Some(&from), Some(&to)) = (left.last(), right.first()) {
        nfa.add_transition(from, Symbol::Epsilon, to);
    }
    left.append(right);
    left
}

fn alternate(
    nfa: &mut Nfa,
    mut left: StateGraph<NfaStateId>,
    right: StateGraph<NfaStateId>,
) -> StateGraph<NfaStateId> {
    let start = nfa.add_state();
    let end = nfa.add_state();
    for branch in [&left, &right] {
        if let (Some(&first), Some(&last)) = (branch.first(), branch.last()) {
            nfa.add_transition(start, Symbol::Epsilon, first);
            nfa.add_transition(last, Symbol::Epsilon, end);
        }
    }
    left.push_first(start);
    left.append(right);
    left.push_last(end);
    left
}

/// Wraps `graph` for `*` (skip and loop), `+` (loop) and `?` (skip).
fn repeat(
    nfa: &mut Nfa,
    mut graph: StateGraph<NfaStateId>,
    skip: bool,
    loop_back: bool,
) -> StateGraph<NfaStateId> {
    let start = nfa.add_state();
    let end = nfa.add_state();
    if skip {
        nfa.add_transition(start, Symbol::Epsilon, end);
    }
    if let (Some(&first), Some(&last)) = (graph.first(), graph.last()) {
        nfa.add_transition(start, Symbol::Epsilon, first);
        nfa.add_transition(last, Symbol::Epsilon, end);
        if loop_back {
            nfa.add_transition(last, Symbol::Epsilon, first);
        }
    }
    graph.push_first(start);
    graph.push_last(end);
    graph
}
