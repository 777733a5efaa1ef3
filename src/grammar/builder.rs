use indexmap::IndexMap;

use crate::{
    error::{GrammarError, GrammarErrorKind},
    grammar::{lexicon, rule::GrammarRule, state::GrammarState},
    operator_stack::{self, Evaluate, OperatorStack},
    state_graph::StateGraph,
    tokenizer::{Token, TokenSource},
};

/// Alternatives by rule name, in the order the names were first seen.
pub type RuleMap = IndexMap<String, Vec<GrammarRule>>;

type Sequences = OperatorStack<StateGraph<GrammarState>, Operator>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Operator {
    Concat,
    Alt,
    Star,
    Optional,
}

impl operator_stack::Operator for Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::Star | Operator::Optional => 3,
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
            Operator::Optional => '?',
        }
    }
}

/// Reads the right-hand side of one rule block and expands it into the rule's
/// alternatives plus the sub-rules its groups, `*` and `?` need.
pub struct RuleBuilder<'a> {
    eof_token: &'a str,
    multi_child: bool,
    stack: Sequences,
    expansion: Expansion<'a>,
}

/// The rules one block expands into so far.
pub(crate) struct Expansion<'a> {
    name: String,
    line: usize,
    /// Line of the token being read, for error reports.
    token_line: usize,
    subrule_counter: &'a mut usize,
    /// Rule that an alternative closes into: the block's rule, or the
    /// sub-rule of the innermost open group.
    names: Vec<String>,
    rules: RuleMap,
}

impl<'a> RuleBuilder<'a> {
    /// `subrule_counter` numbers generated sub-rules and is shared by every
    /// builder of one grammar.
    pub fn new(name: &str, line: usize, eof_token: &'a str, subrule_counter: &'a mut usize) -> Self {
        let mut rules = RuleMap::new();
        rules.insert(name.to_string(), vec![]);
        Self {
            eof_token,
            multi_child: false,
            stack: OperatorStack::new(),
            expansion: Expansion {
                name: name.to_string(),
                line,
                token_line: line,
                subrule_counter,
                names: vec![name.to_string()],
                rules,
            },
        }
    }

    /// Consumes tokens up to and including the end of line that closes the
    /// rule. An end-of-file token is left in `tokens`.
    pub fn build(mut self, tokens: &mut dyn TokenSource) -> Result<RuleMap, GrammarError> {
        loop {
            let token = tokens.next_token()?;
            if token.name == self.eof_token {
                tokens.push_token()?;
                break;
            }
            self.expansion.token_line = token.line;
            match token.name.as_str() {
                lexicon::EOL => break,
                lexicon::OP => {
                    let op = match token.lexeme.as_str() {
                        "*" => Operator::Star,
                        "?" => Operator::Optional,
                        _ => Operator::Alt,
                    };
                    self.stack.push_operator(&mut self.expansion, op)?;
                }
                lexicon::LPAREN => {
                    let name = self.expansion.new_name();
                    self.expansion.names.push(name);
                    self.stack.open_group();
                }
                lexicon::RPAREN => self.close_group()?,
                lexicon::ID => self
                    .stack
                    .push_operand(StateGraph::single(GrammarState::new(&token.lexeme))),
                lexicon::MULTI_CHILD => {
                    self.multi_child = true;
                    let next = tokens.next_token()?;
                    if next.name == self.eof_token {
                        tokens.push_token()?;
                    } else if next.name != lexicon::EOL {
                        return Err(GrammarError::new(next.line, GrammarErrorKind::MisplacedMultiChild));
                    }
                    break;
                }
                _ => {
                    return Err(GrammarError::new(
                        token.line,
                        GrammarErrorKind::UnexpectedToken(token.lexeme),
                    ));
                }
            }

            let next = tokens.next_token()?;
            tokens.push_token()?;
            if ends_operand(&token) && starts_operand(&next) {
                self.stack.push_operator(&mut self.expansion, Operator::Concat)?;
            }
        }

        let Self {
            multi_child,
            stack,
            mut expansion,
            ..
        } = self;
        expansion.token_line = expansion.line;
        let Some(sequence) = stack.finish(&mut expansion)?.pop() else {
            return Err(expansion.error(GrammarErrorKind::EmptyRule(expansion.name.clone())));
        };
        let name = expansion.name.clone();
        expansion.add(&name, sequence);

        if multi_child {
            for rule in expansion.rules.get_mut(&name).into_iter().flatten() {
                rule.set_multi_child(true);
            }
        }
        Ok(expansion.rules)
    }

    /// A group with content becomes a sub-rule; `()` matches nothing.
    fn close_group(&mut self) -> Result<(), GrammarError> {
        let depth = self.stack.close_group(&mut self.expansion)?;
        let name = self.expansion.names.pop().unwrap_or_default();
        let sequence = if self.stack.len() > depth {
            self.stack.pop_operand()
        } else {
            None
        };
        let result = match sequence {
            Some(sequence) => {
                self.expansion.add(&name, sequence);
                GrammarState::new(&name)
            }
            None => GrammarState::epsilon(),
        };
        self.stack.push_operand(StateGraph::single(result));
        Ok(())
    }
}

impl Expansion<'_> {
    fn new_name(&mut self) -> String {
        let name = format!("{}{{{}}}", self.name, self.subrule_counter);
        *self.subrule_counter += 1;
        name
    }

    fn add(&mut self, name: &str, sequence: StateGraph<GrammarState>) {
        let rule = GrammarRule::new(name, sequence, name != self.name, self.line);
        self.rules.entry(name.to_string()).or_default().push(rule);
    }

    fn error(&self, kind: GrammarErrorKind) -> GrammarError {
        GrammarError::new(self.token_line, kind)
    }
}

impl Evaluate<StateGraph<GrammarState>, Operator> for Expansion<'_> {
    type Error = GrammarError;

    fn evaluate(&mut self, stack: &mut Sequences, op: Operator) -> Result<(), GrammarError> {
        let line = self.token_line;
        let pop = move |stack: &mut Sequences| {
            stack
                .pop_operand()
                .ok_or_else(|| GrammarError::new(line, GrammarErrorKind::MissingOperand(op.symbol())))
        };
        match op {
            Operator::Concat => {
                let right = pop(stack)?;
                let mut left = pop(stack)?;
                left.append(right);
                stack.push_operand(left);
            }
            Operator::Alt => {
                let right = pop(stack)?;
                let left = pop(stack)?;
                let name = self.names.last().cloned().unwrap_or_default();
                self.add(&name, left);
                stack.push_operand(right);
            }
            Operator::Star | Operator::Optional => {
                let mut sequence = pop(stack)?;
                let name = self.new_name();
                if op == Operator::Star {
                    sequence.push_last(GrammarState::new(&name));
                }
                self.add(&name, sequence);
                self.add(&name, StateGraph::new());
                stack.push_operand(StateGraph::single(GrammarState::new(&name)));
            }
        }
        Ok(())
    }

    fn unopened_group(&self) -> GrammarError {
        self.error(GrammarErrorKind::UnopenedGroup)
    }

    fn unterminated_group(&self) -> GrammarError {
        self.error(GrammarErrorKind::UnterminatedGroup)
    }
}

fn ends_operand(token: &Token) -> bool {
    match token.name.as_str() {
        lexicon::ID | lexicon::RPAREN => true,
        lexicon::OP => token.lexeme != "|",
        _ => false,
    }
}

fn starts_operand(token: &Token) -> bool {
    matches!(token.name.as_str(), lexicon::ID | lexicon::LPAREN)
}
