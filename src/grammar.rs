mod builder;
pub mod lexicon;
pub mod rule;
pub mod state;

use std::{collections::BTreeSet, fmt};

use cranelift_entity::{EntityRef, EntitySet, PrimaryMap, SecondaryMap, entity_impl};
use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    config::{Config, EOF_TOKEN},
    error::{GrammarError, GrammarErrorKind},
    grammar::{
        builder::{RuleBuilder, RuleMap},
        rule::GrammarRule,
        state::{GrammarState, SymbolKind},
    },
    parser::Parser,
    pattern_set::PatternSet,
    tokenizer::TokenSource,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(u32);
entity_impl!(RuleId, "rule");

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AltId(u32);
entity_impl!(AltId, "alt");

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerminalId(u32);
entity_impl!(TerminalId, "t");

/// A named rule and its alternatives.
#[derive(Clone, Debug)]
pub struct Rule {
    name: String,
    alternatives: Vec<AltId>,
    subrule: bool,
    line: usize,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alternatives(&self) -> &[AltId] {
        &self.alternatives
    }

    pub fn is_subrule(&self) -> bool {
        self.subrule
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

/// FIRST set of a rule or a symbol sequence.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct FirstSet {
    pub terminals: BTreeSet<TerminalId>,
    /// Whether the empty string can be derived.
    pub nullable: bool,
}

/// A compiled LL(1) grammar.
///
/// A grammar file holds one rule block per line:
///
/// ```text
/// Name -> RHS [>1]
/// ```
///
/// The right-hand side is made of rule and token names, `( )` groups and the
/// `| * ?` operators. A trailing `[>1]` marks the rule multi-child. The first
/// rule is the start rule and must be followed by end-of-file.
#[derive(Clone, Debug)]
pub struct Grammar {
    rules: PrimaryMap<RuleId, Rule>,
    alternatives: PrimaryMap<AltId, GrammarRule>,
    terminals: PrimaryMap<TerminalId, String>,
    rule_names: IndexMap<String, RuleId>,
    terminal_names: IndexMap<String, TerminalId>,
    first: SecondaryMap<RuleId, FirstSet>,
    follow: SecondaryMap<RuleId, BTreeSet<TerminalId>>,
    table: IndexMap<(RuleId, TerminalId), AltId>,
    eof: TerminalId,
    start_state: GrammarState,
    eof_state: GrammarState,
}

impl Grammar {
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        Self::parse_with(text, &Config::default())
    }

    /// Compiles a grammar file. `config` names the end-of-file terminal.
    pub fn parse_with(text: &str, config: &Config) -> Result<Self, GrammarError> {
        let lexicon = PatternSet::parse(lexicon::DEFINITIONS)
            .map_err(|err| GrammarError::new(err.line, GrammarErrorKind::Lexicon(err)))?;
        let mut tokens = lexicon.tokenizer(text);
        let mut rules = RuleMap::new();
        let mut subrule_counter = 1;

        loop {
            let token = tokens.next_token()?;
            match token.name.as_str() {
                EOF_TOKEN => break,
                lexicon::EOL => continue,
                lexicon::ID => {}
                _ => return Err(GrammarError::new(token.line, GrammarErrorKind::MissingRuleName)),
            }
            let separator = tokens.next_token()?;
            if separator.name != lexicon::SEP {
                return Err(GrammarError::new(
                    separator.line,
                    GrammarErrorKind::MissingSeparator,
                ));
            }

            let builder =
                RuleBuilder::new(&token.lexeme, token.line, EOF_TOKEN, &mut subrule_counter);
            for (name, alternatives) in builder.build(&mut tokens)? {
                rules.entry(name).or_default().extend(alternatives);
            }
        }

        Self::compile(rules, config)
    }

    fn compile(rules: RuleMap, config: &Config) -> Result<Self, GrammarError> {
        let mut grammar = Self::resolve(rules, config)?;

        let mut firsts = FirstSets::new(&grammar.rules, &grammar.alternatives);
        for rule in grammar.rules.keys() {
            firsts
                .visit(rule)
                .map_err(|rule| grammar.error(rule, |name| GrammarErrorKind::LeftRecursion { rule: name }))?;
        }
        grammar.follow = follow_sets(&grammar.rules, &grammar.alternatives, &firsts.first, grammar.eof);
        let table = build_table(&grammar, &mut firsts)?;
        let first = firsts.first;
        grammar.first = first;
        grammar.table = table;

        for (id, rule) in grammar.rules.iter() {
            trace!(
                "FIRST({}) = {}, FOLLOW({}) = {}",
                rule.name,
                grammar.display_first(&grammar.first[id]),
                rule.name,
                grammar.display_terminals(&grammar.follow[id])
            );
        }
        debug!(
            "compiled grammar: {} rules, {} alternatives, {} terminals, {} table cells",
            grammar.rules.len(),
            grammar.alternatives.len(),
            grammar.terminals.len(),
            grammar.table.len()
        );
        Ok(grammar)
    }

    /// Moves the alternatives into arenas and resolves every symbol to a rule
    /// or a terminal.
    fn resolve(rules: RuleMap, config: &Config) -> Result<Self, GrammarError> {
        if rules.is_empty() {
            return Err(GrammarError::new(0, GrammarErrorKind::NoRules));
        }

        let mut grammar = Self {
            rules: PrimaryMap::new(),
            alternatives: PrimaryMap::new(),
            terminals: PrimaryMap::new(),
            rule_names: IndexMap::new(),
            terminal_names: IndexMap::new(),
            first: SecondaryMap::new(),
            follow: SecondaryMap::new(),
            table: IndexMap::new(),
            eof: TerminalId::new(0),
            start_state: GrammarState::new(""),
            eof_state: GrammarState::new(&config.eof_token),
        };
        grammar.eof = grammar.intern(&config.eof_token);
        grammar.eof_state.resolve(SymbolKind::Token(grammar.eof));

        for (name, alternatives) in &rules {
            let first = alternatives.first();
            let id = grammar.rules.push(Rule {
                name: name.clone(),
                alternatives: vec![],
                subrule: first.is_some_and(GrammarRule::is_subrule),
                line: first.map_or(0, GrammarRule::line),
            });
            grammar.rule_names.insert(name.clone(), id);
        }
        let start = grammar.start();
        grammar.start_state = GrammarState::new(&grammar.rules[start].name);
        grammar.start_state.resolve(SymbolKind::Rule(start));

        for (name, alternatives) in rules {
            let rule = grammar.rule_names[&name];
            for mut alternative in alternatives {
                for state in alternative.sequence_mut().iter_mut() {
                    let kind = match grammar.rule_names.get(state.name()) {
                        Some(&id) => SymbolKind::Rule(id),
                        None => SymbolKind::Token(grammar.intern(state.name())),
                    };
                    state.resolve(kind);
                }
                let id = grammar.alternatives.push(alternative);
                grammar.rules[rule].alternatives.push(id);
            }
        }
        Ok(grammar)
    }

    fn intern(&mut self, name: &str) -> TerminalId {
        if let Some(&id) = self.terminal_names.get(name) {
            return id;
        }
        let id = self.terminals.push(name.to_string());
        self.terminal_names.insert(name.to_string(), id);
        id
    }

    fn error(&self, rule: RuleId, kind: impl FnOnce(String) -> GrammarErrorKind) -> GrammarError {
        let rule = &self.rules[rule];
        GrammarError::new(rule.line, kind(rule.name.clone()))
    }

    /// The first rule defined.
    pub fn start(&self) -> RuleId {
        RuleId::new(0)
    }

    /// The end-of-file terminal.
    pub fn eof(&self) -> TerminalId {
        self.eof
    }

    /// A state expecting the start rule.
    pub fn start_state(&self) -> &GrammarState {
        &self.start_state
    }

    /// A state expecting the end-of-file token.
    pub fn eof_state(&self) -> &GrammarState {
        &self.eof_state
    }

    pub fn parser(&self) -> Parser<'_> {
        Parser::new(self)
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter()
    }

    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rule_names.get(name).copied()
    }

    pub fn alternative(&self, id: AltId) -> &GrammarRule {
        &self.alternatives[id]
    }

    /// Alternatives of the rule called `name`, in definition order.
    pub fn alternatives(&self, name: &str) -> impl Iterator<Item = &GrammarRule> {
        self.rule_id(name)
            .map(|id| self.rules[id].alternatives.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&alt| &self.alternatives[alt])
    }

    pub fn terminal_name(&self, id: TerminalId) -> &str {
        &self.terminals[id]
    }

    pub fn terminal_id(&self, name: &str) -> Option<TerminalId> {
        self.terminal_names.get(name).copied()
    }

    pub fn terminals(&self) -> impl Iterator<Item = (TerminalId, &str)> {
        self.terminals.iter().map(|(id, name)| (id, name.as_str()))
    }

    pub fn lookup(&self, rule: RuleId, terminal: TerminalId) -> Option<AltId> {
        self.table.get(&(rule, terminal)).copied()
    }

    /// The alternative to expand `rule` with when `token` is next.
    pub fn production(&self, rule: &str, token: &str) -> Option<&GrammarRule> {
        let alt = self.lookup(self.rule_id(rule)?, self.terminal_id(token)?)?;
        Some(&self.alternatives[alt])
    }

    /// Every table cell as `(rule, token, alternative)`.
    pub fn table(&self) -> impl Iterator<Item = (&str, &str, &GrammarRule)> {
        self.table.iter().map(|(&(rule, terminal), &alt)| {
            (
                self.rules[rule].name.as_str(),
                self.terminals[terminal].as_str(),
                &self.alternatives[alt],
            )
        })
    }

    /// FIRST set of the rule called `name` by terminal name. `None` stands for
    /// the empty string.
    pub fn first(&self, name: &str) -> Option<BTreeSet<Option<&str>>> {
        let first = &self.first[self.rule_id(name)?];
        let mut set: BTreeSet<_> = first
            .terminals
            .iter()
            .map(|&id| Some(self.terminal_name(id)))
            .collect();
        if first.nullable {
            set.insert(None);
        }
        Some(set)
    }

    pub fn first_set(&self, rule: RuleId) -> &FirstSet {
        &self.first[rule]
    }

    /// FOLLOW set of the rule called `name` by terminal name.
    pub fn follow(&self, name: &str) -> Option<BTreeSet<&str>> {
        let follow = &self.follow[self.rule_id(name)?];
        Some(follow.iter().map(|&id| self.terminal_name(id)).collect())
    }

    pub fn follow_set(&self, rule: RuleId) -> &BTreeSet<TerminalId> {
        &self.follow[rule]
    }

    fn display_terminals(&self, terminals: &BTreeSet<TerminalId>) -> String {
        let names: Vec<_> = terminals.iter().map(|&id| self.terminal_name(id)).collect();
        format!("{{{}}}", names.join(", "))
    }

    fn display_first(&self, first: &FirstSet) -> String {
        let mut names: Vec<_> = first.terminals.iter().map(|&id| self.terminal_name(id)).collect();
        if first.nullable {
            names.push("ε");
        }
        format!("{{{}}}", names.join(", "))
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for alternative in self.alternatives.values() {
            writeln!(f, "{alternative}")?;
        }
        writeln!(f)?;
        for (rule, token, alternative) in self.table() {
            writeln!(f, "({rule}, {token}) => {alternative}")?;
        }
        Ok(())
    }
}

/// Memoised FIRST computation. Visiting a rule that is already being
/// expanded on the current path means the grammar is left recursive.
struct FirstSets<'g> {
    rules: &'g PrimaryMap<RuleId, Rule>,
    alternatives: &'g PrimaryMap<AltId, GrammarRule>,
    first: SecondaryMap<RuleId, FirstSet>,
    done: EntitySet<RuleId>,
    path: Vec<RuleId>,
}

impl<'g> FirstSets<'g> {
    fn new(rules: &'g PrimaryMap<RuleId, Rule>, alternatives: &'g PrimaryMap<AltId, GrammarRule>) -> Self {
        Self {
            rules,
            alternatives,
            first: SecondaryMap::new(),
            done: EntitySet::new(),
            path: vec![],
        }
    }

    fn visit(&mut self, rule: RuleId) -> Result<(), RuleId> {
        if self.done.contains(rule) {
            return Ok(());
        }
        if self.path.contains(&rule) {
            return Err(rule);
        }
        self.path.push(rule);

        let rules = self.rules;
        let alternatives = self.alternatives;
        let mut first = FirstSet::default();
        for &alt in &rules[rule].alternatives {
            let alt_first = self.sequence(&alternatives[alt])?;
            first.terminals.extend(alt_first.terminals);
            first.nullable |= alt_first.nullable;
        }

        self.path.pop();
        self.done.insert(rule);
        self.first[rule] = first;
        Ok(())
    }

    /// FIRST of one alternative, walking past nullable rules.
    fn sequence(&mut self, alternative: &GrammarRule) -> Result<FirstSet, RuleId> {
        let mut first = FirstSet::default();
        for state in alternative.symbols() {
            match state.kind() {
                SymbolKind::Token(terminal) => {
                    first.terminals.insert(terminal);
                    return Ok(first);
                }
                SymbolKind::Rule(rule) => {
                    self.visit(rule)?;
                    let rule_first = &self.first[rule];
                    first.terminals.extend(rule_first.terminals.iter().copied());
                    if !rule_first.nullable {
                        return Ok(first);
                    }
                }
                SymbolKind::Unknown | SymbolKind::Epsilon => {}
            }
        }
        first.nullable = true;
        Ok(first)
    }
}

/// FOLLOW sets as the least fixpoint over every alternative, scanned right to
/// left with a trail of what may follow the current position.
fn follow_sets(
    rules: &PrimaryMap<RuleId, Rule>,
    alternatives: &PrimaryMap<AltId, GrammarRule>,
    first: &SecondaryMap<RuleId, FirstSet>,
    eof: TerminalId,
) -> SecondaryMap<RuleId, BTreeSet<TerminalId>> {
    let mut follow: SecondaryMap<RuleId, BTreeSet<TerminalId>> = SecondaryMap::new();
    if let Some(start) = rules.keys().next() {
        follow[start].insert(eof);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for (id, rule) in rules.iter() {
            for &alt in &rule.alternatives {
                let mut trail = follow[id].clone();
                for state in alternatives[alt].symbols().rev() {
                    match state.kind() {
                        SymbolKind::Rule(target) => {
                            let before = follow[target].len();
                            follow[target].extend(trail.iter().copied());
                            changed |= follow[target].len() > before;
                            let target_first = &first[target];
                            if !target_first.nullable {
                                trail.clear();
                            }
                            trail.extend(target_first.terminals.iter().copied());
                        }
                        SymbolKind::Token(terminal) => {
                            trail.clear();
                            trail.insert(terminal);
                        }
                        SymbolKind::Unknown | SymbolKind::Epsilon => {}
                    }
                }
            }
        }
    }

    for id in rules.keys() {
        if follow[id].is_empty() {
            follow[id].insert(eof);
        }
    }
    follow
}

fn build_table(
    grammar: &Grammar,
    firsts: &mut FirstSets<'_>,
) -> Result<IndexMap<(RuleId, TerminalId), AltId>, GrammarError> {
    let mut table = IndexMap::new();
    for (id, rule) in grammar.rules.iter() {
        for &alt in &rule.alternatives {
            let first = firsts
                .sequence(&grammar.alternatives[alt])
                .map_err(|rule| grammar.error(rule, |name| GrammarErrorKind::LeftRecursion { rule: name }))?;
            let mut lookaheads = first.terminals;
            if first.nullable {
                lookaheads.extend(grammar.follow[id].iter().copied());
            }

            for terminal in lookaheads {
                match table.get(&(id, terminal)) {
                    Some(&existing) if existing != alt => {
                        let token = grammar.terminal_name(terminal).to_string();
                        return Err(grammar.error(id, |rule| GrammarErrorKind::Ambiguous { rule, token }));
                    }
                    _ => {
                        trace!(
                            "table ({}, {}) => {}",
                            rule.name,
                            grammar.terminal_name(terminal),
                            grammar.alternatives[alt]
                        );
                        table.insert((id, terminal), alt);
                    }
                }
            }
        }
    }
    Ok(table)
}
