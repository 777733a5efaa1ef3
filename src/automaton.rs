use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use cranelift_entity::{EntityRef, PrimaryMap, entity_impl};

use crate::state_graph::StateGraph;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NfaStateId(u32);
entity_impl!(NfaStateId, "n");

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DfaStateId(u32);
entity_impl!(DfaStateId, "d");

/// Label of an automaton transition.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Symbol {
    /// Taken without consuming input. Only found in NFAs.
    Epsilon,
    /// Matches any input character.
    Any,
    Char(char),
}

/// Lowest character code a negated character class can match.
pub const NEGATION_FIRST: u8 = 9;
/// Highest character code a negated character class can match.
pub const NEGATION_LAST: u8 = 126;

/// A token pattern that accepts in some state.
///
/// Ordering is by definition position first, so the first owner of an ordered
/// set is the pattern that wins a tie.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Owner {
    pub position: usize,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct NfaState {
    accepting: bool,
    owners: BTreeSet<Owner>,
    transitions: BTreeMap<Symbol, Vec<NfaStateId>>,
}

impl NfaState {
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn owners(&self) -> &BTreeSet<Owner> {
        &self.owners
    }

    pub fn transitions(&self, symbol: Symbol) -> &[NfaStateId] {
        self.transitions
            .get(&symbol)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.transitions.keys().copied()
    }

    /// Targets reachable by consuming `symbol`, wildcard edges included.
    fn targets_on(&self, symbol: Symbol) -> impl Iterator<Item = NfaStateId> + '_ {
        let wildcard = match symbol {
            Symbol::Char(_) => self.transitions(Symbol::Any),
            _ => &[],
        };
        self.transitions(symbol).iter().chain(wildcard).copied()
    }
}

/// Arena of NFA states plus the ordered state run of the finished automaton.
#[derive(Clone, Debug, Default)]
pub struct Nfa {
    states: PrimaryMap<NfaStateId, NfaState>,
    graph: StateGraph<NfaStateId>,
}

impl Nfa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self) -> NfaStateId {
        self.states.push(NfaState::default())
    }

    pub fn add_transition(&mut self, from: NfaStateId, symbol: Symbol, to: NfaStateId) {
        let targets = self.states[from].transitions.entry(symbol).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    pub fn set_accepting(&mut self, state: NfaStateId, owner: Owner) {
        let state = &mut self.states[state];
        state.accepting = true;
        state.owners.insert(owner);
    }

    pub fn clear_accepting(&mut self, state: NfaStateId) {
        let state = &mut self.states[state];
        state.accepting = false;
        state.owners.clear();
    }

    pub fn state(&self, id: NfaStateId) -> &NfaState {
        &self.states[id]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State run of the finished automaton: entry first, exit last.
    pub fn graph(&self) -> &StateGraph<NfaStateId> {
        &self.graph
    }

    pub(crate) fn set_graph(&mut self, graph: StateGraph<NfaStateId>) {
        self.graph = graph;
    }

    pub fn start(&self) -> Option<NfaStateId> {
        self.graph.first().copied()
    }

    pub fn end(&self) -> Option<NfaStateId> {
        self.graph.last().copied()
    }

    /// All states reachable from `states` through epsilon transitions only,
    /// `states` included.
    pub fn epsilon_closure(&self, states: impl IntoIterator<Item = NfaStateId>) -> BTreeSet<NfaStateId> {
        let mut closure = BTreeSet::new();
        let mut process = vec![];
        for state in states {
            if closure.insert(state) {
                process.push(state);
            }
        }
        while let Some(state) = process.pop() {
            for &next in self.states[state].transitions(Symbol::Epsilon) {
                if closure.insert(next) {
                    process.push(next);
                }
            }
        }
        closure
    }

    /// All states reachable from `states` by consuming `symbol`.
    pub fn move_on(&self, states: &BTreeSet<NfaStateId>, symbol: Symbol) -> BTreeSet<NfaStateId> {
        states
            .iter()
            .flat_map(|&state| self.states[state].targets_on(symbol))
            .collect()
    }

    /// Deep-copies the finished automaton of `source` into this arena.
    ///
    /// Copies are neither accepting nor owned; the copy of the source's exit
    /// state is the last element of the returned graph.
    pub fn copy_graph(&mut self, source: &Nfa) -> StateGraph<NfaStateId> {
        let mut copies = HashMap::new();
        let mut graph = StateGraph::new();
        for &original in source.graph() {
            let copy = self.add_state();
            copies.insert(original, copy);
            graph.push_last(copy);
        }
        for &original in source.graph() {
            let copy = copies[&original];
            for (&symbol, targets) in &source.states[original].transitions {
                for target in targets {
                    if let Some(&target) = copies.get(target) {
                        self.add_transition(copy, symbol, target);
                    }
                }
            }
        }
        graph
    }
}

impl fmt::Display for Nfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &id in &self.graph {
            let state = &self.states[id];
            write!(f, "{id}{}", if state.accepting { "!" } else { "" })?;
            for (symbol, targets) in &state.transitions {
                for target in targets {
                    write!(f, " [{symbol} >> {target}]")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct DfaState {
    accepting: bool,
    owners: BTreeSet<Owner>,
    transitions: BTreeMap<Symbol, DfaStateId>,
    nfa_states: BTreeSet<NfaStateId>,
}

impl DfaState {
    fn new(nfa: &Nfa, nfa_states: BTreeSet<NfaStateId>) -> Self {
        let mut accepting = false;
        let mut owners = BTreeSet::new();
        for &id in &nfa_states {
            let state = nfa.state(id);
            if state.accepting {
                accepting = true;
                owners.extend(state.owners.iter().cloned());
            }
        }
        Self {
            accepting,
            owners,
            transitions: BTreeMap::new(),
            nfa_states,
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Owning patterns, earliest-defined first.
    pub fn owners(&self) -> &BTreeSet<Owner> {
        &self.owners
    }

    /// The pattern this state accepts for, if any.
    pub fn winner(&self) -> Option<&Owner> {
        self.owners.first()
    }

    pub fn transitions(&self) -> &BTreeMap<Symbol, DfaStateId> {
        &self.transitions
    }

    pub fn nfa_states(&self) -> &BTreeSet<NfaStateId> {
        &self.nfa_states
    }
}

/// A deterministic automaton produced by subset construction. State `d0` is
/// the start state.
#[derive(Clone, Debug)]
pub struct Dfa {
    states: PrimaryMap<DfaStateId, DfaState>,
}

impl Dfa {
    /// Runs subset construction from the entry state of `nfa`. An empty NFA
    /// yields a single dead state.
    pub fn from_nfa(nfa: &Nfa) -> Self {
        let mut states = PrimaryMap::new();
        let mut known: HashMap<BTreeSet<NfaStateId>, DfaStateId> = HashMap::new();

        let start_set = nfa.epsilon_closure(nfa.start());
        let start = states.push(DfaState::new(nfa, start_set.clone()));
        known.insert(start_set, start);
        let mut process = vec![start];

        while let Some(current) = process.pop() {
            let source: &BTreeSet<NfaStateId> = &states[current].nfa_states;
            let symbols: BTreeSet<Symbol> = source
                .iter()
                .flat_map(|&id| nfa.state(id).symbols())
                .filter(|&symbol| symbol != Symbol::Epsilon)
                .collect();

            let mut edges = vec![];
            for symbol in symbols {
                let target = nfa.epsilon_closure(nfa.move_on(source, symbol));
                if !target.is_empty() {
                    edges.push((symbol, target));
                }
            }

            for (symbol, target) in edges {
                let next = match known.get(&target) {
                    Some(&next) => next,
                    None => {
                        let next = states.push(DfaState::new(nfa, target.clone()));
                        known.insert(target, next);
                        process.push(next);
                        next
                    }
                };
                states[current].transitions.insert(symbol, next);
            }
        }

        Self { states }
    }

    pub fn start(&self) -> DfaStateId {
        DfaStateId::new(0)
    }

    pub fn state(&self, id: DfaStateId) -> &DfaState {
        &self.states[id]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DfaStateId, &DfaState)> {
        self.states.iter()
    }

    /// Follows the transition on `ch`, falling back to a wildcard edge.
    pub fn step(&self, from: DfaStateId, ch: char) -> Option<DfaStateId> {
        let transitions = &self.states[from].transitions;
        transitions
            .get(&Symbol::Char(ch))
            .or_else(|| transitions.get(&Symbol::Any))
            .copied()
    }

    pub fn matches(&self, input: &str) -> bool {
        let mut current = self.start();
        for ch in input.chars() {
            match self.step(current, ch) {
                Some(next) => current = next,
                None => return false,
            }
        }
        self.states[current].accepting
    }
}

impl fmt::Display for Dfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, state) in self.states.iter() {
            write!(f, "{id}")?;
            if let Some(owner) = state.winner() {
                write!(f, "! <{}>", owner.name)?;
            } else if state.accepting {
                write!(f, "!")?;
            }
            for (symbol, target) in &state.transitions {
                write!(f, " [{symbol} >> {target}]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Epsilon => write!(f, "ε"),
            Symbol::Any => write!(f, "."),
            Symbol::Char(ch) => write!(f, "{}", escape(*ch)),
        }
    }
}

/// Renders whitespace the way it is written in a definition file.
pub fn escape(ch: char) -> String {
    match ch {
        ' ' => "\\s".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\n' => "\\n".to_string(),
        ch => ch.to_string(),
    }
}

#[cfg(test)]
mod test {
    use cranelift_entity::EntityRef;

    use crate::{
        automaton::{Dfa, DfaStateId, Nfa, NfaStateId, Owner, Symbol},
        state_graph::StateGraph,
    };

    #[test]
    fn ids_print_with_prefix() {
        assert_eq!(format!("{:?}", NfaStateId::new(3)), "n3");
        assert_eq!(format!("{} {:?}", DfaStateId::new(0), DfaStateId::new(1)), "d0 d1");
    }

    fn owner(name: &str, position: usize) -> Owner {
        Owner {
            position,
            name: name.to_string(),
        }
    }

    // a(b|c)*
    fn sample() -> Nfa {
        let mut nfa = Nfa::new();
        let s: Vec<_> = (0..6).map(|_| nfa.add_state()).collect();
        nfa.add_transition(s[0], Symbol::Char('a'), s[1]);
        nfa.add_transition(s[1], Symbol::Epsilon, s[2]);
        nfa.add_transition(s[2], Symbol::Char('b'), s[3]);
        nfa.add_transition(s[2], Symbol::Char('c'), s[3]);
        nfa.add_transition(s[3], Symbol::Epsilon, s[2]);
        nfa.add_transition(s[3], Symbol::Epsilon, s[5]);
        nfa.add_transition(s[1], Symbol::Epsilon, s[5]);
        nfa.set_accepting(s[5], owner("word", 0));
        nfa.set_graph(s.into_iter().collect());
        nfa
    }

    #[test]
    fn epsilon_closure_follows_chains() {
        let nfa = sample();
        let start = nfa.start().unwrap();
        assert_eq!(nfa.epsilon_closure([start]).len(), 1);
        let second = *nfa.graph().get(1).unwrap();
        let closure = nfa.epsilon_closure([second]);
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn subset_construction() {
        let nfa = sample();
        let dfa = Dfa::from_nfa(&nfa);
        assert!(!dfa.state(dfa.start()).is_accepting());
        assert!(dfa.matches("a"));
        assert!(dfa.matches("abcbb"));
        assert!(!dfa.matches("b"));
        assert!(!dfa.matches("ab a"));
        assert!(!dfa.matches(""));
        // {n0}, {n1 n2 n5}, {n3 n2 n5}
        assert_eq!(dfa.len(), 3);
    }

    #[test]
    fn wildcard_is_a_fallback() {
        let mut nfa = Nfa::new();
        let s: Vec<_> = (0..3).map(|_| nfa.add_state()).collect();
        nfa.add_transition(s[0], Symbol::Any, s[1]);
        nfa.add_transition(s[0], Symbol::Char('x'), s[2]);
        nfa.set_accepting(s[1], owner("any", 1));
        nfa.set_accepting(s[2], owner("x", 0));
        nfa.set_graph(s.into_iter().collect());
        let dfa = Dfa::from_nfa(&nfa);

        let on_x = dfa.step(dfa.start(), 'x').unwrap();
        let owners: Vec<_> = dfa.state(on_x).owners().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(owners, vec!["x", "any"]);
        let on_y = dfa.step(dfa.start(), 'y').unwrap();
        assert_eq!(dfa.state(on_y).winner().unwrap().name, "any");
    }

    #[test]
    fn copy_resets_acceptance() {
        let source = sample();
        let mut nfa = Nfa::new();
        let copy: StateGraph<_> = nfa.copy_graph(&source);
        assert_eq!(copy.len(), source.len());
        assert!(copy.iter().all(|&id| !nfa.state(id).is_accepting()));
        let entry = *copy.first().unwrap();
        assert_eq!(nfa.state(entry).transitions(Symbol::Char('a')).len(), 1);
    }
}
