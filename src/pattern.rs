use std::fmt;

use log::debug;

use crate::{
    TokenSpec,
    automaton::{Dfa, Nfa, Owner, Symbol},
    error::PatternError,
    regex_parser::{self, EmbedLookup},
    state_graph::StateGraph,
};

/// A single compiled token pattern: the regex, its NFA and the DFA built from
/// it.
#[derive(Clone, Debug)]
pub struct Pattern {
    spec: TokenSpec,
    nfa: Nfa,
    dfa: Dfa,
}

impl Pattern {
    /// Compiles `spec`, resolving `:name:` embeddings through `lookup`.
    pub fn new(spec: TokenSpec, lookup: &dyn EmbedLookup) -> Result<Self, PatternError> {
        let mut nfa = regex_parser::build_nfa(spec.pattern(), lookup)?;
        let end = nfa.end().ok_or(PatternError::EmptyRegex)?;
        nfa.set_accepting(end, spec.owner());
        let dfa = Dfa::from_nfa(&nfa);
        debug!(
            "compiled pattern {:?}: {} NFA states, {} DFA states",
            spec.name(),
            nfa.len(),
            dfa.len()
        );
        Ok(Self { spec, nfa, dfa })
    }

    /// Compiles a standalone pattern without embedding support.
    pub fn compile(name: &str, regex: &str) -> Result<Self, PatternError> {
        Self::new(TokenSpec::new(name.to_string(), regex.to_string()), &())
    }

    /// Merges `other` into this pattern as an alternative, so that this
    /// pattern matches whatever either of them matched.
    pub fn add_alternative(&mut self, other: &Pattern) {
        let copy = self.nfa.copy_graph(&other.nfa);
        let (Some(old_first), Some(old_last)) = (self.nfa.start(), self.nfa.end()) else {
            return;
        };
        let (Some(&new_first), Some(&new_last)) = (copy.first(), copy.last()) else {
            return;
        };

        self.nfa.clear_accepting(old_last);
        let start = self.nfa.add_state();
        let end = self.nfa.add_state();
        self.nfa.add_transition(start, Symbol::Epsilon, old_first);
        self.nfa.add_transition(start, Symbol::Epsilon, new_first);
        self.nfa.add_transition(old_last, Symbol::Epsilon, end);
        self.nfa.add_transition(new_last, Symbol::Epsilon, end);
        self.nfa.set_accepting(end, self.spec.owner());

        let mut graph = StateGraph::single(start);
        graph.append(self.nfa.graph().clone());
        graph.append(copy);
        graph.push_last(end);
        self.nfa.set_graph(graph);

        self.spec.extend_pattern(other.regex());
        self.dfa = Dfa::from_nfa(&self.nfa);
        debug!(
            "merged alternative into {:?}: {} DFA states",
            self.name(),
            self.dfa.len()
        );
    }

    pub fn matches(&self, input: &str) -> bool {
        self.dfa.matches(input)
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn regex(&self) -> &str {
        self.spec.pattern()
    }

    pub fn is_internal(&self) -> bool {
        self.spec.is_internal()
    }

    pub fn position(&self) -> usize {
        self.spec.position()
    }

    pub fn spec(&self) -> &TokenSpec {
        &self.spec
    }

    pub fn owner(&self) -> Owner {
        self.spec.owner()
    }

    pub fn nfa(&self) -> &Nfa {
        &self.nfa
    }

    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] (DFA)", self.name())?;
        write!(f, "{}", self.dfa)
    }
}

#[cfg(test)]
mod test {
    use crate::{error::PatternError, pattern::Pattern};

    #[test]
    fn main() {
        let number = Pattern::compile("number", "[0123456789]+").unwrap();
        assert!(number.matches("2024"));
        assert!(!number.matches(""));
        assert!(!number.matches("20x"));
        assert_eq!(number.name(), "number");
        assert!(number.to_string().starts_with("[number] (DFA)\n"));
    }

    #[test]
    fn alternatives_merge() {
        let mut keyword = Pattern::compile("keyword", "if").unwrap();
        let other = Pattern::compile("keyword", "else").unwrap();
        keyword.add_alternative(&other);
        assert!(keyword.matches("if"));
        assert!(keyword.matches("else"));
        assert!(!keyword.matches("ifelse"));
        assert_eq!(keyword.regex(), "if | else");
        let accepting = keyword
            .nfa()
            .graph()
            .iter()
            .filter(|&&id| keyword.nfa().state(id).is_accepting())
            .count();
        assert_eq!(accepting, 1);
    }

    #[test]
    fn errors() {
        assert_eq!(
            Pattern::compile("bad", "").unwrap_err(),
            PatternError::EmptyRegex
        );
        assert_eq!(
            Pattern::compile("bad", ":digit:").unwrap_err(),
            PatternError::UndefinedEmbed("digit".to_string())
        );
    }
}
