use std::fmt;

use indexmap::IndexMap;
use log::debug;

use crate::{
    TokenSpec,
    automaton::{Dfa, Nfa, Symbol},
    config::{Config, EOF_TOKEN},
    error::{DefinitionError, DefinitionErrorKind, PatternError, TokenizeError},
    pattern::Pattern,
    regex_parser::EmbedLookup,
    state_graph::StateGraph,
    tokenizer::Tokenizer,
};

/// Every pattern of a definition file, plus the master automaton joining the
/// non-internal ones.
///
/// A definition file holds one pattern per line:
///
/// ```text
/// [:]name: regex    # comment
/// ```
///
/// A leading `:` marks the pattern internal. Defining a name twice adds the
/// second regex as an alternative of the first.
#[derive(Clone, Debug)]
pub struct PatternSet {
    patterns: IndexMap<String, Pattern>,
    nfa: Nfa,
    dfa: Dfa,
}

impl EmbedLookup for IndexMap<String, Pattern> {
    fn embedded(&self, name: &str) -> Option<&Nfa> {
        self.get(name).map(Pattern::nfa)
    }
}

impl PatternSet {
    /// Parses a definition file.
    pub fn parse(definitions: &str) -> Result<Self, DefinitionError> {
        let mut patterns = IndexMap::new();

        for (idx, line) in definitions.lines().enumerate() {
            let line_number = idx + 1;
            let error = |kind| DefinitionError::new(line_number, kind);

            let line = strip_comment(line.trim()).trim();
            if line.is_empty() {
                continue;
            }
            let (internal, line) = match line.strip_prefix(':') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let Some((name, regex)) = line.split_once(':') else {
                return Err(error(DefinitionErrorKind::MissingSeparator));
            };

            let name = name.trim();
            if name.is_empty() {
                return Err(error(DefinitionErrorKind::MissingName));
            }
            if !is_valid_name(name) {
                return Err(error(DefinitionErrorKind::InvalidName(name.to_string())));
            }
            if name == EOF_TOKEN {
                return Err(error(DefinitionErrorKind::ReservedName(name.to_string())));
            }
            let regex = regex.trim();
            if regex.is_empty() {
                return Err(error(DefinitionErrorKind::MissingRegex(name.to_string())));
            }

            let spec = TokenSpec::new(name.to_string(), regex.to_string()).with_internal(internal);
            define(&mut patterns, spec).map_err(|source| {
                error(DefinitionErrorKind::Pattern {
                    name: name.to_string(),
                    source,
                })
            })?;
        }

        Ok(Self::join(patterns))
    }

    /// Builds a set from already separated specs, in definition order.
    pub fn from_specs(specs: impl IntoIterator<Item = TokenSpec>) -> Result<Self, PatternError> {
        let mut patterns = IndexMap::new();
        for spec in specs {
            define(&mut patterns, spec)?;
        }
        Ok(Self::join(patterns))
    }

    fn join(patterns: IndexMap<String, Pattern>) -> Self {
        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        let mut graph = StateGraph::single(start);

        for pattern in patterns.values().filter(|pattern| !pattern.is_internal()) {
            let copy = nfa.copy_graph(pattern.nfa());
            if let (Some(&first), Some(&last)) = (copy.first(), copy.last()) {
                nfa.add_transition(start, Symbol::Epsilon, first);
                nfa.set_accepting(last, pattern.owner());
            }
            graph.append(copy);
        }
        nfa.set_graph(graph);

        let dfa = Dfa::from_nfa(&nfa);
        debug!(
            "master automaton for {} patterns: {} NFA states, {} DFA states",
            patterns.len(),
            nfa.len(),
            dfa.len()
        );
        Self { patterns, nfa, dfa }
    }

    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    /// Patterns in definition order.
    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The union of all non-internal patterns.
    pub fn nfa(&self) -> &Nfa {
        &self.nfa
    }

    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    /// A tokenizer with the default [`Config`]. No pattern can be named after
    /// its end-of-file token, so this cannot fail.
    pub fn tokenizer(&self, input: &str) -> Tokenizer<'_> {
        Tokenizer::build(self, input, Config::default())
    }

    /// Fails if a token-producing pattern has the configured end-of-file name.
    pub fn tokenizer_with(&self, input: &str, config: Config) -> Result<Tokenizer<'_>, TokenizeError> {
        Tokenizer::new(self, input, config)
    }
}

fn define(patterns: &mut IndexMap<String, Pattern>, spec: TokenSpec) -> Result<(), PatternError> {
    if spec.name() == EOF_TOKEN {
        return Err(PatternError::ReservedName(spec.name().to_string()));
    }
    let position = patterns
        .get_index_of(spec.name())
        .unwrap_or(patterns.len());
    let pattern = Pattern::new(spec.with_position(position), &*patterns)?;
    match patterns.get_mut(pattern.name()) {
        Some(existing) => existing.add_alternative(&pattern),
        None => {
            patterns.insert(pattern.name().to_string(), pattern);
        }
    }
    Ok(())
}

/// Cuts `line` at the first `#` not escaped with `\`.
fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '#' if !escaped => return &line[..idx],
            '\\' => escaped = !escaped,
            _ => escaped = false,
        }
    }
    line
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

impl fmt::Display for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pattern in self.patterns.values() {
            writeln!(
                f,
                "{}{}: {}",
                if pattern.is_internal() { ":" } else { "" },
                pattern.name(),
                pattern.regex()
            )?;
        }
        writeln!(f, "[master] (DFA)")?;
        write!(f, "{}", self.dfa)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        TokenSpec,
        error::{DefinitionError, DefinitionErrorKind, PatternError},
        pattern_set::{PatternSet, strip_comment},
    };

    #[test]
    fn main() {
        let set = PatternSet::parse(
            "
            # identifiers
            :letter: [abcdefghijklmnopqrstuvwxyz_]
            :digit: [0123456789]
            id: :letter:(:letter:|:digit:)*
            ",
        )
        .unwrap();
        assert_eq!(set.len(), 3);
        let id = set.pattern("id").unwrap();
        assert!(id.matches("x1_2"));
        assert!(!id.matches("1x"));
        assert!(set.pattern("letter").unwrap().is_internal());
        assert_eq!(id.position(), 2);
    }

    #[test]
    fn master_skips_internal_patterns() {
        let set = PatternSet::parse(":digit: [0123456789]\nnumber: :digit:+").unwrap();
        let dfa = set.dfa();
        let state = dfa.step(dfa.start(), '7').unwrap();
        let owners: Vec<_> = dfa
            .state(state)
            .owners()
            .iter()
            .map(|owner| owner.name.as_str())
            .collect();
        assert_eq!(owners, vec!["number"]);
    }

    #[test]
    fn earlier_definition_wins() {
        let set = PatternSet::parse("keyword: if\nid: [fi]+").unwrap();
        let dfa = set.dfa();
        let i = dfa.step(dfa.start(), 'i').unwrap();
        let f = dfa.step(i, 'f').unwrap();
        assert_eq!(dfa.state(f).winner().unwrap().name, "keyword");
        assert_eq!(dfa.state(i).winner().unwrap().name, "id");
    }

    #[test]
    fn repeated_names_merge() {
        let set = PatternSet::parse("op: \\+\nnumber: [0123456789]+\nop: -").unwrap();
        assert_eq!(set.len(), 2);
        let op = set.pattern("op").unwrap();
        assert!(op.matches("+"));
        assert!(op.matches("-"));
        assert_eq!(op.position(), 0);
    }

    #[test]
    fn comments() {
        assert_eq!(strip_comment("a: b # c"), "a: b ");
        assert_eq!(strip_comment("hash: \\#x"), "hash: \\#x");
        assert_eq!(strip_comment("# all"), "");
        let set = PatternSet::parse("hash: \\# [abc] # trailing").unwrap();
        assert!(set.pattern("hash").unwrap().matches("#b"));
    }

    #[test]
    fn definition_errors() {
        let error = |text| PatternSet::parse(text).unwrap_err();
        assert_eq!(
            error("a: b\nmissing"),
            DefinitionError::new(2, DefinitionErrorKind::MissingSeparator)
        );
        assert_eq!(
            error("::abc"),
            DefinitionError::new(1, DefinitionErrorKind::MissingName)
        );
        assert_eq!(
            error("1abc: x"),
            DefinitionError::new(1, DefinitionErrorKind::InvalidName("1abc".to_string()))
        );
        assert_eq!(
            error("eof: x"),
            DefinitionError::new(1, DefinitionErrorKind::ReservedName("eof".to_string()))
        );
        assert_eq!(
            error("\n\nname:   # nothing"),
            DefinitionError::new(3, DefinitionErrorKind::MissingRegex("name".to_string()))
        );
        assert_eq!(
            error("bad: (ab"),
            DefinitionError::new(
                1,
                DefinitionErrorKind::Pattern {
                    name: "bad".to_string(),
                    source: PatternError::UnterminatedGroup,
                }
            )
        );
        assert_eq!(error("a: b\nbad: (ab").to_string(), "(2) [bad] could not find end subpattern ')'");
    }

    #[test]
    fn from_specs() {
        let set = PatternSet::from_specs([
            TokenSpec::new("digit".to_string(), "[0123456789]".to_string()).with_internal(true),
            TokenSpec::new("number".to_string(), ":digit:+".to_string()),
        ])
        .unwrap();
        assert!(set.pattern("number").unwrap().matches("42"));

        let result = PatternSet::from_specs([TokenSpec::new("eof".to_string(), "x".to_string())]);
        assert_eq!(result.err(), Some(PatternError::ReservedName("eof".to_string())));
    }
}
