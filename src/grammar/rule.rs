use std::fmt;

use crate::{grammar::state::GrammarState, state_graph::StateGraph};

/// One alternative of a rule: `name -> sequence`.
///
/// An alternative whose sequence holds no symbols, or only epsilon symbols,
/// is the empty production.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GrammarRule {
    name: String,
    sequence: StateGraph<GrammarState>,
    subrule: bool,
    multi_child: bool,
    line: usize,
}

impl GrammarRule {
    pub fn new(name: &str, sequence: StateGraph<GrammarState>, subrule: bool, line: usize) -> Self {
        Self {
            name: name.to_string(),
            sequence,
            subrule,
            multi_child: false,
            line,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &StateGraph<GrammarState> {
        &self.sequence
    }

    pub(crate) fn sequence_mut(&mut self) -> &mut StateGraph<GrammarState> {
        &mut self.sequence
    }

    /// Symbols that consume input, in order.
    pub fn symbols(&self) -> impl DoubleEndedIterator<Item = &GrammarState> {
        self.sequence.iter().filter(|state| !state.is_epsilon())
    }

    pub fn is_empty(&self) -> bool {
        self.symbols().next().is_none()
    }

    /// Sub-rules are synthesized for groups, `*` and `?`. They never produce a
    /// node of their own in the parse tree.
    pub fn is_subrule(&self) -> bool {
        self.subrule
    }

    pub fn is_multi_child(&self) -> bool {
        self.multi_child
    }

    pub(crate) fn set_multi_child(&mut self, multi_child: bool) {
        self.multi_child = multi_child;
    }

    /// Line of the rule block this alternative was written in.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for GrammarRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ->", self.name)?;
        if self.is_empty() {
            write!(f, " ε")?;
        }
        for state in self.symbols() {
            write!(f, " {state}")?;
        }
        if self.multi_child {
            write!(f, " [>1]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::grammar::{rule::GrammarRule, state::GrammarState};

    #[test]
    fn main() {
        let sequence = [GrammarState::new("a"), GrammarState::epsilon(), GrammarState::new("B")]
            .into_iter()
            .collect();
        let mut rule = GrammarRule::new("A", sequence, false, 1);
        assert!(!rule.is_empty());
        assert_eq!(rule.symbols().count(), 2);
        rule.set_multi_child(true);
        assert_eq!(rule.to_string(), "A -> a B [>1]");

        let empty = GrammarRule::new("A{1}", [GrammarState::epsilon()].into_iter().collect(), true, 1);
        assert!(empty.is_empty());
        assert_eq!(empty.to_string(), "A{1} -> ε");
    }
}
