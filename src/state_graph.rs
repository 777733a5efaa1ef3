use std::fmt;

/// An ordered, appendable run of automaton states.
///
/// Both compilers build their automata out of these: the regex evaluator keeps
/// NFA fragments whose first element is the entry state and whose last element
/// is the exit state, and the grammar evaluator keeps the symbol sequence of a
/// rule alternative.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateGraph<T> {
    states: Vec<T>,
}

impl<T> Default for StateGraph<T> {
    fn default() -> Self {
        Self { states: Vec::new() }
    }
}

impl<T> StateGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(state: T) -> Self {
        Self {
            states: vec![state],
        }
    }

    pub fn push_first(&mut self, state: T) {
        self.states.insert(0, state);
    }

    pub fn push_last(&mut self, state: T) {
        self.states.push(state);
    }

    /// Concatenates `other` onto the end of this graph.
    pub fn append(&mut self, mut other: StateGraph<T>) {
        self.states.append(&mut other.states);
    }

    pub fn first(&self) -> Option<&T> {
        self.states.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.states.last()
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.states.get(idx)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.states.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.states.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.states
    }
}

impl<T: Clone> StateGraph<T> {
    /// Copies the states in `range` into a new graph, or `None` if `range`
    /// reaches past the end.
    pub fn sub_graph(&self, range: std::ops::Range<usize>) -> Option<StateGraph<T>> {
        let states = self.states.get(range)?;
        Some(Self {
            states: states.to_vec(),
        })
    }
}

impl<T> FromIterator<T> for StateGraph<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a StateGraph<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

impl<T: fmt::Display> fmt::Display for StateGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, state) in self.states.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{state}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::state_graph::StateGraph;

    #[test]
    fn append_keeps_order() {
        let mut left: StateGraph<u32> = [1, 2].into_iter().collect();
        let right: StateGraph<u32> = [3, 4].into_iter().collect();
        left.append(right);
        left.push_first(0);
        assert_eq!(left.first(), Some(&0));
        assert_eq!(left.last(), Some(&4));
        assert_eq!(left.as_slice(), &[0, 1, 2, 3, 4]);
        assert_eq!(left.sub_graph(1..3).unwrap().as_slice(), &[1, 2]);
        assert!(left.sub_graph(4..6).is_none());
    }

    #[test]
    fn empty_graph_has_no_ends() {
        let graph: StateGraph<u32> = StateGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.first(), None);
        assert_eq!(graph.last(), None);
    }
}
