//! Epsilon Non-deterministic Finite Automaton (ε-NFA) over bytes.

use crate::formlang::Accept;
use crate::formlang::state::{StateId, StateSet};
use crate::formlang::symbol::{ALPHABET_SIZE, ByteRange};

/// An ε-NFA whose final states carry accept labels.
///
/// State 0 is the single start state. A state can be final for several
/// rules at once; their labels are merged when the state is marked.
#[derive(Debug, Clone)]
pub struct EpsilonNFA<A> {
    /// Byte edges per state.
    edges: Vec<Vec<(ByteRange, StateId)>>,
    /// Epsilon edges per state.
    epsilon: Vec<Vec<StateId>>,
    labels: Vec<Option<A>>,
}

impl<A: Accept> EpsilonNFA<A> {
    /// Create an NFA holding only the start state.
    pub fn new() -> Self {
        let mut nfa = Self {
            edges: Vec::new(),
            epsilon: Vec::new(),
            labels: Vec::new(),
        };
        nfa.add_state();
        nfa
    }

    /// Add a fresh state with no edges and return its id.
    pub fn add_state(&mut self) -> StateId {
        let id = self.edges.len() as StateId;
        self.edges.push(Vec::new());
        self.epsilon.push(Vec::new());
        self.labels.push(None);
        id
    }

    /// The start state, always the first one created.
    pub fn start_state(&self) -> StateId {
        0
    }

    /// Number of states, including the start state.
    pub fn num_states(&self) -> usize {
        self.edges.len()
    }

    /// Add an edge from `source` to `destination` on every byte in `range`.
    pub fn add_transition(&mut self, source: StateId, range: ByteRange, destination: StateId) {
        self.edges[source as usize].push((range, destination));
    }

    /// Add an edge that consumes no input.
    pub fn add_epsilon_transition(&mut self, source: StateId, destination: StateId) {
        self.epsilon[source as usize].push(destination);
    }

    /// Mark `state` final, merging `label` into any label it already has.
    pub fn add_final_state(&mut self, state: StateId, label: &A) {
        match &mut self.labels[state as usize] {
            Some(existing) => existing.merge(label),
            slot => *slot = Some(label.clone()),
        }
    }

    /// Whether `state` carries a label.
    pub fn is_final(&self, state: StateId) -> bool {
        self.labels[state as usize].is_some()
    }

    /// The merged label of every final state in `states`.
    pub fn label_of(&self, states: &StateSet) -> A {
        let mut label = A::default();
        for state in states.iter() {
            if let Some(l) = &self.labels[state as usize] {
                label.merge(l);
            }
        }
        label
    }

    /// Epsilon closure of `seeds`, by depth-first search.
    pub fn epsilon_closure<I>(&self, seeds: I) -> StateSet
    where
        I: IntoIterator<Item = StateId>,
    {
        let mut closure = StateSet::with_capacity(self.num_states());
        let mut stack: Vec<StateId> = seeds.into_iter().collect();

        while let Some(s) = stack.pop() {
            if !closure.insert(s) {
                continue;
            }
            for &dest in &self.epsilon[s as usize] {
                if !closure.contains(dest) {
                    stack.push(dest);
                }
            }
        }

        closure
    }

    /// Raw byte successors of `states`, one sorted and deduplicated target
    /// list per input byte. Epsilon edges are not followed.
    pub fn byte_moves(&self, states: &StateSet) -> Vec<Vec<StateId>> {
        let mut moves = vec![Vec::new(); ALPHABET_SIZE];
        for state in states.iter() {
            for &(range, dest) in &self.edges[state as usize] {
                for byte in range.bytes() {
                    moves[byte as usize].push(dest);
                }
            }
        }
        for targets in &mut moves {
            targets.sort_unstable();
            targets.dedup();
        }
        moves
    }

    /// States reachable from `states` on `byte`, epsilon-closed.
    pub fn move_on_byte(&self, states: &StateSet, byte: u8) -> StateSet {
        let reached = states.iter().flat_map(|s| {
            self.edges[s as usize]
                .iter()
                .filter(move |(range, _)| range.contains(byte))
                .map(|&(_, dest)| dest)
        });
        self.epsilon_closure(reached)
    }

    /// Run the NFA over `input`, returning the merged label at the end.
    pub fn accepts(&self, input: &[u8]) -> A {
        let mut current = self.epsilon_closure([self.start_state()]);
        for &byte in input {
            current = self.move_on_byte(&current, byte);
            if current.is_empty() {
                break;
            }
        }
        self.label_of(&current)
    }
}

impl<A: Accept> Default for EpsilonNFA<A> {
    fn default() -> Self {
        Self::new()
    }
}
