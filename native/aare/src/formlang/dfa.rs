//! Complete byte DFA with Hopcroft minimization.

use crate::formlang::Accept;
use crate::formlang::state::{StateId, StateSet};
use crate::formlang::symbol::ALPHABET_SIZE;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// The non-matching state. Every byte loops back to it.
pub const DEAD_STATE: StateId = 0;
/// The state matching starts in.
pub const START_STATE: StateId = 1;

/// A complete deterministic automaton over bytes.
///
/// Every state has a successor for every byte, with missing transitions
/// going to [`DEAD_STATE`]. Each state carries an accept label; the default
/// label means "not accepting".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DFA<A> {
    rows: Vec<[StateId; ALPHABET_SIZE]>,
    accepts: Vec<A>,
}

impl<A: Accept> DFA<A> {
    /// Create a DFA holding only the dead state.
    pub fn new() -> Self {
        Self {
            rows: vec![[DEAD_STATE; ALPHABET_SIZE]],
            accepts: vec![A::default()],
        }
    }

    /// Add a state whose transitions all go to the dead state.
    pub fn add_state(&mut self, accept: A) -> StateId {
        let id = self.rows.len() as StateId;
        self.rows.push([DEAD_STATE; ALPHABET_SIZE]);
        self.accepts.push(accept);
        id
    }

    /// Point the edge of `source` on `byte` at `destination`.
    pub fn set_transition(&mut self, source: StateId, byte: u8, destination: StateId) {
        self.rows[source as usize][byte as usize] = destination;
    }

    /// Successor of `source` on `byte`.
    pub fn transition(&self, source: StateId, byte: u8) -> StateId {
        self.rows[source as usize][byte as usize]
    }

    /// Every successor of `state`, indexed by byte.
    pub fn row(&self, state: StateId) -> &[StateId; ALPHABET_SIZE] {
        &self.rows[state as usize]
    }

    /// Number of states, including the dead state.
    pub fn num_states(&self) -> usize {
        self.rows.len()
    }

    /// The start state, always [`START_STATE`].
    pub fn start_state(&self) -> StateId {
        START_STATE
    }

    /// Accept label of `state`. Non-accepting states carry the default label.
    pub fn accept(&self, state: StateId) -> &A {
        &self.accepts[state as usize]
    }

    /// Accept labels of all states, indexed by state id.
    pub fn accepts(&self) -> &[A] {
        &self.accepts
    }

    /// Walk `input` from the start state.
    pub fn walk(&self, input: &[u8]) -> StateId {
        self.walk_from(self.start_state(), input)
    }

    /// Walk `input` from `state`.
    pub fn walk_from(&self, state: StateId, input: &[u8]) -> StateId {
        input
            .iter()
            .fold(state, |state, &byte| self.transition(state, byte))
    }

    /// States reachable from the start state, plus the dead state.
    fn find_reachable_states(&self) -> StateSet {
        let mut reachable = StateSet::with_capacity(self.num_states());
        reachable.insert(DEAD_STATE);
        let mut queue = VecDeque::from([self.start_state()]);

        while let Some(state) = queue.pop_front() {
            if !reachable.insert(state) {
                continue;
            }
            for &next in self.row(state) {
                if !reachable.contains(next) {
                    queue.push_back(next);
                }
            }
        }

        reachable
    }

    /// Minimize the DFA using Hopcroft's algorithm.
    ///
    /// `symbols` must contain at least one byte of every byte equivalence
    /// class of this automaton; refinement only splits on those. States are
    /// first grouped by [`Accept::key`], so states with different keys are
    /// never merged; the labels of merged states are merged too. The result
    /// is canonically numbered.
    pub fn minimize(&self, symbols: &[u8]) -> DFA<A> {
        let n = self.num_states();
        let reachable = self.find_reachable_states();

        // Initial partition: one block per distinct accept key.
        let mut by_label: BTreeMap<A::Key, StateSet> = BTreeMap::new();
        for state in reachable.iter() {
            by_label
                .entry(self.accepts[state as usize].key())
                .or_insert_with(|| StateSet::with_capacity(n))
                .insert(state);
        }
        let mut partitions: Vec<StateSet> = by_label.into_values().collect();

        let mut block_of = vec![usize::MAX; n];
        for (idx, partition) in partitions.iter().enumerate() {
            for state in partition.iter() {
                block_of[state as usize] = idx;
            }
        }

        let mut reverse_transitions: HashMap<(StateId, u8), Vec<StateId>> = HashMap::new();
        for state in reachable.iter() {
            for &symbol in symbols {
                reverse_transitions
                    .entry((self.transition(state, symbol), symbol))
                    .or_default()
                    .push(state);
            }
        }

        // Worklist of (partition_index, symbol) splitters.
        let mut worklist: VecDeque<(usize, u8)> = (0..partitions.len())
            .flat_map(|idx| symbols.iter().map(move |&symbol| (idx, symbol)))
            .collect();

        while let Some((splitter_idx, symbol)) = worklist.pop_front() {
            let mut predecessors = StateSet::with_capacity(n);
            for target in partitions[splitter_idx].iter() {
                if let Some(sources) = reverse_transitions.get(&(target, symbol)) {
                    for &source in sources {
                        predecessors.insert(source);
                    }
                }
            }
            if predecessors.is_empty() {
                continue;
            }

            let touched: BTreeSet<usize> = predecessors
                .iter()
                .map(|state| block_of[state as usize])
                .collect();

            for part_idx in touched {
                let partition = &partitions[part_idx];
                let intersection = partition.intersection(&predecessors);
                if intersection.len() == partition.len() {
                    continue;
                }
                let difference = partition.difference(&predecessors);

                // Keep the larger part in place, queue the smaller one.
                let (keep, add) = if intersection.len() <= difference.len() {
                    (difference, intersection)
                } else {
                    (intersection, difference)
                };

                let new_idx = partitions.len();
                for state in add.iter() {
                    block_of[state as usize] = new_idx;
                }
                partitions[part_idx] = keep;
                partitions.push(add);

                for &sym in symbols {
                    worklist.push_back((new_idx, sym));
                }
            }
        }

        self.build_quotient(&block_of, partitions.len())
    }

    /// Collapse states into blocks and renumber canonically.
    ///
    /// The dead state's block becomes state 0. The start state's block
    /// becomes state 1, as a separate copy if it is the dead block. The rest
    /// are numbered in breadth-first order, bytes ascending.
    fn build_quotient(&self, block_of: &[usize], num_blocks: usize) -> DFA<A> {
        let mut representative = vec![DEAD_STATE; num_blocks];
        let mut labels = vec![A::default(); num_blocks];
        let mut seen = vec![false; num_blocks];
        for (state, &block) in block_of.iter().enumerate() {
            if block == usize::MAX {
                continue;
            }
            labels[block].merge(&self.accepts[state]);
            if !seen[block] {
                seen[block] = true;
                representative[block] = state as StateId;
            }
        }

        let dead_block = block_of[DEAD_STATE as usize];
        let start_block = block_of[self.start_state() as usize];

        let mut new_id: Vec<Option<StateId>> = vec![None; num_blocks];
        new_id[dead_block] = Some(DEAD_STATE);

        let mut minimized = DFA::new();
        let mut queue = VecDeque::new();
        if start_block == dead_block {
            minimized.add_state(A::default());
        } else {
            let rep = representative[start_block];
            let start = minimized.add_state(labels[start_block].clone());
            new_id[start_block] = Some(start);
            queue.push_back((start, rep));
        }

        while let Some((state, rep)) = queue.pop_front() {
            for byte in 0..ALPHABET_SIZE {
                let block = block_of[self.rows[rep as usize][byte] as usize];
                let dest = match new_id[block] {
                    Some(dest) => dest,
                    None => {
                        let dest_rep = representative[block];
                        let dest = minimized.add_state(labels[block].clone());
                        new_id[block] = Some(dest);
                        queue.push_back((dest, dest_rep));
                        dest
                    }
                };
                minimized.rows[state as usize][byte] = dest;
            }
        }

        minimized
    }
}

impl<A: Accept> Default for DFA<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_bytes() -> Vec<u8> {
        (0..=255).collect()
    }

    #[test]
    fn test_dfa_basic() {
        let mut dfa: DFA<u32> = DFA::new();
        let s1 = dfa.add_state(0);
        let s2 = dfa.add_state(0);
        let s3 = dfa.add_state(1);
        dfa.set_transition(s1, b'a', s2);
        dfa.set_transition(s2, b'b', s3);

        assert_eq!(dfa.num_states(), 4);
        assert_eq!(dfa.start_state(), s1);
        assert_eq!(dfa.walk(b"ab"), s3);
        assert_eq!(dfa.walk(b"abc"), DEAD_STATE);
        assert_eq!(*dfa.accept(s3), 1);
    }

    #[test]
    fn test_dfa_minimization() {
        // 1 -a-> 2 -b-> 4(final)
        // 1 -b-> 3 -b-> 5(final)
        // 2 and 3 merge, as do 4 and 5.
        let mut dfa: DFA<u32> = DFA::new();
        for label in [0, 0, 0, 7, 7] {
            dfa.add_state(label);
        }
        dfa.set_transition(1, b'a', 2);
        dfa.set_transition(1, b'b', 3);
        dfa.set_transition(2, b'b', 4);
        dfa.set_transition(3, b'b', 5);

        let minimized = dfa.minimize(&all_bytes());
        assert_eq!(minimized.num_states(), 4);
        assert_eq!(minimized.transition(1, b'a'), minimized.transition(1, b'b'));
        assert_eq!(*minimized.accept(minimized.walk(b"ab")), 7);
        assert_eq!(*minimized.accept(minimized.walk(b"bb")), 7);
    }

    #[test]
    fn test_minimize_keeps_distinct_labels() {
        let mut dfa: DFA<u32> = DFA::new();
        for label in [0, 1, 2] {
            dfa.add_state(label);
        }
        dfa.set_transition(1, b'a', 2);
        dfa.set_transition(1, b'b', 3);

        let minimized = dfa.minimize(&all_bytes());
        assert_eq!(minimized.num_states(), 4);
        assert_eq!(*minimized.accept(minimized.walk(b"a")), 1);
        assert_eq!(*minimized.accept(minimized.walk(b"b")), 2);
    }

    #[test]
    fn test_minimize_drops_unreachable_and_dead_equivalents() {
        let mut dfa: DFA<u32> = DFA::new();
        let start = dfa.add_state(0);
        let sink = dfa.add_state(0);
        let unreachable = dfa.add_state(5);
        for byte in 0..=255 {
            dfa.set_transition(start, byte, sink);
            dfa.set_transition(sink, byte, sink);
        }
        dfa.set_transition(unreachable, b'x', start);

        let minimized = dfa.minimize(&all_bytes());
        // The start state is equivalent to dead but is kept as its own copy.
        assert_eq!(minimized.num_states(), 2);
        assert!(minimized.row(START_STATE).iter().all(|&s| s == DEAD_STATE));
        assert!(minimized.row(DEAD_STATE).iter().all(|&s| s == DEAD_STATE));
    }

    #[test]
    fn test_minimize_with_representatives() {
        // Bytes 'a'..='z' behave identically, 'a' stands in for all of them.
        let mut dfa: DFA<u32> = DFA::new();
        let s1 = dfa.add_state(0);
        let s2 = dfa.add_state(3);
        let s3 = dfa.add_state(3);
        for byte in b'a'..=b'z' {
            dfa.set_transition(s1, byte, s2);
            dfa.set_transition(s2, byte, s3);
            dfa.set_transition(s3, byte, s3);
        }

        let mut symbols = vec![0, b'a'];
        symbols.push(b'{');
        let minimized = dfa.minimize(&symbols);
        assert_eq!(minimized.num_states(), 3);
        assert_eq!(*minimized.accept(minimized.walk(b"qrs")), 3);
        assert_eq!(minimized.walk(b"q0"), DEAD_STATE);
    }
}
