//! Subset construction for converting an ε-NFA to a DFA.

use crate::error::{Error, Result};
use crate::formlang::Accept;
use crate::formlang::dfa::{DEAD_STATE, DFA};
use crate::formlang::epsilon_nfa::EpsilonNFA;
use crate::formlang::state::StateId;
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};

/// Convert an ε-NFA to a complete DFA using the powerset construction.
///
/// The empty NFA set becomes the dead state 0 and the start closure becomes
/// state 1. Remaining states are numbered breadth-first, bytes ascending.
/// Each DFA state's label is the merge of its NFA members' labels.
///
/// Fails with [`Error::TableOverflow`] once more than `max_states` states
/// would be needed.
pub fn subset_construction<A: Accept>(nfa: &EpsilonNFA<A>, max_states: usize) -> Result<DFA<A>> {
    let mut state_mapping: IndexMap<Vec<StateId>, StateId> = IndexMap::new();
    state_mapping.insert(Vec::new(), DEAD_STATE);

    let mut dfa = DFA::new();
    let initial_set = nfa.epsilon_closure([nfa.start_state()]);
    let initial = dfa.add_state(nfa.label_of(&initial_set));
    state_mapping.insert(initial_set.to_vec(), initial);

    let mut worklist = VecDeque::from([(initial, initial_set)]);

    while let Some((current, current_set)) = worklist.pop_front() {
        let moves = nfa.byte_moves(&current_set);
        // Many bytes share one raw target list, close each list once.
        let mut resolved: HashMap<&[StateId], StateId> = HashMap::new();

        for (byte, targets) in moves.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }

            let next = match resolved.get(targets.as_slice()) {
                Some(&next) => next,
                None => {
                    let next_set = nfa.epsilon_closure(targets.iter().copied());
                    let key = next_set.to_vec();
                    let next = match state_mapping.get(&key) {
                        Some(&existing) => existing,
                        None => {
                            if dfa.num_states() >= max_states {
                                return Err(Error::TableOverflow(format!(
                                    "automaton exceeds {max_states} states"
                                )));
                            }
                            let new_state = dfa.add_state(nfa.label_of(&next_set));
                            state_mapping.insert(key, new_state);
                            worklist.push_back((new_state, next_set));
                            new_state
                        }
                    };
                    resolved.insert(targets.as_slice(), next);
                    next
                }
            };

            dfa.set_transition(current, byte as u8, next);
        }
    }

    Ok(dfa)
}
