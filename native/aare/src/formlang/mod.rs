//! Byte automata for policy matching.
//!
//! This module provides:
//! - Thompson construction of engine patterns into a labeled ε-NFA
//! - Subset construction into a complete DFA with merged accept labels
//! - Hopcroft minimization with canonical state numbering

mod dfa;
mod epsilon_nfa;
mod regex;
mod state;
mod subset_construction;
mod symbol;

pub use dfa::{DEAD_STATE, DFA, START_STATE};
pub use epsilon_nfa::EpsilonNFA;
pub use regex::{Fragment, chain, compile_hir, literal_fragment, parse_engine_pattern};
pub use state::{StateId, StateSet};
pub use subset_construction::subset_construction;
pub use symbol::{ALPHABET_SIZE, ByteRange};

use std::fmt::Debug;

/// A label carried by accepting states.
///
/// When several accepting paths end on the same state their labels are
/// merged. `merge` must be commutative, associative and idempotent so the
/// result only depends on the set of contributions.
pub trait Accept: Clone + Default + Eq + Ord + Debug {
    /// The part of a label that is observable in the output. States whose
    /// keys are equal may be merged by minimization.
    type Key: Ord;

    fn merge(&mut self, other: &Self);

    fn key(&self) -> Self::Key;

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
impl Accept for u32 {
    type Key = u32;

    fn merge(&mut self, other: &Self) {
        *self |= *other;
    }

    fn key(&self) -> u32 {
        *self
    }
}
