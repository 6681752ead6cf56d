//! State identifiers and state sets.

use fixedbitset::FixedBitSet;
use std::fmt;

/// Automaton state identifier.
pub type StateId = u32;

/// A set of states backed by a growable bit set.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StateSet {
    bits: FixedBitSet,
}

impl StateSet {
    /// An empty set sized for state ids below `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(capacity),
        }
    }

    /// Insert a state, growing the set if needed. Returns whether it was new.
    pub fn insert(&mut self, state: StateId) -> bool {
        let idx = state as usize;
        if idx >= self.bits.len() {
            self.bits.grow(idx + 1);
        }
        !self.bits.put(idx)
    }

    /// Whether `state` is a member.
    pub fn contains(&self, state: StateId) -> bool {
        self.bits.contains(state as usize)
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.bits.is_clear()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Iterate over members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.bits.ones().map(|i| i as StateId)
    }

    /// Members present in both sets.
    pub fn intersection(&self, other: &StateSet) -> StateSet {
        let mut result = self.clone();
        result.bits.intersect_with(&other.bits);
        result
    }

    /// Members of `self` that are not in `other`.
    pub fn difference(&self, other: &StateSet) -> StateSet {
        let mut result = self.clone();
        result.bits.difference_with(&other.bits);
        result
    }

    /// Sorted member list, used as a hashable key for the set.
    pub fn to_vec(&self) -> Vec<StateId> {
        self.iter().collect()
    }
}

impl fmt::Debug for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<StateId> for StateSet {
    fn from_iter<I: IntoIterator<Item = StateId>>(iter: I) -> Self {
        let mut set = Self::with_capacity(0);
        for state in iter {
            set.insert(state);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_grows() {
        let mut set = StateSet::with_capacity(2);
        assert!(set.is_empty());
        assert!(set.insert(40));
        assert!(!set.insert(40));
        assert!(set.contains(40));
        assert!(!set.contains(1000));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_split_operations() {
        let part: StateSet = [1, 3, 5, 7].into_iter().collect();
        let preds: StateSet = [3, 7, 9].into_iter().collect();

        assert_eq!(part.intersection(&preds).to_vec(), vec![3, 7]);
        assert_eq!(part.difference(&preds).to_vec(), vec![1, 5]);
        // Shorter left operand.
        let small: StateSet = [3].into_iter().collect();
        assert_eq!(small.difference(&preds).to_vec(), Vec::<StateId>::new());
    }
}
