//! Open slots of the next/check arrays during placement.

use rangemap::RangeSet;

/// The unclaimed slots of a growing array, kept as disjoint intervals.
///
/// Slots at or past [`FreeList::len`] do not exist yet and count as free:
/// placing a row there grows the array.
#[derive(Debug, Clone, Default)]
pub struct FreeList {
    free: RangeSet<usize>,
    len: usize,
}

impl FreeList {
    /// An array of `len` slots, all free.
    pub fn new(len: usize) -> Self {
        let mut free = RangeSet::new();
        if len > 0 {
            free.insert(0..len);
        }
        Self { free, len }
    }

    /// Current array length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of free slots inside the array.
    pub fn holes(&self) -> usize {
        self.free.iter().map(|r| r.end - r.start).sum()
    }

    pub fn is_free(&self, slot: usize) -> bool {
        slot >= self.len || self.free.contains(&slot)
    }

    /// Whether every `base + class` is free.
    pub fn fits_in(&self, base: usize, classes: &[usize]) -> bool {
        classes.iter().all(|&c| self.is_free(base + c))
    }

    /// Lowest base for `classes` (ascending, non-empty).
    ///
    /// Candidates put the first class on a free slot at or after its own
    /// index so that the base is never negative. If no hole fits, the row
    /// goes at the end of the array.
    pub fn first_fit(&self, classes: &[usize]) -> usize {
        let first = classes[0];
        for gap in self.free.overlapping(&(first..self.len.max(first + 1))) {
            for slot in gap.start.max(first)..gap.end {
                let base = slot - first;
                if self.fits_in(base, classes) {
                    return base;
                }
            }
        }
        self.len.max(first) - first
    }

    /// Claim `base + class` for every class, growing the array as needed.
    pub fn occupy(&mut self, base: usize, classes: &[usize]) {
        if let Some(&last) = classes.last() {
            self.grow(base + last + 1);
        }
        for &c in classes {
            let slot = base + c;
            self.free.remove(slot..slot + 1);
        }
    }

    /// Extend the array to `len` slots, the new ones free.
    pub fn grow(&mut self, len: usize) {
        if len > self.len {
            self.free.insert(self.len..len);
            self.len = len;
        }
    }

    pub fn gaps(&self) -> impl Iterator<Item = std::ops::Range<usize>> + '_ {
        self.free.iter().cloned()
    }
}
