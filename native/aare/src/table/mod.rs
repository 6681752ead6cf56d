//! Compressed transition tables.
//!
//! A DFA row per state is stored as a default successor plus the columns
//! that differ from it. Rows are overlaid into shared `next`/`check` arrays
//! at a per-state `base` offset, with `check` recording which state owns a
//! slot:
//!
//! ```text
//! slot = base[s] + class_of(byte)
//! next_state(s, byte) = if check[slot] == s { next[slot] } else { default[s] }
//! ```

mod free_list;
mod serialize;

pub use free_list::FreeList;
pub use serialize::{
    YYTD_ID_ACCEPT, YYTD_ID_ACCEPT2, YYTD_ID_BASE, YYTD_ID_CHK, YYTD_ID_DEF, YYTD_ID_EC,
    YYTD_ID_NXT, YYTH_MAGIC,
};

use crate::config::CompileOptions;
use crate::equiv::EquivalenceMap;
use crate::error::{Error, Result};
use crate::formlang::{DEAD_STATE, DFA, START_STATE, StateId};
use crate::perms::PermissionRecord;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Largest state id the 16-bit default/next/check tables can hold.
pub const MAX_TABLE_STATE: usize = u16::MAX as usize;

/// The kernel-loadable form of a policy DFA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressedTable {
    default: Vec<StateId>,
    base: Vec<u32>,
    next: Vec<StateId>,
    check: Vec<StateId>,
    accept: Vec<u64>,
    accept2: Vec<u64>,
    equiv: EquivalenceMap,
    /// Whether the alphabet was reduced, and the EC table is serialized.
    reduced: bool,
}

/// Size figures of one compression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionStats {
    pub states: usize,
    pub classes: usize,
    /// Length of the next/check arrays.
    pub entries: usize,
    /// Exceptional entries actually stored; a perfect packing would need
    /// exactly this many slots.
    pub optimal: usize,
    /// Unclaimed slots left inside next/check.
    pub holes: usize,
}

impl CompressionStats {
    /// Packed size relative to the uncompressed `states * classes` table.
    pub fn ratio(&self) -> f64 {
        let full = self.states * self.classes;
        if full == 0 {
            return 0.0;
        }
        (self.states * 2 + self.entries) as f64 / full as f64
    }
}

/// Per-state placement input.
struct Row {
    state: StateId,
    default: StateId,
    /// Class ids whose successor differs from `default`, ascending.
    cases: Vec<usize>,
    targets: Vec<StateId>,
}

fn plan_row(dfa: &DFA<PermissionRecord>, reps: &[u8], state: StateId) -> Row {
    let targets: Vec<StateId> = reps
        .iter()
        .map(|&byte| dfa.transition(state, byte))
        .collect();

    let mut counts: BTreeMap<StateId, usize> = BTreeMap::new();
    for &t in &targets {
        *counts.entry(t).or_default() += 1;
    }
    // Most frequent successor; ties go to the lowest id.
    let default = counts
        .iter()
        .max_by_key(|&(&id, &count)| (count, Reverse(id)))
        .map_or(DEAD_STATE, |(&id, _)| id);

    let cases = targets
        .iter()
        .enumerate()
        .filter(|&(_, &t)| t != default)
        .map(|(class, _)| class)
        .collect();

    Row {
        state,
        default,
        cases,
        targets,
    }
}

impl CompressedTable {
    /// Compress `dfa` over the classes of `equiv`.
    ///
    /// `equiv` must be exact for `dfa`. Pass [`EquivalenceMap::identity`] to
    /// compress over raw bytes; `reduced` records whether the EC table
    /// belongs in the serialized form.
    pub fn compress(
        dfa: &DFA<PermissionRecord>,
        equiv: EquivalenceMap,
        reduced: bool,
    ) -> Result<Self> {
        let num_states = dfa.num_states();
        if num_states > MAX_TABLE_STATE + 1 {
            return Err(Error::TableOverflow(format!(
                "{num_states} states do not fit 16-bit state ids"
            )));
        }

        let reps = equiv.representatives();
        let classes = reps.len();
        let rows: Vec<Row> = (0..num_states as StateId)
            .map(|state| plan_row(dfa, &reps, state))
            .collect();
        assert!(
            rows[DEAD_STATE as usize].cases.is_empty() && rows[DEAD_STATE as usize].default == DEAD_STATE,
            "dead state must not leave itself"
        );

        let mut order: Vec<&Row> = rows.iter().collect();
        order.sort_by_key(|row| (Reverse(row.cases.len()), row.state));

        let mut free = FreeList::new(classes);
        let mut base = vec![0u32; num_states];
        let mut next: Vec<StateId> = vec![DEAD_STATE; classes];
        let mut check: Vec<StateId> = vec![DEAD_STATE; classes];

        for row in order {
            if row.cases.is_empty() {
                continue;
            }
            let pos = free.first_fit(&row.cases);
            free.occupy(pos, &row.cases);
            if next.len() < free.len() {
                next.resize(free.len(), DEAD_STATE);
                check.resize(free.len(), DEAD_STATE);
            }
            for &class in &row.cases {
                next[pos + class] = row.targets[class];
                check[pos + class] = row.state;
            }
            base[row.state as usize] = u32::try_from(pos)
                .map_err(|_| Error::TableOverflow(format!("base {pos} exceeds 32 bits")))?;
        }

        // Every base + max_class must be addressable.
        let needed = base.iter().map(|&b| b as usize).max().unwrap_or(0) + classes;
        if next.len() < needed {
            next.resize(needed, DEAD_STATE);
            check.resize(needed, DEAD_STATE);
        }
        if next.len() > u32::MAX as usize {
            return Err(Error::TableOverflow(format!(
                "{} next/check entries exceed 32-bit offsets",
                next.len()
            )));
        }

        let table = Self {
            default: rows.iter().map(|row| row.default).collect(),
            base,
            next,
            check,
            accept: dfa.accepts().iter().map(PermissionRecord::accept).collect(),
            accept2: dfa.accepts().iter().map(PermissionRecord::accept2).collect(),
            equiv,
            reduced,
        };

        debug!(
            states = num_states,
            classes,
            entries = table.next.len(),
            holes = free.holes(),
            "compressed transition table"
        );
        Ok(table)
    }

    /// Compress with the alphabet handling chosen by `options`.
    pub fn from_dfa(dfa: &DFA<PermissionRecord>, options: &CompileOptions) -> Result<Self> {
        let (equiv, reduced) = if options.equiv_classes {
            (EquivalenceMap::from_dfa(dfa), true)
        } else {
            (EquivalenceMap::identity(), false)
        };
        if options.dump_equiv && reduced {
            equiv.log_dump();
        }

        let table = Self::compress(dfa, equiv, reduced)?;

        if options.dump_stats {
            let stats = table.stats();
            info!(
                target: "aare::dump",
                states = stats.states,
                classes = stats.classes,
                entries = stats.entries,
                optimal = stats.optimal,
                holes = stats.holes,
                "compression ratio {:.4}",
                stats.ratio()
            );
        }
        if options.dump_table {
            info!(target: "aare::dump", "transition table:\n{}", table.dump());
        }
        Ok(table)
    }

    pub fn stats(&self) -> CompressionStats {
        let optimal = self.check.iter().filter(|&&c| c != DEAD_STATE).count();
        CompressionStats {
            states: self.num_states(),
            classes: self.equiv.num_classes(),
            entries: self.next.len(),
            optimal,
            holes: self.next.len() - optimal,
        }
    }

    pub fn num_states(&self) -> usize {
        self.default.len()
    }

    pub fn default(&self) -> &[StateId] {
        &self.default
    }

    pub fn base(&self) -> &[u32] {
        &self.base
    }

    pub fn next(&self) -> &[StateId] {
        &self.next
    }

    pub fn check(&self) -> &[StateId] {
        &self.check
    }

    pub fn accept(&self) -> &[u64] {
        &self.accept
    }

    pub fn accept2(&self) -> &[u64] {
        &self.accept2
    }

    pub fn equiv(&self) -> &EquivalenceMap {
        &self.equiv
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    /// Successor of `state` on `byte`.
    pub fn next_state(&self, state: StateId, byte: u8) -> StateId {
        let slot = self.base[state as usize] as usize + self.equiv.class_of(byte) as usize;
        if self.check[slot] == state {
            self.next[slot]
        } else {
            self.default[state as usize]
        }
    }

    /// Walk `input` from the start state.
    pub fn walk(&self, input: &[u8]) -> StateId {
        input
            .iter()
            .fold(START_STATE, |state, &byte| self.next_state(state, byte))
    }

    /// The allow/audit and deny/quiet words of the state `input` ends in.
    pub fn lookup(&self, input: &[u8]) -> (u64, u64) {
        let state = self.walk(input) as usize;
        (self.accept[state], self.accept2[state])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formlang::Accept;

    fn record(allow: u32) -> PermissionRecord {
        PermissionRecord {
            allow,
            ..Default::default()
        }
    }

    /// start -/-> a -x-> b(accept 4), with a looping on lowercase letters.
    fn sample_dfa() -> DFA<PermissionRecord> {
        let mut dfa = DFA::new();
        let start = dfa.add_state(PermissionRecord::default());
        let a = dfa.add_state(record(2));
        let b = dfa.add_state(record(4));
        dfa.set_transition(start, b'/', a);
        for byte in b'a'..=b'z' {
            dfa.set_transition(a, byte, a);
        }
        dfa.set_transition(a, b'x', b);
        dfa
    }

    fn assert_lossless(dfa: &DFA<PermissionRecord>, table: &CompressedTable) {
        for state in 0..dfa.num_states() as StateId {
            for byte in 0..=255u8 {
                assert_eq!(
                    table.next_state(state, byte),
                    dfa.transition(state, byte),
                    "state {state} byte {byte:#x}"
                );
            }
            assert_eq!(table.accept()[state as usize], dfa.accept(state).accept());
        }
    }

    #[test]
    fn test_compress_reduced() {
        let dfa = sample_dfa();
        let table = CompressedTable::from_dfa(&dfa, &CompileOptions::default()).unwrap();
        assert!(table.is_reduced());
        assert_eq!(table.equiv().num_classes(), 4);
        assert_lossless(&dfa, &table);

        assert_eq!(table.lookup(b"/abcx"), (4, 0));
        assert_eq!(table.lookup(b"/abc"), (2, 0));
        assert_eq!(table.walk(b"/abc/"), DEAD_STATE);
    }

    #[test]
    fn test_compress_identity() {
        let dfa = sample_dfa();
        let options = CompileOptions {
            equiv_classes: false,
            ..Default::default()
        };
        let table = CompressedTable::from_dfa(&dfa, &options).unwrap();
        assert!(!table.is_reduced());
        assert_eq!(table.equiv().num_classes(), 256);
        assert_lossless(&dfa, &table);
    }

    #[test]
    fn test_defaults_and_bases() {
        let dfa = sample_dfa();
        let table = CompressedTable::compress(&dfa, EquivalenceMap::from_dfa(&dfa), true).unwrap();

        // The dead state and states without exceptions sit at base 0.
        assert_eq!(table.base()[DEAD_STATE as usize], 0);
        assert_eq!(table.base()[3], 0);
        assert_eq!(table.default()[DEAD_STATE as usize], DEAD_STATE);
        // State 2 mostly goes to itself (the lowercase class plus 'x') or dead.
        assert_eq!(table.default()[2], DEAD_STATE);

        let max_base = *table.base().iter().max().unwrap() as usize;
        assert!(table.next().len() >= max_base + table.equiv().num_classes());
        assert_eq!(table.next().len(), table.check().len());
    }

    #[test]
    fn test_default_prefers_most_frequent() {
        // Every byte but NUL loops, so the loop is the default.
        let mut dfa = DFA::new();
        let start = dfa.add_state(record(1));
        for byte in 1..=255u8 {
            dfa.set_transition(start, byte, start);
        }
        let table = CompressedTable::compress(&dfa, EquivalenceMap::identity(), false).unwrap();
        assert_eq!(table.default()[START_STATE as usize], START_STATE);
        assert_eq!(table.stats().optimal, 1);
        assert_lossless(&dfa, &table);
    }

    #[test]
    fn test_compress_is_deterministic() {
        let dfa = sample_dfa();
        let options = CompileOptions::default();
        let a = CompressedTable::from_dfa(&dfa, &options).unwrap();
        let b = CompressedTable::from_dfa(&dfa, &options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.flex_table("p").unwrap(), b.flex_table("p").unwrap());
    }

    #[test]
    fn test_too_many_states() {
        let mut dfa = DFA::new();
        for _ in 0..=MAX_TABLE_STATE {
            dfa.add_state(PermissionRecord::default());
        }
        let err = CompressedTable::compress(&dfa, EquivalenceMap::identity(), false).unwrap_err();
        assert!(matches!(err, Error::TableOverflow(_)));
    }

    #[test]
    fn test_accept_empty_for_nonaccepting() {
        let dfa = sample_dfa();
        let table = CompressedTable::from_dfa(&dfa, &CompileOptions::default()).unwrap();
        for state in 0..dfa.num_states() {
            if dfa.accept(state as StateId).is_empty() {
                assert_eq!(table.accept()[state], 0);
                assert_eq!(table.accept2()[state], 0);
            }
        }
    }
}
