//! Byte equivalence classes.
//!
//! Two bytes are equivalent when every state sends them to the same
//! successor. The compressed table indexes rows by class instead of by byte,
//! which shrinks every row from 256 columns to the number of classes.

use crate::formlang::{ALPHABET_SIZE, Accept, DFA};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::info;

/// Partition of the byte alphabet.
///
/// Class ids are assigned in order of each class's lowest byte, so byte 0 is
/// always in class 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquivalenceMap {
    #[serde(with = "serde_byte_map")]
    class_of: [u8; ALPHABET_SIZE],
    num_classes: usize,
}

impl EquivalenceMap {
    /// Every byte in its own class.
    pub fn identity() -> Self {
        let mut class_of = [0u8; ALPHABET_SIZE];
        for (byte, class) in class_of.iter_mut().enumerate() {
            *class = byte as u8;
        }
        Self {
            class_of,
            num_classes: ALPHABET_SIZE,
        }
    }

    /// The coarsest partition that keeps every transition of `dfa` exact.
    pub fn from_dfa<A: Accept>(dfa: &DFA<A>) -> Self {
        let mut class_of = [0u16; ALPHABET_SIZE];
        let mut num_classes = 1;

        // Refine by one row at a time; numbering by first occurrence keeps
        // ids in order of lowest byte.
        for state in 0..dfa.num_states() {
            let row = dfa.row(state as u32);
            let mut remap: HashMap<(u16, u32), u16> = HashMap::new();
            let mut refined = [0u16; ALPHABET_SIZE];
            for byte in 0..ALPHABET_SIZE {
                let next_id = remap.len() as u16;
                refined[byte] = *remap.entry((class_of[byte], row[byte])).or_insert(next_id);
            }
            class_of = refined;
            num_classes = remap.len();
            if num_classes == ALPHABET_SIZE {
                break;
            }
        }

        Self {
            class_of: class_of.map(|c| c as u8),
            num_classes,
        }
    }

    pub fn class_of(&self, byte: u8) -> u8 {
        self.class_of[byte as usize]
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Highest class id.
    pub fn max_class(&self) -> u8 {
        (self.num_classes - 1) as u8
    }

    pub fn is_identity(&self) -> bool {
        self.num_classes == ALPHABET_SIZE
    }

    /// The byte-to-class table, as serialized in the EC table.
    pub fn as_bytes(&self) -> &[u8; ALPHABET_SIZE] {
        &self.class_of
    }

    /// The lowest byte of each class, indexed by class id.
    pub fn representatives(&self) -> Vec<u8> {
        let mut reps = Vec::with_capacity(self.num_classes);
        for byte in 0..=255u8 {
            if self.class_of(byte) as usize == reps.len() {
                reps.push(byte);
            }
        }
        reps
    }

    /// Bytes of `class`, ascending.
    pub fn members(&self, class: u8) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(move |&b| self.class_of(b) == class)
    }

    /// One line per class listing its member bytes.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for class in 0..self.num_classes {
            let _ = write!(out, "0x{class:02x}:");
            for byte in self.members(class as u8) {
                let _ = write!(out, " 0x{byte:02x}");
            }
            out.push('\n');
        }
        out
    }

    pub(crate) fn log_dump(&self) {
        info!(target: "aare::dump", classes = self.num_classes, "equivalence classes:\n{}", self.dump());
    }
}

mod serde_byte_map {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(map: &[u8; 256], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }
}
