//! Text and binary forms of a [`CompressedTable`].
//!
//! The binary form is the flex-style table blob the kernel loads: a header
//! followed by one typed, big-endian table per array, each padded to an
//! 8-byte boundary.

use super::CompressedTable;
use crate::error::{Error, Result};
use crate::formlang::DEAD_STATE;
use std::fmt::Write as _;

pub const YYTH_MAGIC: u32 = 0x1B5E_783D;
const YYTH_VERSION: &[u8] = b"notflex\0";

pub const YYTD_ID_ACCEPT: u16 = 1;
pub const YYTD_ID_BASE: u16 = 2;
pub const YYTD_ID_CHK: u16 = 3;
pub const YYTD_ID_DEF: u16 = 4;
pub const YYTD_ID_EC: u16 = 5;
pub const YYTD_ID_ACCEPT2: u16 = 7;
pub const YYTD_ID_NXT: u16 = 8;

const TABLE_HEADER_LEN: usize = 12;

fn align8(len: usize) -> usize {
    (len + 7) & !7
}

fn pad8(out: &mut Vec<u8>) {
    out.resize(align8(out.len()), 0);
}

/// One table's elements, already narrowed to their serialized width.
enum TableData<'a> {
    U8(&'a [u8]),
    U16(Vec<u16>),
    U32(&'a [u32]),
    U64(&'a [u64]),
}

impl TableData<'_> {
    fn width(&self) -> u16 {
        match self {
            TableData::U8(_) => 1,
            TableData::U16(_) => 2,
            TableData::U32(_) => 4,
            TableData::U64(_) => 8,
        }
    }

    fn count(&self) -> usize {
        match self {
            TableData::U8(d) => d.len(),
            TableData::U16(d) => d.len(),
            TableData::U32(d) => d.len(),
            TableData::U64(d) => d.len(),
        }
    }

    fn write(&self, id: u16, out: &mut Vec<u8>) {
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&self.width().to_be_bytes());
        // hi length, unused
        out.extend_from_slice(&0u32.to_be_bytes());
        // Bounded by the blob size, which was checked to fit 32 bits.
        out.extend_from_slice(&(self.count() as u32).to_be_bytes());
        match self {
            TableData::U8(d) => out.extend_from_slice(d),
            TableData::U16(d) => d.iter().for_each(|v| out.extend_from_slice(&v.to_be_bytes())),
            TableData::U32(d) => d.iter().for_each(|v| out.extend_from_slice(&v.to_be_bytes())),
            TableData::U64(d) => d.iter().for_each(|v| out.extend_from_slice(&v.to_be_bytes())),
        }
        pad8(out);
    }
}

/// A header size field.
fn size_field(size: usize, what: &str) -> Result<u32> {
    u32::try_from(size)
        .map_err(|_| Error::TableOverflow(format!("{what} of {size} bytes exceeds 32 bits")))
}

/// State ids were range checked at compression time.
fn narrow(states: &[u32]) -> Vec<u16> {
    states.iter().map(|&s| s as u16).collect()
}

impl CompressedTable {
    /// Flex-style table blob named `name`.
    ///
    /// Fails with [`Error::TableOverflow`] when the blob would not fit the
    /// 32-bit size fields of its header.
    pub fn flex_table(&self, name: &str) -> Result<Vec<u8>> {
        let mut tables: Vec<(u16, TableData<'_>)> = vec![
            (YYTD_ID_ACCEPT, TableData::U64(&self.accept)),
            (YYTD_ID_ACCEPT2, TableData::U64(&self.accept2)),
        ];
        if self.reduced {
            tables.push((YYTD_ID_EC, TableData::U8(self.equiv.as_bytes())));
        }
        tables.extend([
            (YYTD_ID_BASE, TableData::U32(&self.base)),
            (YYTD_ID_DEF, TableData::U16(narrow(&self.default))),
            (YYTD_ID_NXT, TableData::U16(narrow(&self.next))),
            (YYTD_ID_CHK, TableData::U16(narrow(&self.check))),
        ]);

        let hsize = align8(4 + 4 + 4 + 2 + YYTH_VERSION.len() + name.len() + 1);
        let ssize = hsize
            + tables
                .iter()
                .map(|(_, t)| align8(TABLE_HEADER_LEN + t.count() * t.width() as usize))
                .sum::<usize>();

        let hsize32 = size_field(hsize, "header")?;
        let ssize32 = size_field(ssize, "table blob")?;

        let mut out = Vec::with_capacity(ssize);
        out.extend_from_slice(&YYTH_MAGIC.to_be_bytes());
        out.extend_from_slice(&hsize32.to_be_bytes());
        out.extend_from_slice(&ssize32.to_be_bytes());
        // flags
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(YYTH_VERSION);
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        pad8(&mut out);

        for (id, table) in &tables {
            table.write(*id, &mut out);
        }
        debug_assert_eq!(out.len(), ssize);
        Ok(out)
    }

    /// Human-readable listing of every table.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "size={} (accept, accept2, default, base):  {{state}} -> {{default state}}",
            self.num_states()
        );
        for state in 0..self.num_states() {
            let _ = writeln!(
                out,
                "{state}: (0x{:x}, 0x{:x}, {}, {})",
                self.accept[state], self.accept2[state], self.default[state], self.base[state]
            );
        }

        let _ = writeln!(
            out,
            "size={} (next, check): {{check state}} -> {{next state}} : offset from base",
            self.next.len()
        );
        for (slot, (&next, &check)) in self.next.iter().zip(&self.check).enumerate() {
            if check == DEAD_STATE {
                continue;
            }
            let offset = slot - self.base[check as usize] as usize;
            let _ = writeln!(out, "{slot}: ({next}, {check}) {{{check}}} -> {{{next}}}: 0x{offset:02x}");
        }

        if self.reduced {
            out.push_str("equivalence classes:\n");
            out.push_str(&self.equiv.dump());
        }
        out
    }
}
