//! Transition symbols.
//!
//! Automata here run over raw bytes. NFA edges carry inclusive byte ranges so
//! that a negated class like `[^/\x00]` is one edge rather than 254.

/// Number of distinct input symbols.
pub const ALPHABET_SIZE: usize = 256;

/// An inclusive range of input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    pub lo: u8,
    pub hi: u8,
}

impl ByteRange {
    pub fn new(lo: u8, hi: u8) -> Self {
        debug_assert!(lo <= hi);
        Self { lo, hi }
    }

    pub fn single(byte: u8) -> Self {
        Self { lo: byte, hi: byte }
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.lo <= byte && byte <= self.hi
    }

    pub fn bytes(&self) -> impl Iterator<Item = u8> {
        self.lo..=self.hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range() {
        let r = ByteRange::new(b'a', b'c');
        assert!(r.contains(b'b'));
        assert!(!r.contains(b'd'));
        assert_eq!(r.bytes().collect::<Vec<_>>(), b"abc".to_vec());

        let full = ByteRange::new(0, 255);
        assert_eq!(full.bytes().count(), ALPHABET_SIZE);
        assert_eq!(ByteRange::single(7).bytes().count(), 1);
    }
}
