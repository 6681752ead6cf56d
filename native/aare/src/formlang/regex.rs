//! Engine pattern parsing and Thompson construction.
//!
//! Engine patterns are parsed with `regex-syntax` in byte mode (no Unicode,
//! no UTF-8 requirement) and compiled into fragments of an [`EpsilonNFA`].
//! Matching is always whole-input, so `^` and `$` compile to nothing.

use crate::error::{Error, ParseErrorKind, Result};
use crate::formlang::Accept;
use crate::formlang::epsilon_nfa::EpsilonNFA;
use crate::formlang::state::StateId;
use crate::formlang::symbol::ByteRange;
use regex_syntax::ParserBuilder;
use regex_syntax::hir::{Class, Hir, HirKind, Look};

/// Parse an engine pattern into its syntax tree.
pub fn parse_engine_pattern(pattern: &str) -> Result<Hir> {
    let hir = ParserBuilder::new()
        .unicode(false)
        .utf8(false)
        .build()
        .parse(pattern)
        .map_err(|e| Error::parse(pattern, ParseErrorKind::Engine(e.to_string())))?;
    check_supported(pattern, &hir)?;
    Ok(hir)
}

/// Reject the constructs the byte automaton cannot express.
fn check_supported(pattern: &str, hir: &Hir) -> Result<()> {
    match hir.kind() {
        HirKind::Look(Look::Start | Look::End) => Ok(()),
        HirKind::Look(look) => Err(Error::parse(
            pattern,
            ParseErrorKind::Engine(format!("unsupported assertion {look:?}")),
        )),
        HirKind::Class(Class::Unicode(class)) if class.iter().any(|r| r.end() > '\u{7f}') => {
            Err(Error::parse(
                pattern,
                ParseErrorKind::Engine("non-ASCII character class".to_string()),
            ))
        }
        HirKind::Repetition(rep) => check_supported(pattern, &rep.sub),
        HirKind::Capture(cap) => check_supported(pattern, &cap.sub),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => {
            subs.iter().try_for_each(|sub| check_supported(pattern, sub))
        }
        _ => Ok(()),
    }
}

/// A compiled sub-automaton with one entry and one exit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub start: StateId,
    pub end: StateId,
}

/// Compile `hir` into fresh states of `nfa`.
pub fn compile_hir<A: Accept>(nfa: &mut EpsilonNFA<A>, hir: &Hir) -> Fragment {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => {
            let s = nfa.add_state();
            Fragment { start: s, end: s }
        }
        HirKind::Literal(literal) => literal_fragment(nfa, &literal.0),
        HirKind::Class(class) => {
            let start = nfa.add_state();
            let end = nfa.add_state();
            for range in class_ranges(class) {
                nfa.add_transition(start, range, end);
            }
            Fragment { start, end }
        }
        HirKind::Repetition(rep) => {
            let min = rep.min as usize;
            let mut parts = Vec::new();
            for _ in 0..min {
                parts.push(compile_hir(nfa, &rep.sub));
            }
            match rep.max {
                None => parts.push(star(nfa, &rep.sub)),
                Some(max) => {
                    for _ in min..max as usize {
                        parts.push(optional(nfa, &rep.sub));
                    }
                }
            }
            chain(nfa, parts)
        }
        HirKind::Capture(cap) => compile_hir(nfa, &cap.sub),
        HirKind::Concat(subs) => {
            let parts = subs.iter().map(|sub| compile_hir(nfa, sub)).collect();
            chain(nfa, parts)
        }
        HirKind::Alternation(subs) => {
            let start = nfa.add_state();
            let end = nfa.add_state();
            for sub in subs {
                let branch = compile_hir(nfa, sub);
                nfa.add_epsilon_transition(start, branch.start);
                nfa.add_epsilon_transition(branch.end, end);
            }
            Fragment { start, end }
        }
    }
}

/// A fragment matching exactly `bytes`.
pub fn literal_fragment<A: Accept>(nfa: &mut EpsilonNFA<A>, bytes: &[u8]) -> Fragment {
    let start = nfa.add_state();
    let mut end = start;
    for &byte in bytes {
        let next = nfa.add_state();
        nfa.add_transition(end, ByteRange::single(byte), next);
        end = next;
    }
    Fragment { start, end }
}

/// Join fragments end to start with epsilon edges.
pub fn chain<A: Accept>(nfa: &mut EpsilonNFA<A>, parts: Vec<Fragment>) -> Fragment {
    let mut parts = parts.into_iter();
    let Some(first) = parts.next() else {
        let s = nfa.add_state();
        return Fragment { start: s, end: s };
    };
    let mut end = first.end;
    for part in parts {
        nfa.add_epsilon_transition(end, part.start);
        end = part.end;
    }
    Fragment {
        start: first.start,
        end,
    }
}

fn star<A: Accept>(nfa: &mut EpsilonNFA<A>, sub: &Hir) -> Fragment {
    let head = nfa.add_state();
    let body = compile_hir(nfa, sub);
    nfa.add_epsilon_transition(head, body.start);
    nfa.add_epsilon_transition(body.end, head);
    Fragment {
        start: head,
        end: head,
    }
}

fn optional<A: Accept>(nfa: &mut EpsilonNFA<A>, sub: &Hir) -> Fragment {
    let start = nfa.add_state();
    let end = nfa.add_state();
    let body = compile_hir(nfa, sub);
    nfa.add_epsilon_transition(start, body.start);
    nfa.add_epsilon_transition(body.end, end);
    nfa.add_epsilon_transition(start, end);
    Fragment { start, end }
}

fn class_ranges(class: &Class) -> Vec<ByteRange> {
    match class {
        Class::Bytes(bytes) => bytes
            .iter()
            .map(|r| ByteRange::new(r.start(), r.end()))
            .collect(),
        // Only ASCII classes get past `check_supported`.
        Class::Unicode(unicode) => unicode
            .iter()
            .filter(|r| r.start() <= '\u{7f}')
            .map(|r| ByteRange::new(r.start() as u8, r.end().min('\u{7f}') as u8))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(pattern: &str) -> EpsilonNFA<u32> {
        let hir = parse_engine_pattern(pattern).unwrap();
        let mut nfa = EpsilonNFA::new();
        let frag = compile_hir(&mut nfa, &hir);
        let start = nfa.start_state();
        nfa.add_epsilon_transition(start, frag.start);
        nfa.add_final_state(frag.end, &1);
        nfa
    }

    fn matches(nfa: &EpsilonNFA<u32>, input: &[u8]) -> bool {
        nfa.accepts(input) == 1
    }

    #[test]
    fn test_segment_glob() {
        let nfa = matcher(r"/foo/[^/\x00][^/\x00]*");
        assert!(matches(&nfa, b"/foo/bar"));
        assert!(matches(&nfa, b"/foo/\xffbar"));
        assert!(!matches(&nfa, b"/foo/"));
        assert!(!matches(&nfa, b"/foo/bar/baz"));
        assert!(!matches(&nfa, b"/foo/b\x00r"));
    }

    #[test]
    fn test_tree_glob_and_alternation() {
        let nfa = matcher(r"/(usr|opt)/[^\x00]*");
        assert!(matches(&nfa, b"/usr/"));
        assert!(matches(&nfa, b"/opt/a/b/c"));
        assert!(!matches(&nfa, b"/var/a"));
    }

    #[test]
    fn test_anchors_and_escapes() {
        let nfa = matcher(r"^/a\.b\x41$");
        assert!(matches(&nfa, b"/a.bA"));
        assert!(!matches(&nfa, b"/axbA"));
    }

    #[test]
    fn test_bounded_repetition() {
        let nfa = matcher("a{2,3}");
        assert!(!matches(&nfa, b"a"));
        assert!(matches(&nfa, b"aa"));
        assert!(matches(&nfa, b"aaa"));
        assert!(!matches(&nfa, b"aaaa"));
    }

    #[test]
    fn test_rejects_bad_patterns() {
        let err = parse_engine_pattern("(abc").unwrap_err();
        assert!(matches!(
            err.parse_kind(),
            Some(ParseErrorKind::Engine(_))
        ));
        assert!(parse_engine_pattern(r"a\bc").is_err());
    }
}
