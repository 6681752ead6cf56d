//! Translation of policy glob patterns into engine patterns.
//!
//! The policy language uses shell-like globbing (`*`, `**`, `?`, `[...]`,
//! `{a,b}`) over paths. The automaton builder understands a small regular
//! expression dialect instead, so every pattern is rewritten in a single
//! left-to-right pass before it is added to a ruleset.
//!
//! The rewrite is driven by a tiny state machine ([`Lex`]) plus an explicit
//! stack of per-depth separator counters for `{}` groups.

use crate::config::CompileOptions;
use crate::error::{Error, ParseErrorKind, Result};
use std::fmt;
use tracing::{info, warn};

/// Deepest accepted nesting of `{}` alternations.
pub const MAX_ALT_DEPTH: usize = 50;

/// One path component character: anything but `/` and NUL.
const SEGMENT_CHAR: &str = r"[^/\x00]";
/// `*`: any run of path component characters.
const SEGMENT_GLOB: &str = r"[^/\x00]*";
/// `**`: any run of characters except NUL, crossing `/`.
const TREE_GLOB: &str = r"[^\x00]*";

/// Classification of a translated pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternType {
    /// No operators, the pattern is a literal string.
    Basic,
    /// The only operator is a trailing `**`.
    TailGlob,
    /// Anything needing the full automaton.
    Regex,
    /// Translation failed.
    Invalid,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatternType::Basic => "basic",
            PatternType::TailGlob => "tailglob",
            PatternType::Regex => "regex",
            PatternType::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// The result of translating one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Engine pattern.
    pub regex: String,
    pub ptype: PatternType,
    /// Byte offset of the first glob operator in the source pattern.
    pub first_op: Option<usize>,
}

/// Lexical position of the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lex {
    Plain,
    Escaped,
    Class,
    ClassEscaped,
}

struct Translator<'a> {
    pattern: &'a str,
    out: String,
    capacity: usize,
    lex: Lex,
    /// Separator count for each open `{`.
    groups: Vec<u32>,
    ptype: PatternType,
    first_op: Option<usize>,
}

impl<'a> Translator<'a> {
    fn new(pattern: &'a str, capacity: usize) -> Self {
        Self {
            pattern,
            out: String::with_capacity(pattern.len().min(capacity)),
            capacity,
            lex: Lex::Plain,
            groups: Vec::new(),
            ptype: PatternType::Basic,
            first_op: None,
        }
    }

    fn fail(&self, kind: ParseErrorKind) -> Error {
        Error::parse(self.pattern, kind)
    }

    fn store(&mut self, s: &str) -> Result<()> {
        if self.out.len() + s.len() > self.capacity {
            return Err(Error::BufferOverflow {
                pattern: self.pattern.to_string(),
                capacity: self.capacity,
            });
        }
        self.out.push_str(s);
        Ok(())
    }

    fn store_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.store(c.encode_utf8(&mut buf))
    }

    /// Class members are bytes, so a multibyte character contributes each of
    /// its UTF-8 bytes as a `\xHH` escape.
    fn store_class_char(&mut self, c: char) -> Result<()> {
        if c.is_ascii() {
            return self.store_char(c);
        }
        let mut buf = [0u8; 4];
        for &b in c.encode_utf8(&mut buf).as_bytes() {
            self.store(&format!(r"\x{b:02x}"))?;
        }
        Ok(())
    }

    fn store_escaped(&mut self, c: char) -> Result<()> {
        self.store("\\")?;
        self.store_char(c)
    }

    fn mark_operator(&mut self, pos: usize) {
        if self.first_op.is_none() {
            self.first_op = Some(pos);
        }
    }

    fn run(mut self, anchor: bool) -> Result<Translation> {
        if anchor {
            self.store("^")?;
        }

        let mut pos = 0;
        while let Some(c) = self.pattern[pos..].chars().next() {
            pos = match self.lex {
                Lex::Plain => self.plain(pos, c)?,
                Lex::Escaped => self.escaped(pos, c)?,
                Lex::Class => self.class(pos, c)?,
                Lex::ClassEscaped => self.class_escaped(pos, c)?,
            };
        }

        match self.lex {
            _ if !self.groups.is_empty() => {
                return Err(self.fail(ParseErrorKind::UnclosedGrouping));
            }
            Lex::Class | Lex::ClassEscaped => {
                return Err(self.fail(ParseErrorKind::UnclosedGrouping));
            }
            Lex::Escaped => return Err(self.fail(ParseErrorKind::TrailingEscape)),
            Lex::Plain => {}
        }

        if anchor {
            self.store("$")?;
        }

        Ok(Translation {
            regex: self.out,
            ptype: self.ptype,
            first_op: self.first_op,
        })
    }

    fn plain(&mut self, pos: usize, c: char) -> Result<usize> {
        let next = pos + c.len_utf8();
        match c {
            '\\' => self.lex = Lex::Escaped,
            '*' => return self.glob(pos),
            '?' => {
                self.mark_operator(pos);
                self.ptype = PatternType::Regex;
                self.store(SEGMENT_CHAR)?;
            }
            '[' => {
                self.mark_operator(pos);
                self.ptype = PatternType::Regex;
                self.lex = Lex::Class;
                self.store("[")?;
            }
            ']' => return Err(self.fail(ParseErrorKind::UnmatchedClassClose)),
            '{' => {
                self.mark_operator(pos);
                if self.groups.len() >= MAX_ALT_DEPTH {
                    return Err(self.fail(ParseErrorKind::NestingExceeded));
                }
                self.groups.push(0);
                self.ptype = PatternType::Regex;
                self.store("(")?;
            }
            '}' => match self.groups.pop() {
                None => return Err(self.fail(ParseErrorKind::UnmatchedGroupClose)),
                Some(0) => return Err(self.fail(ParseErrorKind::InvalidAlternationCount)),
                Some(_) => self.store(")")?,
            },
            ',' => match self.groups.last_mut() {
                Some(count) => {
                    *count += 1;
                    self.store("|")?;
                }
                None => self.store(",")?,
            },
            '^' | '$' | '.' | '+' | '|' | '(' | ')' => self.store_escaped(c)?,
            _ => self.store_char(c)?,
        }
        Ok(next)
    }

    fn escaped(&mut self, pos: usize, c: char) -> Result<usize> {
        self.lex = Lex::Plain;
        let next = pos + c.len_utf8();
        match c {
            '\\' => self.store(r"\\")?,
            '*' | '[' | ']' | '{' | '}' | '^' | '$' => self.store_escaped(c)?,
            '.' | '+' | '|' | '(' | ')' => {
                // Always escaped anyway, so the quote was not needed.
                self.unnecessary_escape(c);
                self.store_escaped(c)?;
            }
            '?' | ',' => self.store_char(c)?,
            'x' | 'd' | '0'..='7' => return self.numeric_escape(pos, c),
            _ => {
                self.unnecessary_escape(c);
                self.store_char(c)?;
            }
        }
        Ok(next)
    }

    fn class(&mut self, pos: usize, c: char) -> Result<usize> {
        match c {
            '\\' => self.lex = Lex::ClassEscaped,
            ']' => {
                self.lex = Lex::Plain;
                self.store("]")?;
            }
            '[' | '.' | '+' | '|' | '(' | ')' => self.store_escaped(c)?,
            _ => self.store_class_char(c)?,
        }
        Ok(pos + c.len_utf8())
    }

    fn class_escaped(&mut self, pos: usize, c: char) -> Result<usize> {
        self.lex = Lex::Class;
        let next = pos + c.len_utf8();
        match c {
            '\\' => self.store(r"\\")?,
            '[' | ']' | '{' | '}' | '*' | ',' | '-' => self.store_escaped(c)?,
            '^' | '$' | '.' | '+' | '|' | '(' | ')' => self.store_escaped(c)?,
            '?' => self.store_char(c)?,
            'x' | 'd' | '0'..='7' => return self.numeric_escape(pos, c),
            _ => {
                self.unnecessary_escape(c);
                self.store_class_char(c)?;
            }
        }
        Ok(next)
    }

    /// Handles an unescaped `*` at `pos`, returning the position after it.
    fn glob(&mut self, pos: usize) -> Result<usize> {
        let bytes = self.pattern.as_bytes();
        self.mark_operator(pos);

        // A glob that makes up a whole path component must match at least
        // one character: `/foo/*` does not match `/foo/`.
        if self.out.ends_with('/') {
            let stars = bytes[pos..].iter().take_while(|&&b| b == b'*').count();
            match bytes.get(pos + stars) {
                None | Some(b'/') => self.store(SEGMENT_CHAR)?,
                _ => {}
            }
        }

        if bytes.get(pos + 1) == Some(&b'*') {
            self.ptype = if pos + 2 == bytes.len() && self.ptype == PatternType::Basic {
                PatternType::TailGlob
            } else {
                PatternType::Regex
            };
            self.store(TREE_GLOB)?;
            Ok(pos + 2)
        } else {
            self.ptype = PatternType::Regex;
            self.store(SEGMENT_GLOB)?;
            Ok(pos + 1)
        }
    }

    /// `\xHH`, `\dNNN` and octal `\NNN` escapes, normalized to `\xHH`.
    fn numeric_escape(&mut self, pos: usize, c: char) -> Result<usize> {
        let digits_at = if c == 'x' || c == 'd' { pos + 1 } else { pos };
        let radix = match c {
            'x' => 16,
            'd' => 10,
            _ => 8,
        };
        match parse_byte(&self.pattern.as_bytes()[digits_at..], radix) {
            Some((value, used)) => {
                self.store(&format!(r"\x{value:02x}"))?;
                Ok(digits_at + used)
            }
            None => {
                self.unnecessary_escape(c);
                self.store_char(c)?;
                Ok(pos + 1)
            }
        }
    }

    fn unnecessary_escape(&self, c: char) {
        warn!(
            pattern = self.pattern,
            character = %c,
            "character was quoted unnecessarily, dropped preceding quote ('\\') character"
        );
    }
}

/// Parses up to three (two for hex) digits whose value fits in a byte.
fn parse_byte(digits: &[u8], radix: u32) -> Option<(u8, usize)> {
    let max_digits = if radix == 16 { 2 } else { 3 };
    let mut value: u32 = 0;
    let mut used = 0;
    for &b in digits.iter().take(max_digits) {
        let Some(d) = (b as char).to_digit(radix) else {
            break;
        };
        let candidate = value * radix + d;
        if candidate > 0xff {
            break;
        }
        value = candidate;
        used += 1;
    }
    (used > 0).then_some((value as u8, used))
}

/// Translates `pattern` into an engine pattern no longer than `capacity` bytes.
///
/// With `anchor` set the result is bracketed by `^` and `$`.
pub fn convert_aaregex(pattern: &str, anchor: bool, capacity: usize) -> Result<Translation> {
    Translator::new(pattern, capacity).run(anchor)
}

/// Classifies `pattern`, reporting failures as [`PatternType::Invalid`].
pub fn pattern_type(pattern: &str, capacity: usize) -> PatternType {
    convert_aaregex(pattern, false, capacity).map_or(PatternType::Invalid, |t| t.ptype)
}

/// Translator bound to a set of compile options.
#[derive(Debug, Clone, Copy)]
pub struct PatternTranslator<'a> {
    options: &'a CompileOptions,
}

impl<'a> PatternTranslator<'a> {
    pub fn new(options: &'a CompileOptions) -> Self {
        Self { options }
    }

    pub fn translate(&self, pattern: &str, anchor: bool) -> Result<Translation> {
        let mut translation = convert_aaregex(pattern, anchor, self.options.pattern_capacity())?;
        if translation.ptype == PatternType::TailGlob && !self.options.tail_glob {
            translation.ptype = PatternType::Regex;
        }
        if self.options.dump_rule_exprs {
            info!(target: "aare::dump", "aare: {}   ->   {}", pattern, translation.regex);
        }
        Ok(translation)
    }
}

/// Collapses repeated `/` in a path.
///
/// A leading `//` followed by something other than `/` is kept, as Linux
/// gives it a distinct namespace meaning.
pub fn filter_slashes(path: &str) -> String {
    if path.len() < 2 {
        return path.to_string();
    }

    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    if path.starts_with("//") && !path[2..].starts_with('/') {
        out.push_str("//");
        rest = &path[2..];
    }

    let mut seen_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if !seen_slash {
                out.push(c);
                seen_slash = true;
            }
        } else {
            seen_slash = false;
            out.push(c);
        }
    }
    out
}
