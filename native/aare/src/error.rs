//! Error types shared by every compilation stage.

use crate::rules::RuleClass;
use thiserror::Error;

/// The specific structural problem found in a policy pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("invalid close ], no matching open [ detected")]
    UnmatchedClassClose,

    #[error("unclosed grouping or character class, expecting close }}")]
    UnclosedGrouping,

    #[error("exceeded maximum nesting of {{}}")]
    NestingExceeded,

    #[error("invalid number of items between {{}}")]
    InvalidAlternationCount,

    #[error("invalid close }}, no matching open {{ detected")]
    UnmatchedGroupClose,

    #[error("trailing '\\' escape character")]
    TrailingEscape,

    #[error("{0}")]
    Engine(String),
}

/// Errors reported by the compiler.
///
/// A failing call only ever rejects its own input: a bad pattern rejects one
/// rule, a bad rule leaves the ruleset untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to parse pattern '{pattern}': {kind}")]
    Parse {
        pattern: String,
        kind: ParseErrorKind,
    },

    #[error("pattern '{pattern}' exceeds the {capacity} byte translation buffer")]
    BufferOverflow { pattern: String, capacity: usize },

    #[error("malformed {class} rule: {reason}")]
    MalformedRule { class: RuleClass, reason: String },

    #[error("automaton construction failed: {0}")]
    AutomatonConstruction(String),

    #[error("transition table overflow: {0}")]
    TableOverflow(String),
}

impl Error {
    pub(crate) fn parse(pattern: &str, kind: ParseErrorKind) -> Self {
        Error::Parse {
            pattern: pattern.to_string(),
            kind,
        }
    }

    /// The parse problem, if this is a pattern parse failure.
    pub fn parse_kind(&self) -> Option<&ParseErrorKind> {
        match self {
            Error::Parse { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
