//! Compilation options.
//!
//! Everything that used to be a process-wide flag is carried here and passed
//! explicitly to each compilation, so independent policy units can be
//! compiled side by side with different settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted policy path, matching the kernel's `PATH_MAX`.
pub const PATH_MAX: usize = 4096;

/// Extra translation room for the `^` and `$` anchors.
pub const ANCHOR_SLACK: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompileOptions {
    /// Log every `pattern -> engine pattern` translation.
    pub dump_rule_exprs: bool,
    /// Log the compressed transition table.
    pub dump_table: bool,
    /// Log compression statistics.
    pub dump_stats: bool,
    /// Log the byte equivalence classes.
    pub dump_equiv: bool,
    /// Allow patterns ending in a lone `**` to be classified as tail globs.
    pub tail_glob: bool,
    /// Minimize the DFA before compression.
    pub minimize: bool,
    /// Reduce the byte alphabet to equivalence classes.
    pub equiv_classes: bool,
    /// Longest source pattern accepted by the translator.
    pub max_pattern_len: usize,
    /// Upper bound on DFA states before construction is abandoned.
    pub max_states: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dump_rule_exprs: false,
            dump_table: false,
            dump_stats: false,
            dump_equiv: false,
            tail_glob: true,
            minimize: true,
            equiv_classes: true,
            max_pattern_len: PATH_MAX,
            max_states: 1 << 20,
        }
    }
}

impl CompileOptions {
    /// Capacity of the translation buffer for one pattern.
    pub fn pattern_capacity(&self) -> usize {
        self.max_pattern_len + ANCHOR_SLACK
    }

    /// Apply a single optimization or dump switch.
    pub fn apply(&mut self, flag: DfaFlag) {
        match flag {
            DfaFlag::NoMinimize => self.minimize = false,
            DfaFlag::NoEquiv => self.equiv_classes = false,
            DfaFlag::NoTailGlob => self.tail_glob = false,
            DfaFlag::DumpRuleExprs => self.dump_rule_exprs = true,
            DfaFlag::DumpTable => self.dump_table = true,
            DfaFlag::DumpStats => self.dump_stats = true,
            DfaFlag::DumpEquiv => self.dump_equiv = true,
        }
    }

    /// Build options from a list of switch names, e.g. `["no-minimize", "trans-table"]`.
    pub fn from_flags<'a, I>(flags: I) -> Result<Self, UnknownFlag>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut options = Self::default();
        for name in flags {
            options.apply(name.parse()?);
        }
        Ok(options)
    }
}

/// The parser's `-O`/`-D` switch names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfaFlag {
    NoMinimize,
    NoEquiv,
    NoTailGlob,
    DumpRuleExprs,
    DumpTable,
    DumpStats,
    DumpEquiv,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dfa option '{0}'")]
pub struct UnknownFlag(pub String);

impl FromStr for DfaFlag {
    type Err = UnknownFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "no-minimize" => DfaFlag::NoMinimize,
            "no-equiv" => DfaFlag::NoEquiv,
            "no-tail-glob" => DfaFlag::NoTailGlob,
            "rule-exprs" => DfaFlag::DumpRuleExprs,
            "trans-table" => DfaFlag::DumpTable,
            "trans-stats" => DfaFlag::DumpStats,
            "equiv" => DfaFlag::DumpEquiv,
            other => return Err(UnknownFlag(other.to_string())),
        })
    }
}

impl fmt::Display for DfaFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DfaFlag::NoMinimize => "no-minimize",
            DfaFlag::NoEquiv => "no-equiv",
            DfaFlag::NoTailGlob => "no-tail-glob",
            DfaFlag::DumpRuleExprs => "rule-exprs",
            DfaFlag::DumpTable => "trans-table",
            DfaFlag::DumpStats => "trans-stats",
            DfaFlag::DumpEquiv => "equiv",
        };
        f.write_str(name)
    }
}
