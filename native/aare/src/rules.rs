//! Rule accumulation.
//!
//! A [`Ruleset`] collects the rules of one policy unit. Each rule is one or
//! more engine sub-patterns that match in sequence (joined by a NUL byte in
//! the automaton) together with the permission, audit and deny bits it
//! contributes when its whole vector matches.

use crate::error::{Error, Result};
use crate::formlang::parse_engine_pattern;
use crate::perms::PermissionRecord;
use regex_syntax::hir::Hir;
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;

/// What kind of policy entry a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleClass {
    File,
    Link,
    ChangeProfile,
    Ptrace,
    Mount,
    Dbus,
    Xmatch,
}

impl RuleClass {
    pub const ALL: [RuleClass; 7] = [
        RuleClass::File,
        RuleClass::Link,
        RuleClass::ChangeProfile,
        RuleClass::Ptrace,
        RuleClass::Mount,
        RuleClass::Dbus,
        RuleClass::Xmatch,
    ];

    /// This class's bit in [`PermissionRecord::class_flags`].
    pub fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Accepted number of sub-patterns.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            RuleClass::File | RuleClass::Xmatch => 1..=1,
            RuleClass::Link => 2..=2,
            RuleClass::ChangeProfile => 1..=3,
            RuleClass::Ptrace => 1..=2,
            RuleClass::Mount => 1..=5,
            RuleClass::Dbus => 1..=6,
        }
    }
}

impl fmt::Display for RuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleClass::File => "file",
            RuleClass::Link => "link",
            RuleClass::ChangeProfile => "change-profile",
            RuleClass::Ptrace => "ptrace",
            RuleClass::Mount => "mount",
            RuleClass::Dbus => "dbus",
            RuleClass::Xmatch => "xmatch",
        };
        f.write_str(name)
    }
}

/// One accumulated rule.
#[derive(Debug, Clone)]
pub struct Rule {
    class: RuleClass,
    subpatterns: Vec<String>,
    parsed: Vec<Hir>,
    deny: bool,
    perms: u32,
    audit: u32,
}

impl Rule {
    /// Validate and parse a rule.
    pub fn new<S: AsRef<str>>(
        class: RuleClass,
        subpatterns: &[S],
        deny: bool,
        perms: u32,
        audit: u32,
    ) -> Result<Self> {
        if subpatterns.is_empty() {
            return Err(Error::MalformedRule {
                class,
                reason: "no sub-patterns".to_string(),
            });
        }
        let arity = class.arity();
        if !arity.contains(&subpatterns.len()) {
            let expected = if arity.start() == arity.end() {
                arity.start().to_string()
            } else {
                format!("{} to {}", arity.start(), arity.end())
            };
            return Err(Error::MalformedRule {
                class,
                reason: format!("expected {expected} sub-patterns, got {}", subpatterns.len()),
            });
        }

        let subpatterns: Vec<String> = subpatterns.iter().map(|s| s.as_ref().to_string()).collect();
        let parsed = subpatterns
            .iter()
            .map(|p| parse_engine_pattern(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            class,
            subpatterns,
            parsed,
            deny,
            perms,
            audit,
        })
    }

    pub fn class(&self) -> RuleClass {
        self.class
    }

    pub fn subpatterns(&self) -> &[String] {
        &self.subpatterns
    }

    pub(crate) fn parsed(&self) -> &[Hir] {
        &self.parsed
    }

    pub fn deny(&self) -> bool {
        self.deny
    }

    pub fn perms(&self) -> u32 {
        self.perms
    }

    pub fn audit(&self) -> u32 {
        self.audit
    }

    /// What this rule contributes to a state it accepts on.
    pub fn record(&self) -> PermissionRecord {
        let mut record = PermissionRecord::default();
        record.accumulate(self.class, self.deny, self.perms, self.audit);
        record
    }
}

/// The rules of one policy unit.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule of one or more cooperating sub-patterns.
    ///
    /// The rule is validated and every sub-pattern parsed before anything is
    /// stored, so a failure leaves the ruleset untouched.
    pub fn add_rule<S: AsRef<str>>(
        &mut self,
        class: RuleClass,
        subpatterns: &[S],
        deny: bool,
        perms: u32,
        audit: u32,
    ) -> Result<()> {
        let rule = Rule::new(class, subpatterns, deny, perms, audit)?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

impl Extend<Rule> for Ruleset {
    fn extend<I: IntoIterator<Item = Rule>>(&mut self, iter: I) {
        self.rules.extend(iter);
    }
}
