//! D-Bus entries.

use super::translate_or_any;
use crate::error::{Error, Result};
use crate::pattern::PatternTranslator;
use crate::perms::{MAY_BIND, MAY_EAVESDROP, MAY_RECEIVE, MAY_SEND};
use crate::rules::{Rule, RuleClass};

/// Class byte prefixed to every D-Bus rule.
pub const CLASS_DBUS: u8 = 0x20;

/// A decomposed D-Bus rule. Absent fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbusEntry {
    pub bus: Option<String>,
    pub name: Option<String>,
    pub peer_label: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub mode: u32,
    pub audit: u32,
    pub deny: bool,
}

/// Expand a D-Bus entry.
///
/// Binding matches `[bus, name]`, message passing the full six elements and
/// eavesdropping only the bus.
pub fn expand_dbus_entry(entry: &DbusEntry, translator: &PatternTranslator<'_>) -> Result<Vec<Rule>> {
    let bus = format!(
        r"\x{CLASS_DBUS:02x}{}",
        translate_or_any(translator, entry.bus.as_deref())?
    );
    let vec = [
        bus,
        translate_or_any(translator, entry.name.as_deref())?,
        translate_or_any(translator, entry.peer_label.as_deref())?,
        translate_or_any(translator, entry.path.as_deref())?,
        translate_or_any(translator, entry.interface.as_deref())?,
        translate_or_any(translator, entry.member.as_deref())?,
    ];

    let mut rules = Vec::new();
    let mut push = |len: usize, mode: u32, audit: u32| -> Result<()> {
        rules.push(Rule::new(RuleClass::Dbus, &vec[..len], entry.deny, mode, audit)?);
        Ok(())
    };
    if entry.mode & MAY_BIND != 0 {
        push(2, entry.mode & MAY_BIND, entry.audit & MAY_BIND)?;
    }
    let message = MAY_SEND | MAY_RECEIVE;
    if entry.mode & message != 0 {
        push(6, entry.mode & message, entry.audit & message)?;
    }
    if entry.mode & MAY_EAVESDROP != 0 {
        push(1, entry.mode & MAY_EAVESDROP, entry.audit & MAY_EAVESDROP)?;
    }

    if rules.is_empty() {
        return Err(Error::MalformedRule {
            class: RuleClass::Dbus,
            reason: "entry grants no d-bus permission".to_string(),
        });
    }
    Ok(rules)
}
