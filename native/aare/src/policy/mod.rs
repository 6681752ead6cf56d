//! Profile entries to rulesets and tables.
//!
//! Each entry kind is decomposed into one or more vector rules. File-family
//! rules go into the file table; mount and D-Bus rules, which carry a class
//! byte on their first element, go into the policy table.

mod dbus;
mod file;
mod mount;
mod xmatch;

pub use dbus::{CLASS_DBUS, DbusEntry, expand_dbus_entry};
pub use file::{FileEntry, expand_file_entry};
pub use mount::{
    CLASS_MOUNT, MS_ALL_FLAGS, MS_BIND, MS_BIND_FLAGS, MS_CMDS, MS_DIRSYNC, MS_I_VERSION,
    MS_KERNMOUNT, MS_MAKE_CMDS, MS_MAKE_FLAGS, MS_MANDLOCK, MS_MOVE, MS_MOVE_FLAGS, MS_NOATIME,
    MS_NODEV, MS_NODIRATIME, MS_NOEXEC, MS_NOSUID, MS_POSIXACL, MS_PRIVATE, MS_RDONLY, MS_REC,
    MS_RELATIME, MS_REMOUNT, MS_REMOUNT_FLAGS, MS_SHARED, MS_SILENT, MS_SLAVE, MS_STRICTATIME,
    MS_SYNCHRONOUS, MS_UNBINDABLE, MountEntry, build_mnt_flags, expand_mount_entry,
};
pub use xmatch::{Xmatch, build_xmatch, local_name};

use crate::config::CompileOptions;
use crate::create_dfa;
use crate::error::Result;
use crate::pattern::{PatternTranslator, PatternType};
use crate::rules::Ruleset;
use crate::table::CompressedTable;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Engine pattern matching any string without a NUL.
pub const ANY_STRING: &str = r"[^\x00]*";

/// Translated `value`, if any.
pub(crate) fn translate(
    translator: &PatternTranslator<'_>,
    value: Option<&str>,
) -> Result<Option<String>> {
    value
        .map(|v| translator.translate(v, false).map(|t| t.regex))
        .transpose()
}

/// Translated `value`, or [`ANY_STRING`] when absent.
pub(crate) fn translate_or_any(
    translator: &PatternTranslator<'_>,
    value: Option<&str>,
) -> Result<String> {
    Ok(translate(translator, value)?.unwrap_or_else(|| ANY_STRING.to_string()))
}

/// The rule-bearing parts of one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub attachment: Option<String>,
    pub altnames: Vec<String>,
    pub files: Vec<FileEntry>,
    pub mounts: Vec<MountEntry>,
    pub dbus: Vec<DbusEntry>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Tables produced for one profile. A table is absent when no rule feeds it.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledProfile {
    pub xmatch: Xmatch,
    pub file: Option<CompressedTable>,
    pub policy: Option<CompressedTable>,
}

fn table_for(ruleset: Ruleset, options: &CompileOptions) -> Result<Option<CompressedTable>> {
    if ruleset.is_empty() {
        return Ok(None);
    }
    create_dfa(ruleset, options).map(Some)
}

/// Compile every table of `profile`.
#[instrument(skip_all, fields(profile = %profile.name))]
pub fn compile_profile(profile: &Profile, options: &CompileOptions) -> Result<CompiledProfile> {
    let translator = PatternTranslator::new(options);

    let mut file_rules = Ruleset::new();
    let mut pattern_counts: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &profile.files {
        let (rules, ptype) = expand_file_entry(entry, &translator)?;
        file_rules.extend(rules);
        *pattern_counts.entry(ptype.to_string()).or_default() += 1;
    }
    debug!(?pattern_counts, rules = file_rules.len(), "expanded file entries");

    let mut policy_rules = Ruleset::new();
    for entry in &profile.mounts {
        policy_rules.extend(expand_mount_entry(entry, &translator)?);
    }
    for entry in &profile.dbus {
        policy_rules.extend(expand_dbus_entry(entry, &translator)?);
    }
    debug!(rules = policy_rules.len(), "expanded policy entries");

    let xmatch = build_xmatch(
        &profile.name,
        profile.attachment.as_deref(),
        &profile.altnames,
        options,
    )?;

    Ok(CompiledProfile {
        xmatch,
        file: table_for(file_rules, options)?,
        policy: table_for(policy_rules, options)?,
    })
}

/// Classification of every file entry name, for callers that pick a
/// cheaper matcher for literal paths.
pub fn file_pattern_types(profile: &Profile, options: &CompileOptions) -> Vec<PatternType> {
    profile
        .files
        .iter()
        .map(|entry| crate::pattern::pattern_type(&entry.name, options.pattern_capacity()))
        .collect()
}
