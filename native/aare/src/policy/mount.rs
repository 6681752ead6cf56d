//! Mount, umount and pivot_root entries.
//!
//! Mount rules match a vector of
//! `[class + mount point, device, fs type, flags, data]`. Each flag bit `i`
//! is encoded as the byte `i + 1` so the flags element is a fixed-order
//! string the kernel builds the same way.

use super::{ANY_STRING, translate_or_any};
use crate::error::{Error, Result};
use crate::pattern::PatternTranslator;
use crate::perms::{AUDIT_MNT_DATA, MATCH_CONT, MAY_MOUNT, MAY_PIVOTROOT, MAY_UMOUNT};
use crate::rules::{Rule, RuleClass};
use std::fmt::Write as _;

/// Class byte prefixed to every mount rule.
pub const CLASS_MOUNT: u8 = 7;

pub const MS_RDONLY: u32 = 1;
pub const MS_NOSUID: u32 = 1 << 1;
pub const MS_NODEV: u32 = 1 << 2;
pub const MS_NOEXEC: u32 = 1 << 3;
pub const MS_SYNCHRONOUS: u32 = 1 << 4;
pub const MS_REMOUNT: u32 = 1 << 5;
pub const MS_MANDLOCK: u32 = 1 << 6;
pub const MS_DIRSYNC: u32 = 1 << 7;
pub const MS_NOATIME: u32 = 1 << 10;
pub const MS_NODIRATIME: u32 = 1 << 11;
pub const MS_BIND: u32 = 1 << 12;
pub const MS_MOVE: u32 = 1 << 13;
pub const MS_REC: u32 = 1 << 14;
pub const MS_SILENT: u32 = 1 << 15;
pub const MS_POSIXACL: u32 = 1 << 16;
pub const MS_UNBINDABLE: u32 = 1 << 17;
pub const MS_PRIVATE: u32 = 1 << 18;
pub const MS_SLAVE: u32 = 1 << 19;
pub const MS_SHARED: u32 = 1 << 20;
pub const MS_RELATIME: u32 = 1 << 21;
pub const MS_KERNMOUNT: u32 = 1 << 22;
pub const MS_I_VERSION: u32 = 1 << 23;
pub const MS_STRICTATIME: u32 = 1 << 24;

pub const MS_ALL_FLAGS: u32 = MS_RDONLY
    | MS_NOSUID
    | MS_NODEV
    | MS_NOEXEC
    | MS_SYNCHRONOUS
    | MS_REMOUNT
    | MS_MANDLOCK
    | MS_DIRSYNC
    | MS_NOATIME
    | MS_NODIRATIME
    | MS_BIND
    | MS_MOVE
    | MS_REC
    | MS_SILENT
    | MS_POSIXACL
    | MS_UNBINDABLE
    | MS_PRIVATE
    | MS_SLAVE
    | MS_SHARED
    | MS_RELATIME
    | MS_KERNMOUNT
    | MS_I_VERSION
    | MS_STRICTATIME;

pub const MS_MAKE_CMDS: u32 = MS_UNBINDABLE | MS_PRIVATE | MS_SLAVE | MS_SHARED;
pub const MS_CMDS: u32 = MS_MOVE | MS_REMOUNT | MS_BIND | MS_MAKE_CMDS;
pub const MS_REMOUNT_FLAGS: u32 = MS_ALL_FLAGS & !(MS_CMDS & !MS_REMOUNT);
pub const MS_BIND_FLAGS: u32 = MS_BIND | MS_REC;
pub const MS_MAKE_FLAGS: u32 = MS_MAKE_CMDS | MS_REC;
pub const MS_MOVE_FLAGS: u32 = MS_MOVE;

/// A decomposed mount-family rule.
///
/// `flags` lists flags that may be set, `inv_flags` the subset of those that
/// may also be clear. [`MS_ALL_FLAGS`] in `flags` means "any flags".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub mnt_point: Option<String>,
    pub device: Option<String>,
    pub dev_type: Vec<String>,
    pub opts: Vec<String>,
    pub flags: u32,
    pub inv_flags: u32,
    pub allow: u32,
    pub audit: u32,
    pub deny: bool,
}

impl Default for MountEntry {
    fn default() -> Self {
        Self {
            mnt_point: None,
            device: None,
            dev_type: Vec::new(),
            opts: Vec::new(),
            flags: MS_ALL_FLAGS,
            inv_flags: MS_ALL_FLAGS,
            allow: MAY_MOUNT,
            audit: 0,
            deny: false,
        }
    }
}

/// Flags element for `flags`, each bit optional when also in `inv_flags`.
pub fn build_mnt_flags(flags: u32, inv_flags: u32) -> String {
    if flags == MS_ALL_FLAGS {
        return ANY_STRING.to_string();
    }

    let mut out = String::new();
    for bit in 0..32 {
        let mask = 1u32 << bit;
        if flags & inv_flags & mask != 0 {
            let _ = write!(out, r"(\x{:02x}|)", bit + 1);
        } else if flags & mask != 0 {
            let _ = write!(out, r"\x{:02x}", bit + 1);
        }
    }
    if out.is_empty() {
        // Match nothing but the empty string; 0xfe never appears.
        out.push_str(r"(\xfe|)");
    }
    out
}

fn mask_flags(entry: &MountEntry, mask: u32) -> (u32, u32) {
    let flags = if entry.flags == MS_ALL_FLAGS {
        entry.flags
    } else {
        entry.flags & mask
    };
    let inv_flags = if entry.inv_flags == MS_ALL_FLAGS {
        entry.inv_flags
    } else {
        entry.inv_flags & mask
    };
    (flags, inv_flags)
}

/// `(a|b|...)` over translated values, or anything when empty.
fn build_list_val_expr(values: &[String], translator: &PatternTranslator<'_>) -> Result<String> {
    if values.is_empty() {
        return Ok(ANY_STRING.to_string());
    }
    let alternatives = values
        .iter()
        .map(|v| translator.translate(v, false).map(|t| t.regex))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", alternatives.join("|")))
}

/// Comma-joined translated options, or anything when empty.
fn build_mnt_opts(opts: &[String], translator: &PatternTranslator<'_>) -> Result<String> {
    if opts.is_empty() {
        return Ok(ANY_STRING.to_string());
    }
    let parts = opts
        .iter()
        .map(|v| translator.translate(v, false).map(|t| t.regex))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(","))
}

/// `\x07` followed by the translated value or anything.
fn class_prefixed(value: Option<&str>, translator: &PatternTranslator<'_>) -> Result<String> {
    Ok(format!(r"\x{CLASS_MOUNT:02x}{}", translate_or_any(translator, value)?))
}

struct MountRules<'a> {
    entry: &'a MountEntry,
    rules: Vec<Rule>,
}

impl MountRules<'_> {
    fn push(&mut self, vec: &[&str], allow: u32, audit: u32) -> Result<()> {
        self.rules.push(Rule::new(
            RuleClass::Mount,
            vec,
            self.entry.deny,
            allow,
            audit,
        )?);
        Ok(())
    }

    /// A rule that matches without data, plus one requiring the data when
    /// the entry has options. The first only continues matching then.
    fn push_with_data(&mut self, vec: [&str; 4], opts: Option<&str>) -> Result<()> {
        let audit = self.entry.audit | AUDIT_MNT_DATA;
        match opts {
            Some(opts) => {
                self.push(&vec, MATCH_CONT, audit)?;
                let [a, b, c, d] = vec;
                self.push(&[a, b, c, d, opts], self.entry.allow, audit)
            }
            None => self.push(&vec, self.entry.allow, audit),
        }
    }
}

/// Expand a mount entry into its rules.
pub fn expand_mount_entry(
    entry: &MountEntry,
    translator: &PatternTranslator<'_>,
) -> Result<Vec<Rule>> {
    let mut out = MountRules {
        entry,
        rules: Vec::new(),
    };
    let mnt_point = entry.mnt_point.as_deref();
    let device = entry.device.as_deref();
    let opts = if entry.opts.is_empty() {
        None
    } else {
        Some(build_mnt_opts(&entry.opts, translator)?)
    };
    let mounting = entry.allow & MAY_MOUNT != 0;
    let has_type = !entry.dev_type.is_empty();

    if mounting && entry.flags & MS_REMOUNT != 0 && device.is_none() && !has_type {
        // Remount can't be conditional on device or type.
        let target = class_prefixed(mnt_point.or(device), translator)?;
        let (flags, inv_flags) = mask_flags(entry, MS_REMOUNT_FLAGS);
        let flags = build_mnt_flags(flags, inv_flags);
        out.push_with_data([&target, ANY_STRING, ANY_STRING, &flags], opts.as_deref())?;
    }

    if mounting && entry.flags & MS_BIND != 0 && !has_type && opts.is_none() {
        let target = class_prefixed(mnt_point, translator)?;
        let dev = translate_or_any(translator, device)?;
        let (flags, inv_flags) = mask_flags(entry, MS_BIND_FLAGS);
        let flags = build_mnt_flags(flags, inv_flags);
        out.push(&[&target, &dev, ANY_STRING, &flags], entry.allow, entry.audit)?;
    }

    if mounting
        && entry.flags & MS_MAKE_CMDS != 0
        && device.is_none()
        && !has_type
        && opts.is_none()
    {
        let target = class_prefixed(mnt_point, translator)?;
        let (flags, inv_flags) = mask_flags(entry, MS_MAKE_FLAGS);
        let flags = build_mnt_flags(flags, inv_flags);
        out.push(&[&target, ANY_STRING, ANY_STRING, &flags], entry.allow, entry.audit)?;
    }

    if mounting && entry.flags & MS_MOVE != 0 && !has_type && opts.is_none() {
        let target = class_prefixed(mnt_point, translator)?;
        let dev = translate_or_any(translator, device)?;
        let (flags, inv_flags) = mask_flags(entry, MS_MOVE_FLAGS);
        let flags = build_mnt_flags(flags, inv_flags);
        out.push(&[&target, &dev, ANY_STRING, &flags], entry.allow, entry.audit)?;
    }

    if mounting && (entry.flags | entry.inv_flags) & !MS_CMDS != 0 {
        // Generic mount for flags no command above covers.
        let target = class_prefixed(mnt_point, translator)?;
        let dev = translate_or_any(translator, device)?;
        let types = build_list_val_expr(&entry.dev_type, translator)?;
        let (flags, inv_flags) = mask_flags(entry, !MS_CMDS);
        let flags = build_mnt_flags(flags, inv_flags);
        out.push_with_data([&target, &dev, &types, &flags], opts.as_deref())?;
    }

    if entry.allow & MAY_UMOUNT != 0 {
        let target = class_prefixed(mnt_point, translator)?;
        out.push(&[&target], entry.allow, entry.audit)?;
    }

    if entry.allow & MAY_PIVOTROOT != 0 {
        let target = class_prefixed(mnt_point, translator)?;
        let old_root = translate_or_any(translator, device)?;
        out.push(&[&target, &old_root], entry.allow, entry.audit)?;
    }

    if out.rules.is_empty() {
        return Err(Error::MalformedRule {
            class: RuleClass::Mount,
            reason: "entry encodes no mount rule".to_string(),
        });
    }
    Ok(out.rules)
}
