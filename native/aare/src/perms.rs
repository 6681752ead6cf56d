//! Permission bits and the per-state permission record.

use crate::formlang::Accept;
use crate::rules::RuleClass;
use serde::Serialize;

// File permission bits, one copy per user/other half.
pub const MAY_EXEC: u32 = 0x0001;
pub const MAY_WRITE: u32 = 0x0002;
pub const MAY_READ: u32 = 0x0004;
pub const MAY_APPEND: u32 = 0x0008;
pub const MAY_LINK: u32 = 0x0010;
pub const MAY_LOCK: u32 = 0x0020;
pub const EXEC_MMAP: u32 = 0x0040;
pub const EXEC_UNSAFE: u32 = 0x0080;
pub const EXEC_INHERIT: u32 = 0x0100;
pub const EXEC_MOD_0: u32 = 0x0200;
pub const EXEC_MOD_1: u32 = 0x0400;
pub const EXEC_MOD_2: u32 = 0x0800;
pub const EXEC_MOD_3: u32 = 0x1000;
pub const BASE_PERMS: u32 = 0x1fff;

pub const USER_SHIFT: u32 = 0;
pub const OTHER_SHIFT: u32 = 14;
pub const USER_PERMS: u32 = BASE_PERMS << USER_SHIFT;
pub const OTHER_PERMS: u32 = BASE_PERMS << OTHER_SHIFT;

pub const USER_PTRACE: u32 = 1 << 27;
pub const OTHER_PTRACE: u32 = 1 << 28;
pub const PTRACE_PERMS: u32 = USER_PTRACE | OTHER_PTRACE;
pub const ONEXEC: u32 = 1 << 29;
pub const CHANGE_HAT: u32 = 1 << 30;
pub const CHANGE_PROFILE: u32 = 1 << 31;

pub const LINK_BITS: u32 = (MAY_LINK << USER_SHIFT) | (MAY_LINK << OTHER_SHIFT);

/// The "target must be a subset" bits matching a set of link bits.
pub const fn link_subset(link_bits: u32) -> u32 {
    link_bits << 1
}

pub const USER_EXEC_INHERIT: u32 = EXEC_INHERIT << USER_SHIFT;
pub const OTHER_EXEC_INHERIT: u32 = EXEC_INHERIT << OTHER_SHIFT;
pub const USER_EXEC_MMAP: u32 = EXEC_MMAP << USER_SHIFT;
pub const OTHER_EXEC_MMAP: u32 = EXEC_MMAP << OTHER_SHIFT;

// Mount rule permissions.
pub const MAY_PIVOTROOT: u32 = 0x01;
pub const MAY_MOUNT: u32 = 0x02;
pub const MAY_UMOUNT: u32 = 0x04;
pub const AUDIT_MNT_DATA: u32 = 0x08;
/// Matching continues past this state into the mount data.
pub const MATCH_CONT: u32 = 0x40;

// D-Bus rule permissions.
pub const MAY_SEND: u32 = 0x02;
pub const MAY_RECEIVE: u32 = 0x04;
pub const MAY_EAVESDROP: u32 = 0x20;
pub const MAY_BIND: u32 = 0x40;

/// Accumulated permissions of one automaton state.
///
/// Allow and deny are kept apart; the effective permission is computed on
/// demand. Audit bits of allow rules go to `audit`, those of deny rules to
/// `quiet`, so auditing a denial never looks like auditing an allow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PermissionRecord {
    pub allow: u32,
    pub deny: u32,
    pub audit: u32,
    pub quiet: u32,
    /// [`RuleClass::bit`] of every contributing rule.
    pub class_flags: u32,
}

impl PermissionRecord {
    /// Fold one rule's contribution into the record.
    pub fn accumulate(&mut self, class: RuleClass, deny: bool, perms: u32, audit: u32) {
        if deny {
            self.deny |= perms;
            self.quiet |= audit & perms;
        } else {
            self.allow |= perms;
            self.audit |= audit & perms;
        }
        self.class_flags |= class.bit();
    }

    pub fn effective(&self) -> u32 {
        self.allow & !self.deny
    }

    pub fn has_class(&self, class: RuleClass) -> bool {
        self.class_flags & class.bit() != 0
    }

    /// The `accept` table word: allow low, audit high.
    pub fn accept(&self) -> u64 {
        u64::from(self.allow) | (u64::from(self.audit) << 32)
    }

    /// The `accept2` table word: deny low, quiet high.
    pub fn accept2(&self) -> u64 {
        u64::from(self.deny) | (u64::from(self.quiet) << 32)
    }
}

impl Accept for PermissionRecord {
    /// The serialized accept words. `class_flags` never reaches the table.
    type Key = (u64, u64);

    fn merge(&mut self, other: &Self) {
        self.allow |= other.allow;
        self.deny |= other.deny;
        self.audit |= other.audit;
        self.quiet |= other.quiet;
        self.class_flags |= other.class_flags;
    }

    fn key(&self) -> (u64, u64) {
        (self.accept(), self.accept2())
    }
}
