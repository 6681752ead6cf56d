//! File, link, change-profile and ptrace entries.

use super::translate;
use crate::error::Result;
use crate::pattern::{PatternTranslator, PatternType, filter_slashes};
use crate::perms::{
    CHANGE_PROFILE, LINK_BITS, ONEXEC, OTHER_EXEC_INHERIT, OTHER_EXEC_MMAP, PTRACE_PERMS,
    USER_EXEC_INHERIT, USER_EXEC_MMAP, link_subset,
};
use crate::rules::{Rule, RuleClass};

/// Any executable path, the first element of on-exec change-profile rules.
const ANY_EXEC: &str = r"/[^\x00]*";
/// Link target used when the entry names none.
const ANY_LINK_TARGET: &str = "/[^/].*";

/// A decomposed file rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Target of a link rule.
    pub link_name: Option<String>,
    /// Namespace of a change-profile or ptrace target.
    pub ns: Option<String>,
    pub mode: u32,
    pub audit: u32,
    pub deny: bool,
    /// The link target must be a subset of the link name's permissions.
    pub subset: bool,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            mode,
            ..Default::default()
        }
    }
}

/// Expand a file entry into its rules.
///
/// Returns the rules and the classification of the entry name. Nothing is
/// returned on failure, so callers can add the rules atomically.
pub fn expand_file_entry(
    entry: &FileEntry,
    translator: &PatternTranslator<'_>,
) -> Result<(Vec<Rule>, PatternType)> {
    let mut mode = entry.mode;
    let name = if mode & !CHANGE_PROFILE != 0 {
        filter_slashes(&entry.name)
    } else {
        entry.name.clone()
    };
    let translation = translator.translate(&name, false)?;
    let tbuf = translation.regex.as_str();

    // ix implies m, the kernel does not add it to dfa states.
    if mode & USER_EXEC_INHERIT != 0 {
        mode |= USER_EXEC_MMAP;
    }
    if mode & OTHER_EXEC_INHERIT != 0 {
        mode |= OTHER_EXEC_MMAP;
    }

    let mut rules = Vec::new();

    // Both halves of a link pair must match, so a deny must not mask the
    // link bit on the first half. Audit for the link goes on the pair rule.
    if entry.deny && mode & LINK_BITS != 0 {
        rules.push(Rule::new(
            RuleClass::File,
            &[tbuf],
            true,
            mode & !LINK_BITS,
            entry.audit & !LINK_BITS,
        )?);
    } else if mode & !CHANGE_PROFILE != 0 {
        rules.push(Rule::new(
            RuleClass::File,
            &[tbuf],
            entry.deny,
            mode,
            entry.audit,
        )?);
    }

    if mode & LINK_BITS != 0 {
        let mut perms = mode & LINK_BITS;
        let target = match &entry.link_name {
            Some(link_name) => {
                if entry.subset {
                    perms |= link_subset(perms);
                }
                translator.translate(link_name, false)?.regex
            }
            None => {
                perms |= link_subset(perms);
                ANY_LINK_TARGET.to_string()
            }
        };
        rules.push(Rule::new(
            RuleClass::Link,
            &[tbuf, target.as_str()],
            entry.deny,
            perms,
            entry.audit & LINK_BITS,
        )?);
    }

    if mode & CHANGE_PROFILE != 0 {
        let ns = translate(translator, entry.ns.as_deref())?;
        let mut target: Vec<&str> = Vec::with_capacity(2);
        if let Some(ns) = &ns {
            target.push(ns);
        }
        target.push(tbuf);

        rules.push(Rule::new(
            RuleClass::ChangeProfile,
            &target,
            false,
            CHANGE_PROFILE | ONEXEC,
            0,
        )?);
        // Both on-exec rules are needed.
        rules.push(Rule::new(
            RuleClass::ChangeProfile,
            &[ANY_EXEC],
            false,
            ONEXEC,
            0,
        )?);
        let with_exec: Vec<&str> = std::iter::once(ANY_EXEC).chain(target).collect();
        rules.push(Rule::new(
            RuleClass::ChangeProfile,
            &with_exec,
            false,
            ONEXEC,
            0,
        )?);
    }

    if mode & PTRACE_PERMS != 0 {
        let ns = translate(translator, entry.ns.as_deref())?;
        let target: Vec<&str> = ns.as_deref().into_iter().chain([tbuf]).collect();
        rules.push(Rule::new(
            RuleClass::Ptrace,
            &target,
            false,
            mode & PTRACE_PERMS,
            0,
        )?);
    }

    Ok((rules, translation.ptype))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileOptions;
    use crate::error::Error;
    use crate::perms::{MAY_EXEC, MAY_LINK, MAY_READ, OTHER_SHIFT, USER_PTRACE};

    fn expand(entry: &FileEntry) -> Result<(Vec<Rule>, PatternType)> {
        let options = CompileOptions::default();
        expand_file_entry(entry, &PatternTranslator::new(&options))
    }

    fn classes(rules: &[Rule]) -> Vec<RuleClass> {
        rules.iter().map(Rule::class).collect()
    }

    #[test]
    fn test_plain_file_rule() {
        let entry = FileEntry::new("//usr///bin/*", MAY_READ | MAY_EXEC);
        let (rules, ptype) = expand(&entry).unwrap();
        assert_eq!(ptype, PatternType::Regex);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].subpatterns(), [r"//usr/bin/[^/\x00][^/\x00]*"]);
        assert_eq!(rules[0].perms(), MAY_READ | MAY_EXEC);
    }

    #[test]
    fn test_exec_inherit_implies_mmap() {
        let entry = FileEntry::new("/bin/sh", USER_EXEC_INHERIT | OTHER_EXEC_INHERIT);
        let (rules, _) = expand(&entry).unwrap();
        let perms = rules[0].perms();
        assert_ne!(perms & USER_EXEC_MMAP, 0);
        assert_ne!(perms & OTHER_EXEC_MMAP, 0);
    }

    #[test]
    fn test_link_pair() {
        let entry = FileEntry {
            link_name: Some("/tmp/target".into()),
            ..FileEntry::new("/tmp/link", MAY_LINK | MAY_READ)
        };
        let (rules, _) = expand(&entry).unwrap();
        assert_eq!(classes(&rules), vec![RuleClass::File, RuleClass::Link]);
        assert_eq!(rules[1].subpatterns(), ["/tmp/link", "/tmp/target"]);
        // An explicit target without subset keeps the plain link bit.
        assert_eq!(rules[1].perms(), MAY_LINK);
    }

    #[test]
    fn test_link_without_target_requires_subset() {
        let entry = FileEntry::new("/tmp/link", MAY_LINK);
        let (rules, _) = expand(&entry).unwrap();
        assert_eq!(rules[1].subpatterns()[1], ANY_LINK_TARGET);
        assert_eq!(rules[1].perms(), MAY_LINK | link_subset(MAY_LINK));
    }

    #[test]
    fn test_deny_link_keeps_link_bit_off_first_half() {
        let entry = FileEntry {
            deny: true,
            audit: MAY_LINK | MAY_READ,
            ..FileEntry::new("/tmp/link", MAY_LINK | MAY_READ | (MAY_LINK << OTHER_SHIFT))
        };
        let (rules, _) = expand(&entry).unwrap();
        assert_eq!(rules[0].perms() & LINK_BITS, 0);
        assert_eq!(rules[0].audit(), MAY_READ);
        assert!(rules[1].deny());
        assert_eq!(rules[1].audit(), MAY_LINK);
    }

    #[test]
    fn test_change_profile_adds_three_rules() {
        let entry = FileEntry::new("/profiles/foo", CHANGE_PROFILE);
        let (rules, _) = expand(&entry).unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|r| r.class() == RuleClass::ChangeProfile));
        assert_eq!(rules[0].subpatterns(), ["/profiles/foo"]);
        assert_eq!(rules[0].perms(), CHANGE_PROFILE | ONEXEC);
        assert_eq!(rules[1].subpatterns(), [ANY_EXEC]);
        assert_eq!(rules[2].subpatterns(), [ANY_EXEC, "/profiles/foo"]);
    }

    #[test]
    fn test_change_profile_with_namespace() {
        let entry = FileEntry {
            ns: Some("ns*".into()),
            ..FileEntry::new("//not//filtered", CHANGE_PROFILE)
        };
        let (rules, _) = expand(&entry).unwrap();
        assert_eq!(rules[0].subpatterns(), [r"ns[^/\x00]*", "//not//filtered"]);
        assert_eq!(rules[2].subpatterns().len(), 3);
    }

    #[test]
    fn test_ptrace() {
        let entry = FileEntry::new("/usr/bin/gdb", USER_PTRACE);
        let (rules, _) = expand(&entry).unwrap();
        // Ptrace bits alone still produce the plain rule.
        assert_eq!(classes(&rules), vec![RuleClass::File, RuleClass::Ptrace]);
        assert_eq!(rules[1].perms(), USER_PTRACE);

        let entry = FileEntry {
            ns: Some("lxc".into()),
            ..entry
        };
        let (rules, _) = expand(&entry).unwrap();
        assert_eq!(rules[1].subpatterns(), ["lxc", "/usr/bin/gdb"]);
    }

    #[test]
    fn test_bad_name() {
        let entry = FileEntry::new("/tmp/{a", MAY_READ);
        assert!(matches!(expand(&entry), Err(Error::Parse { .. })));
    }
}
