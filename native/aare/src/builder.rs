//! Ruleset to DFA.
//!
//! Every rule becomes one branch out of a shared NFA start state. A vector
//! rule chains its sub-patterns with a NUL byte between them, and the
//! branch's final state carries the rule's [`PermissionRecord`]
//! contribution. Subset construction then merges the contributions of
//! every rule whose branch ends on the same DFA state.

use crate::config::CompileOptions;
use crate::equiv::EquivalenceMap;
use crate::error::{Error, Result};
use crate::formlang::{DFA, EpsilonNFA, chain, compile_hir, literal_fragment, subset_construction};
use crate::perms::PermissionRecord;
use crate::rules::{Rule, Ruleset};
use tracing::debug;

/// Separator between the sub-patterns of a vector rule.
pub const SUBPATTERN_SEPARATOR: u8 = 0;

fn build_nfa(rules: &[Rule]) -> EpsilonNFA<PermissionRecord> {
    let mut nfa = EpsilonNFA::new();
    let start = nfa.start_state();

    for rule in rules {
        let mut parts = Vec::with_capacity(rule.parsed().len() * 2);
        for (i, hir) in rule.parsed().iter().enumerate() {
            if i > 0 {
                parts.push(literal_fragment(&mut nfa, &[SUBPATTERN_SEPARATOR]));
            }
            parts.push(compile_hir(&mut nfa, hir));
        }
        let branch = chain(&mut nfa, parts);
        nfa.add_epsilon_transition(start, branch.start);
        nfa.add_final_state(branch.end, &rule.record());
    }

    nfa
}

/// Build the DFA of `ruleset`, consuming it.
pub fn build_dfa(ruleset: Ruleset, options: &CompileOptions) -> Result<DFA<PermissionRecord>> {
    if ruleset.is_empty() {
        return Err(Error::AutomatonConstruction("ruleset has no rules".to_string()));
    }

    let rules = ruleset.into_rules();
    let nfa = build_nfa(&rules);
    debug!(rules = rules.len(), nfa_states = nfa.num_states(), "built rule nfa");
    drop(rules);

    let dfa = subset_construction(&nfa, options.max_states)?;
    debug!(states = dfa.num_states(), "built dfa");

    if !options.minimize {
        return Ok(dfa);
    }
    let symbols = EquivalenceMap::from_dfa(&dfa).representatives();
    let minimized = dfa.minimize(&symbols);
    debug!(
        states = minimized.num_states(),
        removed = dfa.num_states() - minimized.num_states(),
        "minimized dfa"
    );
    Ok(minimized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formlang::DEAD_STATE;
    use crate::perms::{MAY_READ, MAY_WRITE};
    use crate::rules::RuleClass;

    fn file_rules(rules: &[(&str, bool, u32, u32)]) -> Ruleset {
        let mut set = Ruleset::new();
        for &(pattern, deny, perms, audit) in rules {
            set.add_rule(RuleClass::File, &[pattern], deny, perms, audit)
                .unwrap();
        }
        set
    }

    #[test]
    fn test_overlapping_rules_accumulate() {
        let rules = file_rules(&[
            (r"/tmp/[^/\x00][^/\x00]*", false, MAY_READ, 0),
            ("/tmp/secret", true, MAY_READ, MAY_READ),
            ("/tmp/secret", false, MAY_WRITE, MAY_WRITE),
        ]);
        let dfa = build_dfa(rules, &CompileOptions::default()).unwrap();

        let secret = dfa.accept(dfa.walk(b"/tmp/secret"));
        assert_eq!(secret.allow, MAY_READ | MAY_WRITE);
        assert_eq!(secret.deny, MAY_READ);
        assert_eq!(secret.audit, MAY_WRITE);
        assert_eq!(secret.quiet, MAY_READ);
        assert_eq!(secret.effective(), MAY_WRITE);

        let other = dfa.accept(dfa.walk(b"/tmp/other"));
        assert_eq!(other.allow, MAY_READ);
        assert_eq!(other.deny, 0);

        assert_eq!(dfa.walk(b"/tmp/a/b"), DEAD_STATE);
    }

    #[test]
    fn test_vector_rule_joined_by_nul() {
        let mut rules = Ruleset::new();
        rules
            .add_rule(RuleClass::Link, &["/a", "/b[^/\\x00]*"], false, 0x10, 0)
            .unwrap();
        let dfa = build_dfa(rules, &CompileOptions::default()).unwrap();

        assert_eq!(dfa.accept(dfa.walk(b"/a\0/bc")).allow, 0x10);
        assert_eq!(dfa.accept(dfa.walk(b"/a")).allow, 0);
        assert_eq!(dfa.walk(b"/a/bc"), DEAD_STATE);
    }

    #[test]
    fn test_minimize_preserves_language() {
        let make = || {
            file_rules(&[
                ("/(usr|opt)/lib/[^/\\x00]*", false, MAY_READ, 0),
                ("/usr/lib/x", false, MAY_READ, 0),
            ])
        };
        let minimized = build_dfa(make(), &CompileOptions::default()).unwrap();
        let options = CompileOptions {
            minimize: false,
            ..Default::default()
        };
        let plain = build_dfa(make(), &options).unwrap();
        assert!(minimized.num_states() <= plain.num_states());

        for path in [&b"/usr/lib/x"[..], b"/opt/lib/", b"/usr/lib", b"/opt/lib/a/b", b"/srv"] {
            assert_eq!(
                minimized.accept(minimized.walk(path)),
                plain.accept(plain.walk(path)),
                "{}",
                String::from_utf8_lossy(path)
            );
        }
    }

    #[test]
    fn test_classes_do_not_split_equal_accepts() {
        let build = |second: RuleClass| {
            let mut rules = Ruleset::new();
            rules.add_rule(RuleClass::File, &["/a"], false, MAY_READ, 0).unwrap();
            rules.add_rule(second, &["/b"], false, MAY_READ, 0).unwrap();
            build_dfa(rules, &CompileOptions::default()).unwrap()
        };
        let same = build(RuleClass::File);
        let mixed = build(RuleClass::Xmatch);
        assert_eq!(mixed.num_states(), same.num_states());

        // Both paths end on one state carrying both classes.
        let end = mixed.walk(b"/a");
        assert_eq!(mixed.walk(b"/b"), end);
        assert!(mixed.accept(end).has_class(RuleClass::File));
        assert!(mixed.accept(end).has_class(RuleClass::Xmatch));
    }

    #[test]
    fn test_empty_ruleset_rejected() {
        let err = build_dfa(Ruleset::new(), &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::AutomatonConstruction(_)));
    }

    #[test]
    fn test_state_limit() {
        let rules = file_rules(&[("/[a-z]{6}", false, MAY_READ, 0)]);
        let options = CompileOptions {
            max_states: 4,
            ..Default::default()
        };
        assert!(matches!(
            build_dfa(rules, &options).unwrap_err(),
            Error::TableOverflow(_)
        ));
    }
}
