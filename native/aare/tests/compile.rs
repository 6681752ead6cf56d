use aare::perms::{MAY_EXEC, MAY_READ, MAY_WRITE};
use aare::policy::{FileEntry, MountEntry};
use aare::{
    CompileOptions, CompressedTable, PatternTranslator, PatternType, Profile, RuleClass, Ruleset,
    build_dfa, compile_profile, create_dfa,
};
use proptest::prelude::*;

fn file_ruleset(rules: &[(&str, bool, u32, u32)], options: &CompileOptions) -> Ruleset {
    let translator = PatternTranslator::new(options);
    let mut set = Ruleset::new();
    for &(glob, deny, perms, audit) in rules {
        let translation = translator.translate(glob, false).unwrap();
        set.add_rule(RuleClass::File, &[translation.regex], deny, perms, audit)
            .unwrap();
    }
    set
}

#[test]
fn test_profile_paths() {
    let options = CompileOptions::default();
    let rules = file_ruleset(
        &[
            ("/etc/**", false, MAY_READ, 0),
            ("/etc/shadow", true, MAY_READ, MAY_READ),
            ("/usr/{bin,sbin}/*", false, MAY_READ | MAY_EXEC, 0),
            ("/home/*/.cache/**", false, MAY_READ | MAY_WRITE, MAY_WRITE),
        ],
        &options,
    );
    let table = create_dfa(rules, &options).unwrap();

    let allow = |path: &str| table.lookup(path.as_bytes()).0 as u32;
    let deny = |path: &str| table.lookup(path.as_bytes()).1 as u32;

    assert_eq!(allow("/etc/passwd"), MAY_READ);
    assert_eq!(allow("/etc/ssl/certs/ca.pem"), MAY_READ);
    assert_eq!(allow("/etc/"), 0);
    assert_eq!(deny("/etc/shadow"), MAY_READ);
    assert_eq!(allow("/usr/sbin/ip"), MAY_READ | MAY_EXEC);
    assert_eq!(allow("/usr/lib/ld.so"), 0);
    assert_eq!(allow("/usr/bin/sub/x"), 0);

    let (accept, _) = table.lookup(b"/home/user/.cache/x/y");
    assert_eq!(accept as u32, MAY_READ | MAY_WRITE);
    assert_eq!((accept >> 32) as u32, MAY_WRITE);
}

#[test]
fn test_same_rules_give_identical_bytes() {
    let options = CompileOptions::default();
    let rules = [
        ("/var/log/*.log", false, MAY_WRITE, 0),
        ("/var/{log,cache}/**", false, MAY_READ, 0),
    ];
    let a = create_dfa(file_ruleset(&rules, &options), &options).unwrap();
    let b = create_dfa(file_ruleset(&rules, &options), &options).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.flex_table("varlog").unwrap(), b.flex_table("varlog").unwrap());
    assert_eq!(a.dump(), b.dump());
}

#[test]
fn test_options_change_table_shape() {
    let rules = [("/srv/[a-c]*", false, MAY_READ, 0)];
    let reduced = CompileOptions::default();
    let full = CompileOptions::from_flags(["no-equiv", "no-minimize"]).unwrap();

    let small = create_dfa(file_ruleset(&rules, &reduced), &reduced).unwrap();
    let large = create_dfa(file_ruleset(&rules, &full), &full).unwrap();
    assert!(small.is_reduced());
    assert!(!large.is_reduced());
    assert!(small.flex_table("srv").unwrap().len() < large.flex_table("srv").unwrap().len());
    for path in ["/srv/a", "/srv/bzz", "/srv/d", "/srv/"] {
        assert_eq!(small.lookup(path.as_bytes()), large.lookup(path.as_bytes()), "{path}");
    }
}

#[test]
fn test_json_diagnostics() {
    let options = CompileOptions::default();
    let table = create_dfa(file_ruleset(&[("/a", false, MAY_READ, 0)], &options), &options).unwrap();
    let json = serde_json::to_value(&table).unwrap();
    assert_eq!(json["reduced"], true);
    assert_eq!(json["accept"].as_array().unwrap().len(), table.num_states());
}

#[test]
fn test_options_from_json() {
    let options: CompileOptions =
        serde_json::from_str(r#"{"minimize": false, "max-states": 64}"#).unwrap();
    assert!(!options.minimize);
    assert_eq!(options.max_states, 64);
    assert!(options.equiv_classes);
}

#[test]
fn test_compile_profile_end_to_end() {
    let mut profile = Profile::new("/usr/bin/*-helper");
    profile.files.push(FileEntry::new("/run/helper/**", MAY_READ | MAY_WRITE));
    profile.mounts.push(MountEntry {
        mnt_point: Some("/run/helper/mnt".into()),
        allow: aare::perms::MAY_UMOUNT,
        ..Default::default()
    });

    let compiled = compile_profile(&profile, &CompileOptions::default()).unwrap();
    let xmatch = compiled.xmatch.table.unwrap();
    assert_ne!(xmatch.lookup(b"/usr/bin/net-helper").0, 0);
    assert_eq!(compiled.xmatch.len, "/usr/bin/".len());

    let file = compiled.file.unwrap();
    assert_eq!(
        file.lookup(b"/run/helper/sock").0 as u32,
        MAY_READ | MAY_WRITE
    );
    assert!(compiled.policy.is_some());
}

#[test]
fn test_pattern_classification() {
    let options = CompileOptions::default();
    let translator = PatternTranslator::new(&options);
    for (glob, ptype) in [
        ("/most/basic/test", PatternType::Basic),
        ("/opt/**", PatternType::TailGlob),
        ("/opt/**/x", PatternType::Regex),
    ] {
        assert_eq!(translator.translate(glob, false).unwrap().ptype, ptype, "{glob}");
    }
    for glob in ["[blort", "blort]", "{beta}", "biz{beta"] {
        assert_eq!(aare::pattern::pattern_type(glob, options.pattern_capacity()), PatternType::Invalid);
    }
}

fn arb_component() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "ab", "*", "**", "?", "{a,b}", "[ab]", "a*"])
        .prop_map(str::to_string)
}

fn arb_glob() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_component(), 1..4).prop_map(|parts| format!("/{}", parts.join("/")))
}

fn arb_rule() -> impl Strategy<Value = (String, bool, u32, u32)> {
    (arb_glob(), any::<bool>(), 1u32..0x100, 0u32..0x100)
}

fn ruleset_of(rules: &[(String, bool, u32, u32)], options: &CompileOptions) -> Ruleset {
    let borrowed: Vec<_> = rules
        .iter()
        .map(|(glob, deny, perms, audit)| (glob.as_str(), *deny, *perms, *audit))
        .collect();
    file_ruleset(&borrowed, options)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn compression_is_lossless(rules in prop::collection::vec(arb_rule(), 1..5)) {
        let options = CompileOptions::default();
        let dfa = build_dfa(ruleset_of(&rules, &options), &options).unwrap();
        let table = CompressedTable::from_dfa(&dfa, &options).unwrap();

        prop_assert_eq!(table.num_states(), dfa.num_states());
        for state in 0..dfa.num_states() as u32 {
            let record = dfa.accept(state);
            prop_assert_eq!(table.accept()[state as usize], record.accept());
            prop_assert_eq!(table.accept2()[state as usize], record.accept2());
            for byte in 0..=255u8 {
                prop_assert_eq!(table.next_state(state, byte), dfa.transition(state, byte));
            }
        }
    }

    #[test]
    fn rule_order_does_not_matter(
        (rules, shuffled) in prop::collection::vec(arb_rule(), 1..5)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let options = CompileOptions::default();
        let a = create_dfa(ruleset_of(&rules, &options), &options).unwrap();
        let b = create_dfa(ruleset_of(&shuffled, &options), &options).unwrap();
        prop_assert_eq!(a.flex_table("p").unwrap(), b.flex_table("p").unwrap());
    }
}
