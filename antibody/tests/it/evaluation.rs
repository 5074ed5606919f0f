use antibody::scanner::ScanParams;
use antibody::MetadataValue;

use crate::utils::{Checker, Compiler};

fn group_rules() -> &'static str {
    r#"
rule two_of_group {
    strings:
        $grp1 = "alpha"
        $grp2 = "bravo"
        $grp3 = "charlie"
        $grp4 = "delta"
        $grp5 = "echo"
        $other = "foxtrot"
    condition:
        2 of ($grp*)
}

rule three_of_group {
    strings:
        $grp1 = "alpha"
        $grp2 = "bravo"
        $grp3 = "charlie"
        $grp4 = "delta"
        $grp5 = "echo"
    condition:
        3 of ($grp*)
}

rule all_of_group {
    strings:
        $grp1 = "alpha"
        $grp2 = "bravo"
        $grp3 = "charlie"
        $grp4 = "delta"
        $grp5 = "echo"
    condition:
        all of ($grp*)
}
"#
}

#[test]
fn test_quantifiers() {
    let mut checker = Checker::new(group_rules());

    checker.check_rule_matches(b"", &[]);
    checker.check_rule_matches(b"alpha", &[]);
    checker.check_rule_matches(b"alpha foxtrot", &[]);
    checker.check_rule_matches(b"alpha echo", &["two_of_group"]);
    // The same pattern found twice is counted once.
    checker.check_rule_matches(b"alpha alpha", &[]);
    checker.check_rule_matches(
        b"alpha bravo delta",
        &["two_of_group", "three_of_group"],
    );
    checker.check_rule_matches(
        b"echo delta charlie bravo alpha",
        &["two_of_group", "three_of_group", "all_of_group"],
    );
}

#[test]
fn test_of_sets() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "aaa"
        $b1 = "bbb"
        $b2 = "ccc"
    condition:
        any of ($a, $b2)
}

rule b {
    strings:
        $a = "aaa"
        $b1 = "bbb"
        $b2 = "ccc"
    condition:
        all of them
}

rule c {
    strings:
        $a = "aaa"
        $b1 = "bbb"
        $b2 = "ccc"
    condition:
        min_hits of ($b*, $a)
}
"#,
    );
    checker.check_rule_matches(b"bbb", &[]);
    checker.check_rule_matches(b"ccc", &["a"]);
    checker.check_rule_matches(b"bbb ccc", &["a", "c"]);
    checker.check_rule_matches(b"aaa ccc bbb", &["a", "b", "c"]);

    checker.define_symbol("min_hits", 1_i64);
    checker.check_rule_matches(b"bbb", &["c"]);
    checker.define_symbol("min_hits", 0_i64);
    checker.check_rule_matches(b"", &["c"]);
    checker.define_symbol("min_hits", 4_i64);
    checker.check_rule_matches(b"aaa ccc bbb", &["a", "b"]);
}

#[test]
fn test_boolean_operators() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "aaa"
        $b = "bbb"
        $c = "ccc"
    condition:
        $a and not $b or $c
}"#,
    );
    checker.check(b"aaa", true);
    checker.check(b"aaa bbb", false);
    checker.check(b"aaa bbb ccc", true);
    checker.check(b"ccc", true);
    checker.check(b"bbb", false);

    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "aaa"
        $b = "bbb"
        $c = "ccc"
    condition:
        $a and not ($b or $c)
}"#,
    );
    checker.check(b"aaa", true);
    checker.check(b"aaa ccc", false);
    checker.check(b"ccc", false);

    let mut checker = Checker::new("rule a { condition: true and not false }");
    checker.check(b"", true);
    let mut checker = Checker::new("rule a { condition: not (true or false) }");
    checker.check(b"", false);
}

#[test]
fn test_header_magic() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "This program"
        $b = "cannot be run"
    condition:
        header_magic == 0x5A4D and all of them
}"#,
    );
    checker.check(b"MZ This program cannot be run", true);
    checker.check(b"ZM This program cannot be run", false);
    checker.check(b"\x7FELF This program cannot be run", false);
    checker.check(b"M", false);

    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "This program"
    condition:
        valid_header and $a
}"#,
    );
    checker.check(b"MZ This program", true);
    checker.check(b"PK This program", false);

    checker.set_scan_params(ScanParams::default().expected_magic(*b"PK"));
    checker.check(b"MZ This program", false);
    checker.check(b"PK This program", true);
}

#[test]
fn test_filesize() {
    let mut checker = Checker::new(
        r#"
rule small {
    condition:
        filesize < 1KB
}

rule big {
    condition:
        filesize >= 0x10 and filesize <= 1MB
}

rule exact {
    condition:
        filesize == 0o20
}
"#,
    );
    checker.check_rule_matches(b"", &["small"]);
    checker.check_rule_matches(&[0; 16], &["small", "big", "exact"]);
    checker.check_rule_matches(&[0; 1024], &["big"]);
    checker.check_rule_matches(&vec![0; 1024 * 1024 + 1], &[]);
}

#[test]
fn test_read_integers() {
    let mut checker = Checker::new(
        r#"
rule a {
    condition:
        uint16(0) == 0x5A4D and uint32(0x3C) == 0x80 and uint8(0x3C) > 0x7F
}"#,
    );
    let mut mem = vec![0_u8; 0x40];
    mem[0..2].copy_from_slice(b"MZ");
    mem[0x3C] = 0x80;
    checker.check(&mem, true);

    mem[0x3D] = 0x01;
    checker.check(&mem, false);

    // Out of bounds reads are never true.
    checker.check(&mem[..0x3E], false);
}

#[test]
fn test_external_symbols() {
    let mut compiler = Compiler::new();
    compiler.define_symbol("strict", false);
    compiler.add_rules(
        r#"
rule a {
    condition:
        filesize > sym_int and not strict
}

rule b {
    condition:
        filesize >= sym_float
}

rule c {
    condition:
        sym_bool
}
"#,
    );
    let mut checker = compiler.into_checker();
    checker.check_rule_matches(b"a", &["c"]);
    checker.check_rule_matches(b"ab", &["a", "b", "c"]);

    checker.define_symbol("sym_int", 5_i64);
    checker.define_symbol("sym_bool", false);
    checker.check_rule_matches(b"ab", &["b"]);

    checker.define_symbol("sym_float", 2.5);
    checker.check_rule_matches(b"ab", &[]);
    checker.define_symbol("strict", true);
    checker.check_rule_matches(b"abcdef", &["b"]);
}

#[test]
fn test_rule_details() {
    let mut checker = Checker::new(
        r#"
// A rule with everything
rule ransom_note : ransomware windows {
    meta:
        author = "analyst"
        severity = "high"
        score = 75
        offset = -3
        active = true
    /* Patterns */
    strings:
        $note = "files have been encrypted" nocase
    condition:
        $note
}"#,
    );

    let res = checker.scan_mem(b"YOUR FILES HAVE BEEN ENCRYPTED");
    let rule = &res.rules[0];
    assert!(rule.is_matched());
    assert_eq!(rule.name, "ransom_note");
    assert_eq!(rule.tags, ["ransomware", "windows"]);
    let metas: Vec<_> = rule
        .metadatas
        .iter()
        .map(|m| (m.name.as_str(), m.value.clone()))
        .collect();
    assert_eq!(
        metas,
        [
            ("author", MetadataValue::Bytes(b"analyst".to_vec())),
            ("severity", MetadataValue::Bytes(b"high".to_vec())),
            ("score", MetadataValue::Integer(75)),
            ("offset", MetadataValue::Integer(-3)),
            ("active", MetadataValue::Boolean(true)),
        ]
    );
    assert_eq!(rule.matches.len(), 1);
    assert_eq!(rule.matches[0].name, "note");
    assert_eq!(rule.matches[0].offset, 5);
}

#[test]
fn test_assessment() {
    let mut checker = Checker::new(
        r#"
rule locker {
    meta:
        severity = "critical"
        category = "ransomware"
        family = "lockbit"
    strings:
        $a = ".locked"
        $b = "bitcoin"
    condition:
        any of them
}

rule loader {
    meta:
        severity = "medium"
        family = "emotet"
    strings:
        $a = "loader"
    condition:
        $a
}

rule dropper {
    meta:
        severity = "low"
        family = "emotet"
    strings:
        $a = "dropper"
    condition:
        $a
}
"#,
    );

    let res = checker.scan_mem(b"loader dropper");
    let assessment = res.assessment();
    assert_eq!(assessment.severity, antibody::assessment::Severity::Medium);
    assert_eq!(assessment.family.as_deref(), Some("emotet"));
    assert_eq!(assessment.matched_rules, ["loader", "dropper"]);
    assert!((assessment.confidence - 0.1).abs() < 1e-9);

    let res = checker.scan_mem(b"a.locked file, pay in bitcoin, loader");
    let assessment = res.assessment();
    assert_eq!(assessment.severity, antibody::assessment::Severity::Critical);
    assert_eq!(assessment.family.as_deref(), Some("ransomware"));
    assert!((assessment.confidence - 0.2).abs() < 1e-9);

    let res = checker.scan_mem(b"nothing");
    assert_eq!(res.assessment(), antibody::assessment::Assessment::default());
}

#[test]
fn test_known_hashes() {
    use antibody::assessment::Severity;
    use antibody::known_hashes::{KnownHashInfo, KnownHashes};
    use antibody::scanner::Verdict;

    let mut checker = Checker::new(
        r#"
rule loader {
    meta:
        severity = "low"
        family = "emotet"
    strings:
        $a = "loader"
    condition:
        $a
}"#,
    );

    let mut known_hashes = KnownHashes::new();
    // md5 of "loader"
    known_hashes
        .add(
            "4a527f83a3a4ca7e1d70adb26a35b72e",
            KnownHashInfo::new().family("qbot").severity(Severity::Critical),
        )
        .unwrap();
    // md5 of "abc"
    known_hashes
        .add("900150983CD24FB0D6963F7D28E17F72", KnownHashInfo::new())
        .unwrap();
    checker.set_known_hashes(known_hashes);

    let res = checker.scan_mem(b"abc");
    assert_eq!(res.rules[0].verdict, Verdict::Skipped);
    let assessment = res.assessment();
    assert!(assessment.is_malicious());
    assert_eq!(assessment.severity, Severity::High);
    assert_eq!(assessment.family, None);
    assert!(assessment.matched_rules.is_empty());
    assert_eq!(
        assessment.known_hash.unwrap().hash,
        "900150983cd24fb0d6963f7d28e17f72"
    );

    // The table takes precedence over the rules.
    let assessment = checker.scan_mem(b"loader").assessment();
    assert_eq!(assessment.severity, Severity::Critical);
    assert_eq!(assessment.family.as_deref(), Some("qbot"));
    assert!(assessment.matched_rules.is_empty());

    // Not a known file, the rules are evaluated.
    let res = checker.scan_mem(b"a loader");
    let assessment = res.assessment();
    assert!(assessment.is_malicious());
    assert_eq!(assessment.severity, Severity::Low);
    assert_eq!(assessment.matched_rules, ["loader"]);
    assert!(assessment.known_hash.is_none());

    let res = checker.scan_mem(b"nothing");
    assert!(!res.assessment().is_malicious());
}
