use antibody::scanner::Transform;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::utils::Checker;

fn xor(data: &[u8], key: u8) -> Vec<u8> {
    data.iter().map(|b| b ^ key).collect()
}

#[test]
fn test_text_pattern() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "AES"
    condition:
        $a
}"#,
    );
    checker.check(b"AES", true);
    checker.check(b"__AES__", true);
    checker.check(b"aes", false);
    checker.check(b"AE", false);
    checker.check(b"", false);
}

#[test]
fn test_text_pattern_nocase() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "AES" nocase
    condition:
        $a
}"#,
    );
    checker.check(b"aes", true);
    checker.check(b"AeS", true);
    checker.check(b"__aES", true);
    checker.check(b"AE5", false);
}

#[test]
fn test_text_escapes() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "C:\\Windows\x00\t\"x\""
    condition:
        $a
}"#,
    );
    checker.check(b"C:\\Windows\0\t\"x\"", true);
    checker.check(b"C:\\Windows\0\t\"x", false);
}

#[test]
fn test_hex_pattern() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = { C7 ?? ?? E9 }
    condition:
        $a
}"#,
    );
    checker.check(b"\xC7\x01\x02\xE9", true);
    checker.check(b"\xC7\xFF\x00\xE9", true);
    checker.check(b"\xC8\x01\x02\xE9", false);
    checker.check(b"\xC7\x01\xE9", false);
    checker.check(b"\xC7\x01\x02", false);
}

#[test]
fn test_hex_pattern_masks() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = { 4D 5A ?0 A? ?? 00 }
    condition:
        $a
}"#,
    );
    checker.check(b"MZ\x90\xA3\x11\x00", true);
    checker.check(b"MZ\x00\xAF\x00\x00", true);
    checker.check(b"MZ\x91\xA3\x11\x00", false);
    checker.check(b"MZ\x90\xB3\x11\x00", false);
    checker.check(b"MZ\x90\xA3\x11\x01", false);

    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = { ?? ?? 6A 40 68 00 30 00 00 ?? }
    condition:
        $a
}"#,
    );
    checker.check(b"\x01\x02\x6A\x40\x68\x00\x30\x00\x00\x03", true);
    // Missing bytes around the anchor.
    checker.check(b"\x02\x6A\x40\x68\x00\x30\x00\x00\x03", false);
    checker.check(b"\x01\x02\x6A\x40\x68\x00\x30\x00\x00", false);
}

#[test]
fn test_xor_all_keys() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "attack_vector_1" xor
    condition:
        $a
}"#,
    );

    for key in 1..=255 {
        let mut mem = b"prefix ".to_vec();
        mem.extend(xor(b"attack_vector_1", key));
        mem.extend(b" suffix");
        checker.check_matches(
            &mem,
            vec![(
                "a".to_owned(),
                vec![("a".to_owned(), 7, Transform::Xor(key))],
            )],
        );
    }

    // The key 0 is not part of the default range.
    checker.check(b"attack_vector_1", false);
}

#[test]
fn test_xor_range() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "attack_vector_1" xor(0x10-0x20)
    condition:
        $a
}"#,
    );
    checker.check(&xor(b"attack_vector_1", 0x10), true);
    checker.check(&xor(b"attack_vector_1", 0x20), true);
    checker.check(&xor(b"attack_vector_1", 0x0F), false);
    checker.check(&xor(b"attack_vector_1", 0x21), false);

    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "attack_vector_1" xor(0)
    condition:
        $a
}"#,
    );
    checker.check(b"attack_vector_1", true);
    checker.check(&xor(b"attack_vector_1", 1), false);
}

#[test]
fn test_base64() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "This program cannot" base64
    condition:
        $a
}"#,
    );

    // Every alignment of the text in the encoded stream is found.
    for prefix in ["", "a", "ab", "abc", "abcd"] {
        let plain = format!("{prefix}This program cannot be run");
        let encoded = STANDARD.encode(plain.as_bytes());
        checker.check(encoded.as_bytes(), true);
    }
    checker.check(STANDARD.encode(b"This program can").as_bytes(), false);
    checker.check(b"This program cannot", false);

    let encoded = STANDARD.encode(b"abThis program cannot be run");
    let res = checker.scan_mem(encoded.as_bytes());
    let rule = res.matched_rules().next().unwrap();
    assert_eq!(rule.matches[0].transform, Transform::Base64 { phase: 2 });
}

#[test]
fn test_xor_base64() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "powershell -enc" xor(1-3) base64
    condition:
        $a
}"#,
    );

    let encoded = STANDARD.encode(xor(b"xpowershell -enc AAAA", 2));
    let res = checker.scan_mem(encoded.as_bytes());
    let rule = res.matched_rules().next().unwrap();
    assert_eq!(
        rule.matches[0].transform,
        Transform::XorBase64 { key: 2, phase: 1 }
    );

    checker.check(
        STANDARD.encode(xor(b"powershell -enc", 4)).as_bytes(),
        false,
    );
    checker.check(STANDARD.encode(b"powershell -enc").as_bytes(), false);
}

#[test]
fn test_matches_details() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "abc"
        $b = { 61 62 ?? }
        $c = "zzz"
    condition:
        $a or $c
}

rule b {
    strings:
        $a = "ABC" nocase
    condition:
        $a
}"#,
    );

    // Only the first match of every pattern is reported.
    checker.check_matches(
        b"__abd_abc_abc",
        vec![
            (
                "a".to_owned(),
                vec![
                    ("a".to_owned(), 6, Transform::Plain),
                    ("b".to_owned(), 2, Transform::Plain),
                ],
            ),
            ("b".to_owned(), vec![("a".to_owned(), 6, Transform::Plain)]),
        ],
    );
}

#[test]
fn test_many_rules_shared_atoms() {
    let mut rules = String::new();
    for i in 0..50 {
        rules.push_str(&format!(
            "rule r{i} {{ strings: $a = \"shared_prefix_{i:02}\" condition: $a }}\n"
        ));
    }
    let mut checker = Checker::new(&rules);
    checker.check_rule_matches(b"shared_prefix_07 shared_prefix_42", &["r7", "r42"]);
    checker.check_rule_matches(b"shared_prefix_", &[]);
}
