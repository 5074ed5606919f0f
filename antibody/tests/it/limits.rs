use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use antibody::compiler::CompilerParams;
use antibody::scanner::{ScanError, ScanParams, Verdict};

use crate::utils::{Checker, Compiler};

#[test]
fn test_max_condition_depth() {
    let mut compiler = Compiler::new();
    compiler.set_params(CompilerParams::default().max_condition_depth(5));
    compiler.add_rules("rule a { condition: not not not not true }");
    compiler.check_add_rules_err(
        "rule b { condition: not not not not not true }",
        "mem:1:41: error: condition is too deep",
    );

    // Deep conditions are rejected by the parser before any stack overflow.
    let cond = format!("{}true{}", "(".repeat(10_000), ")".repeat(10_000));
    Compiler::new().check_add_rules_err(&format!("rule a {{ condition: {cond} }}"), "mem:1:");
}

#[test]
fn test_long_not_chain() {
    // Rejected on the 20th `not`, at column 21 + 19 * 4.
    let cond = format!("{}true", "not ".repeat(100_000));
    Compiler::new().check_add_rules_err(
        &format!("rule a {{ condition: {cond} }}"),
        "mem:1:97: error: too many imbricated expressions",
    );

    // Other rules of the same document are still compiled.
    let mut compiler = Compiler::new();
    let rules = format!("rule a {{ condition: {cond} }}\nrule b {{ condition: true }}");
    let status = compiler.compiler.add_rules_str(rules);
    assert_eq!(status.errors().count(), 1);
    let mut checker = compiler.into_checker();
    checker.check_rule_matches(b"", &["b"]);
}

#[test]
fn test_max_patterns_per_rule() {
    let mut compiler = Compiler::new();
    compiler.set_params(CompilerParams::default().max_patterns_per_rule(2));
    compiler.add_rules(r#"rule a { strings: $a = "a" $b = "b" condition: any of them }"#);
    compiler.check_add_rules_err(
        r#"rule b { strings: $a = "a" $b = "b" $c = "c" condition: any of them }"#,
        "mem:1:6: error: rule declares 3 patterns, more than the limit of 2",
    );
}

#[test]
fn test_max_scan_size() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "abc"
    condition:
        $a
}

rule b {
    condition:
        true
}"#,
    );
    checker.set_scan_params(ScanParams::default().max_scan_size(10));
    checker.check_verdicts(b"0123456abc", &[Verdict::Matched, Verdict::Matched]);

    // Bigger buffers are refused, never truncated.
    checker.assert_success = false;
    checker.check_verdicts(b"0123456789abc", &[Verdict::Aborted, Verdict::Aborted]);
    assert_eq!(
        checker.last_err,
        Some(ScanError::SizeLimitExceeded { size: 13, limit: 10 })
    );
}

#[test]
fn test_timeout() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "abc"
    condition:
        $a
}

rule b {
    condition:
        true
}"#,
    );
    checker.assert_success = false;

    checker.set_scan_params(ScanParams::default().timeout_duration(Some(Duration::ZERO)));
    checker.check_verdicts(b"abc", &[Verdict::Aborted, Verdict::Aborted]);
    assert_eq!(checker.last_err, Some(ScanError::Timeout));

    checker.set_scan_params(ScanParams::default().deadline(Some(Instant::now())));
    checker.check_verdicts(&vec![0; 4 * 1024 * 1024], &[Verdict::Aborted, Verdict::Aborted]);
    assert_eq!(checker.last_err, Some(ScanError::Timeout));

    checker.set_scan_params(
        ScanParams::default().timeout_duration(Some(Duration::from_secs(3600))),
    );
    checker.check_verdicts(b"abc", &[Verdict::Matched, Verdict::Matched]);
    assert_eq!(checker.last_err, None);
}

#[test]
fn test_cancellation() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "abc"
    condition:
        $a
}"#,
    );
    checker.assert_success = false;

    let flag = Arc::new(AtomicBool::new(false));
    checker.set_scan_params(ScanParams::default().cancellation_flag(Some(Arc::clone(&flag))));
    checker.check_verdicts(b"abc", &[Verdict::Matched]);

    flag.store(true, Ordering::Relaxed);
    checker.check_verdicts(b"abc", &[Verdict::Aborted]);
    assert_eq!(checker.last_err, Some(ScanError::Cancelled));
}

#[test]
fn test_matches_across_windows() {
    let mut checker = Checker::new(
        r#"
rule a {
    strings:
        $a = "across_the_boundary"
        $b = { DE AD ?? BE EF }
    condition:
        all of them
}"#,
    );

    let window = 1024 * 1024;
    for shift in [1, 5, 10, 18] {
        let mut mem = vec![0_u8; 3 * window];
        let start = window - shift;
        mem[start..start + 19].copy_from_slice(b"across_the_boundary");
        let start = 2 * window - 2;
        mem[start..start + 5].copy_from_slice(b"\xDE\xAD\x00\xBE\xEF");
        checker.check(&mem, true);
    }
}
