use std::sync::Arc;
use std::thread;

use antibody::scanner::Verdict;

use crate::utils::Compiler;

const RULES: &str = r#"
rule text {
    strings:
        $a = "CreateRemoteThread"
        $b = "VirtualAllocEx" nocase
    condition:
        all of them
}

rule shellcode {
    strings:
        $a = { FC E8 ?? 00 00 00 }
    condition:
        $a
}

rule encoded {
    strings:
        $a = "cmd.exe /c" xor(1-16)
    condition:
        $a and filesize < 1MB
}
"#;

fn buffers() -> Vec<Vec<u8>> {
    let mut buffers = Vec::new();
    for i in 0..64_u8 {
        let mut mem = vec![i; 4096];
        if i % 2 == 0 {
            mem[100..118].copy_from_slice(b"CreateRemoteThread");
        }
        if i % 3 == 0 {
            mem[200..214].copy_from_slice(b"VIRTUALALLOCEX");
        }
        if i % 5 == 0 {
            mem[300..306].copy_from_slice(b"\xFC\xE8\x82\x00\x00\x00");
        }
        if i % 7 == 0 {
            let key = i % 16 + 1;
            let encoded: Vec<u8> = b"cmd.exe /c".iter().map(|b| b ^ key).collect();
            mem[400..410].copy_from_slice(&encoded);
        }
        buffers.push(mem);
    }
    buffers
}

fn verdicts(scanner: &antibody::Scanner, mem: &[u8]) -> Vec<Verdict> {
    let res = scanner.scan_mem(mem).unwrap();
    res.rules.iter().map(|rule| rule.verdict).collect()
}

#[test]
fn test_concurrent_scans() {
    let mut compiler = Compiler::new();
    compiler.add_rules(RULES);
    let scanner = compiler.compiler.finalize().unwrap();

    let buffers = Arc::new(buffers());
    let sequential: Vec<_> = buffers.iter().map(|mem| verdicts(&scanner, mem)).collect();

    // Sanity check on the expected verdicts.
    assert_eq!(
        sequential[0],
        [Verdict::Matched, Verdict::Matched, Verdict::Matched]
    );
    assert_eq!(
        sequential[1],
        [Verdict::NotMatched, Verdict::NotMatched, Verdict::NotMatched]
    );
    assert_eq!(
        sequential[6],
        [Verdict::Matched, Verdict::NotMatched, Verdict::NotMatched]
    );
    assert_eq!(
        sequential[35],
        [Verdict::NotMatched, Verdict::Matched, Verdict::Matched]
    );

    let handles: Vec<_> = (0..8)
        .map(|thread_index| {
            let scanner = scanner.clone();
            let buffers = Arc::clone(&buffers);
            thread::spawn(move || {
                buffers
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % 8 == thread_index)
                    .map(|(i, mem)| (i, verdicts(&scanner, mem)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut nb_results = 0;
    for handle in handles {
        for (i, res) in handle.join().unwrap() {
            assert_eq!(res, sequential[i], "buffer {i}");
            nb_results += 1;
        }
    }
    assert_eq!(nb_results, buffers.len());
}

#[test]
fn test_shared_scanner_reference() {
    let mut compiler = Compiler::new();
    compiler.add_rules(RULES);
    let scanner = compiler.compiler.finalize().unwrap();
    let scanner = &scanner;
    let buffers = buffers();

    thread::scope(|s| {
        for mem in &buffers {
            let _handle = s.spawn(move || {
                let res = verdicts(&scanner, mem);
                assert_eq!(res, verdicts(&scanner, mem));
            });
        }
    });
}
