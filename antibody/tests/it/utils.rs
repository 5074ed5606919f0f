use antibody::compiler::CompilerParams;
use antibody::scanner::{ScanError, ScanParams, ScanResult, Transform, Verdict};

pub struct Checker {
    scanner: antibody::Scanner,

    pub assert_success: bool,
    pub last_err: Option<ScanError>,
}

pub struct Compiler {
    pub compiler: antibody::Compiler,
}

impl Compiler {
    pub fn new() -> Self {
        let mut this = Self {
            compiler: antibody::Compiler::new(),
        };

        this.define_symbol("sym_int", 1_i64);
        this.define_symbol("sym_bool", true);
        this.define_symbol("sym_float", 1.5);
        this.define_symbol("min_hits", 2_i64);
        this.define_symbol("max_entropy", 7.2);

        this
    }

    pub fn define_symbol<T: Into<antibody::compiler::ExternalValue>>(&mut self, name: &str, v: T) {
        assert!(self.compiler.define_symbol(name, v));
    }

    #[track_caller]
    pub fn add_rules(&mut self, rules: &str) {
        let status = self.compiler.add_rules_str(rules);
        if let Some(err) = status.errors().next() {
            panic!("compilation failed: {err}");
        };
    }

    #[track_caller]
    pub fn check_add_rules_err(mut self, rules: &str, expected_prefix: &str) {
        let status = self.compiler.add_rules_str(rules);
        let errors: Vec<_> = status.errors().map(ToString::to_string).collect();
        assert_eq!(errors.len(), 1, "errors: {errors:?}");
        assert!(
            errors[0].starts_with(expected_prefix),
            "error: {}\nexpected prefix: {expected_prefix}",
            errors[0]
        );
    }

    pub fn set_params(&mut self, params: CompilerParams) {
        self.compiler.set_params(params);
    }

    pub fn into_checker(self) -> Checker {
        Checker {
            scanner: self.compiler.finalize().unwrap(),
            assert_success: true,
            last_err: None,
        }
    }
}

impl Checker {
    #[track_caller]
    pub fn new(rule: &str) -> Self {
        let mut compiler = Compiler::new();
        compiler.add_rules(rule);
        compiler.into_checker()
    }

    pub fn set_scan_params(&mut self, scan_params: ScanParams) {
        self.scanner.set_scan_params(scan_params);
    }

    pub fn define_symbol<T: Into<antibody::compiler::ExternalValue>>(&mut self, name: &str, v: T) {
        self.scanner.define_symbol(name, v).unwrap();
    }

    pub fn set_known_hashes(&mut self, known_hashes: antibody::known_hashes::KnownHashes) {
        self.scanner.set_known_hashes(known_hashes);
    }

    /// Check whether any rule matched.
    #[track_caller]
    pub fn check(&mut self, mem: &[u8], expected_res: bool) {
        let res = self.scan_mem(mem);
        let res = res.matched_rules().next().is_some();
        assert_eq!(res, expected_res, "test failed on {mem:?}");
    }

    pub fn scan_mem(&mut self, mem: &[u8]) -> ScanResult<'_> {
        match self.scanner.scan_mem(mem) {
            Ok(v) => {
                self.last_err = None;
                v
            }
            Err((err, v)) => {
                if self.assert_success {
                    panic!("scan failed: {err:?}");
                }
                self.last_err = Some(err);
                v
            }
        }
    }

    /// Check the names of the matched rules.
    #[track_caller]
    pub fn check_rule_matches(&mut self, mem: &[u8], expected_matches: &[&str]) {
        let mut expected: Vec<String> = expected_matches.iter().map(|v| v.to_string()).collect();
        expected.sort_unstable();

        let scan_res = self.scan_mem(mem);
        let mut res: Vec<String> = scan_res
            .matched_rules()
            .map(|v| v.name.to_owned())
            .collect();
        res.sort_unstable();
        assert_eq!(res, expected, "test failed");
    }

    /// Check the found patterns of every matched rule.
    #[track_caller]
    pub fn check_matches(&mut self, mem: &[u8], expected: Matches) {
        let scan_res = self.scan_mem(mem);
        let res: Matches = scan_res
            .matched_rules()
            .map(|rule| {
                (
                    rule.name.to_owned(),
                    rule.matches
                        .iter()
                        .map(|m| (m.name.to_owned(), m.offset, m.transform))
                        .collect(),
                )
            })
            .collect();
        assert_eq!(res, expected, "test failed");
    }

    /// Check the verdict of every rule.
    #[track_caller]
    pub fn check_verdicts(&mut self, mem: &[u8], expected: &[Verdict]) {
        let res = self.scan_mem(mem);
        let verdicts: Vec<_> = res.rules.iter().map(|rule| rule.verdict).collect();
        assert_eq!(verdicts, expected);
    }
}

pub type Matches = Vec<(String, Vec<(String, usize, Transform)>)>;

/// Build a PE32 file whose sections contain the given bytes.
///
/// The section data is laid out after the headers, in the same order as the sections.
pub fn build_pe32(sections: &[&[u8]]) -> Vec<u8> {
    const E_LFANEW: usize = 0x40;
    const OPTIONAL_HEADER_SIZE: usize = 96 + 16 * 8;

    let nb_sections = u16::try_from(sections.len()).unwrap();
    let headers_len = E_LFANEW + 4 + 20 + OPTIONAL_HEADER_SIZE + 40 * sections.len();

    let mut data = vec![0_u8; headers_len];
    // DOS header
    data[0..2].copy_from_slice(b"MZ");
    write_u32(&mut data, 0x3C, E_LFANEW as u32);

    // NT headers
    let mut off = E_LFANEW;
    data[off..off + 4].copy_from_slice(b"PE\0\0");
    off += 4;

    // File header
    write_u16(&mut data, off, 0x014C);
    write_u16(&mut data, off + 2, nb_sections);
    write_u16(&mut data, off + 16, OPTIONAL_HEADER_SIZE as u16);
    write_u16(&mut data, off + 18, 0x0102);
    off += 20;

    // Optional header, with 16 empty data directories.
    write_u16(&mut data, off, 0x010B);
    write_u32(&mut data, off + 32, 0x1000);
    write_u32(&mut data, off + 36, 0x200);
    write_u32(&mut data, off + 92, 16);
    off += OPTIONAL_HEADER_SIZE;

    // Section table
    let mut raw_offset = headers_len;
    for (i, section) in sections.iter().enumerate() {
        let name = format!(".sec{i}");
        data[off..off + name.len()].copy_from_slice(name.as_bytes());
        let size = section.len() as u32;
        write_u32(&mut data, off + 8, size);
        write_u32(&mut data, off + 12, 0x1000 * (i as u32 + 1));
        write_u32(&mut data, off + 16, size);
        write_u32(&mut data, off + 20, raw_offset as u32);
        raw_offset += section.len();
        off += 40;
    }

    for section in sections {
        data.extend_from_slice(section);
    }
    data
}

/// Section type of an ELF section with content.
pub const SHT_PROGBITS: u32 = 1;
/// Section type of an ELF section without content in the file.
pub const SHT_NOBITS: u32 = 8;

/// Build a little-endian ELF64 file with the given sections.
///
/// A NULL section is always added first, at index 0.
pub fn build_elf64(sections: &[(u32, &[u8])]) -> Vec<u8> {
    const EHDR_SIZE: usize = 64;
    const SHDR_SIZE: usize = 64;

    let mut data = vec![0_u8; EHDR_SIZE];
    data[0..4].copy_from_slice(b"\x7FELF");
    data[4] = 2; // ELFCLASS64
    data[5] = 1; // ELFDATA2LSB
    data[6] = 1; // EV_CURRENT
    write_u16(&mut data, 16, 2); // ET_EXEC
    write_u16(&mut data, 18, 0x3E); // EM_X86_64
    write_u32(&mut data, 20, 1);
    write_u16(&mut data, 52, EHDR_SIZE as u16);
    write_u16(&mut data, 58, SHDR_SIZE as u16);
    write_u16(&mut data, 60, u16::try_from(sections.len() + 1).unwrap());

    let mut offsets = Vec::new();
    for (_, content) in sections {
        offsets.push(data.len());
        data.extend_from_slice(content);
    }

    let shoff = data.len();
    write_u64(&mut data, 40, shoff as u64);

    // NULL section
    data.extend_from_slice(&[0; SHDR_SIZE]);
    for ((sh_type, content), offset) in sections.iter().zip(offsets) {
        let mut shdr = vec![0_u8; SHDR_SIZE];
        write_u32(&mut shdr, 4, *sh_type);
        write_u64(&mut shdr, 24, offset as u64);
        write_u64(&mut shdr, 32, content.len() as u64);
        write_u64(&mut shdr, 48, 1);
        data.extend_from_slice(&shdr);
    }
    data
}

fn write_u16(data: &mut [u8], offset: usize, v: u16) {
    data[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
}

fn write_u32(data: &mut [u8], offset: usize, v: u32) {
    data[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

fn write_u64(data: &mut [u8], offset: usize, v: u64) {
    data[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

/// Bytes with every byte value once, for an entropy of 8.
pub fn all_bytes() -> Vec<u8> {
    (0..=255).collect()
}
