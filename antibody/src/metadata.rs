//! Properties of the scanned bytes used by conditions.
//!
//! Those are extracted lazily, and only once per scan: a condition that does not use a
//! section entropy never triggers the parsing of the section table.
use std::cell::OnceCell;
use std::ops::Range;

use antibody_parser::expression::IntegerSize;

/// Shannon entropy of a byte string, in bits per byte.
///
/// This is `-Σ p(b)·log2(p(b))` over the 256 possible byte values, where `p(b)` is the
/// frequency of the byte value `b`. The entropy of an empty string is `0.0`.
///
/// ```
/// assert_eq!(antibody::metadata::entropy(b"aaaa"), 0.0);
/// assert_eq!(antibody::metadata::entropy(b"abcd"), 2.0);
/// ```
#[must_use]
pub fn entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut counters = [0_u64; 256];
    for b in bytes {
        counters[usize::from(*b)] += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = bytes.len() as f64;
    counters
        .into_iter()
        .filter(|n| *n != 0)
        .map(|n| {
            #[allow(clippy::cast_precision_loss)]
            let x = (n as f64) / len;
            -(x * x.log2())
        })
        .sum()
}

/// Bytes being scanned, with their lazily computed properties.
#[derive(Debug)]
pub(crate) struct ScanTarget<'a> {
    mem: &'a [u8],

    /// Entropy of the whole bytes.
    entropy: OnceCell<f64>,

    /// Sections, in the order of the section table.
    sections: OnceCell<Vec<Section>>,
}

#[derive(Debug)]
struct Section {
    /// Region of the section in the scanned bytes.
    ///
    /// None if the section table describes a region outside of the bytes.
    region: Option<Range<usize>>,

    entropy: OnceCell<f64>,
}

impl Section {
    fn new(region: Option<Range<usize>>) -> Self {
        Self {
            region,
            entropy: OnceCell::new(),
        }
    }
}

impl<'a> ScanTarget<'a> {
    pub(crate) fn new(mem: &'a [u8]) -> Self {
        Self {
            mem,
            entropy: OnceCell::new(),
            sections: OnceCell::new(),
        }
    }

    pub(crate) fn filesize(&self) -> usize {
        self.mem.len()
    }

    /// First two bytes, as a little-endian u16.
    pub(crate) fn header_magic(&self) -> Option<u16> {
        match self.mem {
            [a, b, ..] => Some(u16::from_le_bytes([*a, *b])),
            _ => None,
        }
    }

    pub(crate) fn starts_with(&self, magic: &[u8]) -> bool {
        self.mem.starts_with(magic)
    }

    /// Little-endian unsigned integer read at the given offset.
    pub(crate) fn read_integer(&self, size: IntegerSize, offset: u64) -> Option<u32> {
        let offset = usize::try_from(offset).ok()?;
        let mem = self.mem.get(offset..)?;

        match size {
            IntegerSize::U8 => mem.first().copied().map(u32::from),
            IntegerSize::U16 => match mem {
                [a, b, ..] => Some(u16::from_le_bytes([*a, *b]).into()),
                _ => None,
            },
            IntegerSize::U32 => match mem {
                [a, b, c, d, ..] => Some(u32::from_le_bytes([*a, *b, *c, *d])),
                _ => None,
            },
        }
    }

    pub(crate) fn entropy(&self) -> f64 {
        *self.entropy.get_or_init(|| entropy(self.mem))
    }

    /// Entropy of the section at the given index.
    ///
    /// None if the bytes have no section table, or if the section does not exist or is out
    /// of bounds.
    pub(crate) fn section_entropy(&self, index: u64) -> Option<f64> {
        let sections = self.sections.get_or_init(|| parse_sections(self.mem));
        let section = sections.get(usize::try_from(index).ok()?)?;
        let region = section.region.clone()?;

        Some(
            *section
                .entropy
                .get_or_init(|| self.mem.get(region).map_or(0.0, entropy)),
        )
    }
}

/// Region of a section, if it is contained in the scanned bytes.
#[cfg_attr(not(feature = "object"), allow(dead_code))]
fn region(offset: u64, size: u64, mem_len: usize) -> Option<Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(size).ok()?)?;
    if end > mem_len {
        None
    } else {
        Some(start..end)
    }
}

#[cfg(feature = "object")]
fn parse_sections(mem: &[u8]) -> Vec<Section> {
    use object::elf::{FileHeader32, FileHeader64};
    use object::pe::{ImageNtHeaders32, ImageNtHeaders64};
    use object::{Endianness, FileKind};

    let sections = match FileKind::parse(mem) {
        Ok(FileKind::Pe32) => pe_sections::<ImageNtHeaders32>(mem),
        Ok(FileKind::Pe64) => pe_sections::<ImageNtHeaders64>(mem),
        Ok(FileKind::Elf32) => elf_sections::<FileHeader32<Endianness>>(mem),
        Ok(FileKind::Elf64) => elf_sections::<FileHeader64<Endianness>>(mem),
        _ => None,
    };
    sections.unwrap_or_default()
}

#[cfg(not(feature = "object"))]
fn parse_sections(_mem: &[u8]) -> Vec<Section> {
    Vec::new()
}

#[cfg(feature = "object")]
fn pe_sections<Pe: object::read::pe::ImageNtHeaders>(mem: &[u8]) -> Option<Vec<Section>> {
    use object::read::pe::PeFile;
    use object::LittleEndian as LE;

    let file = PeFile::<Pe>::parse(mem).ok()?;

    Some(
        file.section_table()
            .iter()
            .map(|section| {
                Section::new(region(
                    section.pointer_to_raw_data.get(LE).into(),
                    section.size_of_raw_data.get(LE).into(),
                    mem.len(),
                ))
            })
            .collect(),
    )
}

#[cfg(feature = "object")]
fn elf_sections<Elf>(mem: &[u8]) -> Option<Vec<Section>>
where
    Elf: object::read::elf::FileHeader<Endian = object::Endianness>,
{
    use object::elf;
    use object::read::elf::SectionHeader;

    let header = Elf::parse(mem).ok()?;
    let e = header.endian().ok()?;
    // Only the offset and size of the sections are needed, the names are not
    // resolved. Stripped files may not have a section name table at all.
    let section_headers = header.section_headers(e, mem).ok()?;

    Some(
        section_headers
            .iter()
            .map(|section| {
                // Those sections have no content in the file.
                if matches!(section.sh_type(e), elf::SHT_NULL | elf::SHT_NOBITS) {
                    Section::new(Some(0..0))
                } else {
                    Section::new(region(
                        section.sh_offset(e).into(),
                        section.sh_size(e).into(),
                        mem.len(),
                    ))
                }
            })
            .collect(),
    )
}
