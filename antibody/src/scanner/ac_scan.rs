//! Provides the [`AcScan`] object, used to scan for all patterns in a single AC pass.
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, AhoCorasickKind, BuildError, Input};

use super::ScanError;
use crate::atoms::pick_atom_in_literal;
use crate::compiler::pattern::Pattern;
use crate::matcher::Transform;
use crate::timeout::AbortChecker;

/// Size of the windows in which the scanned bytes are searched.
///
/// Abort conditions are checked between two windows.
const WINDOW_SIZE: usize = 1024 * 1024;

/// Factorize atoms from all patterns, to scan for them in a single pass.
///
/// For every pattern, atoms are extracted from the literals of its matcher. A single
/// Aho-Corasick object is built from all those atoms, and a single pass on the scanned bytes
/// is done with this object. For every match on an atom, the match is then confirmed to see if
/// it matches the whole pattern.
#[derive(Debug)]
pub(crate) struct AcScan {
    /// Aho Corasick for all the atoms.
    aho: AhoCorasick,

    /// Map from a aho pattern index to a list details on the literals.
    aho_index_to_literal_info: Vec<Vec<LiteralInfo>>,

    /// Length of the longest atom.
    max_atom_len: usize,
}

/// Details on a literal of a pattern.
#[derive(Debug)]
struct LiteralInfo {
    /// Index of the pattern in the patterns array.
    pattern_index: usize,

    /// Index of the literal for the pattern.
    literal_index: usize,

    /// Offset of the atom in the literal.
    atom_offset: usize,
}

/// First match found for a pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct FoundPattern {
    /// Offset of the match in the scanned bytes.
    pub offset: usize,

    /// Variant of the pattern that was found.
    pub transform: Transform,
}

impl AcScan {
    pub(crate) fn new(patterns: &[Pattern]) -> Result<Self, BuildError> {
        let mut lits = Vec::new();
        let mut known_lits = HashMap::new();
        let mut aho_index_to_literal_info = Vec::new();
        let mut max_atom_len = 0;

        for (pattern_index, pattern) in patterns.iter().enumerate() {
            for (literal_index, lit) in pattern.matcher.literals.iter().enumerate() {
                let (start, end) = pick_atom_in_literal(lit);
                let mut atom = lit[start..(lit.len() - end)].to_vec();
                let literal_info = LiteralInfo {
                    pattern_index,
                    literal_index,
                    atom_offset: start,
                };
                max_atom_len = max_atom_len.max(atom.len());

                // Patterns sharing the same atom are confirmed from the same AC match.
                // The AC is case insensitive, so normalize before de-duplicating.
                atom.make_ascii_lowercase();

                match known_lits.entry(atom.clone()) {
                    Entry::Vacant(v) => {
                        let _r = v.insert(lits.len());
                        aho_index_to_literal_info.push(vec![literal_info]);
                        lits.push(atom);
                    }
                    Entry::Occupied(o) => {
                        let index = o.get();
                        aho_index_to_literal_info[*index].push(literal_info);
                    }
                }
            }
        }

        // First try with a DFA for performances, otherwise let the crate pick the
        // implementation.
        let aho = match AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .kind(Some(AhoCorasickKind::DFA))
            .build(&lits)
        {
            Ok(aho) => aho,
            Err(_) => AhoCorasickBuilder::new()
                .ascii_case_insensitive(true)
                .build(&lits)?,
        };

        Ok(Self {
            aho,
            aho_index_to_literal_info,
            max_atom_len,
        })
    }

    /// Scan the bytes, and return the first match found for each pattern.
    pub(super) fn scan(
        &self,
        mem: &[u8],
        patterns: &[Pattern],
        checker: &mut AbortChecker,
    ) -> Result<Vec<Option<FoundPattern>>, ScanError> {
        self.scan_windows(mem, patterns, checker, WINDOW_SIZE)
    }

    fn scan_windows(
        &self,
        mem: &[u8],
        patterns: &[Pattern],
        checker: &mut AbortChecker,
        window_size: usize,
    ) -> Result<Vec<Option<FoundPattern>>, ScanError> {
        let mut found = vec![None; patterns.len()];
        let mut nb_remaining = patterns.len();

        // Windows overlap by the length of the longest atom minus one, so that every atom is
        // entirely contained in the window where it starts. Matches starting in the overlap
        // belong to the next window.
        let overlap = self.max_atom_len.saturating_sub(1);
        let mut window_start = 0;

        while window_start < mem.len() && nb_remaining > 0 {
            checker.check_now()?;

            let window_end = window_start.saturating_add(window_size).min(mem.len());
            let search_end = window_end.saturating_add(overlap).min(mem.len());
            let input = Input::new(mem).range(window_start..search_end);

            for mat in self.aho.find_overlapping_iter(input) {
                if mat.start() >= window_end {
                    continue;
                }
                checker.check()?;

                for info in &self.aho_index_to_literal_info[mat.pattern().as_usize()] {
                    if found[info.pattern_index].is_some() {
                        continue;
                    }
                    let Some(literal_start) = mat.start().checked_sub(info.atom_offset) else {
                        continue;
                    };
                    let matcher = &patterns[info.pattern_index].matcher;
                    if let Some((offset, transform)) =
                        matcher.confirm(mem, info.literal_index, literal_start)
                    {
                        found[info.pattern_index] = Some(FoundPattern { offset, transform });
                        nb_remaining -= 1;
                    }
                }

                if nb_remaining == 0 {
                    break;
                }
            }

            window_start = window_end;
        }

        Ok(found)
    }
}
