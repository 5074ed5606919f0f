//! Selection of atoms, the byte strings fed to the Aho-Corasick automaton.
//!
//! An atom is a byte string contained in every possible match of a pattern:
//!
//! - If an atom is found, then the pattern may be present.
//! - If no atoms are found, then the pattern cannot be found.
//!
//! Atoms are selected by computing a rank for each candidate: the higher the rank, the rarer
//! the atom should be in scanned bytes, and thus the lower the rate of matches that must be
//! confirmed.
use std::ops::Range;

/// Maximum size of an atom extracted from a literal and used in the AC scan.
const ATOM_SIZE: usize = 4;

/// Pick a shorter atom from a literal.
///
/// This returns a tuple of:
/// - the offset to add to the start of the literal, in order to get the start of the atom.
/// - the offset to substract from the end of the literal, in order to get the end of the atom.
pub fn pick_atom_in_literal(lit: &[u8]) -> (usize, usize) {
    if lit.len() <= ATOM_SIZE {
        return (0, 0);
    }

    lit.windows(ATOM_SIZE)
        .enumerate()
        .max_by_key(|(_, s)| atom_rank(s))
        .map_or((0, 0), |(i, _)| (i, lit.len() - i - ATOM_SIZE))
}

/// Pick the anchor of a masked byte sequence.
///
/// The anchor is the longest run of fully fixed bytes. Between runs of the same length, the
/// one containing the best atom is preferred.
///
/// Returns None if no byte is fully fixed.
pub fn pick_anchor(masks: &[u8], bytes: &[u8]) -> Option<Range<usize>> {
    let mut best: Option<(Range<usize>, u32)> = None;

    let mut i = 0;
    while i < masks.len() {
        if masks[i] != 0xFF {
            i += 1;
            continue;
        }
        let start = i;
        while i < masks.len() && masks[i] == 0xFF {
            i += 1;
        }
        let rank = literal_rank(&bytes[start..i]);

        let better = match &best {
            None => true,
            Some((range, best_rank)) => {
                (i - start) > range.len() || ((i - start) == range.len() && rank > *best_rank)
            }
        };
        if better {
            best = Some((start..i, rank));
        }
    }

    best.map(|(range, _)| range)
}

/// Rank of the best atom contained in a literal.
fn literal_rank(lit: &[u8]) -> u32 {
    if lit.len() > ATOM_SIZE {
        lit.windows(ATOM_SIZE).map(atom_rank).max().unwrap_or(0)
    } else {
        atom_rank(lit)
    }
}

/// Compute the rank of an atom.
///
/// The higher the value, the best quality (i.e., the less false positives).
fn atom_rank(atom: &[u8]) -> u32 {
    let mut quality = 0_u32;
    let mut bitmask = [false; 256];
    let mut nb_uniq = 0;

    for b in atom {
        quality += byte_rank(*b);

        if !bitmask[usize::from(*b)] {
            bitmask[usize::from(*b)] = true;
            nb_uniq += 1;
        }
    }

    // If all the bytes in the atom are equal and very common, penalize it heavily.
    if nb_uniq == 1 && (bitmask[0] || bitmask[0x20] || bitmask[0xCC] || bitmask[0xFF]) {
        quality = quality.saturating_sub(10 * u32::try_from(atom.len()).unwrap_or(30));
    }
    // Atoms with more unique bytes have a better quality.
    else {
        quality += 2 * nb_uniq;
    }

    quality
}

fn byte_rank(b: u8) -> u32 {
    match b {
        0x00 | 0x20 | 0xCC | 0xFF => 12,
        v if v.is_ascii_lowercase() => 18,
        _ => 20,
    }
}
