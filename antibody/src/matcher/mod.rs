//! Searchable forms of the patterns declared in rules.
//!
//! Every pattern is compiled into a [`Matcher`]: a list of literals to search for, and the way
//! a match on one of those literals is confirmed.
//!
//! - Text patterns are expanded into one literal per variant: the plain text, or one literal
//!   per xor key, each of them possibly encoded in base64 in its three phases. Case insensitivity
//!   is not expanded: literals are searched case insensitively and confirmed with the right
//!   comparison.
//! - Hex strings without wildcards are a single plain literal.
//! - Hex strings with wildcards are searched through their anchor, the longest run of fixed
//!   bytes, and confirmed by applying the masks on the bytes surrounding the anchor.
use antibody_parser::hex_string::Token;
use antibody_parser::rule::PatternModifiers;

use crate::atoms::pick_anchor;

mod base64;

/// Transformation applied on a pattern to get the literal that was found.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    /// The pattern as declared.
    Plain,

    /// Pattern xored with a single byte key.
    Xor(u8),

    /// Pattern encoded in base64.
    Base64 {
        /// Number of bytes preceding the pattern in the encoded stream, modulo 3.
        phase: u8,
    },

    /// Pattern xored with a single byte key, then encoded in base64.
    XorBase64 {
        /// Key of the xor.
        key: u8,
        /// Number of bytes preceding the xored pattern in the encoded stream, modulo 3.
        phase: u8,
    },
}

#[derive(Debug)]
pub(crate) struct Matcher {
    /// Literals to search for.
    ///
    /// Any match of the pattern contains one of those literals.
    pub(crate) literals: Vec<Vec<u8>>,

    kind: MatcherKind,
}

#[derive(Debug)]
enum MatcherKind {
    /// Every literal is a complete form of the pattern.
    Literals {
        /// Transformation applied to get each literal, in the same order as the literals.
        transforms: Vec<Transform>,

        /// Literals are compared case insensitively.
        nocase: bool,
    },

    /// The single literal is the anchor of a masked byte sequence.
    Masked {
        /// Fixed bits of each byte.
        bytes: Vec<u8>,

        /// Mask selecting the fixed bits of each byte.
        masks: Vec<u8>,

        /// Offset of the anchor in the byte sequence.
        anchor_start: usize,
    },
}

impl Matcher {
    /// Build the matcher of a text pattern.
    ///
    /// Returns None if no variant of the pattern contains any byte to search for.
    pub(crate) fn new_text(text: &[u8], modifiers: &PatternModifiers) -> Option<Self> {
        let forms: Vec<(Vec<u8>, Option<u8>)> = match modifiers.xor {
            Some((from, to)) => (from..=to)
                .map(|key| (text.iter().map(|b| b ^ key).collect(), Some(key)))
                .collect(),
            None => vec![(text.to_vec(), None)],
        };

        let mut literals = Vec::new();
        let mut transforms = Vec::new();
        for (bytes, key) in forms {
            if modifiers.base64 {
                for phase in 0..base64::NB_PHASES {
                    if let Some(encoded) = base64::encode_base64(&bytes, phase) {
                        literals.push(encoded);
                        transforms.push(match key {
                            Some(key) => Transform::XorBase64 { key, phase },
                            None => Transform::Base64 { phase },
                        });
                    }
                }
            } else if !bytes.is_empty() {
                literals.push(bytes);
                transforms.push(key.map_or(Transform::Plain, Transform::Xor));
            }
        }

        if literals.is_empty() {
            return None;
        }
        Some(Self {
            literals,
            kind: MatcherKind::Literals {
                transforms,
                nocase: modifiers.nocase,
            },
        })
    }

    /// Build the matcher of a hex string.
    ///
    /// Returns None if no byte of the hex string is fully fixed.
    pub(crate) fn new_hex(tokens: &[Token]) -> Option<Self> {
        let (bytes, masks): (Vec<u8>, Vec<u8>) = tokens.iter().map(Token::value_and_mask).unzip();

        let anchor = pick_anchor(&masks, &bytes)?;
        if anchor.len() == bytes.len() {
            return Some(Self {
                literals: vec![bytes],
                kind: MatcherKind::Literals {
                    transforms: vec![Transform::Plain],
                    nocase: false,
                },
            });
        }

        Some(Self {
            literals: vec![bytes[anchor.clone()].to_vec()],
            kind: MatcherKind::Masked {
                bytes,
                masks,
                anchor_start: anchor.start,
            },
        })
    }

    /// Confirm a possible match of a literal, starting at `start` in `mem`.
    ///
    /// Returns the offset of the match of the whole pattern, and the transformation of the
    /// pattern that was found.
    pub(crate) fn confirm(
        &self,
        mem: &[u8],
        literal_index: usize,
        start: usize,
    ) -> Option<(usize, Transform)> {
        match &self.kind {
            MatcherKind::Literals { transforms, nocase } => {
                let lit = self.literals.get(literal_index)?;
                let window = mem.get(start..start.checked_add(lit.len())?)?;
                let found = if *nocase {
                    window.eq_ignore_ascii_case(lit)
                } else {
                    window == lit.as_slice()
                };
                if found {
                    Some((start, *transforms.get(literal_index)?))
                } else {
                    None
                }
            }
            MatcherKind::Masked {
                bytes,
                masks,
                anchor_start,
            } => {
                let start = start.checked_sub(*anchor_start)?;
                let window = mem.get(start..start.checked_add(bytes.len())?)?;
                let found = window
                    .iter()
                    .zip(bytes.iter().zip(masks))
                    .all(|(b, (value, mask))| (b & mask) == *value);
                if found {
                    Some((start, Transform::Plain))
                } else {
                    None
                }
            }
        }
    }
}
