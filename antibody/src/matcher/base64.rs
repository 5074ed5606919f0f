//! Base64 forms of a pattern.
//!
//! When a pattern is embedded in a base64 encoded stream, its encoding depends on the number of
//! bytes preceding it, modulo 3. Those are the three phases of a pattern. For each phase, the
//! encoded characters that also depend on the bytes surrounding the pattern are dropped.
//!
//! Patterns are encoded once, when compiling the rule, so this is done by hand rather than
//! through a base64 crate, which would need the surrounding characters to be cut afterwards.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Number of phases of a base64 encoding.
pub(crate) const NB_PHASES: u8 = 3;

/// Encode a byte string in base64, for a given phase.
///
/// The phase is the number of bytes preceding the string in the encoded stream, modulo 3.
///
/// Returns None if the string is too short to produce any character that only depends on it.
pub(crate) fn encode_base64(s: &[u8], phase: u8) -> Option<Vec<u8>> {
    let mut res = Vec::with_capacity(s.len() * 4 / 3 + 2);

    let rest = match phase % NB_PHASES {
        1 => {
            // Encode [?, s[0], s[1]]: only the last two characters are known.
            let [a, b, rest @ ..] = s else {
                return None;
            };
            let v = (u32::from(*a) << 8) | u32::from(*b);
            res.push(char_at(v >> 6));
            res.push(char_at(v));
            rest
        }
        2 => {
            // Encode [?, ?, s[0]]: only the last character is known.
            let [a, rest @ ..] = s else {
                return None;
            };
            res.push(char_at(u32::from(*a)));
            rest
        }
        _ => s,
    };

    let mut iter = rest.chunks_exact(3);
    for chunk in &mut iter {
        let v = (u32::from(chunk[0]) << 16) | (u32::from(chunk[1]) << 8) | u32::from(chunk[2]);

        res.push(char_at(v >> 18));
        res.push(char_at(v >> 12));
        res.push(char_at(v >> 6));
        res.push(char_at(v));
    }

    match iter.remainder() {
        [a] => {
            // Encode [a, ?, ?]: only the first character is known.
            res.push(char_at(u32::from(*a) >> 2));
        }
        [a, b] => {
            // Encode [a, b, ?]: only the first two characters are known.
            let v = (u32::from(*a) << 8) | u32::from(*b);
            res.push(char_at(v >> 10));
            res.push(char_at(v >> 4));
        }
        _ => (),
    }

    if res.is_empty() {
        None
    } else {
        Some(res)
    }
}

fn char_at(v: u32) -> u8 {
    // Masked to 6 bits, always in bounds.
    ALPHABET[(v & 0x3F) as usize]
}
