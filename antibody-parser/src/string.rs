//! Parsing related to strings and identifiers.

use nom::bytes::complete::take_while;
use nom::character::complete::char;
use nom::combinator::{cut, map, opt, recognize};
use nom::error::{ErrorKind as NomErrorKind, ParseError};
use nom::sequence::{pair, preceded};
use nom::Parser;

use super::error::Error;
use super::nom_recipes::{rtrim, take_one};
use super::types::{Input, ParseResult};

/// Returns true if the char is an identifier digit, ie a-z, a-Z, 0-9, _
fn is_identifier_digit(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

/// Parse the contents of an identifier, after its sigil.
///
/// Does not right-trim, a `*` wildcard can follow.
fn identifier_contents(input: Input) -> ParseResult<String> {
    map(take_while(is_identifier_digit), |input: Input| {
        input.cursor().to_owned()
    })
    .parse(input)
}

fn pattern_identifier_no_rtrim(input: Input) -> ParseResult<String> {
    preceded(char('$'), cut(identifier_contents)).parse(input)
}

/// Parse a pattern identifier, roughly `$[a-zA-Z0-9_]*`.
pub(crate) fn pattern_identifier(input: Input) -> ParseResult<String> {
    rtrim(pattern_identifier_no_rtrim).parse(input)
}

/// Parse a pattern identifier with an optional trailing wildcard.
///
/// The boolean is true if the wildcard is present, ie the identifier
/// names a group of patterns sharing the prefix.
pub(crate) fn pattern_identifier_with_wildcard(input: Input) -> ParseResult<(String, bool)> {
    rtrim(pair(
        pattern_identifier_no_rtrim,
        map(opt(char('*')), |v| v.is_some()),
    ))
    .parse(input)
}

/// Parse an identifier, roughly `[a-zA-Z_][a-zA-Z0-9_]*`.
pub(crate) fn identifier(input: Input) -> ParseResult<String> {
    rtrim(map(
        recognize((
            take_one(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '_')),
            cut(take_while(is_identifier_digit)),
        )),
        |input| input.cursor().to_owned(),
    ))
    .parse(input)
}

/// Parse a quoted string with escapable characters.
///
/// Recognized escapes are `\t`, `\r`, `\n`, `\"`, `\\`, and `\x[0-9a-fA-F]{2}`.
/// Non ascii characters are kept as their utf-8 encoding, hence returning
/// a byte string.
pub(crate) fn quoted(input: Input) -> ParseResult<Vec<u8>> {
    rtrim(quoted_no_rtrim).parse(input)
}

fn quoted_no_rtrim(input: Input) -> ParseResult<Vec<u8>> {
    let (mut input, _) = char('"').parse(input)?;

    let mut index = 0;
    let mut res = Vec::new();

    let mut chars = input.cursor().char_indices();

    while let Some((i, c)) = chars.next() {
        index = i;
        match c {
            '\\' => match chars.next() {
                Some((_, 't')) => res.push(b'\t'),
                Some((_, 'r')) => res.push(b'\r'),
                Some((_, 'n')) => res.push(b'\n'),
                Some((_, '"')) => res.push(b'"'),
                Some((_, '\\')) => res.push(b'\\'),
                Some((_, 'x')) => match (chars.next(), chars.next()) {
                    (Some((i1, a)), Some((i2, b))) => {
                        let Some(a) = a.to_digit(16) else {
                            index = i1;
                            break;
                        };
                        let Some(b) = b.to_digit(16) else {
                            index = i2;
                            break;
                        };
                        #[allow(clippy::cast_possible_truncation)]
                        res.push(((a as u8) << 4) | (b as u8));
                    }
                    _ => break,
                },
                Some((j, _)) => {
                    index = j;
                    break;
                }
                None => break,
            },
            '\n' => break,
            '"' => {
                input.advance(i + 1);
                return Ok((input, res));
            }
            c => {
                let mut buf = [0; 4];
                res.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    input.advance(index);
    Err(nom::Err::Error(Error::from_error_kind(
        input,
        NomErrorKind::EscapedTransform,
    )))
}
