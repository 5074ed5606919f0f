//! AST objects related to hex strings.
use nom::character::complete::char;
use nom::combinator::{cut, success};
use nom::error::{ErrorKind as NomErrorKind, ParseError};
use nom::multi::many1;
use nom::sequence::terminated;
use nom::Parser;

use super::error::{Error, ErrorKind};
use super::nom_recipes::rtrim;
use super::types::{Input, ParseResult};

/// A token in an hex string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// A fully declared byte, eg `9C`
    Byte(u8),
    /// A masked byte, eg `?5`, `C?`, `??`
    ///
    /// The value only holds the unmasked nibble, in its position in the
    /// byte: `C?` is `MaskedByte(0xC0, Mask::Right)`.
    MaskedByte(u8, Mask),
}

/// Mask on a byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mask {
    /// The left part is masked, ie ?X
    Left,
    /// The right part is masked, ie X?
    Right,
    /// Both parts are masked, ie ??
    All,
}

impl Token {
    /// Fixed bits of the token, and the mask selecting them.
    #[must_use]
    pub fn value_and_mask(&self) -> (u8, u8) {
        match self {
            Self::Byte(b) => (*b, 0xFF),
            Self::MaskedByte(b, Mask::Left) => (*b & 0x0F, 0x0F),
            Self::MaskedByte(b, Mask::Right) => (*b & 0xF0, 0xF0),
            Self::MaskedByte(_, Mask::All) => (0, 0),
        }
    }
}

/// Parse a hex string.
///
/// The input is expected to look like `{ AB .. }`.
///
/// # Errors
///
/// Returns an error if the parsing fails.
pub fn parse_hex_string(input: &str) -> Result<Vec<Token>, Error> {
    use nom::Finish;

    let input = Input::new(input);
    let (_, tokens) = hex_string(input).finish()?;

    Ok(tokens)
}

/// Parse an hex string, `{ AB ?? C? .. }`.
pub(crate) fn hex_string(input: Input) -> ParseResult<Vec<Token>> {
    let (input, _) = rtrim(char('{')).parse(input)?;

    cut(terminated(many1(token), rtrim(char('}')))).parse(input)
}

/// Parse a nibble: an hex-digit or a `?` wildcard.
fn nibble(mut input: Input) -> ParseResult<Option<u8>> {
    match input.cursor().chars().next() {
        Some('?') => {
            input.advance(1);
            Ok((input, None))
        }
        Some(c) => match c.to_digit(16) {
            Some(v) => {
                input.advance(1);
                // Cannot truncate, a hex digit is < 16.
                #[allow(clippy::cast_possible_truncation)]
                Ok((input, Some(v as u8)))
            }
            None => Err(nom::Err::Error(Error::from_error_kind(
                input,
                NomErrorKind::HexDigit,
            ))),
        },
        None => Err(nom::Err::Error(Error::from_error_kind(
            input,
            NomErrorKind::HexDigit,
        ))),
    }
}

/// Parse a byte token, made of two adjacent nibbles.
fn token(input: Input) -> ParseResult<Token> {
    let start = input.pos();
    let (input, high) = nibble(input)?;
    let (input, low) = match nibble(input) {
        Ok(v) => v,
        Err(nom::Err::Error(_)) => {
            let mut end = input;
            end.save_cursor_before_rtrim();
            return Err(nom::Err::Failure(Error::new(
                end.get_span_from(start),
                ErrorKind::HexStringHalfByte,
            )));
        }
        Err(e) => return Err(e),
    };

    let token = match (high, low) {
        (Some(h), Some(l)) => Token::Byte((h << 4) | l),
        (Some(h), None) => Token::MaskedByte(h << 4, Mask::Right),
        (None, Some(l)) => Token::MaskedByte(l, Mask::Left),
        (None, None) => Token::MaskedByte(0, Mask::All),
    };
    let (input, ()) = rtrim(success(())).parse(input)?;
    Ok((input, token))
}
