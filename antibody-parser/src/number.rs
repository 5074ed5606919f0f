//! Parsing related to numbers.
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, hex_digit1, oct_digit1};
use nom::combinator::{cut, opt, recognize};
use nom::error::ErrorKind as NomErrorKind;
use nom::sequence::{pair, preceded};
use nom::Parser;

use super::error::{Error, ErrorKind};
use super::nom_recipes::{map_res, rtrim, textual_tag as ttag};
use super::types::{Input, ParseResult};

/// Parse a decimal number.
///
/// This function matches the pattern `/\d+(MB|KB)?`/.
fn decimal_number(input: Input) -> ParseResult<i64> {
    let start = input.pos();
    let (input, (n, suffix)) =
        rtrim(pair(digit1, opt(alt((ttag("MB"), ttag("KB")))))).parse(input)?;

    let n = match str::parse::<i64>(&n) {
        Ok(n) => n,
        Err(e) => {
            return Err(nom::Err::Failure(Error::new(
                input.get_span_from(start),
                ErrorKind::StrToIntError(e),
            )))
        }
    };

    let coef = match suffix {
        Some("MB") => 1024 * 1024,
        Some("KB") => 1024,
        _ => return Ok((input, n)),
    };
    match n.checked_mul(coef) {
        Some(n) => Ok((input, n)),
        None => Err(nom::Err::Failure(Error::new(
            input.get_span_from(start),
            ErrorKind::MulOverflow {
                left: n,
                right: coef,
            },
        ))),
    }
}

/// Parse an hexadecimal number, `/0x[0-9a-fA-F]+/`.
fn hexadecimal_number(input: Input) -> ParseResult<i64> {
    preceded(
        tag("0x"),
        cut(map_res(rtrim(hex_digit1), |n: Input| {
            i64::from_str_radix(&n, 16).map_err(ErrorKind::StrToHexIntError)
        })),
    )
    .parse(input)
}

/// Parse an octal number, `/0o[0-7]+/`.
fn octal_number(input: Input) -> ParseResult<i64> {
    preceded(
        tag("0o"),
        cut(map_res(rtrim(oct_digit1), |n: Input| {
            i64::from_str_radix(&n, 8).map_err(ErrorKind::StrToOctIntError)
        })),
    )
    .parse(input)
}

/// Parse a number (integer).
///
/// Can be:
/// - hexadecimal with 0x prefix,
/// - octal with 0o prefix,
/// - decimal with optional KB/MB suffix.
pub(crate) fn number(input: Input) -> ParseResult<i64> {
    // Decimal must be last, it would otherwise eat the '0' of the prefixes.
    alt((hexadecimal_number, octal_number, decimal_number)).parse(input)
}

/// Parse a double, `/\d+\.\d+/`.
pub(crate) fn double(input: Input) -> ParseResult<f64> {
    map_res(
        rtrim(recognize((digit1, char('.'), digit1))),
        |payload: Input| {
            str::parse::<f64>(&payload).map_err(|_| ErrorKind::NomError(NomErrorKind::Float))
        },
    )
    .parse(input)
}
