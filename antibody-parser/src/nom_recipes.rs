//! Common nom recipes, shared by all other modules.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until};
use nom::character::complete::multispace1;
use nom::combinator::{cut, opt, value};
use nom::error::{ErrorKind as NomErrorKind, ParseError};
use nom::multi::many0;
use nom::Parser;

use super::error::{Error, ErrorKind};
use super::types::{Input, ParseResult};

/// Right trim after the given parser.
pub(crate) fn rtrim<'a, F, O>(mut inner: F) -> impl FnMut(Input<'a>) -> ParseResult<'a, O>
where
    F: Parser<Input<'a>, Output = O, Error = Error> + 'a,
{
    move |input| {
        let (mut input, output) = inner.parse(input)?;
        input.save_cursor_before_rtrim();
        let (input, _) = opt(many0(alt((
            multiline_comment,
            singleline_comment,
            value((), multispace1),
        ))))
        .parse(input)?;
        Ok((input, output))
    }
}

/// Left trim the input.
pub(crate) fn ltrim(mut input: Input) -> ParseResult<()> {
    loop {
        match alt((
            multiline_comment,
            singleline_comment,
            value((), multispace1),
        ))
        .parse(input)
        {
            Ok((i, ())) => input = i,
            Err(nom::Err::Error(_)) => return Ok((input, ())),
            err @ Err(_) => return err,
        }
    }
}

/// Accepts a single character if the passed function returns true on it.
pub(crate) fn take_one<F>(f: F) -> impl for<'a> Fn(Input<'a>) -> ParseResult<'a, char>
where
    F: Fn(char) -> bool,
{
    move |mut input| match input.cursor().chars().next().map(|c| (c, f(c))) {
        Some((c, true)) => {
            input.advance(c.len_utf8());
            Ok((input, c))
        }
        _ => Err(nom::Err::Error(Error::from_error_kind(
            input,
            NomErrorKind::Satisfy,
        ))),
    }
}

/// Recognize a textual tag.
///
/// Same as [`nom::bytes::complete::tag`], but the following character
/// must not be alphanumeric: `not` is not recognized in `nothing`.
pub(crate) fn textual_tag(
    tag: &'static str,
) -> impl for<'a> Fn(Input<'a>) -> ParseResult<'a, &'static str> {
    move |input: Input| {
        if let Some(input) = input.strip_prefix(tag) {
            match input.cursor().chars().next() {
                Some(c) if c.is_alphanumeric() || c == '_' => Err(nom::Err::Error(
                    Error::from_error_kind(input, NomErrorKind::Tag),
                )),
                _ => Ok((input, tag)),
            }
        } else {
            Err(nom::Err::Error(Error::from_error_kind(
                input,
                NomErrorKind::Tag,
            )))
        }
    }
}

/// Parse a C-style /* ... */ comment.
fn multiline_comment(input: Input) -> ParseResult<()> {
    value((), (tag("/*"), cut(take_until("*/")), cut(tag("*/")))).parse(input)
}

/// Parse single line // ... comments.
///
/// A comment on the last line does not need a trailing newline.
fn singleline_comment(input: Input) -> ParseResult<()> {
    let (mut input, _) = tag("//").parse(input)?;
    let len = input.cursor().find('\n').map_or(input.len(), |i| i + 1);
    input.advance(len);
    Ok((input, ()))
}

/// Equivalent to [`nom::combinator::map_res`] but expects an
/// [`ErrorKind`] type of error.
///
/// This allows using the starting input to generate a proper span
/// for the error.
pub(crate) fn map_res<'a, O1, O2, F, G>(
    mut parser: F,
    mut f: G,
) -> impl FnMut(Input<'a>) -> ParseResult<'a, O2>
where
    F: Parser<Input<'a>, Output = O1, Error = Error>,
    G: FnMut(O1) -> Result<O2, ErrorKind>,
{
    move |input: Input| {
        let start = input.pos();
        let (input, o1) = parser.parse(input)?;
        match f(o1) {
            Ok(o2) => Ok((input, o2)),
            Err(kind) => Err(nom::Err::Failure(Error::new(
                input.get_span_from(start),
                kind,
            ))),
        }
    }
}
