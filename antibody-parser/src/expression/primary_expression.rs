//! Parsing of the operands of boolean expressions: `of` expressions,
//! comparisons, keywords and symbols.
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{cut, map, opt};
use nom::error::{ErrorKind as NomErrorKind, ParseError};
use nom::multi::separated_list1;
use nom::sequence::{delimited, pair};
use nom::Parser;

use super::{
    CmpOperator, Expression, ExpressionKind, Field, FieldKind, IntegerSize, PatternSet,
    Selection, SetElement, Value,
};
use crate::error::Error;
use crate::nom_recipes::{rtrim, textual_tag as ttag};
use crate::number::{double, number};
use crate::string::{identifier, pattern_identifier_with_wildcard};
use crate::types::{Input, ParseResult};

/// Words that cannot be used as external symbol names.
const KEYWORDS: &[&str] = &[
    "all",
    "and",
    "any",
    "condition",
    "entropy",
    "false",
    "filesize",
    "header_magic",
    "meta",
    "not",
    "of",
    "or",
    "rule",
    "strings",
    "them",
    "true",
    "uint16",
    "uint32",
    "uint8",
    "valid_header",
];

/// Parse the name of an external symbol.
fn symbol(input: Input) -> ParseResult<String> {
    let (next, name) = identifier(input)?;
    if KEYWORDS.contains(&name.as_str()) {
        return Err(nom::Err::Error(Error::from_error_kind(
            input,
            NomErrorKind::Verify,
        )));
    }
    Ok((next, name))
}

/// Parse `<selection> of <set>`.
pub(super) fn of_expression(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (input, selection) = selection(input)?;
    let (input, _) = rtrim(ttag("of")).parse(input)?;
    let (input, set) = cut(pattern_set).parse(input)?;

    Ok((
        input,
        Expression {
            expr: ExpressionKind::Of { selection, set },
            span: input.get_span_from(start),
        },
    ))
}

fn selection(input: Input) -> ParseResult<Selection> {
    alt((
        map(symbol, Selection::Symbol),
        map(rtrim(ttag("any")), |_| Selection::Any),
        map(rtrim(ttag("all")), |_| Selection::All),
        map(number, |n| Selection::Count(n.unsigned_abs())),
    ))
    .parse(input)
}

/// Parse `them` or `( $a, $b*, ... )`.
fn pattern_set(input: Input) -> ParseResult<PatternSet> {
    alt((
        map(rtrim(ttag("them")), |_| PatternSet {
            elements: Vec::new(),
        }),
        map(
            delimited(
                rtrim(char('(')),
                separated_list1(rtrim(char(',')), set_element),
                rtrim(char(')')),
            ),
            |elements| PatternSet { elements },
        ),
    ))
    .parse(input)
}

fn set_element(input: Input) -> ParseResult<SetElement> {
    let start = input.pos();
    let (input, (name, is_wildcard)) = pattern_identifier_with_wildcard(input)?;

    Ok((
        input,
        SetElement {
            name,
            is_wildcard,
            span: input.get_span_from(start),
        },
    ))
}

/// Parse `<field> <op> <value>`.
pub(super) fn comparison(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (input, field) = field(input)?;
    let (input, (op, value)) = cut(pair(operator, value)).parse(input)?;

    Ok((
        input,
        Expression {
            expr: ExpressionKind::Comparison { field, op, value },
            span: input.get_span_from(start),
        },
    ))
}

fn field(input: Input) -> ParseResult<Field> {
    let start = input.pos();
    let (input, kind) = alt((
        map(rtrim(ttag("filesize")), |_| FieldKind::Filesize),
        map(rtrim(ttag("header_magic")), |_| FieldKind::HeaderMagic),
        entropy_field,
        read_integer_field,
    ))
    .parse(input)?;

    Ok((
        input,
        Field {
            kind,
            span: input.get_span_from(start),
        },
    ))
}

/// Parse `entropy` or `entropy(index)`.
fn entropy_field(input: Input) -> ParseResult<FieldKind> {
    let (input, _) = rtrim(ttag("entropy")).parse(input)?;
    let (input, index) = opt(delimited(
        rtrim(char('(')),
        cut(number),
        cut(rtrim(char(')'))),
    ))
    .parse(input)?;

    Ok((
        input,
        match index {
            Some(index) => FieldKind::SectionEntropy(index.unsigned_abs()),
            None => FieldKind::Entropy,
        },
    ))
}

/// Parse `uint8(offset)`, `uint16(offset)` or `uint32(offset)`.
fn read_integer_field(input: Input) -> ParseResult<FieldKind> {
    let (input, size) = rtrim(alt((
        map(ttag("uint8"), |_| IntegerSize::U8),
        map(ttag("uint16"), |_| IntegerSize::U16),
        map(ttag("uint32"), |_| IntegerSize::U32),
    )))
    .parse(input)?;
    let (input, offset) =
        cut(delimited(rtrim(char('(')), number, rtrim(char(')')))).parse(input)?;

    Ok((
        input,
        FieldKind::ReadInteger {
            size,
            offset: offset.unsigned_abs(),
        },
    ))
}

fn operator(input: Input) -> ParseResult<CmpOperator> {
    rtrim(alt((
        map(tag("<="), |_| CmpOperator::LessOrEqual),
        map(tag(">="), |_| CmpOperator::GreaterOrEqual),
        map(tag("=="), |_| CmpOperator::Equal),
        map(tag("<"), |_| CmpOperator::Less),
        map(tag(">"), |_| CmpOperator::Greater),
    )))
    .parse(input)
}

fn value(input: Input) -> ParseResult<Value> {
    alt((
        map(symbol, Value::Symbol),
        map(double, Value::Float),
        map(number, Value::Integer),
    ))
    .parse(input)
}

/// Parse the keywords usable as boolean operands, or a boolean symbol.
pub(super) fn simple_item(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (input, expr) = alt((
        map(rtrim(ttag("true")), |_| ExpressionKind::Boolean(true)),
        map(rtrim(ttag("false")), |_| ExpressionKind::Boolean(false)),
        map(rtrim(ttag("valid_header")), |_| ExpressionKind::ValidHeader),
        map(symbol, ExpressionKind::Symbol),
    ))
    .parse(input)?;

    Ok((
        input,
        Expression {
            expr,
            span: input.get_span_from(start),
        },
    ))
}
