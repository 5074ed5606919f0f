//! Parse detection rules.
use std::collections::HashSet;
use std::ops::Range;

use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{cut, map, opt};
use nom::multi::many1;
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::Parser;

use super::error::{Error, ErrorKind};
use super::expression::{self, Expression};
use super::hex_string::{self, Token};
use super::nom_recipes::{map_res, rtrim, textual_tag as ttag};
use super::number;
use super::string;
use super::types::{Input, ParseResult};

/// A detection rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Name of the rule.
    pub name: String,

    /// Span of the name of the rule.
    pub name_span: Range<usize>,

    /// Tags associated with the rule.
    pub tags: Vec<String>,

    /// Metadata associated with the rule.
    pub metadatas: Vec<Metadata>,

    /// Patterns declared in the `strings:` section.
    pub patterns: Vec<PatternDeclaration>,

    /// Condition of the rule.
    pub condition: Expression,
}

/// Value associated with a metadata key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataValue {
    /// Quoted string. Escapes can produce non utf-8 bytes.
    Bytes(Vec<u8>),
    /// Integer, possibly negative.
    Integer(i64),
    /// `true` or `false`.
    Boolean(bool),
}

/// A metadata key-value, associated with a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Name of the metadata.
    pub name: String,
    /// Value of the metadata.
    pub value: MetadataValue,
}

/// Value of a declared pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternValue {
    /// A text string, `"..."`.
    Text(Vec<u8>),
    /// A hex string, `{ ... }`.
    Bytes(Vec<Token>),
}

/// Modifiers applied on a text pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternModifiers {
    /// `nocase`: match any casing of the ascii letters.
    pub nocase: bool,

    /// `xor`: inclusive range of single-byte keys.
    pub xor: Option<(u8, u8)>,

    /// `base64`: match the base64 encodings of the pattern.
    pub base64: bool,
}

/// A pattern declared in a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternDeclaration {
    /// Name of the pattern, without the `$` sigil.
    pub name: String,
    /// Value of the pattern.
    pub value: PatternValue,
    /// Modifiers of the pattern.
    pub modifiers: PatternModifiers,
    /// Span covering the whole declaration.
    pub span: Range<usize>,
}

/// Parse a rule.
pub(crate) fn rule(input: Input) -> ParseResult<Rule> {
    let (input, _) = rtrim(ttag("rule")).parse(input)?;

    let start = input.pos();
    let (input, name) = cut(string::identifier).parse(input)?;
    let name_span = input.get_span_from(start);

    let (input, (tags, (metadatas, patterns, condition))) = cut(pair(
        opt(tags),
        delimited(
            rtrim(char('{')),
            (opt(meta), opt(patterns), condition),
            rtrim(char('}')),
        ),
    ))
    .parse(input)?;

    Ok((
        input,
        Rule {
            name,
            name_span,
            tags: tags.unwrap_or_default(),
            metadatas: metadatas.unwrap_or_default(),
            patterns: patterns.unwrap_or_default(),
            condition,
        },
    ))
}

/// Parse the name following the `rule` keyword, without the rest of it.
pub(crate) fn rule_name(input: Input) -> ParseResult<String> {
    preceded(rtrim(ttag("rule")), string::identifier).parse(input)
}

/// Parse a list of tags, `: tag1 tag2 ...`.
fn tags(input: Input) -> ParseResult<Vec<String>> {
    let (input, _) = rtrim(char(':')).parse(input)?;

    cut(many1(string::identifier)).parse(input)
}

/// Parse the `meta:` section in a rule.
fn meta(input: Input) -> ParseResult<Vec<Metadata>> {
    preceded(
        pair(rtrim(ttag("meta")), rtrim(char(':'))),
        cut(many1(meta_declaration)),
    )
    .parse(input)
}

/// Parse a single metadata declaration.
fn meta_declaration(input: Input) -> ParseResult<Metadata> {
    map(
        separated_pair(
            string::identifier,
            rtrim(char('=')),
            cut(alt((
                map(string::quoted, MetadataValue::Bytes),
                map(number::number, MetadataValue::Integer),
                map(preceded(rtrim(char('-')), number::number), |v| {
                    MetadataValue::Integer(-v)
                }),
                map(rtrim(ttag("true")), |_| MetadataValue::Boolean(true)),
                map(rtrim(ttag("false")), |_| MetadataValue::Boolean(false)),
            ))),
        ),
        |(name, value)| Metadata { name, value },
    )
    .parse(input)
}

/// Parse the `strings:` section.
fn patterns(input: Input) -> ParseResult<Vec<PatternDeclaration>> {
    let (mut input, _) = pair(rtrim(ttag("strings")), rtrim(char(':'))).parse(input)?;

    let mut names = HashSet::new();
    let mut decls = Vec::new();
    loop {
        let res = if decls.is_empty() {
            cut(pattern_declaration).parse(input)
        } else {
            pattern_declaration(input)
        };
        match res {
            Ok((i, decl)) => {
                if !names.insert(decl.name.clone()) {
                    return Err(nom::Err::Failure(Error::new(
                        decl.span,
                        ErrorKind::PatternDeclarationDuplicated { name: decl.name },
                    )));
                }
                decls.push(decl);
                input = i;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((input, decls))
}

/// Parse a single pattern declaration, `$name = value modifiers`.
fn pattern_declaration(input: Input) -> ParseResult<PatternDeclaration> {
    let start = input.pos();
    let (input, name) = string::pattern_identifier(input)?;
    if name.is_empty() {
        return Err(nom::Err::Failure(Error::new(
            input.get_span_from(start),
            ErrorKind::PatternEmptyIdentifier,
        )));
    }

    let (input, (value, modifiers)) = preceded(
        cut(rtrim(char('='))),
        cut(alt((
            pair(map(string::quoted, PatternValue::Text), text_modifiers),
            map(hex_string::hex_string, |tokens| {
                (PatternValue::Bytes(tokens), PatternModifiers::default())
            }),
        ))),
    )
    .parse(input)?;

    Ok((
        input,
        PatternDeclaration {
            name,
            value,
            modifiers,
            span: input.get_span_from(start),
        },
    ))
}

/// A single parsed modifier.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Modifier {
    Nocase,
    Xor(u8, u8),
    Base64,
}

impl Modifier {
    fn name(&self) -> &'static str {
        match self {
            Self::Nocase => "nocase",
            Self::Xor(..) => "xor",
            Self::Base64 => "base64",
        }
    }
}

/// Parse the modifiers following a text pattern.
fn text_modifiers(mut input: Input) -> ParseResult<PatternModifiers> {
    let start = input.pos();
    let mut modifiers = PatternModifiers::default();

    loop {
        let modifier_start = input.pos();
        let (i, modifier) = match modifier(input) {
            Ok(v) => v,
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        };
        let duplicated = match modifier {
            Modifier::Nocase => std::mem::replace(&mut modifiers.nocase, true),
            Modifier::Xor(from, to) => modifiers.xor.replace((from, to)).is_some(),
            Modifier::Base64 => std::mem::replace(&mut modifiers.base64, true),
        };
        if duplicated {
            return Err(nom::Err::Failure(Error::new(
                i.get_span_from(modifier_start),
                ErrorKind::ModifiersDuplicated {
                    modifier_name: modifier.name().to_owned(),
                },
            )));
        }
        input = i;
    }

    if modifiers.nocase {
        let other = if modifiers.xor.is_some() {
            Some("xor")
        } else if modifiers.base64 {
            Some("base64")
        } else {
            None
        };
        if let Some(other) = other {
            return Err(nom::Err::Failure(Error::new(
                input.get_span_from(start),
                ErrorKind::ModifiersIncompatible {
                    first_modifier_name: other.to_owned(),
                    second_modifier_name: "nocase".to_owned(),
                },
            )));
        }
    }

    Ok((input, modifiers))
}

fn modifier(input: Input) -> ParseResult<Modifier> {
    alt((
        map(rtrim(ttag("nocase")), |_| Modifier::Nocase),
        map(rtrim(ttag("base64")), |_| Modifier::Base64),
        xor_modifier,
    ))
    .parse(input)
}

/// Parse a XOR modifier, ie:
/// - `'xor'`
/// - `'xor' '(' number ')'`
/// - `'xor' '(' number '-' number ')'`
fn xor_modifier(input: Input) -> ParseResult<Modifier> {
    let (input, _) = rtrim(ttag("xor")).parse(input)?;

    let start = input.pos();
    let (input, open_paren) = opt(rtrim(char('('))).parse(input)?;
    if open_paren.is_none() {
        return Ok((input, Modifier::Xor(1, 255)));
    }

    let (input, from) = cut(map_res(number::number, number_to_u8)).parse(input)?;

    let (input, to) = cut(terminated(
        opt(preceded(
            rtrim(char('-')),
            map_res(number::number, number_to_u8),
        )),
        rtrim(char(')')),
    ))
    .parse(input)?;

    let res = match to {
        Some(to) => {
            if to < from {
                return Err(nom::Err::Failure(Error::new(
                    input.get_span_from(start),
                    ErrorKind::XorRangeInvalid { from, to },
                )));
            }
            Modifier::Xor(from, to)
        }
        None => Modifier::Xor(from, from),
    };
    Ok((input, res))
}

fn number_to_u8(value: i64) -> Result<u8, ErrorKind> {
    u8::try_from(value).map_err(|_| ErrorKind::XorRangeInvalidValue { value })
}

/// Parse the condition, `condition: expression`.
fn condition(input: Input) -> ParseResult<Expression> {
    let (input, _) = rtrim(ttag("condition")).parse(input)?;
    cut(preceded(rtrim(char(':')), expression::expression)).parse(input)
}
