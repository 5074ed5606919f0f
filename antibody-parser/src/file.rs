//! Parse whole rule documents.
use nom::error::{ErrorKind as NomErrorKind, ParseError};

use super::error::Error;
use super::nom_recipes::ltrim;
use super::rule::{rule, rule_name, Rule};
use super::types::{Input, ParseResult};

/// A parsed rule document.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleFile {
    /// Rules declared in the document, in order.
    pub rules: Vec<Rule>,
}

/// A rule document parsed with error recovery.
#[derive(Clone, Debug, PartialEq)]
pub struct RecoveredFile {
    /// Rules that were parsed successfully.
    pub rules: Vec<Rule>,

    /// Errors on the rules that could not be parsed.
    pub errors: Vec<RuleParseError>,
}

/// Error on a single rule of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleParseError {
    /// Name of the rule, if the parsing went far enough to read it.
    pub rule_name: Option<String>,

    /// The parsing error.
    pub error: Error,
}

/// Parse a document, failing on the first error.
pub(crate) fn rule_file(input: Input) -> ParseResult<RuleFile> {
    let (mut input, ()) = ltrim(input)?;

    let mut rules = Vec::new();
    while !input.is_empty() {
        let (i, rule) = rule(input)?;
        rules.push(rule);
        input = i;
    }

    Ok((input, RuleFile { rules }))
}

/// Parse a document, skipping the rules that cannot be parsed.
///
/// After an error, parsing resumes on the next `rule` keyword following the
/// start of the invalid rule, so that a rule is never dropped without an
/// error being reported.
pub(crate) fn rule_file_with_recovery(input: Input) -> RecoveredFile {
    let mut rules = Vec::new();
    let mut errors = Vec::new();

    let mut input = match ltrim(input) {
        Ok((input, ())) => input,
        Err(e) => {
            errors.push(RuleParseError {
                rule_name: None,
                error: into_error(e, input),
            });
            return RecoveredFile { rules, errors };
        }
    };

    while !input.is_empty() {
        match rule(input) {
            Ok((i, rule)) => {
                rules.push(rule);
                input = i;
            }
            Err(e) => {
                errors.push(RuleParseError {
                    rule_name: rule_name(input).ok().map(|(_, name)| name),
                    error: into_error(e, input),
                });
                match next_rule_start(input) {
                    Some(i) => input = i,
                    None => break,
                }
            }
        }
    }

    RecoveredFile { rules, errors }
}

/// Find the next `rule` keyword, after the start of the current input.
///
/// The keyword must not be part of a longer identifier, and must be followed
/// by a whitespace.
fn next_rule_start(mut input: Input) -> Option<Input> {
    let cursor = input.cursor();
    let mut offset = cursor.chars().next()?.len_utf8();

    loop {
        let pos = offset + cursor.get(offset..)?.find("rule")?;
        offset = pos + "rule".len();

        let before = cursor.get(..pos).and_then(|v| v.chars().next_back());
        let after = cursor.get(offset..).and_then(|v| v.chars().next());
        if !before.is_some_and(is_identifier_char) && after.is_some_and(char::is_whitespace) {
            input.advance(pos);
            return Some(input);
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn into_error(err: nom::Err<Error>, input: Input) -> Error {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => Error::from_error_kind(input, NomErrorKind::Eof),
    }
}
