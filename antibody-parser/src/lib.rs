//! Parser for antibody detection rules.
//!
//! This crate is designed to be used by the `antibody` crate.
//!
//! It exposes two entrypoints: [`parse`], which parses a whole document
//! and fails on the first error, and [`parse_with_recovery`], which skips
//! the rules that cannot be parsed and reports them.
//!
//! ```rust
//! use antibody_parser::expression::*;
//! use antibody_parser::hex_string::*;
//! use antibody_parser::rule::*;
//!
//! let file = antibody_parser::parse(r#"
//! rule Shellcode : loader {
//!     meta:
//!         severity = "high"
//!     strings:
//!         $jmp = { C7 ?? ?? E9 }
//!     condition:
//!         $jmp
//! }"#)?;
//!
//! let rule = &file.rules[0];
//! assert_eq!(rule.name, "Shellcode");
//! assert_eq!(rule.tags, ["loader"]);
//! assert_eq!(
//!     rule.metadatas[0],
//!     Metadata {
//!         name: "severity".to_owned(),
//!         value: MetadataValue::Bytes(b"high".to_vec()),
//!     }
//! );
//! assert_eq!(
//!     rule.patterns[0].value,
//!     PatternValue::Bytes(vec![
//!         Token::Byte(0xC7),
//!         Token::MaskedByte(0, Mask::All),
//!         Token::MaskedByte(0, Mask::All),
//!         Token::Byte(0xE9),
//!     ])
//! );
//! assert_eq!(rule.condition.expr, ExpressionKind::Pattern("jmp".to_owned()));
//!
//! # Ok::<(), antibody_parser::error::Error>(())
//! ```

use nom::Finish;

pub mod error;
pub mod expression;
pub mod file;
pub mod hex_string;
mod nom_recipes;
mod number;
pub mod rule;
mod string;
mod types;

#[cfg(test)]
mod test_helpers;

/// Parse a rule document.
///
/// # Errors
///
/// Returns an error if the document cannot be parsed entirely as a list
/// of rules.
pub fn parse(input: &str) -> Result<file::RuleFile, error::Error> {
    let input = types::Input::new(input);
    let (_, file) = file::rule_file(input).finish()?;

    Ok(file)
}

/// Parse a rule document, recovering from errors.
///
/// A rule that cannot be parsed is reported in
/// [`file::RecoveredFile::errors`], and parsing resumes on the next line
/// starting with the `rule` keyword.
#[must_use]
pub fn parse_with_recovery(input: &str) -> file::RecoveredFile {
    file::rule_file_with_recovery(types::Input::new(input))
}
