use antibody_parser::rule::{PatternDeclaration, PatternValue};

use super::CompilationError;
use crate::matcher::Matcher;

/// A compiled pattern.
#[derive(Debug)]
pub(crate) struct Pattern {
    /// Name of the pattern, without the `$`.
    pub name: String,

    /// Matcher used to search for the pattern.
    pub matcher: Matcher,
}

pub(super) fn compile_pattern(decl: PatternDeclaration) -> Result<Pattern, CompilationError> {
    let PatternDeclaration {
        name,
        value,
        modifiers,
        span,
    } = decl;

    let matcher = match &value {
        PatternValue::Text(text) => Matcher::new_text(text, &modifiers),
        PatternValue::Bytes(tokens) => Matcher::new_hex(tokens),
    };

    match matcher {
        Some(matcher) => Ok(Pattern { name, matcher }),
        None => Err(CompilationError::PatternWithoutFixedByte { name, span }),
    }
}
