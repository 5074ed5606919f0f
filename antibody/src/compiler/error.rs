//! Errors related to compilation of rules.
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

/// Error while compiling a rule.
#[derive(Clone, Debug)]
pub enum CompilationError {
    /// A rule with the same name was already added.
    DuplicatedRuleName {
        /// Name of the rule
        name: String,
        /// Span of the rule name
        span: Range<usize>,
    },

    /// A pattern referenced in a condition is not declared in the rule.
    UnknownPattern {
        /// Name of the pattern
        name: String,
        /// Span of the reference
        span: Range<usize>,
    },

    /// A group of patterns, `$prefix*` or `them`, does not match any declared pattern.
    UnknownPatternGroup {
        /// Prefix of the group, empty for `them`.
        prefix: String,
        /// Span of the group
        span: Range<usize>,
    },

    /// A pattern has no fully fixed byte, and thus cannot be searched for.
    ///
    /// This happens for hex strings made only of wildcards, and for empty text strings.
    PatternWithoutFixedByte {
        /// Name of the pattern
        name: String,
        /// Span of the pattern declaration
        span: Range<usize>,
    },

    /// An external symbol used in a condition is not defined.
    UnknownSymbol {
        /// Name of the symbol
        name: String,
        /// Span of the condition using the symbol
        span: Range<usize>,
    },

    /// An external symbol is used where a value of another type is expected.
    SymbolInvalidType {
        /// Name of the symbol
        name: String,
        /// Type of the symbol
        symbol_type: &'static str,
        /// Types accepted where the symbol is used
        expected_type: &'static str,
        /// Span of the condition using the symbol
        span: Range<usize>,
    },

    /// The condition is nested deeper than
    /// [`crate::compiler::CompilerParams::max_condition_depth`].
    ConditionTooDeep {
        /// Span of the expression exceeding the limit
        span: Range<usize>,
    },

    /// The rule declares more patterns than
    /// [`crate::compiler::CompilerParams::max_patterns_per_rule`].
    TooManyPatterns {
        /// Number of patterns declared
        count: usize,
        /// The limit
        limit: usize,
        /// Span of the rule name
        span: Range<usize>,
    },
}

impl CompilationError {
    #[must_use]
    pub(crate) fn to_diagnostic(&self) -> Diagnostic<()> {
        match self {
            Self::DuplicatedRuleName { name, span } => Diagnostic::error()
                .with_message(format!("rule `{name}` is already declared"))
                .with_labels(vec![Label::primary((), span.clone())]),

            Self::UnknownPattern { name, span } => Diagnostic::error()
                .with_message(format!("unknown pattern `${name}`"))
                .with_labels(vec![Label::primary((), span.clone())]),

            Self::UnknownPatternGroup { prefix, span } => Diagnostic::error()
                .with_message(format!("no pattern matches `${prefix}*`"))
                .with_labels(vec![Label::primary((), span.clone())]),

            Self::PatternWithoutFixedByte { name, span } => Diagnostic::error()
                .with_message(format!("pattern `${name}` has no fixed byte to search for"))
                .with_labels(vec![Label::primary((), span.clone())]),

            Self::UnknownSymbol { name, span } => Diagnostic::error()
                .with_message(format!("unknown symbol `{name}`"))
                .with_labels(vec![Label::primary((), span.clone())]),

            Self::SymbolInvalidType {
                name,
                symbol_type,
                expected_type,
                span,
            } => Diagnostic::error()
                .with_message(format!(
                    "symbol `{name}` has type {symbol_type}, expected {expected_type}"
                ))
                .with_labels(vec![Label::primary((), span.clone())]),

            Self::ConditionTooDeep { span } => Diagnostic::error()
                .with_message("condition is too deep")
                .with_labels(vec![Label::primary((), span.clone())]),

            Self::TooManyPatterns { count, limit, span } => Diagnostic::error()
                .with_message(format!(
                    "rule declares {count} patterns, more than the limit of {limit}"
                ))
                .with_labels(vec![Label::primary((), span.clone())]),
        }
    }
}
