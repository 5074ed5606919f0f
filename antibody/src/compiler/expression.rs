//! Compilation of rule conditions.
use std::ops::Range;

use antibody_parser::expression::{
    self as parser, CmpOperator, FieldKind, PatternSet, Selection, Value,
};

use super::external_symbol::{get_external_symbol, ExternalValue};
use super::rule::RuleCompiler;
use super::CompilationError;

/// A compiled condition.
///
/// Patterns are referenced by their index in the patterns of the rule, and external symbols by
/// their index in the values of the scanner.
#[derive(Debug)]
pub(crate) enum Expression {
    /// A boolean literal.
    Boolean(bool),

    /// The scanned bytes start with the expected magic.
    ValidHeader,

    /// A boolean external symbol.
    Symbol(usize),

    /// A pattern is found.
    Pattern(usize),

    /// Count found patterns of a set, and compare with a threshold.
    Of {
        /// How many patterns must be found.
        threshold: Threshold,
        /// Indexes of the patterns in the set, without duplicates.
        patterns: Vec<usize>,
    },

    /// Compare a field of the scanned bytes with a value.
    Comparison {
        /// Field to extract.
        field: FieldKind,
        /// Comparison operator.
        op: CmpOperator,
        /// Value compared to.
        value: Operand,
    },

    /// Negation.
    Not(Box<Expression>),

    /// All expressions are true.
    And(Vec<Expression>),

    /// One of the expressions is true.
    Or(Vec<Expression>),
}

/// Number of patterns of a set that must be found.
#[derive(Debug)]
pub(crate) enum Threshold {
    /// At least one.
    Any,
    /// All of them.
    All,
    /// At least the given count.
    AtLeast(u64),
    /// At least the value of an integer external symbol.
    Symbol(usize),
}

/// Value of a comparison.
#[derive(Debug)]
pub(crate) enum Operand {
    Integer(i64),
    Float(f64),
    /// An integer or float external symbol.
    Symbol(usize),
}

/// Type of value accepted where an external symbol is used.
#[derive(Copy, Clone, Debug)]
enum SymbolUse {
    Boolean,
    Integer,
    Number,
}

impl SymbolUse {
    fn accepts(self, value: &ExternalValue) -> bool {
        matches!(
            (self, value),
            (Self::Boolean, ExternalValue::Boolean(_))
                | (Self::Integer | Self::Number, ExternalValue::Integer(_))
                | (Self::Number, ExternalValue::Float(_))
        )
    }

    fn type_name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "integer or float",
        }
    }
}

pub(super) fn compile_expression(
    compiler: &RuleCompiler,
    expression: parser::Expression,
    depth: u32,
) -> Result<Expression, CompilationError> {
    let parser::Expression { expr, span } = expression;

    if depth >= compiler.params.max_condition_depth {
        return Err(CompilationError::ConditionTooDeep { span });
    }

    match expr {
        parser::ExpressionKind::Boolean(b) => Ok(Expression::Boolean(b)),
        parser::ExpressionKind::ValidHeader => Ok(Expression::ValidHeader),
        parser::ExpressionKind::Symbol(name) => Ok(Expression::Symbol(find_symbol(
            compiler,
            name,
            span,
            SymbolUse::Boolean,
        )?)),
        parser::ExpressionKind::Pattern(name) => {
            Ok(Expression::Pattern(compiler.find_pattern(name, span)?))
        }
        parser::ExpressionKind::Of { selection, set } => {
            let threshold = match selection {
                Selection::Any => Threshold::Any,
                Selection::All => Threshold::All,
                Selection::Count(count) => Threshold::AtLeast(count),
                Selection::Symbol(name) => Threshold::Symbol(find_symbol(
                    compiler,
                    name,
                    span.clone(),
                    SymbolUse::Integer,
                )?),
            };

            Ok(Expression::Of {
                threshold,
                patterns: compile_pattern_set(compiler, set, span)?,
            })
        }
        parser::ExpressionKind::Comparison { field, op, value } => {
            let value = match value {
                Value::Integer(v) => Operand::Integer(v),
                Value::Float(v) => Operand::Float(v),
                Value::Symbol(name) => {
                    Operand::Symbol(find_symbol(compiler, name, span, SymbolUse::Number)?)
                }
            };

            Ok(Expression::Comparison {
                field: field.kind,
                op,
                value,
            })
        }
        parser::ExpressionKind::Not(expr) => Ok(Expression::Not(Box::new(compile_expression(
            compiler,
            *expr,
            depth + 1,
        )?))),
        parser::ExpressionKind::And(ops) => Ok(Expression::And(compile_operands(
            compiler, ops, depth,
        )?)),
        parser::ExpressionKind::Or(ops) => Ok(Expression::Or(compile_operands(
            compiler, ops, depth,
        )?)),
    }
}

fn compile_operands(
    compiler: &RuleCompiler,
    ops: Vec<parser::Expression>,
    depth: u32,
) -> Result<Vec<Expression>, CompilationError> {
    ops.into_iter()
        .map(|op| compile_expression(compiler, op, depth + 1))
        .collect()
}

fn find_symbol(
    compiler: &RuleCompiler,
    name: String,
    span: Range<usize>,
    symbol_use: SymbolUse,
) -> Result<usize, CompilationError> {
    let Some((index, value)) = get_external_symbol(compiler.external_symbols, &name) else {
        return Err(CompilationError::UnknownSymbol { name, span });
    };
    if !symbol_use.accepts(value) {
        return Err(CompilationError::SymbolInvalidType {
            name,
            symbol_type: value.type_name(),
            expected_type: symbol_use.type_name(),
            span,
        });
    }

    Ok(index)
}

/// Resolve a set of patterns into the indexes of the patterns, sorted and deduplicated.
fn compile_pattern_set(
    compiler: &RuleCompiler,
    set: PatternSet,
    span: Range<usize>,
) -> Result<Vec<usize>, CompilationError> {
    let mut indexes = Vec::new();

    if set.elements.is_empty() {
        // `them`
        indexes.extend(compiler.find_patterns_with_prefix(""));
        if indexes.is_empty() {
            return Err(CompilationError::UnknownPatternGroup {
                prefix: String::new(),
                span,
            });
        }
    }

    for element in set.elements {
        if element.is_wildcard {
            let len = indexes.len();
            indexes.extend(compiler.find_patterns_with_prefix(&element.name));
            if indexes.len() == len {
                return Err(CompilationError::UnknownPatternGroup {
                    prefix: element.name,
                    span: element.span,
                });
            }
        } else {
            indexes.push(compiler.find_pattern(element.name, element.span)?);
        }
    }

    indexes.sort_unstable();
    indexes.dedup();
    Ok(indexes)
}
