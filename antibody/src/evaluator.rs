//! Evaluation of rule conditions on a scanned buffer.
//!
//! Patterns are searched before any rule is evaluated, so the evaluation itself never reads
//! the scanned bytes again, apart from the fields extracted from the [`ScanTarget`].
use std::cmp::Ordering;

use antibody_parser::expression::{CmpOperator, FieldKind};

use crate::compiler::expression::{Expression, Operand, Threshold};
use crate::compiler::ExternalValue;
use crate::metadata::ScanTarget;
use crate::scanner::FoundPattern;

/// Data available while evaluating a rule.
#[derive(Debug)]
pub(crate) struct EvalContext<'a> {
    /// Patterns of the rule, with the first match found for each of them.
    pub found: &'a [Option<FoundPattern>],

    /// Scanned bytes, with the lazily computed fields.
    pub target: &'a ScanTarget<'a>,

    /// Values of the external symbols.
    pub external_symbols: &'a [ExternalValue],

    /// Expected magic for `valid_header`.
    pub expected_magic: &'a [u8],
}

/// Value of a field or of an operand.
#[derive(Copy, Clone, Debug)]
enum Number {
    Integer(i64),
    Float(f64),
}

pub(crate) fn evaluate_rule(condition: &Expression, ctx: &EvalContext) -> bool {
    evaluate_expr(condition, ctx)
}

fn evaluate_expr(expr: &Expression, ctx: &EvalContext) -> bool {
    match expr {
        Expression::Boolean(b) => *b,
        Expression::ValidHeader => ctx.target.starts_with(ctx.expected_magic),
        Expression::Symbol(index) => matches!(
            ctx.external_symbols.get(*index),
            Some(ExternalValue::Boolean(true))
        ),
        Expression::Pattern(index) => is_found(ctx, *index),
        Expression::Of {
            threshold,
            patterns,
        } => {
            let count = patterns
                .iter()
                .filter(|index| is_found(ctx, **index))
                .count();
            match threshold {
                Threshold::Any => count > 0,
                Threshold::All => count == patterns.len(),
                Threshold::AtLeast(n) => u64::try_from(count).is_ok_and(|count| count >= *n),
                Threshold::Symbol(index) => match ctx.external_symbols.get(*index) {
                    // A negative threshold is always reached.
                    Some(ExternalValue::Integer(n)) => match u64::try_from(*n) {
                        Ok(n) => u64::try_from(count).is_ok_and(|count| count >= n),
                        Err(_) => true,
                    },
                    _ => false,
                },
            }
        }
        Expression::Comparison { field, op, value } => {
            let Some(left) = field_value(field, ctx.target) else {
                return false;
            };
            let Some(right) = operand_value(value, ctx.external_symbols) else {
                return false;
            };
            apply_operator(*op, compare(left, right))
        }
        Expression::Not(expr) => !evaluate_expr(expr, ctx),
        Expression::And(ops) => ops.iter().all(|op| evaluate_expr(op, ctx)),
        Expression::Or(ops) => ops.iter().any(|op| evaluate_expr(op, ctx)),
    }
}

fn is_found(ctx: &EvalContext, index: usize) -> bool {
    matches!(ctx.found.get(index), Some(Some(_)))
}

/// Extract a field from the scanned bytes.
///
/// Returns None if the field is not available, in which case any comparison is false.
fn field_value(field: &FieldKind, target: &ScanTarget) -> Option<Number> {
    match field {
        FieldKind::Filesize => i64::try_from(target.filesize()).ok().map(Number::Integer),
        FieldKind::HeaderMagic => target
            .header_magic()
            .map(|v| Number::Integer(i64::from(v))),
        FieldKind::Entropy => Some(Number::Float(target.entropy())),
        FieldKind::SectionEntropy(index) => target.section_entropy(*index).map(Number::Float),
        FieldKind::ReadInteger { size, offset } => target
            .read_integer(*size, *offset)
            .map(|v| Number::Integer(i64::from(v))),
    }
}

fn operand_value(operand: &Operand, external_symbols: &[ExternalValue]) -> Option<Number> {
    match operand {
        Operand::Integer(v) => Some(Number::Integer(*v)),
        Operand::Float(v) => Some(Number::Float(*v)),
        Operand::Symbol(index) => match external_symbols.get(*index)? {
            ExternalValue::Integer(v) => Some(Number::Integer(*v)),
            ExternalValue::Float(v) => Some(Number::Float(*v)),
            ExternalValue::Boolean(_) => None,
        },
    }
}

#[allow(clippy::cast_precision_loss)]
fn compare(left: Number, right: Number) -> Option<Ordering> {
    match (left, right) {
        (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
        (Number::Integer(a), Number::Float(b)) => (a as f64).partial_cmp(&b),
        (Number::Float(a), Number::Integer(b)) => a.partial_cmp(&(b as f64)),
        (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
    }
}

fn apply_operator(op: CmpOperator, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CmpOperator::Less => ordering.is_lt(),
        CmpOperator::LessOrEqual => ordering.is_le(),
        CmpOperator::Greater => ordering.is_gt(),
        CmpOperator::GreaterOrEqual => ordering.is_ge(),
        CmpOperator::Equal => ordering.is_eq(),
    }
}
