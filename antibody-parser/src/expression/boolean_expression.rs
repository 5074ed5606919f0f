//! Parsing of boolean operators and parenthesized expressions.
use nom::character::complete::char;
use nom::combinator::cut;
use nom::sequence::terminated;
use nom::Parser;

use super::primary_expression::{comparison, of_expression, simple_item};
use super::{Expression, ExpressionKind, MAX_EXPR_RECURSION};
use crate::error::{Error, ErrorKind};
use crate::nom_recipes::{rtrim, textual_tag as ttag};
use crate::string::pattern_identifier;
use crate::types::{Input, ParseResult};

/// Parse a full condition expression.
pub(crate) fn expression(input: Input) -> ParseResult<Expression> {
    boolean_expression(input)
}

/// Parse `or` operators, the operator with the lowest precedence.
fn boolean_expression(mut input: Input) -> ParseResult<Expression> {
    // Only parenthesized expressions recurse into this function, operators
    // are accumulated in vectors instead.
    let start = input.pos();

    if input.expr_recursion_counter >= MAX_EXPR_RECURSION {
        return Err(nom::Err::Failure(Error::new(
            input.get_span_from(start),
            ErrorKind::ExprTooDeep,
        )));
    }

    input.expr_recursion_counter += 1;
    let (mut input, res) = expression_and(input)?;

    let mut ops = vec![res];
    while let Ok((i, _)) = rtrim(ttag("or")).parse(input) {
        let (i, elem) = cut(expression_and).parse(i)?;
        ops.push(elem);
        input = i;
    }
    input.expr_recursion_counter -= 1;

    Ok((input, collapse(ops, ExpressionKind::Or, input, start)))
}

/// Parse `and` operators.
fn expression_and(input: Input) -> ParseResult<Expression> {
    let start = input.pos();
    let (mut input, res) = expression_not(input)?;

    let mut ops = vec![res];
    while let Ok((i, _)) = rtrim(ttag("and")).parse(input) {
        let (i, elem) = cut(expression_not).parse(i)?;
        ops.push(elem);
        input = i;
    }

    Ok((input, collapse(ops, ExpressionKind::And, input, start)))
}

fn collapse(
    mut ops: Vec<Expression>,
    builder: fn(Vec<Expression>) -> ExpressionKind,
    input: Input,
    start: crate::types::Position<'_>,
) -> Expression {
    if ops.len() == 1 {
        if let Some(expr) = ops.pop() {
            return expr;
        }
    }
    Expression {
        expr: builder(ops),
        span: input.get_span_from(start),
    }
}

/// Parse `not` operators.
///
/// Each `not` nests the expression one level deeper, and counts against the
/// same budget as parenthesized expressions.
fn expression_not(mut input: Input) -> ParseResult<Expression> {
    let mut starts = Vec::new();
    while let Ok((i, _)) = rtrim(ttag("not")).parse(input) {
        if input.expr_recursion_counter >= MAX_EXPR_RECURSION {
            let start = input.pos();
            return Err(nom::Err::Failure(Error::new(
                input.get_span_from(start),
                ErrorKind::ExprTooDeep,
            )));
        }
        starts.push(input.pos());
        input = i;
        input.expr_recursion_counter += 1;
    }

    let (mut input, mut expr) = expression_item(input)?;
    input.expr_recursion_counter -= starts.len();
    while let Some(start) = starts.pop() {
        expr = Expression {
            expr: ExpressionKind::Not(Box::new(expr)),
            span: input.get_span_from(start),
        };
    }

    Ok((input, expr))
}

/// Parse an operand of the boolean operators.
fn expression_item(input: Input) -> ParseResult<Expression> {
    let start = input.pos();

    if let Ok((input, _)) = rtrim(char('(')).parse(input) {
        let (input, expr) =
            cut(terminated(boolean_expression, rtrim(char(')')))).parse(input)?;
        return Ok((
            input,
            Expression {
                expr: expr.expr,
                span: input.get_span_from(start),
            },
        ));
    }

    if let Ok((input, name)) = pattern_identifier(input) {
        return Ok((
            input,
            Expression {
                expr: ExpressionKind::Pattern(name),
                span: input.get_span_from(start),
            },
        ));
    }

    // `of` and comparisons can both start with an identifier, only
    // the following token tells them apart.
    match of_expression(input) {
        Ok(v) => return Ok(v),
        Err(nom::Err::Error(_)) => (),
        Err(e) => return Err(e),
    }
    match comparison(input) {
        Ok(v) => return Ok(v),
        Err(nom::Err::Error(_)) => (),
        Err(e) => return Err(e),
    }

    simple_item(input)
}
