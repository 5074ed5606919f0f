//! Types related to the condition of a rule.
use std::ops::Range;

mod boolean_expression;
mod primary_expression;

pub(crate) use boolean_expression::expression;

/// Maximum depth of imbricated expressions, through parentheses.
///
/// Deeper nesting is refused during parsing, to prevent stack overflows.
pub(crate) const MAX_EXPR_RECURSION: usize = 20;

/// A condition expression, with its span in the rule source.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    /// Kind of the expression.
    pub expr: ExpressionKind,

    /// Span of the whole expression.
    pub span: Range<usize>,
}

/// Kind of a condition expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ExpressionKind {
    /// `true` or `false`.
    Boolean(bool),

    /// `valid_header`: the scanned bytes start with the expected magic.
    ValidHeader,

    /// A boolean external symbol.
    Symbol(String),

    /// A pattern reference, `$a`.
    Pattern(String),

    /// `<selection> of <set>`.
    Of {
        /// How many patterns of the set must be found.
        selection: Selection,
        /// Set of patterns.
        set: PatternSet,
    },

    /// `<field> <op> <value>`.
    Comparison {
        /// Value extracted from the scanned bytes.
        field: Field,
        /// Comparison operator.
        op: CmpOperator,
        /// Value compared to.
        value: Value,
    },

    /// Negation of an expression.
    Not(Box<Expression>),

    /// All expressions must be true.
    And(Vec<Expression>),

    /// At least one expression must be true.
    Or(Vec<Expression>),
}

/// Selection in an `of` expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// `any`, ie at least one.
    Any,
    /// `all` patterns of the set.
    All,
    /// A fixed count, ie `2 of ...`.
    Count(u64),
    /// An integer external symbol.
    Symbol(String),
}

/// Set of patterns used in an `of` expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternSet {
    /// Elements of the set.
    ///
    /// Empty for `them`, ie every pattern of the rule.
    pub elements: Vec<SetElement>,
}

/// Element of a [`PatternSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetElement {
    /// Name of the pattern, or prefix of the names if `is_wildcard` is set.
    pub name: String,

    /// Whether the element is a prefix followed by `*`.
    pub is_wildcard: bool,

    /// Span of the element.
    pub span: Range<usize>,
}

/// A value extracted from the scanned bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    /// Kind of the field.
    pub kind: FieldKind,

    /// Span of the field.
    pub span: Range<usize>,
}

/// Kind of a [`Field`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// `filesize`.
    Filesize,

    /// `header_magic`: first two bytes, as a little-endian u16.
    HeaderMagic,

    /// `entropy`: entropy of the whole scanned bytes.
    Entropy,

    /// `entropy(i)`: entropy of the section at the given index.
    SectionEntropy(u64),

    /// `uintXX(offset)`: little-endian unsigned integer at an offset.
    ReadInteger {
        /// Size of the integer.
        size: IntegerSize,
        /// Offset of the integer in the scanned bytes.
        offset: u64,
    },
}

/// Size of the integer read by [`FieldKind::ReadInteger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegerSize {
    /// `uint8`
    U8,
    /// `uint16`
    U16,
    /// `uint32`
    U32,
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOperator {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `==`
    Equal,
}

/// Right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An integer literal.
    Integer(i64),
    /// A float literal.
    Float(f64),
    /// An external symbol, either integer or float.
    Symbol(String),
}
