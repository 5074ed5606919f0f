#[derive(Clone, Debug)]
pub(crate) struct ExternalSymbol {
    /// Name of the symbol.
    ///
    /// Unique across all external symbols.
    pub name: String,

    /// Default value of the symbol.
    ///
    /// If no value is specified for this symbol in the scanner, this value is used instead.
    /// It is also used to type-check the conditions during compilation.
    pub default_value: ExternalValue,
}

/// A value used for an external symbol.
///
/// External symbols carry the tunable parts of rules: detection thresholds, counts and flags
/// that are not hard-coded in the rules themselves.
#[derive(Clone, Debug, PartialEq)]
pub enum ExternalValue {
    /// An integer
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean.
    Boolean(bool),
}

impl ExternalValue {
    /// Name of the type of the value, used in error messages.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
        }
    }
}

pub(super) fn get_external_symbol<'a>(
    symbols: &'a [ExternalSymbol],
    name: &str,
) -> Option<(usize, &'a ExternalValue)> {
    symbols
        .iter()
        .enumerate()
        .find(|(_, sym)| sym.name == name)
        .map(|(index, sym)| (index, &sym.default_value))
}

impl From<i64> for ExternalValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ExternalValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ExternalValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}
