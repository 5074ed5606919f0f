//! Compilation parameters

/// Parameters used during compilation.
#[derive(Clone, Debug)]
pub struct CompilerParams {
    /// Maximum depth in a rule's condition AST.
    pub(crate) max_condition_depth: u32,

    /// Maximum number of patterns declared in a single rule.
    pub(crate) max_patterns_per_rule: usize,
}

impl Default for CompilerParams {
    fn default() -> Self {
        Self {
            max_condition_depth: 40,
            max_patterns_per_rule: 10_000,
        }
    }
}

impl CompilerParams {
    /// Maximum depth in a rule's condition AST.
    ///
    /// Compilation and evaluation of conditions are recursive, this limit prevents rules
    /// written to trigger a stack overflow. Rules exceeding it are rejected.
    ///
    /// Default value is `40`.
    #[must_use]
    pub fn max_condition_depth(mut self, max_condition_depth: u32) -> Self {
        self.max_condition_depth = max_condition_depth;
        self
    }

    /// Maximum number of patterns declared in a single rule.
    ///
    /// Rules declaring more patterns are rejected.
    ///
    /// Default value is `10_000`.
    #[must_use]
    pub fn max_patterns_per_rule(mut self, max_patterns_per_rule: usize) -> Self {
        self.max_patterns_per_rule = max_patterns_per_rule;
        self
    }
}
