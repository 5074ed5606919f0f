//! Compilation of a single rule, and the metadata types exposed on rules.
use std::collections::HashMap;
use std::ops::Range;

use antibody_parser::rule as parser;

use super::expression::{compile_expression, Expression};
use super::external_symbol::ExternalSymbol;
use super::pattern::{compile_pattern, Pattern};
use super::{CompilationError, CompilerParams};

pub use antibody_parser::rule::{Metadata, MetadataValue};

/// A compiled rule.
#[derive(Debug)]
pub(crate) struct Rule {
    /// Name of the rule.
    pub name: String,

    /// Tags associated with the rule.
    pub tags: Vec<String>,

    /// Metadata associated with the rule.
    pub metadatas: Vec<Metadata>,

    /// Number of patterns of the rule.
    ///
    /// The patterns are stored in the compiler, starting at `patterns_offset`.
    pub nb_patterns: usize,

    /// Index of the first pattern of the rule in the patterns of the compiler.
    pub patterns_offset: usize,

    /// Condition of the rule.
    pub condition: Expression,
}

/// Object used to compile a rule.
#[derive(Debug)]
pub(super) struct RuleCompiler<'a> {
    /// Indexes of the patterns of the rule, by name.
    patterns_map: HashMap<String, usize>,

    /// External symbols declared in the compiler.
    pub external_symbols: &'a [ExternalSymbol],

    /// Parameters of the compilation.
    pub params: &'a CompilerParams,
}

impl<'a> RuleCompiler<'a> {
    pub(super) fn new(
        rule: &parser::Rule,
        external_symbols: &'a [ExternalSymbol],
        params: &'a CompilerParams,
    ) -> Self {
        let patterns_map = rule
            .patterns
            .iter()
            .enumerate()
            .map(|(i, decl)| (decl.name.clone(), i))
            .collect();

        Self {
            patterns_map,
            external_symbols,
            params,
        }
    }

    /// Index of the pattern with the given name.
    pub(super) fn find_pattern(
        &self,
        name: String,
        span: Range<usize>,
    ) -> Result<usize, CompilationError> {
        match self.patterns_map.get(&name) {
            Some(index) => Ok(*index),
            None => Err(CompilationError::UnknownPattern { name, span }),
        }
    }

    /// Indexes of the patterns whose name starts with the prefix, in no particular order.
    pub(super) fn find_patterns_with_prefix(&self, prefix: &str) -> Vec<usize> {
        self.patterns_map
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, index)| *index)
            .collect()
    }
}

/// A rule with its compiled patterns, before it is added to the compiler.
#[derive(Debug)]
pub(crate) struct CompiledRule {
    pub rule: Rule,
    pub patterns: Vec<Pattern>,
}

pub(crate) fn compile_rule(
    rule: parser::Rule,
    external_symbols: &[ExternalSymbol],
    params: &CompilerParams,
) -> Result<CompiledRule, CompilationError> {
    if rule.patterns.len() > params.max_patterns_per_rule {
        return Err(CompilationError::TooManyPatterns {
            count: rule.patterns.len(),
            limit: params.max_patterns_per_rule,
            span: rule.name_span,
        });
    }

    let compiler = RuleCompiler::new(&rule, external_symbols, params);
    let condition = compile_expression(&compiler, rule.condition, 0)?;

    let patterns = rule
        .patterns
        .into_iter()
        .map(compile_pattern)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledRule {
        rule: Rule {
            name: rule.name,
            tags: rule.tags,
            metadatas: rule.metadatas,
            nb_patterns: patterns.len(),
            patterns_offset: 0,
            condition,
        },
        patterns,
    })
}
