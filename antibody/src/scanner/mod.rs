//! Provides the [`Scanner`] object used to scan bytes against a set of compiled rules.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::assessment::Assessment;
use crate::compiler::external_symbol::ExternalSymbol;
use crate::compiler::pattern::Pattern;
use crate::compiler::rule::Rule;
use crate::compiler::{ExternalValue, FinalizeError};
use crate::evaluator::{evaluate_rule, EvalContext};
use crate::known_hashes::{KnownHashMatch, KnownHashes};
use crate::metadata::ScanTarget;
use crate::timeout::AbortChecker;
use crate::{Compiler, Metadata};

pub use crate::matcher::Transform;

mod ac_scan;
pub(crate) use ac_scan::FoundPattern;
mod error;
pub use error::ScanError;
mod params;
pub use params::ScanParams;

/// Holds a list of rules, and provides methods to run them on bytes.
///
/// A [`Scanner`] can be created with a [`crate::Compiler`] object when all rules have been
/// added to it.
///
/// ```
/// let mut compiler = antibody::Compiler::new();
///
/// // Add as many rules as desired.
/// let _status = compiler.add_rules_str("rule a { strings: $a = \"abc\" condition: $a }");
///
/// // Compile all the rules and generate a scanner.
/// let scanner = compiler.finalize()?;
///
/// // Use the scanner to run the rules against byte strings.
/// let scan_result = scanner.scan_mem(b"abc").unwrap();
/// assert_eq!(scan_result.matched_rules().count(), 1);
/// # Ok::<(), antibody::compiler::FinalizeError>(())
/// ```
///
/// If you need to use the scanner in a multi-thread context, and need to define symbols or
/// modify scan parameters for each scan, you can clone the object, which is guaranteed to be
/// cheap.
///
/// ```
/// let mut compiler = antibody::Compiler::new();
/// compiler.define_symbol("min_size", 0_i64);
/// let _status = compiler.add_rules_str("rule a { condition: filesize >= min_size }");
/// let scanner = compiler.finalize()?;
///
/// let thread1 = {
///     let mut scanner = scanner.clone();
///     std::thread::spawn(move || {
///         scanner.define_symbol("min_size", 10_i64).unwrap();
///         let res = scanner.scan_mem(b"abc").unwrap();
///         assert_eq!(res.matched_rules().count(), 0);
///     })
/// };
/// let thread2 = {
///     let mut scanner = scanner.clone();
///     std::thread::spawn(move || {
///         scanner.define_symbol("min_size", 2_i64).unwrap();
///         let res = scanner.scan_mem(b"abc").unwrap();
///         assert_eq!(res.matched_rules().count(), 1);
///     })
/// };
///
/// thread1.join().unwrap();
/// thread2.join().unwrap();
/// # Ok::<(), antibody::compiler::FinalizeError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Scanner {
    /// Inner value containing all compiled data.
    ///
    /// Put all compiled data into an inner struct behind an Arc: this allows cloning the Scanner
    /// cheaply, in order to use it in parallel or modify external symbols without impacting
    /// other scans.
    inner: Arc<Inner>,

    /// Parameters to use during scanning.
    ///
    /// See documentation of [`ScanParams`] for details on those parameters.
    scan_params: ScanParams,

    /// Values of external symbols.
    ///
    /// Compiled rules uses indexing into this vec to retrieve the symbols values.
    external_symbols_values: Vec<ExternalValue>,

    /// Hashes of known malicious files, checked before any rule.
    known_hashes: Option<Arc<KnownHashes>>,
}

impl Scanner {
    pub(crate) fn new(compiler: Compiler) -> Result<Self, FinalizeError> {
        let Compiler {
            rules,
            patterns,
            external_symbols,
            ..
        } = compiler;

        let ac_scan = ac_scan::AcScan::new(&patterns).map_err(FinalizeError)?;

        let mut external_symbols_values = Vec::new();
        let mut external_symbols_map = HashMap::new();
        for (index, sym) in external_symbols.into_iter().enumerate() {
            let ExternalSymbol {
                name,
                default_value,
            } = sym;
            external_symbols_values.push(default_value);
            let _r = external_symbols_map.insert(name, index);
        }

        debug!(
            nb_rules = rules.len(),
            nb_patterns = patterns.len(),
            "scanner built"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                rules,
                patterns,
                ac_scan,
                external_symbols_map,
            }),
            scan_params: ScanParams::default(),
            external_symbols_values,
            known_hashes: None,
        })
    }

    /// Scan a byte slice.
    ///
    /// Returns the verdict of every rule on the given byte slice.
    ///
    /// # Errors
    ///
    /// Fails if the byte slice is bigger than [`ScanParams::max_scan_size`], or if the scan is
    /// aborted on a timeout or a cancellation. Rules whose verdict was not reached are then
    /// marked as [`Verdict::Aborted`], and results are returned with the error.
    ///
    /// If the byte slice is found in the table set with [`Scanner::set_known_hashes`], the
    /// scan succeeds immediately and every rule is marked as [`Verdict::Skipped`].
    pub fn scan_mem<'scanner>(
        &'scanner self,
        mem: &[u8],
    ) -> Result<ScanResult<'scanner>, (ScanError, ScanResult<'scanner>)> {
        if let Some(known_hash) = self
            .known_hashes
            .as_ref()
            .and_then(|table| table.lookup(mem))
        {
            debug!(hash = %known_hash.hash, "known malicious file");
            let mut result = self.inner.result_with_verdict(Verdict::Skipped);
            result.known_hash = Some(known_hash);
            return Ok(result);
        }

        self.inner
            .scan(mem, &self.scan_params, &self.external_symbols_values)
    }

    /// Define a value for a symbol defined and used in compiled rules.
    ///
    /// This symbol must have been defined when compiling rules using
    /// [`crate::Compiler::define_symbol`]. The provided value must have the same type as
    /// the value provided to this function.
    ///
    /// # Errors
    ///
    /// Fails if a symbol of the given name has never been defined, or if the type of the value
    /// is invalid.
    pub fn define_symbol<S, T>(&mut self, name: S, value: T) -> Result<(), DefineSymbolError>
    where
        S: AsRef<str>,
        T: Into<ExternalValue>,
    {
        self.define_symbol_inner(name.as_ref(), value.into())
    }

    fn define_symbol_inner(
        &mut self,
        name: &str,
        value: ExternalValue,
    ) -> Result<(), DefineSymbolError> {
        let index = match self.inner.external_symbols_map.get(name) {
            Some(v) => *v,
            None => return Err(DefineSymbolError::UnknownName),
        };

        if let Some(v) = self.external_symbols_values.get_mut(index) {
            match (v, value) {
                (ExternalValue::Boolean(a), ExternalValue::Boolean(b)) => *a = b,
                (ExternalValue::Integer(a), ExternalValue::Integer(b)) => *a = b,
                (ExternalValue::Float(a), ExternalValue::Float(b)) => *a = b,
                _ => return Err(DefineSymbolError::InvalidType),
            }
        }

        Ok(())
    }

    /// Set scan parameters on this scanner.
    pub fn set_scan_params(&mut self, params: ScanParams) {
        self.scan_params = params;
    }

    /// Get the current scan parameters on this scanner.
    #[must_use]
    pub fn scan_params(&self) -> &ScanParams {
        &self.scan_params
    }

    /// Set the table of hashes of known malicious files.
    ///
    /// Scanned bytes whose hash is in the table are reported as known malicious files, without
    /// searching any pattern. See [`crate::known_hashes`].
    ///
    /// An `Arc` can be given to share the table between scanners.
    pub fn set_known_hashes<T: Into<Arc<KnownHashes>>>(&mut self, known_hashes: T) {
        self.known_hashes = Some(known_hashes.into());
    }

    /// Names of the compiled rules, in the order they were added.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.inner.rules.iter().map(|rule| rule.name.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    /// List of compiled rules.
    rules: Vec<Rule>,

    /// Compiled patterns of all rules.
    ///
    /// Those are stored in the order the rules have been compiled in.
    patterns: Vec<Pattern>,

    /// Aho-Corasick automaton searching for all the patterns in a single pass.
    ac_scan: ac_scan::AcScan,

    /// Mapping from names to index for external symbols.
    external_symbols_map: HashMap<String, usize>,
}

impl Inner {
    fn scan<'scanner>(
        &'scanner self,
        mem: &[u8],
        params: &ScanParams,
        external_symbols: &[ExternalValue],
    ) -> Result<ScanResult<'scanner>, (ScanError, ScanResult<'scanner>)> {
        if mem.len() > params.max_scan_size {
            let err = ScanError::SizeLimitExceeded {
                size: mem.len(),
                limit: params.max_scan_size,
            };
            warn!(size = mem.len(), limit = params.max_scan_size, "scan refused");
            return Err((err, self.result_with_verdict(Verdict::Aborted)));
        }

        let mut checker = AbortChecker::new(params);

        let found = match self.ac_scan.scan(mem, &self.patterns, &mut checker) {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "scan aborted while searching patterns");
                return Err((err, self.result_with_verdict(Verdict::Aborted)));
            }
        };

        let target = ScanTarget::new(mem);
        let mut rules = Vec::with_capacity(self.rules.len());
        let mut error = None;

        for rule in &self.rules {
            if error.is_none() {
                error = checker.check_now().err();
            }
            if error.is_some() {
                rules.push(EvaluatedRule::new(rule, Verdict::Aborted, Vec::new()));
                continue;
            }

            let range = rule.patterns_offset..(rule.patterns_offset + rule.nb_patterns);
            let rule_found = found.get(range.clone()).unwrap_or_default();
            let ctx = EvalContext {
                found: rule_found,
                target: &target,
                external_symbols,
                expected_magic: &params.expected_magic,
            };

            if evaluate_rule(&rule.condition, &ctx) {
                let matches = self
                    .patterns
                    .get(range)
                    .unwrap_or_default()
                    .iter()
                    .zip(rule_found)
                    .filter_map(|(pattern, found)| {
                        found.map(|found| PatternMatch {
                            name: &pattern.name,
                            offset: found.offset,
                            transform: found.transform,
                        })
                    })
                    .collect();
                rules.push(EvaluatedRule::new(rule, Verdict::Matched, matches));
            } else {
                rules.push(EvaluatedRule::new(rule, Verdict::NotMatched, Vec::new()));
            }
        }

        let result = ScanResult {
            rules,
            known_hash: None,
        };
        match error {
            Some(err) => {
                warn!(error = %err, "scan aborted while evaluating rules");
                Err((err, result))
            }
            None => {
                debug!(
                    size = mem.len(),
                    nb_matched = result.matched_rules().count(),
                    "scan done"
                );
                Ok(result)
            }
        }
    }

    /// Result where every rule has the same verdict, without any evaluation.
    fn result_with_verdict(&self, verdict: Verdict) -> ScanResult<'_> {
        ScanResult {
            rules: self
                .rules
                .iter()
                .map(|rule| EvaluatedRule::new(rule, verdict, Vec::new()))
                .collect(),
            known_hash: None,
        }
    }
}

/// Result of a scan
#[derive(Debug)]
pub struct ScanResult<'scanner> {
    /// Every rule of the scanner, with its verdict, in the order the rules were added.
    pub rules: Vec<EvaluatedRule<'scanner>>,

    /// Set if the scanned bytes are a known malicious file.
    ///
    /// Rules are not evaluated in that case.
    pub known_hash: Option<KnownHashMatch>,
}

impl<'scanner> ScanResult<'scanner> {
    /// Rules that matched.
    pub fn matched_rules(&self) -> impl Iterator<Item = &EvaluatedRule<'scanner>> {
        self.rules.iter().filter(|rule| rule.is_matched())
    }

    /// Summary of the matched rules.
    ///
    /// See [`Assessment`] for details.
    #[must_use]
    pub fn assessment(&self) -> Assessment {
        match &self.known_hash {
            Some(known_hash) => Assessment::from_known_hash(known_hash),
            None => Assessment::from_rules(&self.rules),
        }
    }
}

/// Result of a rule evaluation during a scan.
#[derive(Debug)]
pub struct EvaluatedRule<'scanner> {
    /// Name of the rule.
    pub name: &'scanner str,

    /// Tags associated with the rule.
    pub tags: &'scanner [String],

    /// Metadata associated with the rule.
    pub metadatas: &'scanner [Metadata],

    /// Patterns of the rule that were found.
    ///
    /// Only filled when the rule matched.
    pub matches: Vec<PatternMatch<'scanner>>,

    /// Verdict of the rule.
    pub verdict: Verdict,
}

impl<'scanner> EvaluatedRule<'scanner> {
    fn new(rule: &'scanner Rule, verdict: Verdict, matches: Vec<PatternMatch<'scanner>>) -> Self {
        Self {
            name: &rule.name,
            tags: &rule.tags,
            metadatas: &rule.metadatas,
            matches,
            verdict,
        }
    }

    /// Returns true if the rule matched.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.verdict == Verdict::Matched
    }
}

/// Verdict of a rule on scanned bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The condition of the rule is true.
    Matched,

    /// The condition of the rule is false.
    NotMatched,

    /// The scan was aborted before the rule could be evaluated.
    Aborted,

    /// The rule was not evaluated, the scanned bytes being a known malicious file.
    Skipped,
}

/// A pattern found in the scanned bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct PatternMatch<'scanner> {
    /// Name of the pattern, without the `$`.
    pub name: &'scanner str,

    /// Offset of the first match found for the pattern.
    ///
    /// This is the first match in the order of the scan, which is not guaranteed to be the
    /// lowest offset for hex strings with wildcards before their fixed bytes.
    pub offset: usize,

    /// Variant of the pattern that matched.
    pub transform: Transform,
}

/// Error when defining a symbol's value in a [`Scanner`].
#[derive(Debug)]
pub enum DefineSymbolError {
    /// No symbol with this name exists.
    UnknownName,
    /// The defined symbol has a different value type than the provided one.
    InvalidType,
}

impl std::error::Error for DefineSymbolError {}

impl std::fmt::Display for DefineSymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownName => write!(f, "unknown symbol name"),
            Self::InvalidType => write!(f, "invalid value type"),
        }
    }
}
