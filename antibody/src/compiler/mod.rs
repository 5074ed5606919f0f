//! Provides the [`Compiler`] object used to compile detection rules.
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

mod error;
pub use error::CompilationError;
pub(crate) mod expression;
pub(crate) mod external_symbol;
pub use external_symbol::ExternalValue;
mod params;
pub use params::CompilerParams;
pub(crate) mod pattern;
pub mod rule;

use crate::Scanner;

/// Extensions of the files added by [`Compiler::add_rules_directory`] by default.
pub const DEFAULT_RULES_EXTENSIONS: &[&str] = &["yar", "yara"];

/// Object used to compile rules.
#[derive(Debug, Default)]
pub struct Compiler {
    /// List of compiled rules.
    pub(crate) rules: Vec<rule::Rule>,

    /// Patterns of all the compiled rules.
    ///
    /// The patterns of a rule are contiguous, see [`rule::Rule::patterns_offset`].
    pub(crate) patterns: Vec<pattern::Pattern>,

    /// Names of the compiled rules.
    rules_names: HashSet<String>,

    /// Externally defined symbols.
    pub(crate) external_symbols: Vec<external_symbol::ExternalSymbol>,

    /// Compilation parameters
    params: CompilerParams,
}

impl Compiler {
    /// Create a new object to compile rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules to compile from a file.
    ///
    /// Rules that cannot be parsed or compiled are reported in the returned status, and do
    /// not prevent the other rules of the file from being added.
    ///
    /// # Errors
    ///
    /// An error is returned if the file cannot be read.
    pub fn add_rules_file<T: AsRef<Path>>(
        &mut self,
        path: T,
    ) -> Result<AddRuleStatus, AddRuleError> {
        let mut status = AddRuleStatus::default();
        self.add_rules_file_inner(path.as_ref(), &mut status)?;
        Ok(status)
    }

    fn add_rules_file_inner(
        &mut self,
        path: &Path,
        status: &mut AddRuleStatus,
    ) -> Result<(), AddRuleError> {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            AddRuleError::new(
                AddRuleErrorKind::IO {
                    path: path.to_path_buf(),
                    error,
                },
                Some(path),
                None,
                "",
            )
        })?;
        self.add_rules_str_inner(&contents, Some(path), status);
        Ok(())
    }

    /// Add rules to compile from a string.
    ///
    /// Rules that cannot be parsed or compiled are reported in the returned status, and do
    /// not prevent the other rules from being added.
    pub fn add_rules_str<T: AsRef<str>>(&mut self, rules: T) -> AddRuleStatus {
        let mut status = AddRuleStatus::default();
        self.add_rules_str_inner(rules.as_ref(), None, &mut status);
        status
    }

    /// Add rules from all the files of a directory, walked recursively.
    ///
    /// Only files with one of the given extensions are added, see
    /// [`DEFAULT_RULES_EXTENSIONS`]. Files are added in the order of their paths.
    ///
    /// Errors on unreadable files and on rules are reported in the returned status, and do not
    /// prevent the other files from being added.
    pub fn add_rules_directory<T: AsRef<Path>, S: AsRef<str>>(
        &mut self,
        path: T,
        extensions: &[S],
    ) -> AddRuleStatus {
        let root = path.as_ref();
        let mut status = AddRuleStatus::default();
        let mut nb_files = 0_usize;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    let path = error.path().unwrap_or(root).to_path_buf();
                    status.errors.push(AddRuleError::new(
                        AddRuleErrorKind::IO {
                            path: path.clone(),
                            error: error.into(),
                        },
                        Some(&path),
                        None,
                        "",
                    ));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
                continue;
            }

            nb_files += 1;
            if let Err(err) = self.add_rules_file_inner(entry.path(), &mut status) {
                warn!(path = %entry.path().display(), error = %err, "cannot read rules file");
                status.errors.push(err);
            }
        }

        info!(
            directory = %root.display(),
            nb_files,
            nb_rules = status.rules.len(),
            nb_errors = status.errors.len(),
            "rules directory added"
        );
        status
    }

    fn add_rules_str_inner(
        &mut self,
        s: &str,
        current_filepath: Option<&Path>,
        status: &mut AddRuleStatus,
    ) {
        let file = antibody_parser::parse_with_recovery(s);

        for error in file.errors {
            let err = AddRuleError::new(
                AddRuleErrorKind::Parse(error.error),
                current_filepath,
                error.rule_name,
                s,
            );
            warn!(rule = ?err.rule_name, error = %err, "cannot parse rule");
            status.errors.push(err);
        }

        for rule in file.rules {
            let rule_name = rule.name.clone();
            match self.add_rule(rule) {
                Ok(()) => {
                    debug!(rule = %rule_name, "rule compiled");
                    status.rules.push(rule_name);
                }
                Err(error) => {
                    let err = AddRuleError::new(
                        AddRuleErrorKind::Compilation(error),
                        current_filepath,
                        Some(rule_name),
                        s,
                    );
                    warn!(rule = ?err.rule_name, error = %err, "cannot compile rule");
                    status.errors.push(err);
                }
            }
        }
    }

    fn add_rule(&mut self, rule: antibody_parser::rule::Rule) -> Result<(), CompilationError> {
        let rule_name = rule.name.clone();
        let name_span = rule.name_span.clone();

        let rule::CompiledRule { mut rule, patterns } =
            rule::compile_rule(rule, &self.external_symbols, &self.params)?;

        // Check the rule has no name conflict.
        if self.rules_names.contains(&rule_name) {
            return Err(CompilationError::DuplicatedRuleName {
                name: rule_name,
                span: name_span,
            });
        }

        // From this point onward, the rule is valid.
        rule.patterns_offset = self.patterns.len();
        let _r = self.rules_names.insert(rule_name);
        self.rules.push(rule);
        self.patterns.extend(patterns);
        Ok(())
    }

    /// Define a symbol that can be used in compiled rules.
    ///
    /// Any rules compiled after the addition can use the symbol name, which will be replaced
    /// during scanning by either:
    /// - the last value set in the [`Scanner`] value for this symbol (see
    ///   [`Scanner::define_symbol`]).
    /// - the default value provided here otherwise.
    ///
    /// Returns false if a symbol of the same name is already defined.
    pub fn define_symbol<S, T>(&mut self, name: S, value: T) -> bool
    where
        S: AsRef<str>,
        T: Into<ExternalValue>,
    {
        self.define_symbol_inner(name.as_ref(), value.into())
    }

    fn define_symbol_inner(&mut self, name: &str, default_value: ExternalValue) -> bool {
        if self.external_symbols.iter().any(|sym| sym.name == name) {
            return false;
        }

        self.external_symbols.push(external_symbol::ExternalSymbol {
            name: name.to_owned(),
            default_value,
        });
        true
    }

    /// Set compilation parameters.
    ///
    /// The parameters only apply to rules added after this call.
    pub fn set_params(&mut self, params: CompilerParams) {
        self.params = params;
    }

    /// Get compilation parameters.
    #[must_use]
    pub fn params(&self) -> &CompilerParams {
        &self.params
    }

    /// Finalize the compiler and generate a [`Scanner`].
    ///
    /// # Errors
    ///
    /// Fails if the automaton searching for all the patterns cannot be built, which can only
    /// happen on an unreasonable number of patterns.
    pub fn finalize(self) -> Result<Scanner, FinalizeError> {
        Scanner::new(self)
    }
}

fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|expected| expected.as_ref().eq_ignore_ascii_case(ext))
        })
}

/// Result status of adding rules to a [`Compiler`].
#[derive(Default, Debug)]
pub struct AddRuleStatus {
    /// Names of the rules that were successfully compiled.
    rules: Vec<String>,

    /// Errors on the rules that were rejected.
    errors: Vec<AddRuleError>,
}

impl AddRuleStatus {
    /// Names of the rules that were compiled and added to the compiler.
    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(String::as_str)
    }

    /// Errors on the rules or files that were rejected.
    pub fn errors(&self) -> impl Iterator<Item = &AddRuleError> {
        self.errors.iter()
    }

    /// Append another status to this one.
    pub fn merge(&mut self, other: AddRuleStatus) {
        self.rules.extend(other.rules);
        self.errors.extend(other.errors);
    }
}

/// Error when adding a rule to a [`Compiler`].
#[derive(Debug)]
pub struct AddRuleError {
    /// The path to the file containing the error.
    ///
    /// None if the error happens on a raw string ([`Compiler::add_rules_str`]).
    pub path: Option<PathBuf>,

    /// Name of the rejected rule.
    ///
    /// None if the error is not tied to a rule, or if the rule could not be parsed far enough
    /// to read its name.
    pub rule_name: Option<String>,

    /// The kind of error.
    ///
    /// Boxed because big.
    kind: Box<AddRuleErrorKind>,

    /// Description of the error.
    desc: String,
}

impl Display for AddRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.desc)
    }
}
impl std::error::Error for AddRuleError {}

/// Kind of error when adding a rule to a [`Compiler`].
#[derive(Debug)]
enum AddRuleErrorKind {
    /// Error while trying to read a file or to walk a directory.
    IO {
        /// Path to the file.
        path: PathBuf,

        /// IO error on this path.
        error: std::io::Error,
    },

    /// Error while parsing a rule.
    Parse(antibody_parser::error::Error),

    /// Error while compiling a rule.
    Compilation(CompilationError),
}

impl AddRuleError {
    fn new(
        kind: AddRuleErrorKind,
        input_path: Option<&Path>,
        rule_name: Option<String>,
        input: &str,
    ) -> Self {
        let path_display = input_path.map(|v| v.display().to_string());

        Self {
            desc: generate_description(
                &kind.to_diagnostic(),
                path_display.as_deref().unwrap_or("mem"),
                input,
            ),
            path: input_path.map(Path::to_path_buf),
            rule_name,
            kind: Box::new(kind),
        }
    }

    /// Convert to a [`Diagnostic`].
    ///
    /// This can be used to display the error in a more user-friendly manner than the
    /// simple description.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        self.kind.to_diagnostic()
    }

    /// Returns true if the error is an IO error, i.e. a file that could not be read.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(*self.kind, AddRuleErrorKind::IO { .. })
    }
}

/// Convert to a displayable, single-lined description.
///
/// # Arguments
///
/// * `input_name`: a name for the input, used at the beginning of the
///   description: `<filename>:<line>:<column>: <description>`.
/// * `input`: the input given to [`antibody_parser::parse`] that generated the error.
#[must_use]
pub fn generate_description(diag: &Diagnostic<()>, input_name: &str, input: &str) -> String {
    // Generate a small report using codespan_reporting
    let mut writer = term::termcolor::Buffer::no_color();
    let config = term::Config {
        display_style: term::DisplayStyle::Short,
        ..term::Config::default()
    };

    let files = SimpleFile::new(input_name, &input);
    let _res = term::emit(&mut writer, &config, &files, diag);
    let mut res = writer.as_slice();
    // remove the trailing \n that codespan reporting adds.
    if res.ends_with(b"\n") {
        res = &res[..(res.len() - 1)];
    }
    String::from_utf8_lossy(res).to_string()
}

impl AddRuleErrorKind {
    fn to_diagnostic(&self) -> Diagnostic<()> {
        match self {
            Self::IO { path, error } => Diagnostic::error().with_message(format!(
                "Cannot read rules file {}: {}",
                path.display(),
                error
            )),
            Self::Parse(err) => err.to_diagnostic(),
            Self::Compilation(err) => err.to_diagnostic(),
        }
    }
}

/// Error when finalizing a [`Compiler`] into a [`Scanner`].
#[derive(Debug)]
pub struct FinalizeError(pub(crate) aho_corasick::BuildError);

impl Display for FinalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot build the patterns automaton: {}", self.0)
    }
}

impl std::error::Error for FinalizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
