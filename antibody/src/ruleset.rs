//! Provides the [`ActiveRuleset`] object, holding the scanner built from a directory of rules.
//!
//! The scanner is replaced as a whole when the directory is reloaded. Scans always run on a
//! clone of the scanner, so a reload never affects scans in progress.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use antibody::ruleset::{ActiveRuleset, RulesetConfig};
//!
//! let config = RulesetConfig::new("/etc/antibody/rules")
//!     .external_symbol("max_entropy", 7.2);
//! let (ruleset, status) = ActiveRuleset::load(config)?;
//! for err in status.errors() {
//!     eprintln!("{err}");
//! }
//!
//! let ruleset = Arc::new(ruleset);
//! let reloader = ruleset.spawn_reloader(ruleset.config().get_reload_interval())?;
//!
//! let scanner = ruleset.scanner();
//! let _res = scanner.scan_mem(b"...");
//!
//! // Stops the reload thread.
//! reloader.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{error, info, warn};

use crate::compiler::{
    AddRuleStatus, CompilerParams, ExternalValue, FinalizeError, DEFAULT_RULES_EXTENSIONS,
};
use crate::known_hashes::KnownHashes;
use crate::scanner::ScanParams;
use crate::{Compiler, Scanner};

/// Configuration of an [`ActiveRuleset`].
#[derive(Clone, Debug)]
pub struct RulesetConfig {
    /// Directory containing the rules files.
    rules_dir: PathBuf,

    /// Interval between two reloads of the directory.
    reload_interval: Duration,

    /// Extensions of the rules files.
    extensions: Vec<String>,

    /// External symbols defined before compiling the rules.
    external_symbols: Vec<(String, ExternalValue)>,

    /// Parameters of the compilation.
    compiler_params: CompilerParams,

    /// Parameters applied on the scanners.
    scan_params: ScanParams,

    /// Hashes of known malicious files, shared by every scanner.
    known_hashes: Option<Arc<KnownHashes>>,
}

impl RulesetConfig {
    /// Configuration loading the rules from the given directory.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(rules_dir: P) -> Self {
        Self {
            rules_dir: rules_dir.into(),
            reload_interval: Duration::from_secs(3600),
            extensions: DEFAULT_RULES_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_owned())
                .collect(),
            external_symbols: Vec::new(),
            compiler_params: CompilerParams::default(),
            scan_params: ScanParams::default(),
            known_hashes: None,
        }
    }

    /// Interval between two reloads, when using [`ActiveRuleset::spawn_reloader`].
    ///
    /// The default value is one hour.
    #[must_use]
    pub fn reload_interval(mut self, reload_interval: Duration) -> Self {
        self.reload_interval = reload_interval;
        self
    }

    /// Extensions of the files loaded from the directory.
    ///
    /// The default value is [`DEFAULT_RULES_EXTENSIONS`].
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Define an external symbol usable in the rules.
    ///
    /// Defining a symbol twice replaces its value.
    #[must_use]
    pub fn external_symbol<S, T>(mut self, name: S, value: T) -> Self
    where
        S: Into<String>,
        T: Into<ExternalValue>,
    {
        let name = name.into();
        let value = value.into();
        match self.external_symbols.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.external_symbols.push((name, value)),
        }
        self
    }

    /// Parameters used when compiling the rules.
    #[must_use]
    pub fn compiler_params(mut self, compiler_params: CompilerParams) -> Self {
        self.compiler_params = compiler_params;
        self
    }

    /// Parameters set on the scanners built from the rules.
    #[must_use]
    pub fn scan_params(mut self, scan_params: ScanParams) -> Self {
        self.scan_params = scan_params;
        self
    }

    /// Hashes of known malicious files, set on the scanners built from the rules.
    ///
    /// The table is kept as is on reloads.
    #[must_use]
    pub fn known_hashes(mut self, known_hashes: KnownHashes) -> Self {
        self.known_hashes = Some(Arc::new(known_hashes));
        self
    }

    /// Directory containing the rules files.
    #[must_use]
    pub fn get_rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Interval between two reloads.
    #[must_use]
    pub fn get_reload_interval(&self) -> Duration {
        self.reload_interval
    }

    /// Compile all the rules of the directory.
    fn compile(&self) -> (Compiler, AddRuleStatus) {
        let mut compiler = Compiler::new();
        compiler.set_params(self.compiler_params.clone());
        for (name, value) in &self.external_symbols {
            let _r = compiler.define_symbol(name, value.clone());
        }
        let status = compiler.add_rules_directory(&self.rules_dir, &self.extensions);
        (compiler, status)
    }

    fn build_scanner(&self, compiler: Compiler) -> Result<Scanner, FinalizeError> {
        let mut scanner = compiler.finalize()?;
        scanner.set_scan_params(self.scan_params.clone());
        if let Some(known_hashes) = &self.known_hashes {
            scanner.set_known_hashes(Arc::clone(known_hashes));
        }
        Ok(scanner)
    }
}

/// The scanner built from a directory of rules, replaced as a whole on reloads.
#[derive(Debug)]
pub struct ActiveRuleset {
    config: RulesetConfig,

    /// Current scanner.
    ///
    /// The lock is only held to clone or to replace the scanner, never during a scan.
    scanner: RwLock<Scanner>,
}

impl ActiveRuleset {
    /// Compile the rules of the configured directory.
    ///
    /// Rules that cannot be compiled are listed in the returned status, and do not prevent
    /// the other rules from being loaded.
    ///
    /// # Errors
    ///
    /// Fails if the scanner cannot be built from the compiled rules.
    pub fn load(config: RulesetConfig) -> Result<(Self, AddRuleStatus), FinalizeError> {
        let (compiler, status) = config.compile();
        let scanner = config.build_scanner(compiler)?;

        info!(
            directory = %config.rules_dir.display(),
            nb_rules = status.rules().count(),
            nb_errors = status.errors().count(),
            "ruleset loaded"
        );

        Ok((
            Self {
                config,
                scanner: RwLock::new(scanner),
            },
            status,
        ))
    }

    /// Configuration of the ruleset.
    #[must_use]
    pub fn config(&self) -> &RulesetConfig {
        &self.config
    }

    /// Get a scanner using the current rules.
    ///
    /// The returned scanner is not affected by later reloads.
    #[must_use]
    pub fn scanner(&self) -> Scanner {
        self.scanner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current scanner, returning the previous one.
    #[must_use = "the previous scanner is returned"]
    pub fn replace(&self, scanner: Scanner) -> Scanner {
        let mut current = self
            .scanner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, scanner)
    }

    /// Compile the rules of the directory again, and replace the current scanner.
    ///
    /// # Errors
    ///
    /// If no rule at all could be compiled, the current scanner is kept and an error is
    /// returned. This protects against a directory being emptied or temporarily unreadable.
    pub fn reload(&self) -> Result<AddRuleStatus, ReloadError> {
        let (compiler, status) = self.config.compile();
        if status.rules().next().is_none() {
            warn!(
                directory = %self.config.rules_dir.display(),
                nb_errors = status.errors().count(),
                "no rule compiled, keeping the current ruleset"
            );
            return Err(ReloadError::NoRules(status));
        }

        let scanner = self
            .config
            .build_scanner(compiler)
            .map_err(ReloadError::Finalize)?;
        let _previous = self.replace(scanner);

        info!(
            directory = %self.config.rules_dir.display(),
            nb_rules = status.rules().count(),
            nb_errors = status.errors().count(),
            "ruleset reloaded"
        );
        Ok(status)
    }

    /// Start a thread reloading the ruleset periodically.
    ///
    /// The thread runs until the returned handle is stopped or dropped.
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be spawned.
    pub fn spawn_reloader(self: &Arc<Self>, interval: Duration) -> std::io::Result<ReloaderHandle> {
        let (stop_sender, stop_receiver) = bounded::<()>(0);
        let ruleset = Arc::clone(self);

        let thread = std::thread::Builder::new()
            .name("antibody-reloader".to_owned())
            .spawn(move || loop {
                match stop_receiver.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(err) = ruleset.reload() {
                            warn!(error = %err, "periodic reload failed");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(ReloaderHandle {
            stop_sender: Some(stop_sender),
            thread: Some(thread),
        })
    }
}

/// Handle on the thread started by [`ActiveRuleset::spawn_reloader`].
///
/// Dropping the handle stops the thread.
#[derive(Debug)]
pub struct ReloaderHandle {
    stop_sender: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReloaderHandle {
    /// Stop the reload thread, and wait for it to end.
    ///
    /// A reload in progress is completed first.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        // Dropping the sender wakes up the thread.
        self.stop_sender = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("reload thread panicked");
            }
        }
    }
}

impl Drop for ReloaderHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

/// Error on [`ActiveRuleset::reload`].
#[derive(Debug)]
pub enum ReloadError {
    /// No rule could be compiled, the current ruleset was kept.
    NoRules(AddRuleStatus),

    /// The scanner could not be built, the current ruleset was kept.
    Finalize(FinalizeError),
}

impl Display for ReloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRules(status) => write!(
                f,
                "no rule could be compiled ({} errors)",
                status.errors().count()
            ),
            Self::Finalize(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ReloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoRules(_) => None,
            Self::Finalize(err) => Some(err),
        }
    }
}
