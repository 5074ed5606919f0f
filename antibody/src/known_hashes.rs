//! Table of known malicious files, identified by the hash of their content.
//!
//! When a [`crate::Scanner`] has a table of known hashes, every scanned byte slice is first
//! hashed and looked up in the table. On a hit, no pattern is searched and no rule is
//! evaluated: the bytes are reported as a known malicious file, with the family and severity
//! recorded in the table.
//!
//! ```
//! use antibody::assessment::Severity;
//! use antibody::known_hashes::{KnownHashInfo, KnownHashes};
//!
//! let mut known_hashes = KnownHashes::new();
//! // md5 of "abc"
//! known_hashes.add(
//!     "900150983cd24fb0d6963f7d28e17f72",
//!     KnownHashInfo::new().family("abcware").severity(Severity::Critical),
//! )?;
//!
//! let mut scanner = antibody::Compiler::new().finalize()?;
//! scanner.set_known_hashes(known_hashes);
//!
//! let assessment = scanner.scan_mem(b"abc").unwrap().assessment();
//! assert!(assessment.is_malicious());
//! assert_eq!(assessment.family.as_deref(), Some("abcware"));
//! assert_eq!(assessment.severity, Severity::Critical);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::collections::HashMap;

use md5::{Digest, Md5};
use sha2::Sha256;

use crate::assessment::Severity;

/// Table of hashes of known malicious files.
///
/// MD5 and SHA256 hashes are accepted.
#[derive(Clone, Debug, Default)]
pub struct KnownHashes {
    md5: HashMap<Vec<u8>, KnownHashInfo>,
    sha256: HashMap<Vec<u8>, KnownHashInfo>,
}

/// Information recorded on a known malicious file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownHashInfo {
    /// Malware family of the file.
    pub family: Option<String>,

    /// Severity of the file.
    ///
    /// Default value is [`Severity::High`].
    pub severity: Severity,
}

impl Default for KnownHashInfo {
    fn default() -> Self {
        Self {
            family: None,
            severity: Severity::High,
        }
    }
}

impl KnownHashInfo {
    /// Create a new info, with no family and a high severity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Malware family of the file.
    #[must_use]
    pub fn family<S: Into<String>>(mut self, family: S) -> Self {
        self.family = Some(family.into());
        self
    }

    /// Severity of the file.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Kind of hash of a [`KnownHashMatch`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HashKind {
    /// MD5
    Md5,
    /// SHA256
    Sha256,
}

/// Scanned bytes found in a [`KnownHashes`] table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownHashMatch {
    /// Kind of the hash that matched.
    pub kind: HashKind,

    /// The hash of the scanned bytes, in lowercase hexadecimal.
    pub hash: String,

    /// Information recorded for this hash.
    pub info: KnownHashInfo,
}

impl KnownHashes {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hash to the table.
    ///
    /// The hash is given in hexadecimal, in any case. Its length selects the algorithm: 32
    /// characters for MD5, 64 for SHA256. Adding a hash already in the table replaces its info.
    ///
    /// # Errors
    ///
    /// Fails if the hash is not a valid MD5 or SHA256 hexadecimal string.
    pub fn add(&mut self, hash: &str, info: KnownHashInfo) -> Result<(), InvalidHashError> {
        let invalid = || InvalidHashError {
            hash: hash.to_owned(),
        };
        let bytes = hex::decode(hash.trim()).map_err(|_| invalid())?;

        let table = match bytes.len() {
            16 => &mut self.md5,
            32 => &mut self.sha256,
            _ => return Err(invalid()),
        };
        let _r = table.insert(bytes, info);
        Ok(())
    }

    /// Number of hashes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.md5.len() + self.sha256.len()
    }

    /// Returns true if the table contains no hash.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.md5.is_empty() && self.sha256.is_empty()
    }

    /// Look up the hashes of the given bytes.
    ///
    /// SHA256 is checked first. A hash is only computed if the table holds hashes of its
    /// kind.
    pub(crate) fn lookup(&self, mem: &[u8]) -> Option<KnownHashMatch> {
        if !self.sha256.is_empty() {
            let digest = Sha256::digest(mem);
            if let Some(info) = self.sha256.get(digest.as_slice()) {
                return Some(KnownHashMatch {
                    kind: HashKind::Sha256,
                    hash: hex::encode(digest),
                    info: info.clone(),
                });
            }
        }
        if !self.md5.is_empty() {
            let digest = Md5::digest(mem);
            if let Some(info) = self.md5.get(digest.as_slice()) {
                return Some(KnownHashMatch {
                    kind: HashKind::Md5,
                    hash: hex::encode(digest),
                    info: info.clone(),
                });
            }
        }
        None
    }
}

/// A hash added to a [`KnownHashes`] table is invalid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidHashError {
    /// The invalid hash.
    pub hash: String,
}

impl std::fmt::Display for InvalidHashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid hash `{}`: expected an md5 or sha256 hexadecimal string",
            self.hash
        )
    }
}

impl std::error::Error for InvalidHashError {}
