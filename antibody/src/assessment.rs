//! Summary of the rules matched during a scan.
//!
//! Rules describe what they detect through their metadata:
//!
//! - `severity`: one of `critical`, `high`, `medium` or `low`.
//! - `category`: the kind of threat. Rules with a `ransomware` category are always reported
//!   with the `ransomware` family.
//! - `family`: the name of the detected malware family.
//!
//! Bytes found in a table of [known hashes](crate::known_hashes) are instead assessed from
//! the information recorded in the table, with a full confidence.
//!
//! ```
//! use antibody::assessment::Severity;
//!
//! let mut compiler = antibody::Compiler::new();
//! let _status = compiler.add_rules_str(r#"
//! rule locker {
//!     meta:
//!         severity = "critical"
//!         category = "ransomware"
//!     strings:
//!         $a = ".locked"
//!     condition:
//!         $a
//! }
//! "#);
//! let scanner = compiler.finalize()?;
//! let res = scanner.scan_mem(b"report.pdf.locked").unwrap();
//!
//! let assessment = res.assessment();
//! assert_eq!(assessment.severity, Severity::Critical);
//! assert_eq!(assessment.family.as_deref(), Some("ransomware"));
//! assert_eq!(assessment.matched_rules, ["locker"]);
//! # Ok::<(), antibody::compiler::FinalizeError>(())
//! ```
use crate::known_hashes::KnownHashMatch;
use crate::scanner::EvaluatedRule;
use crate::{Metadata, MetadataValue};

/// Severity of a detection, from the `severity` metadata of the rules.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// No rule matched, or no matched rule declares a known severity.
    #[default]
    Unknown,
    /// `low`
    Low,
    /// `medium`
    Medium,
    /// `high`
    High,
    /// `critical`
    Critical,
}

impl Severity {
    fn from_name(name: &[u8]) -> Self {
        match name.to_ascii_lowercase().as_slice() {
            b"critical" => Self::Critical,
            b"high" => Self::High,
            b"medium" => Self::Medium,
            b"low" => Self::Low,
            _ => Self::Unknown,
        }
    }
}

/// Summary of the matched rules of a scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assessment {
    /// Highest severity among the matched rules.
    pub severity: Severity,

    /// Most frequent malware family among the matched rules.
    ///
    /// Between families with the same count, the first one found is reported.
    pub family: Option<String>,

    /// Confidence in the detection, between 0 and 1.
    ///
    /// For a known malicious file, this is 1. Otherwise, this is the highest ratio of found
    /// patterns in a matched rule, counting ten patterns as a full confidence, and capped at
    /// 0.95.
    ///
    /// Only the first match of each pattern is kept during a scan, so a pattern found many
    /// times counts once.
    pub confidence: f64,

    /// Names of the matched rules.
    pub matched_rules: Vec<String>,

    /// Set if the scanned bytes are a known malicious file.
    pub known_hash: Option<KnownHashMatch>,
}

/// Maximum confidence of a detection.
const MAX_CONFIDENCE: f64 = 0.95;

/// Number of found patterns in a rule giving a full confidence.
const PATTERNS_FOR_FULL_CONFIDENCE: f64 = 10.0;

impl Assessment {
    /// Returns true if the scanned bytes are a known malicious file, or if any rule matched.
    #[must_use]
    pub fn is_malicious(&self) -> bool {
        self.known_hash.is_some() || !self.matched_rules.is_empty()
    }

    pub(crate) fn from_known_hash(known_hash: &KnownHashMatch) -> Self {
        Self {
            severity: known_hash.info.severity,
            family: known_hash.info.family.clone(),
            confidence: 1.0,
            matched_rules: Vec::new(),
            known_hash: Some(known_hash.clone()),
        }
    }

    pub(crate) fn from_rules(rules: &[EvaluatedRule<'_>]) -> Self {
        let mut assessment = Self::default();
        // Families with their counts, in order of appearance.
        let mut families: Vec<(String, usize)> = Vec::new();

        for rule in rules.iter().filter(|rule| rule.is_matched()) {
            assessment.matched_rules.push(rule.name.to_owned());

            if let Some(severity) = get_meta(rule.metadatas, "severity") {
                assessment.severity = assessment.severity.max(Severity::from_name(severity));
            }

            let family = match get_meta(rule.metadatas, "category") {
                Some(category) if category.eq_ignore_ascii_case(b"ransomware") => {
                    Some("ransomware".to_owned())
                }
                _ => get_meta(rule.metadatas, "family")
                    .map(|family| String::from_utf8_lossy(family).into_owned()),
            };
            if let Some(family) = family {
                match families.iter_mut().find(|(name, _)| *name == family) {
                    Some((_, count)) => *count += 1,
                    None => families.push((family, 1)),
                }
            }

            #[allow(clippy::cast_precision_loss)]
            let ratio = (rule.matches.len() as f64 / PATTERNS_FOR_FULL_CONFIDENCE).min(1.0);
            assessment.confidence = assessment.confidence.max(ratio);
        }
        assessment.confidence = assessment.confidence.min(MAX_CONFIDENCE);

        // max_by_key returns the last maximum, iterate in reverse to keep the first one.
        assessment.family = families
            .into_iter()
            .rev()
            .max_by_key(|(_, count)| *count)
            .map(|(name, _)| name);

        assessment
    }
}

/// Get the value of a string metadata.
fn get_meta<'a>(metadatas: &'a [Metadata], name: &str) -> Option<&'a [u8]> {
    metadatas
        .iter()
        .find_map(|meta| match &meta.value {
            MetadataValue::Bytes(v) if meta.name == name => Some(v.as_slice()),
            _ => None,
        })
}
