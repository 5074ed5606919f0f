//! **antibody** is a detection rule engine, used to scan bytes for textual, binary and
//! encoded patterns.
//!
//! Rules declare patterns (text strings, possibly case insensitive, xored or base64 encoded,
//! and hex strings with wildcards) and a condition combining those patterns with properties of
//! the scanned bytes: size, header magic, entropy of the whole buffer or of a section.
//!
//! Here is an example on how to use the library.
//!
//! ```
//! use antibody::Compiler;
//!
//! // Rules must first be added to a compiler.
//! let mut compiler = Compiler::new();
//! let status = compiler.add_rules_str(r#"
//! rule ransom_note : ransomware {
//!     meta:
//!         severity = "high"
//!         category = "ransomware"
//!     strings:
//!         $note = "your files have been encrypted" nocase
//!         $key = { 2D 2D 2D 2D 2D 42 45 47 49 4E ?? 50 55 42 }
//!     condition:
//!         any of them
//! }
//! "#);
//! assert!(status.errors().next().is_none());
//!
//! // Then, all added rules are compiled into a scanner object.
//! let scanner = compiler.finalize()?;
//!
//! // Use this object to scan bytes.
//! let res = scanner.scan_mem(b"...YOUR FILES HAVE BEEN ENCRYPTED...").unwrap();
//! assert!(res.rules.iter().any(|rule| rule.name == "ransom_note" && rule.is_matched()));
//!
//! # Ok::<(), antibody::compiler::FinalizeError>(())
//! ```

// Used in integration tests, not in the library.
// This is to remove the "unused_crate_dependencies" warning.
#[cfg(test)]
use base64 as _;
#[cfg(test)]
use tempfile as _;

pub mod assessment;
pub(crate) mod atoms;
pub mod compiler;
pub use compiler::rule::{Metadata, MetadataValue};
pub use compiler::Compiler;
mod evaluator;
pub mod known_hashes;
mod matcher;
pub mod metadata;
pub mod ruleset;
pub mod scanner;
pub use scanner::Scanner;
mod timeout;

#[cfg(test)]
mod test_helpers;
