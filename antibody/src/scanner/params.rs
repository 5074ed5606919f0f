//! Parameters applicable to a scan.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Parameters used to configure a scan.
#[derive(Clone, Debug)]
pub struct ScanParams {
    /// Max duration for a scan before it is aborted.
    pub(crate) timeout_duration: Option<Duration>,

    /// Instant after which a scan is aborted.
    pub(crate) deadline: Option<Instant>,

    /// Flag aborting the scan when set.
    pub(crate) cancellation_flag: Option<Arc<AtomicBool>>,

    /// Size above which scans are refused.
    pub(crate) max_scan_size: usize,

    /// Bytes expected at the start of the scanned bytes, for `valid_header`.
    pub(crate) expected_magic: Vec<u8>,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            timeout_duration: None,
            deadline: None,
            cancellation_flag: None,
            max_scan_size: 100_000_000,
            expected_magic: b"MZ".to_vec(),
        }
    }
}

impl ScanParams {
    /// Maximum duration of a scan before it is stopped.
    ///
    /// If a scan lasts longer than the timeout, it is aborted, and rules that were not
    /// evaluated are reported as [`crate::scanner::Verdict::Aborted`].
    ///
    /// By default, no timeout is set.
    #[must_use]
    pub fn timeout_duration(mut self, timeout_duration: Option<Duration>) -> Self {
        self.timeout_duration = timeout_duration;
        self
    }

    /// Instant after which a scan is stopped.
    ///
    /// This works as [`ScanParams::timeout_duration`], but with an absolute instant. When
    /// both are set, the earliest one applies.
    ///
    /// By default, no deadline is set.
    #[must_use]
    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Flag that can be set from another thread to stop a scan.
    ///
    /// The flag is checked regularly during the scan. Once set, the scan is aborted with
    /// [`crate::scanner::ScanError::Cancelled`].
    ///
    /// By default, no flag is set.
    #[must_use]
    pub fn cancellation_flag(mut self, cancellation_flag: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation_flag = cancellation_flag;
        self
    }

    /// Maximum size of the scanned bytes.
    ///
    /// Bigger inputs are not scanned at all, and the scan fails with
    /// [`crate::scanner::ScanError::SizeLimitExceeded`]. Inputs are never truncated, as this
    /// could hide true matches.
    ///
    /// The default value is `100_000_000`.
    #[must_use]
    pub fn max_scan_size(mut self, max_scan_size: usize) -> Self {
        self.max_scan_size = max_scan_size;
        self
    }

    /// Bytes the scanned bytes must start with for `valid_header` to be true.
    ///
    /// The default value is `MZ`, the magic of PE files.
    #[must_use]
    pub fn expected_magic<T: Into<Vec<u8>>>(mut self, expected_magic: T) -> Self {
        self.expected_magic = expected_magic.into();
        self
    }
}
