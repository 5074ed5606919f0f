/// Scanning error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanError {
    /// Scanning took too long and timed out.
    ///
    /// See [`crate::scanner::ScanParams::timeout_duration`] and
    /// [`crate::scanner::ScanParams::deadline`].
    Timeout,

    /// The cancellation flag was set during the scan.
    ///
    /// See [`crate::scanner::ScanParams::cancellation_flag`].
    Cancelled,

    /// The scanned bytes are bigger than the configured limit, and were not scanned.
    ///
    /// See [`crate::scanner::ScanParams::max_scan_size`].
    SizeLimitExceeded {
        /// Size of the bytes to scan.
        size: usize,
        /// The limit.
        limit: usize,
    },
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "scan cancelled"),
            Self::SizeLimitExceeded { size, limit } => {
                write!(f, "size {size} exceeds the scan limit of {limit} bytes")
            }
        }
    }
}

impl std::error::Error for ScanError {}
