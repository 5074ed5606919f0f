use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::scanner::{ScanError, ScanParams};

/// Check whether a scan must be aborted, on a deadline or on a cancellation.
#[derive(Debug)]
pub struct AbortChecker {
    /// Instant after which the scan is aborted.
    ///
    /// This is the earliest of the deadline and of the end of the timeout duration.
    deadline: Option<Instant>,

    cancellation_flag: Option<Arc<AtomicBool>>,

    counter: u32,
}

impl AbortChecker {
    pub fn new(params: &ScanParams) -> Self {
        let timeout_end = params
            .timeout_duration
            .and_then(|duration| Instant::now().checked_add(duration));
        let deadline = match (timeout_end, params.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Self {
            deadline,
            cancellation_flag: params.cancellation_flag.clone(),
            counter: 0,
        }
    }

    /// Check for an abort, on hot paths.
    ///
    /// The clock is only read every 10 * 1024 calls.
    pub fn check(&mut self) -> Result<(), ScanError> {
        self.counter = self.counter.wrapping_add(1);
        if self.counter % (10 * 1024) == 0 {
            self.check_now()
        } else {
            Ok(())
        }
    }

    /// Check for an abort immediately.
    pub fn check_now(&self) -> Result<(), ScanError> {
        if let Some(flag) = &self.cancellation_flag {
            if flag.load(Ordering::Relaxed) {
                return Err(ScanError::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ScanError::Timeout);
            }
        }
        Ok(())
    }
}
