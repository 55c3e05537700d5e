//! Progress reporting and cooperative cancellation for long-running stages.
//!
//! The skeleton builder and the gap scorer call back into a [`Progress`]
//! between stages. A caller that wants to stop early takes a
//! [`CancelToken`] before starting and cancels it from another thread; the
//! running computation notices at its next checkpoint and returns
//! [`TraceError::Aborted`] instead of a partial result.
//!
//! # Example
//!
//! ```
//! use filament::algo::progress::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     println!("[{}/{}] {}", current, total, message);
//! });
//! let token = progress.cancel_token();
//! assert!(!progress.is_cancelled());
//! token.cancel();
//! assert!(progress.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, TraceError};

/// A progress callback plus a shared cancellation flag.
///
/// The callback receives:
/// - `current`: Current step (0-based)
/// - `total`: Total number of steps
/// - `message`: Description of the current stage
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
    cancelled: Arc<AtomicBool>,
}

/// Handle that cancels the [`Progress`] it was taken from.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report progress within a sub-range.
    ///
    /// Maps `[0, sub_total]` onto the slot `[range_current, range_current + 1)`
    /// of a `range_total`-step run, in thousandths.
    #[inline]
    pub fn report_sub(
        &self,
        sub_current: usize,
        sub_total: usize,
        range_current: usize,
        range_total: usize,
        message: &str,
    ) {
        if sub_total == 0 || range_total == 0 {
            return;
        }
        let sub_fraction = (sub_current.min(sub_total) * 1000) / sub_total;
        (self.callback)(
            range_current * 1000 + sub_fraction,
            range_total * 1000,
            message,
        );
    }

    /// A token that cancels this reporter.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with [`TraceError::Aborted`] if cancellation was requested.
    pub(crate) fn checkpoint(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            log::debug!("cancelled during {}", stage);
            return Err(TraceError::aborted(format!("cancelled during {}", stage)));
        }
        Ok(())
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
