//! Cooperative progress and cancellation monitors.
//!
//! A [`Monitor`] is threaded through monitored dataset operations to the storage backend.
//! Datasets never interrupt an in-flight backend call, it is up to the backend to check [`Monitor::is_cancelled`] before or during its own I/O.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A cooperative progress/cancellation token.
pub trait Monitor: Send + Sync + core::fmt::Debug {
    /// Returns true if the operation should stop as soon as possible.
    fn is_cancelled(&self) -> bool;

    /// Record that `amount` units of work (elements) have been completed.
    fn worked(&self, amount: u64);
}

/// A [`Monitor`] that accumulates work and can be cancelled from any thread.
#[derive(Debug, Default)]
pub struct ProgressMonitor {
    worked: AtomicU64,
    cancelled: AtomicBool,
}

impl ProgressMonitor {
    /// Create a new progress monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns the total amount of work recorded.
    pub fn total_worked(&self) -> u64 {
        self.worked.load(Ordering::Relaxed)
    }
}

impl Monitor for ProgressMonitor {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn worked(&self, amount: u64) {
        self.worked.fetch_add(amount, Ordering::Relaxed);
    }
}
