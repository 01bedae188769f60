//! A backend adapter which records performance metrics.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    dataset::{ArrayBytes, ArrayShape},
    storage::{
        Backend, QueuedWritableBackendTraits, ReadableBackendTraits, StorageError, StoreOptions,
        TrueSlice, WritableBackendTraits,
    },
};

/// The performance metrics backend adapter. Accumulates metrics, such as bytes read and written.
///
/// It is intended to aid in testing by allowing the application to validate that metrics (e.g., bytes read/written, total read/write operations, permission checks) match expected values for specific operations.
/// Only successful reads and writes are counted towards the byte totals.
pub struct PerformanceMetricsBackend {
    backend: Backend,
    bytes_read: AtomicUsize,
    bytes_written: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    queued_writes: AtomicUsize,
    writable_checks: AtomicUsize,
    initializations: AtomicUsize,
}

impl core::fmt::Debug for PerformanceMetricsBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "performance metrics (reads {}, writes {}, queued writes {})",
            self.reads(),
            self.writes(),
            self.queued_writes()
        )
    }
}

impl PerformanceMetricsBackend {
    /// Create a new performance metrics backend adapter.
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            bytes_read: AtomicUsize::default(),
            bytes_written: AtomicUsize::default(),
            reads: AtomicUsize::default(),
            writes: AtomicUsize::default(),
            queued_writes: AtomicUsize::default(),
            writable_checks: AtomicUsize::default(),
            initializations: AtomicUsize::default(),
        }
    }

    /// Returns the number of bytes read.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes written (or queued for writing).
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of read requests.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of blocking write requests.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of queued write requests.
    pub fn queued_writes(&self) -> usize {
        self.queued_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of writability checks.
    pub fn writable_checks(&self) -> usize {
        self.writable_checks.load(Ordering::Relaxed)
    }

    /// Returns the number of initialisations.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::Relaxed)
    }

    /// Returns the total number of backend calls of any kind.
    pub fn calls(&self) -> usize {
        self.reads() + self.writes() + self.queued_writes() + self.writable_checks() + self.initializations()
    }
}

impl ReadableBackendTraits for PerformanceMetricsBackend {
    fn is_readable(&self) -> bool {
        self.backend.is_readable()
    }

    fn initialize(&self) -> Result<(), StorageError> {
        self.initializations.fetch_add(1, Ordering::Relaxed);
        self.backend.initialize()
    }

    fn retrieve_slice(
        &self,
        slice: &TrueSlice,
        options: &StoreOptions,
    ) -> Result<ArrayBytes, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let bytes = self.backend.retrieve_slice(slice, options)?;
        self.bytes_read.fetch_add(bytes.size(), Ordering::Relaxed);
        Ok(bytes)
    }

    fn shape(&self) -> Result<Option<ArrayShape>, StorageError> {
        self.backend.shape()
    }
}

impl WritableBackendTraits for PerformanceMetricsBackend {
    fn is_writable(&self) -> bool {
        self.writable_checks.fetch_add(1, Ordering::Relaxed);
        self.backend.is_writable()
    }

    fn store_slice(
        &self,
        slice: &TrueSlice,
        bytes: &ArrayBytes,
        options: &StoreOptions,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.backend.store_slice(slice, bytes, options)?;
        self.bytes_written.fetch_add(bytes.size(), Ordering::Relaxed);
        Ok(())
    }

    fn as_queued(&self) -> Option<&dyn QueuedWritableBackendTraits> {
        self.backend
            .as_queued()
            .map(|_| self as &dyn QueuedWritableBackendTraits)
    }
}

impl QueuedWritableBackendTraits for PerformanceMetricsBackend {
    fn enqueue_slice(
        &self,
        slice: TrueSlice,
        bytes: ArrayBytes,
        options: StoreOptions,
    ) -> Result<(), StorageError> {
        self.queued_writes.fetch_add(1, Ordering::Relaxed);
        let queued = self
            .backend
            .as_queued()
            .ok_or_else(|| StorageError::from("the backend does not support queued writes"))?;
        let size = bytes.size();
        queued.enqueue_slice(slice, bytes, options)?;
        self.bytes_written.fetch_add(size, Ordering::Relaxed);
        Ok(())
    }
}
