//! Dataset storage ([backends](backend) and [backend adapters](backend_adapter)).
//!
//! A storage backend performs the physical reads and writes of a root [`Dataset`](crate::dataset::Dataset).
//! Views never hold a backend, they always route through their root.
//!
//! Every backend request is expressed as a [`TrueSlice`]: an ascending [`ArraySubset`] in storage coordinates, the shape of the stored array after any growth, and whether the request grows it.
//! Element bytes are exchanged row-major, native-endian, in storage axis order.
//!
//! ### Fill values
//! A backend receiving an expanded [`TrueSlice`] must ensure that every element inside [`TrueSlice::source_shape`] that has never been written reads back as [`StoreOptions::fill_value`].
//! Whether those elements are materialised eagerly or when first touched is up to the backend.
//! The [`MemoryBackend`](backend::MemoryBackend) materialises them eagerly.
//!
//! ### Queued writes
//! A backend may support non-blocking writes by returning [`Some`] from [`WritableBackendTraits::as_queued`].
//! Failures of a queued write are not reported to the writer, they are surfaced through the backend itself (e.g. [`QueuedBackend::take_errors`](backend::QueuedBackend::take_errors)).

pub mod backend;
pub mod backend_adapter;
mod storage_sync;

use std::sync::Arc;

use derive_more::Display;
use thiserror::Error;

use crate::{
    array_subset::ArraySubset,
    dataset::{ArrayShape, FillValue},
    monitor::Monitor,
};

pub use self::storage_sync::{
    QueuedWritableBackendTraits, ReadableBackendTraits, WritableBackendTraits,
};

/// [`Arc`] wrapped readable backend.
pub type ReadableBackend = Arc<dyn ReadableBackendTraits>;

/// [`Arc`] wrapped readable and writable backend.
pub type Backend = Arc<dyn WritableBackendTraits>;

/// A slice in storage coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{subset} in {source_shape:?}")]
pub struct TrueSlice {
    /// The region of the stored array.
    pub subset: ArraySubset,
    /// The shape of the stored array, including any growth required by this request.
    pub source_shape: ArrayShape,
    /// True if the request grows the stored array.
    pub expanded: bool,
}

impl TrueSlice {
    /// Create a new true slice.
    #[must_use]
    pub fn new(subset: ArraySubset, source_shape: ArrayShape, expanded: bool) -> Self {
        Self {
            subset,
            source_shape,
            expanded,
        }
    }

    /// Returns true if the subset lies within [`source_shape`](TrueSlice::source_shape).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.subset.inbounds(&self.source_shape)
    }
}

/// Options passed to a backend with every request.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    /// The fill value of the dataset.
    pub fill_value: FillValue,
    /// An optional progress/cancellation monitor.
    pub monitor: Option<Arc<dyn Monitor>>,
}

impl StoreOptions {
    /// Create new store options with `fill_value` and no monitor.
    #[must_use]
    pub fn new(fill_value: FillValue) -> Self {
        Self {
            fill_value,
            monitor: None,
        }
    }

    /// Set the monitor.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Option<Arc<dyn Monitor>>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Returns true if the monitor has requested cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|monitor| monitor.is_cancelled())
    }

    /// Report `elements` of progress to the monitor, if any.
    pub fn worked(&self, elements: u64) {
        if let Some(monitor) = &self.monitor {
            monitor.worked(elements);
        }
    }
}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only backend.
    #[error("a write operation was attempted on a read only backend")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The operation was cancelled by its monitor.
    #[error("the operation was cancelled")]
    Cancelled,
    /// The slice is not valid for the backend.
    #[error("invalid slice {0}")]
    InvalidSlice(TrueSlice),
    /// The write queue of the backend has been closed.
    #[error("the write queue is closed")]
    QueueClosed,
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
