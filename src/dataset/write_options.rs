use std::sync::Arc;

use crate::monitor::Monitor;

use super::{ArrayBytes, DataType};

/// Per-call write options.
///
/// Options left unset fall back to the configuration of the dataset.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    asynchronous: Option<bool>,
    monitor: Option<Arc<dyn Monitor>>,
}

impl WriteOptions {
    /// Create new write options using the defaults of the dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write options which always block until the backend has completed the write.
    #[must_use]
    pub fn synchronous() -> Self {
        Self::default().with_asynchronous(false)
    }

    /// Set whether the write should be queued if the backend supports it.
    #[must_use]
    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = Some(asynchronous);
        self
    }

    /// Set the monitor passed through to the backend.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Returns the requested write mode, if set.
    #[must_use]
    pub fn asynchronous(&self) -> Option<bool> {
        self.asynchronous
    }

    /// Returns the monitor, if set.
    #[must_use]
    pub fn monitor(&self) -> Option<&Arc<dyn Monitor>> {
        self.monitor.as_ref()
    }
}

/// A hook normalising data before it is stored.
///
/// A dataset applies its input transform to the data of every write, after the data has been reconciled with the slice and before it is passed on to its root.
/// A write through a view applies the input transform of the view, then those of the views it was derived from (nearest first), and finally that of the root.
///
/// The input transforms of views receive data in the axis order of the view being written, and the input transform of the root receives data in the axis order of the root.
/// A transform must preserve the shape and item size of the data.
pub trait InputTransform: Send + Sync {
    /// Transform `data` of `data_type` elements.
    ///
    /// # Errors
    /// Returns an error message if the data cannot be transformed.
    fn transform(&self, data: ArrayBytes, data_type: &DataType) -> Result<ArrayBytes, String>;
}

impl<F> InputTransform for F
where
    F: Fn(ArrayBytes, &DataType) -> Result<ArrayBytes, String> + Send + Sync,
{
    fn transform(&self, data: ArrayBytes, data_type: &DataType) -> Result<ArrayBytes, String> {
        self(data, data_type)
    }
}
