use crate::dataset::{ArrayBytes, ArrayShape};

use super::{StorageError, StoreOptions, TrueSlice};

/// Readable backend traits.
pub trait ReadableBackendTraits: Send + Sync {
    /// Returns true if the backend can be read from.
    fn is_readable(&self) -> bool {
        true
    }

    /// Prepare the backend for I/O.
    ///
    /// Called once per root dataset, before its first read or write.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the backend could not be set up.
    fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Retrieve the elements of `slice`.
    ///
    /// The returned bytes have the shape of `slice.subset` and are in storage axis order.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn retrieve_slice(
        &self,
        slice: &TrueSlice,
        options: &StoreOptions,
    ) -> Result<ArrayBytes, StorageError>;

    /// Return the shape of the stored array, if the backend tracks it.
    ///
    /// Datasets use this to pick up growth made by other writers of the same backend.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn shape(&self) -> Result<Option<ArrayShape>, StorageError> {
        Ok(None)
    }
}

/// Writable backend traits.
pub trait WritableBackendTraits: ReadableBackendTraits {
    /// Returns true if the backend can be written to.
    ///
    /// Datasets check this before every blocking write and never issue a write to a backend that returns false.
    fn is_writable(&self) -> bool {
        true
    }

    /// Store `bytes` to `slice`, blocking until the write has completed.
    ///
    /// `bytes` have the shape of `slice.subset` and are in storage axis order.
    /// If `slice.expanded` is true, the stored array grows to `slice.source_shape` and elements outside `slice.subset` which have never been written take `options.fill_value`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn store_slice(
        &self,
        slice: &TrueSlice,
        bytes: &ArrayBytes,
        options: &StoreOptions,
    ) -> Result<(), StorageError>;

    /// Returns the queued write capability of the backend, if supported.
    fn as_queued(&self) -> Option<&dyn QueuedWritableBackendTraits> {
        None
    }
}

/// Queued (non-blocking) writable backend traits.
pub trait QueuedWritableBackendTraits: Send + Sync {
    /// Enqueue a write of `bytes` to `slice` and return without waiting for it to complete.
    ///
    /// Failures of the write itself are reported by the backend, not to the caller.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the write could not be enqueued.
    fn enqueue_slice(
        &self,
        slice: TrueSlice,
        bytes: ArrayBytes,
        options: StoreOptions,
    ) -> Result<(), StorageError>;
}
