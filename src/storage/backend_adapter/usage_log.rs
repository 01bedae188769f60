//! A backend adapter which logs backend calls.

use std::{io::Write, sync::Arc};

use parking_lot::Mutex;

use crate::{
    dataset::{ArrayBytes, ArrayShape},
    storage::{
        Backend, QueuedWritableBackendTraits, ReadableBackendTraits, StorageError, StoreOptions,
        TrueSlice, WritableBackendTraits,
    },
};

/// The usage log backend adapter. Logs backend method calls.
///
/// It is intended to aid in debugging and optimising performance by revealing backend access patterns.
///
/// ### Example (log to stdout)
/// ```rust
/// # use std::sync::Arc;
/// # use parking_lot::Mutex;
/// # use lazy_dataset::dataset::{DataType, FillValue};
/// # use lazy_dataset::storage::backend::MemoryBackend;
/// # use lazy_dataset::storage::backend_adapter::UsageLogBackend;
/// let backend = Arc::new(MemoryBackend::new(DataType::UInt8, vec![4, 4], &FillValue::from(0u8)));
/// let log_writer = Arc::new(Mutex::new(
///     // std::io::BufWriter::new(
///     std::io::stdout(),
///     //    )
/// ));
/// let backend = Arc::new(UsageLogBackend::new(backend, log_writer, || {
///     chrono::Utc::now().format("[%T%.3f] ").to_string()
/// }));
/// ```
///
/// Writing and reading a dataset with the above [`UsageLogBackend`] prints outputs like:
/// ```text
/// [23:41:19.885] initialize() -> Ok(())
/// [23:41:19.885] is_writable() -> true
/// [23:41:19.885] store_slice(start [0, 2] step [1, 1] shape [4, 4] in [4, 6], len=16) -> Ok(())
/// [23:41:19.886] shape() -> Ok(Some([4, 6]))
/// [23:41:19.887] is_readable() -> true
/// [23:41:19.887] retrieve_slice(start [0, 0] step [1, 2] shape [4, 3] in [4, 6]) -> len=Ok(12)
/// ```
pub struct UsageLogBackend {
    backend: Backend,
    handle: Arc<Mutex<dyn Write + Send + Sync>>,
    prefix_func: fn() -> String,
}

impl core::fmt::Debug for UsageLogBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        writeln!(f, "usage log")
    }
}

impl UsageLogBackend {
    /// Create a new usage log backend adapter.
    pub fn new(
        backend: Backend,
        handle: Arc<Mutex<dyn Write + Send + Sync>>,
        prefix_func: fn() -> String,
    ) -> Self {
        Self {
            backend,
            handle,
            prefix_func,
        }
    }

    fn log(&self, args: core::fmt::Arguments) -> Result<(), StorageError> {
        writeln!(self.handle.lock(), "{}{args}", (self.prefix_func)())?;
        Ok(())
    }
}

impl ReadableBackendTraits for UsageLogBackend {
    fn is_readable(&self) -> bool {
        let result = self.backend.is_readable();
        let _ = self.log(format_args!("is_readable() -> {result}"));
        result
    }

    fn initialize(&self) -> Result<(), StorageError> {
        let result = self.backend.initialize();
        self.log(format_args!("initialize() -> {result:?}"))?;
        result
    }

    fn retrieve_slice(
        &self,
        slice: &TrueSlice,
        options: &StoreOptions,
    ) -> Result<ArrayBytes, StorageError> {
        let result = self.backend.retrieve_slice(slice, options);
        self.log(format_args!(
            "retrieve_slice({slice}) -> len={:?}",
            result.as_ref().map(ArrayBytes::size)
        ))?;
        result
    }

    fn shape(&self) -> Result<Option<ArrayShape>, StorageError> {
        let result = self.backend.shape();
        self.log(format_args!("shape() -> {result:?}"))?;
        result
    }
}

impl WritableBackendTraits for UsageLogBackend {
    fn is_writable(&self) -> bool {
        let result = self.backend.is_writable();
        let _ = self.log(format_args!("is_writable() -> {result}"));
        result
    }

    fn store_slice(
        &self,
        slice: &TrueSlice,
        bytes: &ArrayBytes,
        options: &StoreOptions,
    ) -> Result<(), StorageError> {
        let result = self.backend.store_slice(slice, bytes, options);
        self.log(format_args!(
            "store_slice({slice}, len={}) -> {result:?}",
            bytes.size()
        ))?;
        result
    }

    fn as_queued(&self) -> Option<&dyn QueuedWritableBackendTraits> {
        self.backend.as_queued().map(|_| self as &dyn QueuedWritableBackendTraits)
    }
}

impl QueuedWritableBackendTraits for UsageLogBackend {
    fn enqueue_slice(
        &self,
        slice: TrueSlice,
        bytes: ArrayBytes,
        options: StoreOptions,
    ) -> Result<(), StorageError> {
        let description = format!("enqueue_slice({slice}, len={})", bytes.size());
        let result = self
            .backend
            .as_queued()
            .ok_or_else(|| StorageError::from("the backend does not support queued writes"))
            .and_then(|queued| queued.enqueue_slice(slice, bytes, options));
        self.log(format_args!("{description} -> {result:?}"))?;
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        array_subset::ArraySubset,
        dataset::{DataType, FillValue},
        storage::backend::{MemoryBackend, QueuedBackend},
    };

    use super::*;

    #[test]
    fn usage_log() {
        let log_writer = Arc::new(Mutex::new(std::io::Cursor::new(Vec::<u8>::new())));
        let memory = Arc::new(MemoryBackend::new(DataType::UInt8, vec![2], &FillValue::from(0u8)));
        let backend = UsageLogBackend::new(memory, log_writer.clone(), || "[log] ".to_string());
        assert!(backend.as_queued().is_none());

        let slice = TrueSlice::new(ArraySubset::new_with_ranges(&[0..2]), vec![2], false);
        backend
            .store_slice(&slice, &ArrayBytes::new(vec![2], vec![1, 2]), &StoreOptions::default())
            .unwrap();
        backend.retrieve_slice(&slice, &StoreOptions::default()).unwrap();

        let log = String::from_utf8(log_writer.lock().get_ref().clone()).unwrap();
        assert_eq!(
            log,
            "[log] store_slice(start [0] step [1] shape [2] in [2], len=2) -> Ok(())\n\
             [log] retrieve_slice(start [0] step [1] shape [2] in [2]) -> len=Ok(2)\n"
        );
    }

    #[test]
    fn usage_log_forwards_queued() {
        let log_writer = Arc::new(Mutex::new(std::io::sink()));
        let memory = Arc::new(MemoryBackend::new(DataType::UInt8, vec![2], &FillValue::from(0u8)));
        let queued = Arc::new(QueuedBackend::new(memory.clone()));
        let backend = UsageLogBackend::new(queued.clone(), log_writer, String::new);
        let slice = TrueSlice::new(ArraySubset::new_with_ranges(&[1..2]), vec![2], false);
        backend
            .as_queued()
            .unwrap()
            .enqueue_slice(slice, ArrayBytes::new(vec![1], vec![5]), StoreOptions::default())
            .unwrap();
        queued.flush();
        assert_eq!(memory.array_bytes().bytes(), &[0, 5]);
    }
}
