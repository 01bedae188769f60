//! A backend adapter which performs writes on a worker thread.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread::JoinHandle,
};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};

use crate::{
    dataset::{ArrayBytes, ArrayShape},
    storage::{
        Backend, QueuedWritableBackendTraits, ReadableBackendTraits, StorageError, StoreOptions,
        TrueSlice, WritableBackendTraits,
    },
};

struct QueuedWrite {
    slice: TrueSlice,
    bytes: ArrayBytes,
    options: StoreOptions,
}

#[derive(Default)]
struct QueueCounts {
    pending: usize,
    worker_exited: bool,
}

#[derive(Default)]
struct QueueState {
    counts: Mutex<QueueCounts>,
    idle: Condvar,
    errors: Mutex<Vec<StorageError>>,
}

impl QueueState {
    fn complete(&self, result: Result<(), StorageError>) {
        if let Err(err) = result {
            log::warn!("queued write failed: {err}");
            self.errors.lock().push(err);
        }
        let mut counts = self.counts.lock();
        counts.pending = counts.pending.saturating_sub(1);
        if counts.pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Marks the worker as exited when dropped, however the worker thread ends.
struct WorkerExitGuard(Arc<QueueState>);

impl Drop for WorkerExitGuard {
    fn drop(&mut self) {
        let mut counts = self.0.counts.lock();
        counts.worker_exited = true;
        if counts.pending > 0 {
            log::error!(
                "queued backend worker exited with {} pending writes",
                counts.pending
            );
        }
        self.0.idle.notify_all();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A backend adapter which supports non-blocking writes.
///
/// Queued writes are applied to the inner backend in order on a dedicated worker thread.
/// Blocking writes and reads wait for all queued writes to complete first, so they always observe earlier queued writes.
///
/// A failed queued write is not reported to its writer.
/// Failures are logged and collected, see [`take_errors`](QueuedBackend::take_errors).
/// A panic of the inner backend during a queued write is collected as a [`StorageError::Other`].
pub struct QueuedBackend {
    backend: Backend,
    sender: Option<Sender<QueuedWrite>>,
    worker: Option<JoinHandle<()>>,
    state: Arc<QueueState>,
}

impl core::fmt::Debug for QueuedBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "queued backend ({} pending)", self.pending())
    }
}

impl QueuedBackend {
    /// Create a new queued backend writing to `backend`.
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        let (sender, receiver) = unbounded::<QueuedWrite>();
        let state = Arc::new(QueueState::default());
        let worker = {
            let backend = backend.clone();
            let state = state.clone();
            std::thread::spawn(move || {
                let _exit_guard = WorkerExitGuard(state.clone());
                while let Ok(write) = receiver.recv() {
                    let result = if write.options.is_cancelled() {
                        Err(StorageError::Cancelled)
                    } else {
                        catch_unwind(AssertUnwindSafe(|| {
                            backend.store_slice(&write.slice, &write.bytes, &write.options)
                        }))
                        .unwrap_or_else(|payload| {
                            Err(StorageError::Other(format!(
                                "queued write panicked: {}",
                                panic_message(payload.as_ref())
                            )))
                        })
                    };
                    state.complete(result);
                }
            })
        };
        Self {
            backend,
            sender: Some(sender),
            worker: Some(worker),
            state,
        }
    }

    /// Return the number of queued writes which have not completed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.counts.lock().pending
    }

    /// Block until all queued writes have completed, or the worker thread has exited.
    pub fn flush(&self) {
        let mut counts = self.state.counts.lock();
        while counts.pending > 0 && !counts.worker_exited {
            self.state.idle.wait(&mut counts);
        }
    }

    /// Take the errors of failed queued writes since the last call.
    #[must_use]
    pub fn take_errors(&self) -> Vec<StorageError> {
        std::mem::take(&mut *self.state.errors.lock())
    }
}

impl Drop for QueuedBackend {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("queued backend worker panicked");
            }
        }
    }
}

impl ReadableBackendTraits for QueuedBackend {
    fn is_readable(&self) -> bool {
        self.backend.is_readable()
    }

    fn initialize(&self) -> Result<(), StorageError> {
        self.backend.initialize()
    }

    fn retrieve_slice(
        &self,
        slice: &TrueSlice,
        options: &StoreOptions,
    ) -> Result<ArrayBytes, StorageError> {
        self.flush();
        self.backend.retrieve_slice(slice, options)
    }

    fn shape(&self) -> Result<Option<ArrayShape>, StorageError> {
        self.backend.shape()
    }
}

impl WritableBackendTraits for QueuedBackend {
    fn is_writable(&self) -> bool {
        self.backend.is_writable()
    }

    fn store_slice(
        &self,
        slice: &TrueSlice,
        bytes: &ArrayBytes,
        options: &StoreOptions,
    ) -> Result<(), StorageError> {
        self.flush();
        self.backend.store_slice(slice, bytes, options)
    }

    fn as_queued(&self) -> Option<&dyn QueuedWritableBackendTraits> {
        Some(self)
    }
}

impl QueuedWritableBackendTraits for QueuedBackend {
    fn enqueue_slice(
        &self,
        slice: TrueSlice,
        bytes: ArrayBytes,
        options: StoreOptions,
    ) -> Result<(), StorageError> {
        let sender = self.sender.as_ref().ok_or(StorageError::QueueClosed)?;
        {
            let mut counts = self.state.counts.lock();
            if counts.worker_exited {
                return Err(StorageError::QueueClosed);
            }
            counts.pending += 1;
        }
        let write = QueuedWrite {
            slice,
            bytes,
            options,
        };
        if sender.send(write).is_err() {
            self.state.complete(Ok(()));
            return Err(StorageError::QueueClosed);
        }
        Ok(())
    }
}
