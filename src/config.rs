//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the `lazy_dataset` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// Configuration options are only read when they are needed, so a dataset never holds a hidden reference to global state.
/// Changing an option does not affect datasets that have already been built.
///
/// ## Default Write Async
/// > default: [`false`]
///
/// The initial [`write_async`](crate::dataset::Dataset::write_async) value of datasets created by a [`DatasetBuilder`](crate::dataset::DatasetBuilder).
/// A dataset built while this is enabled dispatches plain [`store_slice`](crate::dataset::Dataset::store_slice) calls through the queued path of its backend (if supported).
///
/// ## Notify Unchanged Shape
/// > default: [`true`]
///
/// The initial [`notify_unchanged_shape`](crate::dataset::Dataset::notify_unchanged_shape) value of datasets created by a [`DatasetBuilder`](crate::dataset::DatasetBuilder).
/// If enabled, every successful write to such a dataset emits a [`ShapeEvent`](crate::dataset::ShapeEvent), even if the write did not change its shape.
/// Otherwise, events are only emitted by writes that grow the dataset.
#[derive(Debug)]
pub struct Config {
    default_write_async: bool,
    notify_unchanged_shape: bool,
}

#[allow(clippy::derivable_impls)]
impl Default for Config {
    fn default() -> Self {
        Config {
            default_write_async: false,
            notify_unchanged_shape: true,
        }
    }
}

impl Config {
    /// Get the [default write async](#default-write-async) configuration.
    #[must_use]
    pub fn default_write_async(&self) -> bool {
        self.default_write_async
    }

    /// Set the [default write async](#default-write-async) configuration.
    pub fn set_default_write_async(&mut self, default_write_async: bool) {
        self.default_write_async = default_write_async;
    }

    /// Get the [notify unchanged shape](#notify-unchanged-shape) configuration.
    #[must_use]
    pub fn notify_unchanged_shape(&self) -> bool {
        self.notify_unchanged_shape
    }

    /// Set the [notify unchanged shape](#notify-unchanged-shape) configuration.
    pub fn set_notify_unchanged_shape(&mut self, notify_unchanged_shape: bool) {
        self.notify_unchanged_shape = notify_unchanged_shape;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}
