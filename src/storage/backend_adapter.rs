//! Backend adapters.
//!
//! A backend adapter wraps a [`Backend`](crate::storage::Backend) and has the same interface as a backend.
//! Adapters forward the queued write capability of the backend they wrap.

mod performance_metrics;
mod usage_log;

pub use performance_metrics::PerformanceMetricsBackend;
pub use usage_log::UsageLogBackend;
