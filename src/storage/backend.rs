//! Storage backends.

mod memory_backend;
mod queued_backend;

pub use memory_backend::MemoryBackend;
pub use queued_backend::QueuedBackend;
