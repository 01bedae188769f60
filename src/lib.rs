//! A rust library for lazy, chunked, writeable N-dimensional datasets.
//!
//! A [`Dataset`](dataset::Dataset) is a handle to array data which may be far larger than memory.
//! Its elements live in a pluggable [storage backend](storage) and are only read or written in slices.
//!
//! ## Getting Started
//! - [`dataset::DatasetBuilder`] creates a root dataset with a shape, a max shape, an optional chunk hint, a fill value and a backend.
//! - [`dataset::Dataset::slice_view`] and [`dataset::Dataset::transposed_view`] derive cheap views which redirect all writes to their root.
//! - [`dataset::Dataset::store_slice`] writes a slice, growing the root along axes with room in the max shape.
//! - [`storage::backend::MemoryBackend`] is an in-memory backend, and [`storage::backend::QueuedBackend`] makes any backend non-blocking.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use lazy_dataset::dataset::{ArrayBytes, DataType, DatasetBuilder, FillValue};
//! use lazy_dataset::slice::Slice;
//! use lazy_dataset::storage::backend::MemoryBackend;
//!
//! let backend = Arc::new(MemoryBackend::new(DataType::UInt8, vec![2, 3], &FillValue::from(0u8)));
//! let dataset = DatasetBuilder::new(vec![2, 3], DataType::UInt8)
//!     .max_shape(vec![Some(2), Some(10)])
//!     .fill_value(FillValue::from(0u8))
//!     .build("data", backend)?;
//!
//! // Write a 2x4 block at column offset 2, growing the dataset to 2x6
//! dataset.store_slice_elements::<u8>(&[Slice::full(), (2..6).into()], vec![1, 2, 3, 4, 5, 6, 7, 8])?;
//! assert_eq!(dataset.shape(), vec![2, 6]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `lazy_dataset` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array_subset;
pub mod config;
pub mod dataset;
pub mod monitor;
pub mod slice;
pub mod storage;
