//! An in-memory backend.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::{
    array_subset::ArraySubset,
    dataset::{ArrayBytes, ArrayShape, DataType, FillValue},
    storage::{
        ReadableBackendTraits, StorageError, StoreOptions, TrueSlice, WritableBackendTraits,
    },
};

/// An in-memory backend.
///
/// Holds the whole stored array as a contiguous row-major buffer.
/// Growth is materialised eagerly: when a write expands the stored array, new elements are filled with the fill value before the write is applied.
#[derive(Debug)]
pub struct MemoryBackend {
    item_size: usize,
    data: RwLock<MemoryBackendData>,
    writable: AtomicBool,
}

#[derive(Debug)]
struct MemoryBackendData {
    shape: ArrayShape,
    bytes: Vec<u8>,
}

impl MemoryBackend {
    /// Create a new memory backend holding an array of `data_type` elements with `shape` filled with `fill_value`.
    ///
    /// # Panics
    /// Panics if `fill_value` is incompatible with the data type size or the array is larger than [`usize::MAX`] bytes.
    #[must_use]
    pub fn new(data_type: DataType, shape: ArrayShape, fill_value: &FillValue) -> Self {
        Self::new_with_item_size(data_type.size(), shape, fill_value)
    }

    /// Create a new memory backend holding an array of items of `item_size` bytes with `shape` filled with `fill_value`.
    ///
    /// # Panics
    /// Panics if `fill_value` is incompatible with `item_size` or the array is larger than [`usize::MAX`] bytes.
    #[must_use]
    pub fn new_with_item_size(item_size: usize, shape: ArrayShape, fill_value: &FillValue) -> Self {
        let bytes = ArrayBytes::new_fill_value(shape, item_size, fill_value)
            .expect("the fill value must be compatible with the item size");
        Self::from_array_bytes(item_size, bytes)
            .expect("fill value bytes always match the shape")
    }

    /// Create a new memory backend holding `bytes` of items of `item_size` bytes.
    ///
    /// # Errors
    /// Returns [`StorageError::Other`] if the number of bytes does not match the shape and item size.
    pub fn from_array_bytes(item_size: usize, bytes: ArrayBytes) -> Result<Self, StorageError> {
        bytes
            .validate(item_size)
            .map_err(|err| StorageError::Other(err.to_string()))?;
        let shape = bytes.shape().to_vec();
        Ok(Self {
            item_size,
            data: RwLock::new(MemoryBackendData {
                shape,
                bytes: bytes.into_bytes(),
            }),
            writable: AtomicBool::new(true),
        })
    }

    /// Set whether the backend accepts writes.
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::Relaxed);
    }

    /// Return a copy of the whole stored array.
    #[must_use]
    pub fn array_bytes(&self) -> ArrayBytes {
        let data = self.data.read();
        ArrayBytes::new(data.shape.clone(), data.bytes.clone())
    }

    fn grow(
        data: &mut MemoryBackendData,
        shape: &[u64],
        item_size: usize,
        fill_value: &FillValue,
    ) -> Result<(), StorageError> {
        let new_shape: ArrayShape = std::iter::zip(&data.shape, shape)
            .map(|(&current, &requested)| current.max(requested))
            .collect();
        if new_shape == data.shape {
            return Ok(());
        }
        let mut bytes = ArrayBytes::new_fill_value(new_shape.clone(), item_size, fill_value)
            .map_err(|err| StorageError::Other(err.to_string()))?
            .into_bytes();
        ArraySubset::new_with_shape(data.shape.clone())
            .store_bytes(&data.bytes, &mut bytes, &new_shape, item_size)
            .map_err(|err| StorageError::Other(err.to_string()))?;
        data.shape = new_shape;
        data.bytes = bytes;
        Ok(())
    }
}

impl ReadableBackendTraits for MemoryBackend {
    fn retrieve_slice(
        &self,
        slice: &TrueSlice,
        options: &StoreOptions,
    ) -> Result<ArrayBytes, StorageError> {
        if options.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        let data = self.data.read();
        if slice.subset.dimensionality() != data.shape.len() {
            return Err(StorageError::InvalidSlice(slice.clone()));
        }
        let subset = &slice.subset;
        let bytes = if subset.inbounds(&data.shape) {
            subset
                .extract_bytes(&data.bytes, &data.shape, self.item_size)
                .map_err(|err| StorageError::Other(err.to_string()))?
        } else {
            // Elements which have not been materialised yet take the fill value
            let mut bytes = ArrayBytes::new_fill_value(
                subset.shape().to_vec(),
                self.item_size,
                &options.fill_value,
            )
            .map_err(|err| StorageError::Other(err.to_string()))?
            .into_bytes();
            for (output_index, indices) in subset.iter_indices().enumerate() {
                if std::iter::zip(&indices, &data.shape).all(|(index, shape)| index < shape) {
                    let input_index = crate::dataset::ravel_indices(&indices, &data.shape);
                    let input_offset = usize::try_from(input_index).unwrap_or(usize::MAX)
                        * self.item_size;
                    let output_offset = output_index * self.item_size;
                    bytes[output_offset..output_offset + self.item_size].copy_from_slice(
                        &data.bytes[input_offset..input_offset + self.item_size],
                    );
                }
            }
            bytes
        };
        options.worked(subset.num_elements());
        Ok(ArrayBytes::new(subset.shape().to_vec(), bytes))
    }

    fn shape(&self) -> Result<Option<ArrayShape>, StorageError> {
        Ok(Some(self.data.read().shape.clone()))
    }
}

impl WritableBackendTraits for MemoryBackend {
    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Relaxed)
    }

    fn store_slice(
        &self,
        slice: &TrueSlice,
        bytes: &ArrayBytes,
        options: &StoreOptions,
    ) -> Result<(), StorageError> {
        if !self.is_writable() {
            return Err(StorageError::ReadOnly);
        }
        if options.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        let mut data = self.data.write();
        if !slice.is_valid() || slice.source_shape.len() != data.shape.len() {
            return Err(StorageError::InvalidSlice(slice.clone()));
        }
        Self::grow(
            &mut data,
            &slice.source_shape,
            self.item_size,
            &options.fill_value,
        )?;
        let data = &mut *data;
        slice
            .subset
            .store_bytes(bytes.bytes(), &mut data.bytes, &data.shape, self.item_size)
            .map_err(|err| StorageError::Other(err.to_string()))?;
        options.worked(slice.subset.num_elements());
        Ok(())
    }
}
