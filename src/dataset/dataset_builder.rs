use std::sync::Arc;

use crate::{config::global_config, storage::Backend};

use super::{
    dataset_event::EventDelegate, normalise_fill_value, shape_state::ShapeState, ArrayShape,
    ChunkShape, DataType, Dataset, DatasetCreateError, DatasetMetadata, FillValue, HandleConfig,
    MaxShape, RootState, ViewTransform,
};

/// A [`Dataset`] builder.
///
/// The dataset builder is initialised from a shape and a data type.
///  - The max shape defaults to the shape, so the dataset cannot grow.
///  - There is no chunking hint.
///  - The fill value is empty (all zero bytes).
///  - Each item holds a single element.
///  - The default write mode is taken from the [global config](crate::config::Config#default-write-async).
///
/// Use the methods in the dataset builder to change the configuration away from these defaults, and then build a root dataset with [`DatasetBuilder::build`].
///
/// For example:
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # use std::sync::Arc;
/// use lazy_dataset::dataset::{DataType, DatasetBuilder, FillValue};
/// use lazy_dataset::storage::backend::MemoryBackend;
/// let backend = Arc::new(MemoryBackend::new(DataType::Float32, vec![0, 3], &FillValue::from(f32::NAN)));
/// let dataset = DatasetBuilder::new(vec![0, 3], DataType::Float32)
///     .max_shape(vec![None, Some(3)]) // unbounded along the first axis
///     .chunk_shape(vec![64, 3].try_into()?)
///     .fill_value(FillValue::from(f32::NAN))
///     .build("samples", backend)?;
/// assert_eq!(dataset.max_shape(), vec![None, Some(3)]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DatasetBuilder {
    /// Dataset shape.
    pub shape: ArrayShape,
    /// Data type.
    pub data_type: DataType,
    /// Max shape. Defaults to the shape if [`None`].
    pub max_shape: Option<MaxShape>,
    /// Chunking hint.
    pub chunk_shape: Option<ChunkShape>,
    /// Fill value.
    pub fill_value: FillValue,
    /// Elements per item.
    pub elements_per_item: usize,
    /// Default write mode. Defaults to the global config if [`None`].
    pub write_async: Option<bool>,
    /// Whether writes that leave the shape unchanged emit a shape event. Defaults to the global config if [`None`].
    pub notify_unchanged_shape: Option<bool>,
}

impl DatasetBuilder {
    /// Create a new dataset builder for a dataset with `shape` and `data_type`.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType) -> Self {
        Self {
            shape,
            data_type,
            max_shape: None,
            chunk_shape: None,
            fill_value: FillValue::default(),
            elements_per_item: 1,
            write_async: None,
            notify_unchanged_shape: None,
        }
    }

    /// Create a new builder from dataset metadata.
    #[must_use]
    pub fn from_metadata(metadata: &DatasetMetadata) -> Self {
        let mut builder = Self::new(metadata.shape.clone(), metadata.data_type.clone());
        builder
            .max_shape(metadata.max_shape.clone())
            .fill_value(metadata.fill_value.clone())
            .elements_per_item(metadata.elements_per_item);
        builder.chunk_shape = metadata.chunk_shape.clone();
        builder
    }

    /// Set the shape.
    pub fn shape(&mut self, shape: ArrayShape) -> &mut Self {
        self.shape = shape;
        self
    }

    /// Set the data type.
    pub fn data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = data_type;
        self
    }

    /// Set the max shape. An axis with a [`None`] max shape is unbounded.
    pub fn max_shape(&mut self, max_shape: MaxShape) -> &mut Self {
        self.max_shape = Some(max_shape);
        self
    }

    /// Set the chunking hint.
    pub fn chunk_shape(&mut self, chunk_shape: ChunkShape) -> &mut Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Set the fill value.
    ///
    /// The fill value must be empty, the size of an element, or the size of an item.
    pub fn fill_value(&mut self, fill_value: FillValue) -> &mut Self {
        self.fill_value = fill_value;
        self
    }

    /// Set the number of elements per item.
    pub fn elements_per_item(&mut self, elements_per_item: usize) -> &mut Self {
        self.elements_per_item = elements_per_item;
        self
    }

    /// Set the default write mode of the dataset.
    pub fn write_async(&mut self, write_async: bool) -> &mut Self {
        self.write_async = Some(write_async);
        self
    }

    /// Set whether writes that leave the shape unchanged emit a [`ShapeEvent`](super::ShapeEvent).
    pub fn notify_unchanged_shape(&mut self, notify_unchanged_shape: bool) -> &mut Self {
        self.notify_unchanged_shape = Some(notify_unchanged_shape);
        self
    }

    /// Build into a root [`Dataset`] named `name` backed by `backend`.
    ///
    /// The backend is not touched until the first read or write.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if the configuration is inconsistent.
    pub fn build(
        &self,
        name: impl Into<String>,
        backend: Backend,
    ) -> Result<Dataset, DatasetCreateError> {
        self.build_impl(name.into(), Some(backend))
    }

    /// Build into a root [`Dataset`] named `name` without a backend.
    ///
    /// Reads and writes fail until a backend is set with [`Dataset::set_backend`].
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if the configuration is inconsistent.
    pub fn build_without_backend(
        &self,
        name: impl Into<String>,
    ) -> Result<Dataset, DatasetCreateError> {
        self.build_impl(name.into(), None)
    }

    fn build_impl(
        &self,
        name: String,
        backend: Option<Backend>,
    ) -> Result<Dataset, DatasetCreateError> {
        if self.elements_per_item == 0 {
            return Err(DatasetCreateError::ZeroElementsPerItem);
        }
        let max_shape = self
            .max_shape
            .clone()
            .unwrap_or_else(|| self.shape.iter().copied().map(Some).collect());
        if max_shape.len() != self.shape.len() {
            return Err(DatasetCreateError::InvalidMaxShapeDimensionality(
                self.shape.clone(),
                max_shape,
            ));
        }
        let exceeds_max = std::iter::zip(&self.shape, &max_shape)
            .any(|(&size, max)| max.is_some_and(|max| size > max));
        if exceeds_max {
            return Err(DatasetCreateError::ShapeExceedsMaxShape(
                self.shape.clone(),
                max_shape,
            ));
        }
        if let Some(chunk_shape) = &self.chunk_shape {
            if chunk_shape.len() != self.shape.len() {
                return Err(DatasetCreateError::InvalidChunkShapeDimensionality(
                    chunk_shape.len(),
                    self.shape.len(),
                ));
            }
        }
        let fill_value =
            normalise_fill_value(&self.fill_value, &self.data_type, self.elements_per_item)
                .ok_or_else(|| {
                    DatasetCreateError::IncompatibleFillValue(
                        self.data_type.clone(),
                        self.fill_value.clone(),
                        self.elements_per_item,
                    )
                })?;
        let write_async = self
            .write_async
            .unwrap_or_else(|| global_config().default_write_async());
        let notify_unchanged_shape = self
            .notify_unchanged_shape
            .unwrap_or_else(|| global_config().notify_unchanged_shape());

        log::debug!(
            "building dataset {name} with shape {:?} and max shape {max_shape:?}",
            self.shape
        );
        Ok(Dataset::new_root(
            name.into(),
            self.data_type.clone(),
            self.elements_per_item,
            ViewTransform::identity(self.shape.len()),
            RootState {
                shape: ShapeState::new(self.shape.clone(), max_shape, self.shape.clone()),
                chunk_shape: self.chunk_shape.clone(),
                fill_value,
                backend,
                backend_initialized: false,
                notify_unchanged_shape,
            },
            Arc::new(EventDelegate::default()),
            HandleConfig::new(write_async, None),
        ))
    }
}
