use thiserror::Error;

use crate::{
    array_subset::IncompatibleDimensionalityError,
    slice::{Slice, SliceError},
    storage::StorageError,
};

use super::{
    array_bytes::ArrayBytesError, chunk_shape::ZeroChunkDimensionError,
    data_type::UnsupportedDataTypeError, ArrayShape, DataType, FillValue, MaxShape,
};

/// A dataset creation error.
///
/// Construction parameters are validated up front, so an inconsistent dataset is never created.
#[derive(Debug, Error)]
pub enum DatasetCreateError {
    /// The dimensionality of the max shape does not match the shape.
    #[error("max shape {1:?} is incompatible with shape {0:?}")]
    InvalidMaxShapeDimensionality(ArrayShape, MaxShape),
    /// The shape exceeds the max shape.
    #[error("shape {0:?} exceeds the max shape {1:?}")]
    ShapeExceedsMaxShape(ArrayShape, MaxShape),
    /// The dimensionality of the chunk shape does not match the shape.
    #[error("chunk shape dimensionality {0} does not match dataset dimensionality {1}")]
    InvalidChunkShapeDimensionality(usize, usize),
    /// A chunk shape with a zero dimension.
    #[error(transparent)]
    ZeroChunkDimension(#[from] ZeroChunkDimensionError),
    /// The fill value is incompatible with the data type and elements per item.
    #[error("fill value {1} is incompatible with data type {0} and {2} elements per item")]
    IncompatibleFillValue(DataType, FillValue, usize),
    /// Items must have at least one element.
    #[error("elements per item must be non-zero")]
    ZeroElementsPerItem,
    /// Unsupported data type.
    #[error(transparent)]
    UnsupportedDataType(#[from] UnsupportedDataTypeError),
    /// The initial data does not match the shape.
    #[error(transparent)]
    InvalidData(#[from] ArrayBytesError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error deserializing the metadata.
    #[error(transparent)]
    MetadataDeserializationError(#[from] serde_json::Error),
}

/// Dataset errors.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// No backend is configured on the root dataset.
    #[error("dataset {0} has no backend")]
    MissingBackend(String),
    /// The root dataset of a view has been dropped.
    #[error("the root of view {0} has been dropped")]
    DetachedView(String),
    /// A slice extends beyond the max shape.
    #[error("slice {slice} on axis {axis} extends to {end}, beyond the max shape {max}")]
    OutOfBounds {
        /// The axis.
        axis: usize,
        /// The offending slice.
        slice: Slice,
        /// The end (exclusive) of the slice.
        end: u64,
        /// The max extent of the axis.
        max: u64,
    },
    /// The backend is not writable.
    #[error("dataset {0} cannot be written to")]
    WritePermission(String),
    /// The backend is not readable.
    #[error("dataset {0} cannot be read from")]
    ReadPermission(String),
    /// The backend failed to save a slice.
    #[error("could not save dataset {0}")]
    StoreError(String, #[source] StorageError),
    /// The backend failed to load a slice.
    #[error("could not load dataset {0}")]
    LoadError(String, #[source] StorageError),
    /// The data cannot be reconciled with the shape of the slice.
    #[error("data of shape {0:?} cannot be reshaped to the slice shape {1:?}")]
    ShapeMismatch(ArrayShape, ArrayShape),
    /// The number of bytes does not match the data shape and item size.
    #[error("got data with {0} bytes, expected {1}")]
    InvalidBytesInputSize(usize, u64),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A slice has a zero step.
    #[error("slice {1} on axis {0} has a zero step")]
    InvalidSlice(usize, Slice),
    /// The axis order is not a permutation of the dataset axes.
    #[error("invalid axis permutation {0:?} for a dataset with {1} dimensions")]
    InvalidPermutation(Vec<usize>, usize),
    /// The element type does not match the data type of the dataset.
    #[error("element type {0} does not match the dataset data type {1}")]
    IncompatibleElementType(DataType, DataType),
    /// The chunk shape dimensionality does not match the dataset.
    #[error("chunk shape dimensionality {0} does not match dataset dimensionality {1}")]
    InvalidChunkShapeDimensionality(usize, usize),
    /// The fill value is incompatible with the data type and elements per item.
    #[error("fill value {1} is incompatible with data type {0} and {2} elements per item")]
    IncompatibleFillValue(DataType, FillValue, usize),
    /// The input transform failed.
    #[error("input transform failed: {0}")]
    InputTransform(String),
}

impl From<SliceError> for DatasetError {
    fn from(err: SliceError) -> Self {
        match err {
            SliceError::ZeroStep(axis, slice) => Self::InvalidSlice(axis, slice),
            SliceError::OutOfBounds {
                axis,
                slice,
                end,
                max,
            } => Self::OutOfBounds {
                axis,
                slice,
                end,
                max,
            },
            SliceError::IncompatibleDimensionality(err) => Self::IncompatibleDimensionality(err),
        }
    }
}

impl From<ArrayBytesError> for DatasetError {
    fn from(err: ArrayBytesError) -> Self {
        match err {
            ArrayBytesError::InvalidBytesLength(got, expected) => {
                Self::InvalidBytesInputSize(got, expected)
            }
            ArrayBytesError::IncompatibleShape(from, to) => Self::ShapeMismatch(from, to),
            ArrayBytesError::InvalidAxisOrder(order, dimensionality) => {
                Self::InvalidPermutation(order, dimensionality)
            }
            ArrayBytesError::IncompatibleFillValue(fill_value, item_size) => {
                Self::IncompatibleFillValue(DataType::RawBits(item_size), fill_value, 1)
            }
        }
    }
}
