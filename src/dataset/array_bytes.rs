use thiserror::Error;

use super::{ArrayShape, Element, FillValue};

/// The bytes of a slice of a dataset.
///
/// Items are stored row-major in native endianness.
/// The shape does not include the `elements_per_item` of the dataset, each item occupies `data_type.size() * elements_per_item` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayBytes {
    shape: ArrayShape,
    bytes: Vec<u8>,
}

/// Errors related to [`ArrayBytes`].
#[derive(Clone, Debug, Error)]
pub enum ArrayBytesError {
    /// The number of bytes does not match the shape and item size.
    #[error("got {0} bytes, expected {1}")]
    InvalidBytesLength(usize, u64),
    /// The number of items does not match the target shape.
    #[error("cannot reshape {0:?} to {1:?}")]
    IncompatibleShape(ArrayShape, ArrayShape),
    /// The axis order is not a permutation of the axes.
    #[error("invalid axis order {0:?} for {1} dimensions")]
    InvalidAxisOrder(Vec<usize>, usize),
    /// The fill value cannot fill items of this size.
    #[error("fill value {0} is incompatible with item size {1}")]
    IncompatibleFillValue(FillValue, usize),
}

impl ArrayBytes {
    /// Create new array bytes with `shape` from `bytes`.
    ///
    /// The length of `bytes` is not validated until the bytes are used, see [`validate`](ArrayBytes::validate).
    #[must_use]
    pub fn new(shape: impl Into<ArrayShape>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            shape: shape.into(),
            bytes: bytes.into(),
        }
    }

    /// Create new array bytes with `shape` composed entirely of the `fill_value`.
    ///
    /// # Errors
    /// Returns [`ArrayBytesError::IncompatibleFillValue`] if the fill value cannot fill items of `item_size` bytes.
    pub fn new_fill_value(
        shape: ArrayShape,
        item_size: usize,
        fill_value: &FillValue,
    ) -> Result<Self, ArrayBytesError> {
        let num_items = usize::try_from(shape.iter().product::<u64>())
            .map_err(|_| ArrayBytesError::InvalidBytesLength(usize::MAX, u64::MAX))?;
        let bytes = fill_value
            .repeat(item_size, num_items)
            .ok_or_else(|| ArrayBytesError::IncompatibleFillValue(fill_value.clone(), item_size))?;
        Ok(Self { shape, bytes })
    }

    /// Create new array bytes with `shape` from a vector of `elements`.
    #[must_use]
    pub fn from_elements<T: Element>(shape: impl Into<ArrayShape>, elements: Vec<T>) -> Self {
        Self {
            shape: shape.into(),
            bytes: bytemuck::allocation::pod_collect_to_vec(&elements),
        }
    }

    /// Create new array bytes from an [`ndarray::ArrayViewD`].
    ///
    /// Every axis of the array is an axis of the slice, so this is only suitable for datasets with one element per item.
    #[must_use]
    pub fn from_ndarray<T: Element>(array: &ndarray::ArrayViewD<T>) -> Self {
        let shape = array.shape().iter().map(|&size| size as u64).collect::<Vec<_>>();
        let elements = array.iter().copied().collect::<Vec<T>>();
        Self::from_elements(shape, elements)
    }

    /// Return the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Return the underlying bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Return the number of items.
    #[must_use]
    pub fn num_items(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Return the number of bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Validate that the number of bytes matches the shape for items of `item_size` bytes.
    ///
    /// # Errors
    /// Returns [`ArrayBytesError::InvalidBytesLength`] if the number of bytes is incorrect.
    pub fn validate(&self, item_size: usize) -> Result<(), ArrayBytesError> {
        let expected = self.num_items() * item_size as u64;
        if self.bytes.len() as u64 == expected {
            Ok(())
        } else {
            Err(ArrayBytesError::InvalidBytesLength(self.bytes.len(), expected))
        }
    }

    /// Reinterpret the bytes with a new `shape` with the same number of items.
    ///
    /// # Errors
    /// Returns [`ArrayBytesError::IncompatibleShape`] if the number of items differs.
    pub fn reshape(self, shape: ArrayShape) -> Result<Self, ArrayBytesError> {
        if shape.iter().product::<u64>() == self.num_items() {
            Ok(Self {
                shape,
                bytes: self.bytes,
            })
        } else {
            Err(ArrayBytesError::IncompatibleShape(self.shape, shape))
        }
    }

    /// Reverse the `reversed` axes and then permute the axes into `order`.
    ///
    /// Axis `i` of the output is axis `order[i]` of the input.
    /// The items have a size of `item_size` bytes.
    ///
    /// # Errors
    /// Returns an [`ArrayBytesError`] if `order` is not a permutation of the axes, a reversed axis is out of range, or the bytes are incompatible with the shape.
    pub fn reorder(
        self,
        order: &[usize],
        reversed: &[usize],
        item_size: usize,
    ) -> Result<Self, ArrayBytesError> {
        let dimensionality = self.shape.len();
        let is_permutation = order.len() == dimensionality && {
            let mut seen = vec![false; dimensionality];
            order
                .iter()
                .all(|&axis| axis < dimensionality && !std::mem::replace(&mut seen[axis], true))
        };
        if !is_permutation || reversed.iter().any(|&axis| axis >= dimensionality) {
            return Err(ArrayBytesError::InvalidAxisOrder(
                order.to_vec(),
                dimensionality,
            ));
        }
        let is_identity = order.iter().enumerate().all(|(i, &axis)| i == axis);
        if is_identity && reversed.is_empty() {
            return Ok(self);
        }
        self.validate(item_size)?;

        let mut shape_n = Vec::with_capacity(dimensionality + 1);
        for &size in &self.shape {
            shape_n.push(
                usize::try_from(size)
                    .map_err(|_| ArrayBytesError::InvalidBytesLength(self.bytes.len(), size))?,
            );
        }
        shape_n.push(item_size);
        let mut array = ndarray::ArrayViewD::<u8>::from_shape(shape_n, &self.bytes).map_err(|_| {
            ArrayBytesError::InvalidBytesLength(
                self.bytes.len(),
                self.num_items() * item_size as u64,
            )
        })?;
        for &axis in reversed {
            array.invert_axis(ndarray::Axis(axis));
        }
        let mut order_n = order.to_vec();
        order_n.push(dimensionality);
        let array = array.permuted_axes(order_n);
        let bytes = array.iter().copied().collect::<Vec<u8>>();
        let shape = order.iter().map(|&axis| self.shape[axis]).collect();
        Ok(Self { shape, bytes })
    }

    /// Convert the bytes into a vector of elements.
    #[must_use]
    pub fn into_elements<T: Element>(self) -> Vec<T> {
        bytemuck::allocation::pod_collect_to_vec(&self.bytes)
    }

    /// Convert the bytes into an [`ndarray::ArrayD`] of elements.
    ///
    /// If each item holds more than one element, the array has an additional trailing axis of length `elements_per_item`.
    ///
    /// # Errors
    /// Returns [`ArrayBytesError::InvalidBytesLength`] if the number of elements does not match the shape.
    pub fn into_ndarray<T: Element>(
        self,
        elements_per_item: usize,
    ) -> Result<ndarray::ArrayD<T>, ArrayBytesError> {
        let mut shape = self
            .shape
            .iter()
            .map(|&size| usize::try_from(size).unwrap_or(usize::MAX))
            .collect::<Vec<_>>();
        if elements_per_item > 1 {
            shape.push(elements_per_item);
        }
        let expected = self.num_items() * (elements_per_item * core::mem::size_of::<T>()) as u64;
        let size = self.bytes.len();
        let elements = self.into_elements::<T>();
        ndarray::ArrayD::from_shape_vec(shape, elements)
            .map_err(|_| ArrayBytesError::InvalidBytesLength(size, expected))
    }
}
