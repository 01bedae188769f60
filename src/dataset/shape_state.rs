use crate::slice::SliceNd;

use super::{ArrayShape, DatasetError, MaxShape};

/// The shape and bounds of a root dataset.
///
/// `storage_shape` is the known shape of the stored array, which differs from `shape` if the root maps onto a region of its storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ShapeState {
    pub(crate) original_shape: ArrayShape,
    pub(crate) shape: ArrayShape,
    pub(crate) max_shape: MaxShape,
    pub(crate) storage_shape: ArrayShape,
}

impl ShapeState {
    pub(crate) fn new(shape: ArrayShape, max_shape: MaxShape, storage_shape: ArrayShape) -> Self {
        Self {
            original_shape: shape.clone(),
            shape,
            max_shape,
            storage_shape,
        }
    }

    /// Return the minimal shape containing the current shape and `slice`.
    ///
    /// # Errors
    /// Returns [`DatasetError::OutOfBounds`] if the shape would exceed the max shape.
    pub(crate) fn grow(&self, slice: &SliceNd) -> Result<ArrayShape, DatasetError> {
        if let Some((axis, end, max)) = slice.exceeds(&self.max_shape) {
            return Err(DatasetError::OutOfBounds {
                axis,
                slice: slice.axis_slice(axis),
                end,
                max,
            });
        }
        Ok(slice.expanded_shape(&self.shape))
    }

    /// Return the storage shape required to contain `storage_slice`.
    pub(crate) fn grow_storage(&self, storage_slice: &SliceNd) -> ArrayShape {
        storage_slice.expanded_shape(&self.storage_shape)
    }

    /// Incorporate the shape reported by a backend.
    ///
    /// The shape of the dataset only ever grows, and only if the dataset covers its storage (`storage_is_shape`).
    /// Returns true if the shape changed.
    pub(crate) fn refresh(&mut self, name: &str, reported: &[u64], storage_is_shape: bool) -> bool {
        if reported.len() != self.storage_shape.len() {
            log::warn!(
                "ignoring backend shape {reported:?} of dataset {name} with dimensionality {}",
                self.storage_shape.len()
            );
            return false;
        }
        self.storage_shape = std::iter::zip(&self.storage_shape, reported)
            .map(|(&current, &reported)| current.max(reported))
            .collect();
        if !storage_is_shape {
            return false;
        }
        let shape: ArrayShape = std::iter::zip(&self.shape, reported)
            .map(|(&current, &reported)| current.max(reported))
            .collect();
        if shape == self.shape {
            return false;
        }
        let exceeds_max = std::iter::zip(&shape, &self.max_shape)
            .any(|(&size, max)| max.is_some_and(|max| size > max));
        if exceeds_max {
            log::warn!(
                "ignoring backend shape {reported:?} of dataset {name} exceeding the max shape {:?}",
                self.max_shape
            );
            return false;
        }
        log::debug!("dataset {name} refreshed from {:?} to {shape:?}", self.shape);
        self.shape = shape;
        true
    }

    pub(crate) fn size(&self) -> u64 {
        self.shape.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use crate::slice::Slice;

    use super::*;

    #[test]
    fn shape_state_grow() {
        let state = ShapeState::new(vec![2, 3], vec![Some(2), Some(10)], vec![2, 3]);
        let slice =
            SliceNd::new_expandable(&[Slice::full(), (2..6).into()], &[2, 3], &state.max_shape)
                .unwrap();
        assert_eq!(state.grow(&slice).unwrap(), vec![2, 6]);
        assert_eq!(state.grow_storage(&slice), vec![2, 6]);
        assert_eq!(state.size(), 6);

        let slice = SliceNd::new_with_start_step_shape(vec![0, 8], vec![1, 1], vec![1, 4]).unwrap();
        assert!(matches!(
            state.grow(&slice),
            Err(DatasetError::OutOfBounds {
                axis: 1,
                end: 12,
                max: 10,
                ..
            })
        ));
    }

    #[test]
    fn shape_state_refresh() {
        let mut state = ShapeState::new(vec![2, 3], vec![Some(2), None], vec![2, 3]);
        assert!(!state.refresh("data", &[2, 3], true));
        assert!(state.refresh("data", &[2, 5], true));
        assert_eq!(state.shape, vec![2, 5]);
        assert!(!state.refresh("data", &[2, 4], true));
        assert_eq!(state.shape, vec![2, 5]);
        assert!(!state.refresh("data", &[3, 5], true));
        assert_eq!(state.shape, vec![2, 5]);
        assert!(!state.refresh("data", &[2], true));

        let mut state = ShapeState::new(vec![1, 1], vec![Some(1), Some(1)], vec![4, 4]);
        assert!(!state.refresh("data", &[4, 6], false));
        assert_eq!(state.storage_shape, vec![4, 6]);
        assert_eq!(state.shape, vec![1, 1]);
    }
}
