use std::sync::Arc;

use crate::{
    monitor::Monitor,
    slice::{Slice, SliceNd},
    storage::{StorageError, StoreOptions, TrueSlice},
};

use super::{ArrayBytes, Dataset, DatasetError, DatasetRoot, Element, ViewTransform};

impl Dataset {
    /// Read the region of the dataset selected by `slices`.
    ///
    /// Slices are clamped to the shape of the dataset.
    /// The returned bytes have the shape of the selection and are in the axis order of the dataset.
    /// Elements which have never been written read back as the fill value.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if
    ///  - the number of slices does not match the dimensionality of the dataset or a slice has a zero step,
    ///  - the root has no backend, or the root of a view has been dropped,
    ///  - the backend is not readable ([`DatasetError::ReadPermission`]), or
    ///  - the backend fails to load the data ([`DatasetError::LoadError`]).
    pub fn retrieve_slice(&self, slices: &[Slice]) -> Result<ArrayBytes, DatasetError> {
        self.retrieve(slices, None)
    }

    /// Read the region of the dataset selected by `slices`, reporting progress to `monitor`.
    ///
    /// # Errors
    /// See [`retrieve_slice`](Dataset::retrieve_slice).
    pub fn retrieve_slice_monitored(
        &self,
        slices: &[Slice],
        monitor: Arc<dyn Monitor>,
    ) -> Result<ArrayBytes, DatasetError> {
        self.retrieve(slices, Some(monitor))
    }

    /// Read the region of the dataset selected by `slices` into a vector of elements.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if `T` does not match the data type of the dataset.
    /// See also [`retrieve_slice`](Dataset::retrieve_slice).
    pub fn retrieve_slice_elements<T: Element>(
        &self,
        slices: &[Slice],
    ) -> Result<Vec<T>, DatasetError> {
        self.check_element_type::<T>()?;
        Ok(self.retrieve_slice(slices)?.into_elements())
    }

    /// Read the region of the dataset selected by `slices` into an [`ndarray::ArrayD`].
    ///
    /// If each item holds more than one element, the array has an additional trailing axis holding the elements of an item.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if `T` does not match the data type of the dataset.
    /// See also [`retrieve_slice`](Dataset::retrieve_slice).
    pub fn retrieve_slice_ndarray<T: Element>(
        &self,
        slices: &[Slice],
    ) -> Result<ndarray::ArrayD<T>, DatasetError> {
        self.check_element_type::<T>()?;
        Ok(self
            .retrieve_slice(slices)?
            .into_ndarray(self.elements_per_item)?)
    }

    fn retrieve(
        &self,
        slices: &[Slice],
        monitor: Option<Arc<dyn Monitor>>,
    ) -> Result<ArrayBytes, DatasetError> {
        let root = self.root()?;
        let slice = SliceNd::new_clamped(slices, &self.shape())?;
        root.retrieve(&self.transform, &slice, monitor)
    }
}

impl DatasetRoot {
    /// Read `slice`, given in the coordinates of a handle mapped onto this root by `transform`.
    fn retrieve(
        &self,
        transform: &ViewTransform,
        slice: &SliceNd,
        monitor: Option<Arc<dyn Monitor>>,
    ) -> Result<ArrayBytes, DatasetError> {
        let name = self.name.as_ref();
        let item_size = self.item_size();
        let transform = self.transform.compose(transform);
        let storage_slice = transform.apply(slice);
        let (subset, reversed) = storage_slice.to_ascending();

        let (backend, options, storage_shape, initialized) = {
            let state = self.state.read();
            (
                state.backend.clone(),
                StoreOptions::new(state.fill_value.clone()).with_monitor(monitor),
                state.shape.storage_shape.clone(),
                state.backend_initialized,
            )
        };
        let backend = backend.ok_or_else(|| DatasetError::MissingBackend(name.to_string()))?;
        if !backend.is_readable() {
            return Err(DatasetError::ReadPermission(name.to_string()));
        }
        if !initialized {
            let mut state = self.state.write();
            let current = state
                .backend
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &backend));
            if !(current && state.backend_initialized) {
                backend
                    .initialize()
                    .map_err(|err| DatasetError::LoadError(name.to_string(), err))?;
                if current {
                    state.backend_initialized = true;
                }
            }
        }

        let true_slice = TrueSlice::new(subset, storage_shape, false);
        log::trace!("dataset {name}: reading {true_slice}");
        let bytes = backend
            .retrieve_slice(&true_slice, &options)
            .map_err(|err| DatasetError::LoadError(name.to_string(), err))?;
        if bytes.shape() != true_slice.subset.shape() {
            return Err(DatasetError::LoadError(
                name.to_string(),
                StorageError::Other(format!(
                    "backend returned data of shape {:?} for {true_slice}",
                    bytes.shape()
                )),
            ));
        }
        bytes
            .validate(item_size)
            .map_err(|err| DatasetError::LoadError(name.to_string(), StorageError::Other(err.to_string())))?;
        Ok(bytes.reorder(transform.axes(), &reversed, item_size)?)
    }
}
