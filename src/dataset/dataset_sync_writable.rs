use std::sync::Arc;

use crate::{
    monitor::Monitor,
    slice::{Slice, SliceNd},
    storage::{StoreOptions, TrueSlice},
};

use super::{
    ArrayBytes, DataType, Dataset, DatasetError, DatasetRoot, Element, InputTransform, Lineage,
    MaxShape, ShapeEvent, WriteOptions,
};

/// A write request received by a root dataset.
enum WriteRequest<'a> {
    /// Unresolved slices in the coordinates of the root.
    Local(&'a [Slice]),
    /// A slice already resolved and translated into the coordinates of the root by a view.
    Translated(SliceNd),
}

/// Reconcile `data` with the shape of a slice.
///
/// Data with the same number of items as the slice is reinterpreted with the shape of the slice.
fn reconcile(
    data: ArrayBytes,
    slice_shape: &[u64],
    item_size: usize,
) -> Result<ArrayBytes, DatasetError> {
    data.validate(item_size)?;
    if data.shape() == slice_shape {
        Ok(data)
    } else {
        Ok(data.reshape(slice_shape.to_vec())?)
    }
}

fn apply_input_transform(
    input_transform: &dyn InputTransform,
    data: ArrayBytes,
    data_type: &DataType,
    item_size: usize,
) -> Result<ArrayBytes, DatasetError> {
    let shape = data.shape().to_vec();
    let data = input_transform
        .transform(data, data_type)
        .map_err(DatasetError::InputTransform)?;
    if data.shape() != shape {
        return Err(DatasetError::ShapeMismatch(data.shape().to_vec(), shape));
    }
    data.validate(item_size)?;
    Ok(data)
}

impl Dataset {
    /// Write `data` to the region of the dataset selected by `slices`.
    ///
    /// Uses the default write mode of the dataset, see [`write_async`](Dataset::write_async).
    /// See [`store_slice_opt`](Dataset::store_slice_opt).
    ///
    /// # Errors
    /// See [`store_slice_opt`](Dataset::store_slice_opt).
    pub fn store_slice(&self, slices: &[Slice], data: ArrayBytes) -> Result<(), DatasetError> {
        self.store_slice_opt(slices, data, &WriteOptions::default())
    }

    /// Write `data` to the region of the dataset selected by `slices`, blocking until the backend has completed the write.
    ///
    /// # Errors
    /// See [`store_slice_opt`](Dataset::store_slice_opt).
    pub fn store_slice_sync(&self, slices: &[Slice], data: ArrayBytes) -> Result<(), DatasetError> {
        self.store_slice_opt(slices, data, &WriteOptions::synchronous())
    }

    /// Write `data` to the region of the dataset selected by `slices`, reporting progress to `monitor`.
    ///
    /// # Errors
    /// See [`store_slice_opt`](Dataset::store_slice_opt).
    pub fn store_slice_monitored(
        &self,
        slices: &[Slice],
        data: ArrayBytes,
        monitor: Arc<dyn Monitor>,
    ) -> Result<(), DatasetError> {
        self.store_slice_opt(slices, data, &WriteOptions::new().with_monitor(monitor))
    }

    /// Write `data` to the region of the dataset selected by `slices` with `options`.
    ///
    /// A write through a view is resolved against the (fixed) shape of the view, reconciled, passed through the input transforms of the view, translated into the coordinates of the root, and then handled by the root.
    ///
    /// A root dataset:
    ///  1. resolves `slices` against its shape and max shape, and reconciles `data` with the shape of the slice,
    ///  2. applies its own input transform,
    ///  3. checks the slice against the max shape, so an out-of-bounds write never reaches the backend,
    ///  4. persists the data through the queued path of its backend if the write is asynchronous and the backend supports it, or blocks until the backend has completed the write otherwise,
    ///  5. grows its shape to cover the slice, and
    ///  6. emits a [`ShapeEvent`](super::ShapeEvent) (see [`Config`](crate::config::Config#notify-unchanged-shape)).
    ///
    /// Blocking writes through a root are serialised, and a concurrent write observes either the shape before or after a write.
    ///
    /// `data` may have any shape with the same number of items as the slice.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if
    ///  - the number of slices does not match the dimensionality of the dataset or a slice has a zero step,
    ///  - a slice exceeds the max shape of a root or the shape of a view ([`DatasetError::OutOfBounds`]),
    ///  - `data` cannot be reconciled with the slice,
    ///  - an input transform fails,
    ///  - the root has no backend, or the root of a view has been dropped,
    ///  - the backend is not writable ([`DatasetError::WritePermission`]), or
    ///  - the backend fails to store the data ([`DatasetError::StoreError`]).
    ///
    /// The shape of the dataset is unchanged if an error is returned.
    pub fn store_slice_opt(
        &self,
        slices: &[Slice],
        data: ArrayBytes,
        options: &WriteOptions,
    ) -> Result<(), DatasetError> {
        let asynchronous = options
            .asynchronous()
            .unwrap_or_else(|| self.write_async());
        let monitor = options.monitor().cloned();
        match &self.lineage {
            Lineage::Root(root) => {
                root.store(WriteRequest::Local(slices), data, asynchronous, monitor)
            }
            Lineage::View { shape, .. } => {
                let root = self.root()?;
                let item_size = self.item_size();
                let max_shape: MaxShape = shape.iter().copied().map(Some).collect();
                let slice = SliceNd::new_expandable(slices, shape, &max_shape)?;
                let mut data = reconcile(data, slice.shape(), item_size)?;
                if let Some(input_transform) = self.input_transform() {
                    data = apply_input_transform(
                        input_transform.as_ref(),
                        data,
                        &self.data_type,
                        item_size,
                    )?;
                }
                for input_transform in &self.inherited_input_transforms {
                    data = apply_input_transform(
                        input_transform.as_ref(),
                        data,
                        &self.data_type,
                        item_size,
                    )?;
                }
                let root_slice = self.transform.apply(&slice);
                let data = data.reorder(&self.transform.data_order(), &[], item_size)?;
                log::trace!(
                    "dataset {}: view slice {slice} translated to {root_slice}",
                    self.name
                );
                root.store(
                    WriteRequest::Translated(root_slice),
                    data,
                    asynchronous,
                    monitor,
                )
            }
        }
    }

    pub(super) fn check_element_type<T: Element>(&self) -> Result<(), DatasetError> {
        if T::data_type() == self.data_type {
            Ok(())
        } else {
            Err(DatasetError::IncompatibleElementType(
                T::data_type(),
                self.data_type.clone(),
            ))
        }
    }

    /// Write `elements` to the region of the dataset selected by `slices`.
    ///
    /// The elements are row-major in the axis order of the dataset, with `elements_per_item` consecutive elements per item.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if `T` does not match the data type of the dataset.
    /// See also [`store_slice_opt`](Dataset::store_slice_opt).
    pub fn store_slice_elements<T: Element>(
        &self,
        slices: &[Slice],
        elements: Vec<T>,
    ) -> Result<(), DatasetError> {
        self.check_element_type::<T>()?;
        let num_items = (elements.len() / self.elements_per_item) as u64;
        self.store_slice(slices, ArrayBytes::from_elements(vec![num_items], elements))
    }

    /// Write an [`ndarray::ArrayViewD`] to the region of the dataset selected by `slices`.
    ///
    /// If each item holds more than one element, the trailing axis of `array` may hold the elements of an item.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if `T` does not match the data type of the dataset.
    /// See also [`store_slice_opt`](Dataset::store_slice_opt).
    pub fn store_slice_ndarray<T: Element>(
        &self,
        slices: &[Slice],
        array: &ndarray::ArrayViewD<T>,
    ) -> Result<(), DatasetError> {
        self.check_element_type::<T>()?;
        let mut data = ArrayBytes::from_ndarray(array);
        if self.elements_per_item > 1 {
            if let Some((&last, shape)) = data.shape().split_last() {
                if last == self.elements_per_item as u64 {
                    data = ArrayBytes::new(shape.to_vec(), data.into_bytes());
                }
            }
        }
        self.store_slice(slices, data)
    }
}

impl DatasetRoot {
    fn store(
        &self,
        request: WriteRequest<'_>,
        data: ArrayBytes,
        asynchronous: bool,
        monitor: Option<Arc<dyn Monitor>>,
    ) -> Result<(), DatasetError> {
        let item_size = self.item_size();
        let name = self.name.as_ref();

        let mut state = self.state.write();
        let (slice, mut data) = match request {
            WriteRequest::Local(slices) => {
                let slice = SliceNd::new_expandable(
                    slices,
                    &state.shape.shape,
                    &state.shape.max_shape,
                )?;
                let data = reconcile(data, slice.shape(), item_size)?;
                (slice, data)
            }
            WriteRequest::Translated(slice) => {
                data.validate(item_size)?;
                (slice, data)
            }
        };
        let input_transform = self.config.input_transform.read().clone();
        if let Some(input_transform) = input_transform {
            data = apply_input_transform(input_transform.as_ref(), data, &self.data_type, item_size)?;
        }
        let shape = state.shape.grow(&slice)?;
        let backend = state
            .backend
            .clone()
            .ok_or_else(|| DatasetError::MissingBackend(name.to_string()))?;

        // Translate into ascending storage coordinates
        let order = self.transform.data_order();
        let storage_slice = self.transform.apply(&slice);
        let (subset, reversed) = storage_slice.to_ascending();
        let reversed = reversed.iter().map(|&axis| order[axis]).collect::<Vec<_>>();
        let data = data.reorder(&order, &reversed, item_size)?;
        let expanded = storage_slice.is_expanded(&state.shape.storage_shape);
        let storage_shape = state.shape.grow_storage(&storage_slice);
        let true_slice = TrueSlice::new(subset, storage_shape.clone(), expanded);
        let options = StoreOptions::new(state.fill_value.clone()).with_monitor(monitor);

        let queued = if asynchronous {
            backend.as_queued()
        } else {
            None
        };
        if queued.is_none() && !backend.is_writable() {
            return Err(DatasetError::WritePermission(name.to_string()));
        }
        if !state.backend_initialized {
            backend
                .initialize()
                .map_err(|err| DatasetError::StoreError(name.to_string(), err))?;
            state.backend_initialized = true;
        }
        if let Some(queued) = queued {
            log::debug!("dataset {name}: queueing write of {true_slice}");
            queued
                .enqueue_slice(true_slice, data, options)
                .map_err(|err| DatasetError::StoreError(name.to_string(), err))?;
        } else {
            log::debug!("dataset {name}: writing {true_slice}");
            backend
                .store_slice(&true_slice, &data, &options)
                .map_err(|err| DatasetError::StoreError(name.to_string(), err))?;
        }

        let grew = shape != state.shape.shape;
        if grew {
            log::debug!(
                "dataset {name} grew from {:?} to {shape:?}",
                state.shape.shape
            );
        }
        state.shape.shape = shape;
        state.shape.storage_shape = storage_shape;
        let refreshed = match backend.shape() {
            Ok(Some(reported)) => {
                state
                    .shape
                    .refresh(name, &reported, self.transform.is_identity())
            }
            Ok(None) => false,
            Err(err) => {
                log::warn!("dataset {name}: could not query the backend shape: {err}");
                false
            }
        };
        let event = (grew || refreshed || state.notify_unchanged_shape).then(|| ShapeEvent {
            name: name.to_string(),
            shape: state.shape.shape.clone(),
        });
        drop(state);
        if let Some(event) = event {
            self.events.fire(&event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::{
        dataset::{DatasetBuilder, FillValue},
        storage::{
            backend::MemoryBackend, backend_adapter::PerformanceMetricsBackend, Backend,
            ReadableBackendTraits, StorageError, WritableBackendTraits,
        },
    };

    use super::*;

    fn dataset_2x3() -> (Dataset, Arc<MemoryBackend>) {
        let memory = Arc::new(MemoryBackend::new(
            DataType::UInt8,
            vec![2, 3],
            &FillValue::from(0u8),
        ));
        let dataset = DatasetBuilder::new(vec![2, 3], DataType::UInt8)
            .max_shape(vec![Some(2), Some(10)])
            .fill_value(FillValue::from(0u8))
            .build("data", memory.clone())
            .unwrap();
        (dataset, memory)
    }

    #[test]
    fn reconcile_data() {
        let data = ArrayBytes::new(vec![6], vec![0u8; 6]);
        assert_eq!(reconcile(data, &[2, 3], 1).unwrap().shape(), &[2, 3]);
        let data = ArrayBytes::new(Vec::<u64>::new(), vec![1u8]);
        assert_eq!(reconcile(data, &[1, 1], 1).unwrap().shape(), &[1, 1]);
        let data = ArrayBytes::new(vec![5], vec![0u8; 5]);
        assert!(matches!(
            reconcile(data, &[2, 3], 1),
            Err(DatasetError::ShapeMismatch(..))
        ));
        let data = ArrayBytes::new(vec![6], vec![0u8; 5]);
        assert!(matches!(
            reconcile(data, &[2, 3], 1),
            Err(DatasetError::InvalidBytesInputSize(5, 6))
        ));
    }

    #[test]
    fn store_slice_grow() {
        let (dataset, memory) = dataset_2x3();
        dataset
            .store_slice_elements::<u8>(&[Slice::full(), (0..3).into()], vec![1, 2, 3, 4, 5, 6])
            .unwrap();
        dataset
            .store_slice_elements::<u8>(
                &[Slice::full(), (2..6).into()],
                vec![7, 7, 7, 7, 8, 8, 8, 8],
            )
            .unwrap();
        assert_eq!(dataset.shape(), vec![2, 6]);
        assert_eq!(dataset.original_shape(), vec![2, 3]);
        assert_eq!(
            memory.array_bytes().into_bytes(),
            vec![1, 2, 7, 7, 7, 7, 4, 5, 8, 8, 8, 8]
        );
    }

    #[test]
    fn store_slice_out_of_bounds() {
        let (dataset, memory) = dataset_2x3();
        let metrics = Arc::new(PerformanceMetricsBackend::new(memory));
        dataset.set_backend(Some(metrics.clone())).unwrap();
        let result = dataset.store_slice_elements::<u8>(&[Slice::full(), (8..12).into()], vec![0; 8]);
        assert!(matches!(
            result,
            Err(DatasetError::OutOfBounds {
                axis: 1,
                end: 12,
                max: 10,
                ..
            })
        ));
        assert_eq!(metrics.calls(), 0);
        assert_eq!(dataset.shape(), vec![2, 3]);
    }

    #[test]
    fn store_slice_read_only() {
        let (dataset, memory) = dataset_2x3();
        memory.set_writable(false);
        let metrics = Arc::new(PerformanceMetricsBackend::new(memory));
        dataset.set_backend(Some(metrics.clone())).unwrap();
        let result = dataset.store_slice_elements::<u8>(&[Slice::full(), (3..4).into()], vec![1, 2]);
        assert!(matches!(result, Err(DatasetError::WritePermission(_))));
        assert_eq!(metrics.writes(), 0);
        assert_eq!(metrics.initializations(), 0);
        assert_eq!(dataset.shape(), vec![2, 3]);
    }

    #[test]
    fn store_slice_missing_backend() {
        let dataset = DatasetBuilder::new(vec![2], DataType::UInt8)
            .build_without_backend("data")
            .unwrap();
        assert!(matches!(
            dataset.store_slice_elements::<u8>(&[Slice::full()], vec![1, 2]),
            Err(DatasetError::MissingBackend(_))
        ));
    }

    #[test]
    fn store_slice_element_type() {
        let (dataset, _) = dataset_2x3();
        assert!(matches!(
            dataset.store_slice_elements::<u16>(&[Slice::full(), Slice::full()], vec![0; 6]),
            Err(DatasetError::IncompatibleElementType(
                DataType::UInt16,
                DataType::UInt8
            ))
        ));
    }

    #[test]
    fn store_slice_input_transform() {
        let (dataset, memory) = dataset_2x3();
        dataset.set_input_transform(Some(Arc::new(
            |data: ArrayBytes, _: &DataType| -> Result<ArrayBytes, String> {
                let shape = data.shape().to_vec();
                let bytes = data.into_bytes().into_iter().map(|b| b * 2).collect::<Vec<_>>();
                Ok(ArrayBytes::new(shape, bytes))
            },
        )));
        dataset
            .store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1, 2, 3, 4, 5, 6])
            .unwrap();
        assert_eq!(
            memory.array_bytes().into_bytes(),
            vec![2, 4, 6, 8, 10, 12]
        );

        dataset.set_input_transform(Some(Arc::new(
            |_: ArrayBytes, _: &DataType| -> Result<ArrayBytes, String> { Err("rejected".to_string()) },
        )));
        assert!(matches!(
            dataset.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![0; 6]),
            Err(DatasetError::InputTransform(message)) if message == "rejected"
        ));

        dataset.set_input_transform(Some(Arc::new(
            |_: ArrayBytes, _: &DataType| -> Result<ArrayBytes, String> {
                Ok(ArrayBytes::new(vec![1], vec![0u8]))
            },
        )));
        assert!(matches!(
            dataset.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![0; 6]),
            Err(DatasetError::ShapeMismatch(..))
        ));
    }

    #[test]
    fn store_slice_events() {
        let (dataset, _) = dataset_2x3();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            dataset
                .add_shape_listener(Arc::new(move |event: &ShapeEvent| {
                    assert_eq!(event.name, "data");
                    count.fetch_add(1, Ordering::Relaxed);
                }))
                .unwrap();
        }
        dataset
            .store_slice_elements::<u8>(&[Slice::full(), (3..4).into()], vec![1, 2])
            .unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);
        let result = dataset.store_slice_elements::<u8>(&[Slice::full(), (10..11).into()], vec![1, 2]);
        assert!(result.is_err());
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn store_slice_notify_unchanged_shape() {
        let (dataset, _) = dataset_2x3();
        assert!(dataset.notify_unchanged_shape().unwrap());
        let clone = dataset.clone();
        clone.set_notify_unchanged_shape(false).unwrap();
        assert!(dataset.notify_unchanged_shape().unwrap());

        // Clones share the listeners of their source
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            dataset
                .add_shape_listener(Arc::new(move |_: &ShapeEvent| {
                    count.fetch_add(1, Ordering::Relaxed);
                }))
                .unwrap();
        }
        clone
            .store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1; 6])
            .unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 0);
        dataset
            .store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![2; 6])
            .unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);

        // Growth always notifies
        clone
            .store_slice_elements::<u8>(&[Slice::full(), (3..4).into()], vec![3, 3])
            .unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 2);
        assert_eq!(clone.shape(), vec![2, 4]);
    }

    /// Records the expansion flag of every write.
    struct ExpansionRecorder {
        inner: Arc<MemoryBackend>,
        expanded: Mutex<Vec<bool>>,
    }

    impl ReadableBackendTraits for ExpansionRecorder {
        fn retrieve_slice(
            &self,
            slice: &TrueSlice,
            options: &StoreOptions,
        ) -> Result<ArrayBytes, StorageError> {
            self.inner.retrieve_slice(slice, options)
        }
    }

    impl WritableBackendTraits for ExpansionRecorder {
        fn store_slice(
            &self,
            slice: &TrueSlice,
            bytes: &ArrayBytes,
            options: &StoreOptions,
        ) -> Result<(), StorageError> {
            self.expanded.lock().push(slice.expanded);
            self.inner.store_slice(slice, bytes, options)
        }
    }

    #[test]
    fn store_slice_expanded_flag() {
        let (dataset, memory) = dataset_2x3();
        let recorder = Arc::new(ExpansionRecorder {
            inner: memory,
            expanded: Mutex::new(Vec::new()),
        });
        dataset.set_backend(Some(recorder.clone())).unwrap();
        dataset
            .store_slice_elements::<u8>(&[Slice::full(), (1..3).into()], vec![1; 4])
            .unwrap();
        dataset
            .store_slice_elements::<u8>(&[Slice::full(), Slice::new(Some(2), Some(7), 2)], vec![2; 6])
            .unwrap();
        dataset
            .store_slice_elements::<u8>(&[Slice::full(), (5..7).into()], vec![3; 4])
            .unwrap();
        assert_eq!(dataset.shape(), vec![2, 7]);
        assert_eq!(*recorder.expanded.lock(), vec![false, true, false]);
    }

    #[test]
    fn store_slice_ndarray_items() {
        let memory: Backend = Arc::new(MemoryBackend::new_with_item_size(
            2,
            vec![2],
            &FillValue::from(0u8),
        ));
        let dataset = DatasetBuilder::new(vec![2], DataType::UInt8)
            .elements_per_item(2)
            .build("items", memory)
            .unwrap();
        let array = ndarray::ArrayD::<u8>::from_shape_vec(vec![2, 2], vec![1, 2, 3, 4]).unwrap();
        dataset
            .store_slice_ndarray(&[Slice::full()], &array.view())
            .unwrap();
        assert_eq!(
            dataset.retrieve_slice_elements::<u8>(&[Slice::full()]).unwrap(),
            vec![1, 2, 3, 4]
        );
    }
}
