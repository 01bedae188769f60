//! Lazy datasets.
//!
//! A [`Dataset`] is a handle to an N-dimensional array whose elements live in a [storage backend](crate::storage).
//! Elements are only read or written in slices.
//!
//! There are three kinds of dataset handle:
//!  - a *root* owns the authoritative shape and the backend,
//!  - a *view* ([`Dataset::slice_view`], [`Dataset::transposed_view`]) selects a region of a root, possibly with reversed or reordered axes, and redirects all reads and writes to it, and
//!  - a *clone* ([`Clone`]) is a new root which shares the backend of its source but tracks its own shape.
//!
//! Use [`DatasetBuilder`] to create a root dataset.
//!
//! ### Views
//! A view holds a weak reference to its root, so a view never keeps its root alive.
//! Operations on a view whose root has been dropped fail with [`DatasetError::DetachedView`].
//! View transforms are composed at creation, so a view of a view refers directly to the root.
//! The shape of a view is fixed when it is created.
//!
//! ### Growth
//! A write through a root may extend beyond its current shape along axes with room in the max shape.
//! The root grows to exactly cover the written slice, and the elements created by the growth read back as the fill value.
//! Views never grow.

mod array_bytes;
mod chunk_shape;
pub mod data_type;
mod dataset_builder;
mod dataset_errors;
mod dataset_event;
mod dataset_sync_readable;
mod dataset_sync_writable;
mod element;
mod fill_value;
mod metadata;
mod shape_state;
mod view_transform;
mod write_options;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use parking_lot::RwLock;

pub use self::{
    array_bytes::{ArrayBytes, ArrayBytesError},
    chunk_shape::{ChunkShape, ZeroChunkDimensionError},
    data_type::DataType,
    dataset_builder::DatasetBuilder,
    dataset_errors::{DatasetCreateError, DatasetError},
    dataset_event::{ListenerId, ShapeEvent, ShapeEventListener},
    element::Element,
    fill_value::FillValue,
    metadata::DatasetMetadata,
    view_transform::ViewTransform,
    write_options::{InputTransform, WriteOptions},
};

use self::{dataset_event::EventDelegate, shape_state::ShapeState};

use crate::{
    config::global_config,
    slice::{Slice, SliceNd},
    storage::{backend::MemoryBackend, Backend},
};

/// An ND index to an element in a dataset.
pub type ArrayIndices = Vec<u64>;

/// The shape of a dataset.
pub type ArrayShape = Vec<u64>;

/// The max shape of a dataset. [`None`] marks an unbounded axis.
pub type MaxShape = Vec<Option<u64>>;

/// Ravel ND indices to a linearised index.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

/// Configuration of a dataset handle that does not affect its root.
#[derive(Default)]
struct HandleConfig {
    write_async: AtomicBool,
    input_transform: RwLock<Option<Arc<dyn InputTransform>>>,
}

impl HandleConfig {
    fn new(write_async: bool, input_transform: Option<Arc<dyn InputTransform>>) -> Self {
        Self {
            write_async: AtomicBool::new(write_async),
            input_transform: RwLock::new(input_transform),
        }
    }
}

/// The mutable state of a root dataset.
struct RootState {
    shape: ShapeState,
    chunk_shape: Option<ChunkShape>,
    fill_value: FillValue,
    backend: Option<Backend>,
    backend_initialized: bool,
    notify_unchanged_shape: bool,
}

/// A root dataset: the owner of the authoritative shape and the backend.
struct DatasetRoot {
    name: Arc<str>,
    data_type: DataType,
    elements_per_item: usize,
    /// Maps the coordinates of the root onto its storage. Identity unless the root is a clone of a view.
    transform: ViewTransform,
    state: RwLock<RootState>,
    events: Arc<EventDelegate>,
    config: Arc<HandleConfig>,
}

impl DatasetRoot {
    fn item_size(&self) -> usize {
        self.data_type.size() * self.elements_per_item
    }
}

enum Lineage {
    Root(Arc<DatasetRoot>),
    View {
        root: Weak<DatasetRoot>,
        shape: ArrayShape,
    },
}

/// A lazy, chunked, writeable N-dimensional dataset.
///
/// See the [module documentation](crate::dataset) for an overview of roots, views and clones.
///
/// ### Reading and writing
/// Writes are performed with the `store_slice*` methods, see [`Dataset::store_slice_opt`] for the full write pipeline.
/// Reads are performed with the `retrieve_slice*` methods.
///
/// ### Shape-change notification
/// After every successful write, the root of the dataset emits a [`ShapeEvent`] to its listeners.
/// Listeners are registered on the root, so registering through a view or a clone observes the same events.
pub struct Dataset {
    name: Arc<str>,
    data_type: DataType,
    elements_per_item: usize,
    lineage: Lineage,
    /// Maps the coordinates of this handle onto the coordinates of its root.
    transform: ViewTransform,
    config: Arc<HandleConfig>,
    /// The input transforms of the views this view was derived from, nearest first.
    inherited_input_transforms: Vec<Arc<dyn InputTransform>>,
}

impl core::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("view", &self.is_view())
            .field("shape", &self.shape())
            .finish_non_exhaustive()
    }
}

impl Dataset {
    #[allow(clippy::too_many_arguments)]
    fn new_root(
        name: Arc<str>,
        data_type: DataType,
        elements_per_item: usize,
        transform: ViewTransform,
        state: RootState,
        events: Arc<EventDelegate>,
        config: HandleConfig,
    ) -> Self {
        let root = Arc::new(DatasetRoot {
            name,
            data_type,
            elements_per_item,
            transform,
            state: RwLock::new(state),
            events,
            config: Arc::new(config),
        });
        Self::from_root(root)
    }

    fn from_root(root: Arc<DatasetRoot>) -> Self {
        Self {
            name: root.name.clone(),
            data_type: root.data_type.clone(),
            elements_per_item: root.elements_per_item,
            transform: ViewTransform::identity(root.transform.dimensionality()),
            config: root.config.clone(),
            inherited_input_transforms: Vec::new(),
            lineage: Lineage::Root(root),
        }
    }

    /// Create an in-memory dataset holding `bytes` with `shape`.
    ///
    /// The dataset is backed by a [`MemoryBackend`] and may grow up to `max_shape`.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if `bytes` does not match the shape and data type, or the shape is incompatible with `max_shape`.
    pub fn from_memory(
        name: &str,
        data_type: DataType,
        shape: ArrayShape,
        bytes: Vec<u8>,
        max_shape: MaxShape,
    ) -> Result<Self, DatasetCreateError> {
        let backend = MemoryBackend::from_array_bytes(
            data_type.size(),
            ArrayBytes::new(shape.clone(), bytes),
        )?;
        DatasetBuilder::new(shape, data_type)
            .max_shape(max_shape)
            .build(name, Arc::new(backend))
    }

    fn root(&self) -> Result<Arc<DatasetRoot>, DatasetError> {
        match &self.lineage {
            Lineage::Root(root) => Ok(root.clone()),
            Lineage::View { root, .. } => root
                .upgrade()
                .ok_or_else(|| DatasetError::DetachedView(self.name.to_string())),
        }
    }

    /// Return the name of the dataset.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the data type of the dataset.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Return the number of elements of each item of the dataset.
    #[must_use]
    pub fn elements_per_item(&self) -> usize {
        self.elements_per_item
    }

    /// Return the size in bytes of an item of the dataset.
    #[must_use]
    pub fn item_size(&self) -> usize {
        self.data_type.size() * self.elements_per_item
    }

    /// Returns true if the dataset is a view.
    #[must_use]
    pub fn is_view(&self) -> bool {
        matches!(self.lineage, Lineage::View { .. })
    }

    /// Return the root of a view.
    ///
    /// Returns [`None`] if the dataset is a root or a clone, or if the root of the view has been dropped.
    #[must_use]
    pub fn base(&self) -> Option<Dataset> {
        match &self.lineage {
            Lineage::Root(_) => None,
            Lineage::View { root, .. } => root.upgrade().map(Self::from_root),
        }
    }

    /// Return the shape of the dataset.
    ///
    /// The shape of a root reflects every completed write. The shape of a view is fixed.
    /// A view whose root has been dropped keeps reporting its shape.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        match &self.lineage {
            Lineage::Root(root) => root.state.read().shape.shape.clone(),
            Lineage::View { shape, .. } => shape.clone(),
        }
    }

    /// Return the shape of the dataset at creation.
    #[must_use]
    pub fn original_shape(&self) -> ArrayShape {
        match &self.lineage {
            Lineage::Root(root) => root.state.read().shape.original_shape.clone(),
            Lineage::View { shape, .. } => shape.clone(),
        }
    }

    /// Return the max shape of the dataset.
    ///
    /// The max shape of a view is its shape.
    #[must_use]
    pub fn max_shape(&self) -> MaxShape {
        match &self.lineage {
            Lineage::Root(root) => root.state.read().shape.max_shape.clone(),
            Lineage::View { shape, .. } => shape.iter().copied().map(Some).collect(),
        }
    }

    /// Return the number of items in the dataset.
    #[must_use]
    pub fn size(&self) -> u64 {
        match &self.lineage {
            Lineage::Root(root) => root.state.read().shape.size(),
            Lineage::View { shape, .. } => shape.iter().product(),
        }
    }

    /// Return the dimensionality of the dataset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.transform.dimensionality()
    }

    /// Return the chunking hint of the dataset, in the axis order of the dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn chunk_shape(&self) -> Result<Option<ChunkShape>, DatasetError> {
        let root = self.root()?;
        let state = root.state.read();
        Ok(state.chunk_shape.as_ref().map(|chunk_shape| {
            let axes = self
                .transform
                .axes()
                .iter()
                .map(|&axis| chunk_shape[axis])
                .collect::<Vec<_>>();
            ChunkShape::from(axes)
        }))
    }

    /// Replace the chunking hint of the dataset. [`None`] removes the hint.
    ///
    /// The hint is given in the axis order of the dataset. Setting the hint of a view sets the hint of its root.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the dimensionality of `chunk_shape` does not match the dataset, or the root of a view has been dropped.
    pub fn set_chunk_shape(&self, chunk_shape: Option<ChunkShape>) -> Result<(), DatasetError> {
        let root = self.root()?;
        let chunk_shape = match chunk_shape {
            Some(chunk_shape) if chunk_shape.len() != self.dimensionality() => {
                return Err(DatasetError::InvalidChunkShapeDimensionality(
                    chunk_shape.len(),
                    self.dimensionality(),
                ));
            }
            Some(chunk_shape) => {
                let mut chunk_shape_root = chunk_shape.to_vec();
                for (axis_local, &axis) in self.transform.axes().iter().enumerate() {
                    chunk_shape_root[axis] = chunk_shape[axis_local];
                }
                Some(ChunkShape::from(chunk_shape_root))
            }
            None => None,
        };
        root.state.write().chunk_shape = chunk_shape;
        Ok(())
    }

    /// Return the fill value of the dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn fill_value(&self) -> Result<FillValue, DatasetError> {
        Ok(self.root()?.state.read().fill_value.clone())
    }

    /// Set the fill value of the root of the dataset.
    ///
    /// The new fill value applies to elements created by subsequent growth.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the fill value is incompatible with the data type, or the root of a view has been dropped.
    pub fn set_fill_value(&self, fill_value: FillValue) -> Result<(), DatasetError> {
        let root = self.root()?;
        let fill_value = normalise_fill_value(&fill_value, &self.data_type, self.elements_per_item)
            .ok_or_else(|| {
                DatasetError::IncompatibleFillValue(
                    self.data_type.clone(),
                    fill_value,
                    self.elements_per_item,
                )
            })?;
        root.state.write().fill_value = fill_value;
        Ok(())
    }

    /// Returns true if plain [`store_slice`](Dataset::store_slice) calls queue writes by default.
    #[must_use]
    pub fn write_async(&self) -> bool {
        self.config.write_async.load(Ordering::Relaxed)
    }

    /// Set whether plain [`store_slice`](Dataset::store_slice) calls queue writes by default.
    ///
    /// This only affects this dataset handle (and views subsequently derived from it).
    pub fn set_write_async(&self, write_async: bool) {
        self.config.write_async.store(write_async, Ordering::Relaxed);
    }

    /// Return the input transform of the dataset.
    #[must_use]
    pub fn input_transform(&self) -> Option<Arc<dyn InputTransform>> {
        self.config.input_transform.read().clone()
    }

    /// Set the input transform applied to the data of every write through this dataset.
    ///
    /// Views derived from this dataset afterwards also apply it.
    pub fn set_input_transform(&self, input_transform: Option<Arc<dyn InputTransform>>) {
        *self.config.input_transform.write() = input_transform;
    }

    /// Return the backend of the root of the dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn backend(&self) -> Result<Option<Backend>, DatasetError> {
        Ok(self.root()?.state.read().backend.clone())
    }

    /// Replace the backend of the root of the dataset.
    ///
    /// Only the root of this dataset is reconfigured, clones keep their own backend.
    /// The new backend is initialised before its first read or write.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn set_backend(&self, backend: Option<Backend>) -> Result<(), DatasetError> {
        let root = self.root()?;
        let mut state = root.state.write();
        state.backend = backend;
        state.backend_initialized = false;
        Ok(())
    }

    /// Register a listener for the [`ShapeEvent`]s of the root of the dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn add_shape_listener(
        &self,
        listener: Arc<dyn ShapeEventListener>,
    ) -> Result<ListenerId, DatasetError> {
        Ok(self.root()?.events.add(listener))
    }

    /// Remove a listener. Returns true if the listener was registered.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn remove_shape_listener(&self, id: ListenerId) -> Result<bool, DatasetError> {
        Ok(self.root()?.events.remove(id))
    }

    /// Return the number of listeners registered on the root of the dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn num_shape_listeners(&self) -> Result<usize, DatasetError> {
        Ok(self.root()?.events.len())
    }

    /// Returns true if writes that leave the shape of the root unchanged emit a [`ShapeEvent`].
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn notify_unchanged_shape(&self) -> Result<bool, DatasetError> {
        Ok(self.root()?.state.read().notify_unchanged_shape)
    }

    /// Set whether writes that leave the shape of the root unchanged emit a [`ShapeEvent`].
    ///
    /// Writes that grow the root always emit an event.
    /// Only the root of this dataset is reconfigured, clones keep their own setting.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn set_notify_unchanged_shape(&self, notify_unchanged_shape: bool) -> Result<(), DatasetError> {
        self.root()?.state.write().notify_unchanged_shape = notify_unchanged_shape;
        Ok(())
    }

    fn derive_view(&self, transform: &ViewTransform, shape: ArrayShape) -> Result<Dataset, DatasetError> {
        let root = self.root()?;
        let mut inherited_input_transforms = Vec::new();
        if self.is_view() {
            inherited_input_transforms.extend(self.input_transform());
            inherited_input_transforms.extend(self.inherited_input_transforms.iter().cloned());
        }
        Ok(Dataset {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            elements_per_item: self.elements_per_item,
            lineage: Lineage::View {
                root: Arc::downgrade(&root),
                shape,
            },
            transform: self.transform.compose(transform),
            config: Arc::new(HandleConfig::new(self.write_async(), None)),
            inherited_input_transforms,
        })
    }

    /// Create a view of a region of the dataset.
    ///
    /// Slices are clamped to the shape of the dataset.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the number of slices does not match the dimensionality, a slice has a zero step, or the root of a view has been dropped.
    pub fn slice_view(&self, slices: &[Slice]) -> Result<Dataset, DatasetError> {
        let slice = SliceNd::new_clamped(slices, &self.shape())?;
        log::trace!("dataset {}: slice view {slice}", self.name);
        self.derive_view(&ViewTransform::from_slice(&slice), slice.shape().to_vec())
    }

    /// Create a view of a region of the dataset from optional `start`, `stop` and `step` arrays.
    ///
    /// See [`Slice::from_start_stop_step`].
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if an array does not match the dimensionality, a step is zero, or the root of a view has been dropped.
    pub fn slice_view_start_stop_step(
        &self,
        start: Option<&[i64]>,
        stop: Option<&[i64]>,
        step: Option<&[i64]>,
    ) -> Result<Dataset, DatasetError> {
        let slices = Slice::from_start_stop_step(start, stop, step, self.dimensionality())?;
        self.slice_view(&slices)
    }

    /// Create a view of the dataset with reordered axes, where axis `i` of the view is axis `order[i]` of the dataset.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if `order` is not a permutation of the axes of the dataset, or the root of a view has been dropped.
    pub fn transposed_view(&self, order: &[usize]) -> Result<Dataset, DatasetError> {
        let transform = ViewTransform::from_order(order)
            .filter(|transform| transform.dimensionality() == self.dimensionality())
            .ok_or_else(|| DatasetError::InvalidPermutation(order.to_vec(), self.dimensionality()))?;
        let shape = transform.local_shape(&self.shape());
        self.derive_view(&transform, shape)
    }

    /// Return the metadata of the dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::DetachedView`] if the root of a view has been dropped.
    pub fn metadata(&self) -> Result<DatasetMetadata, DatasetError> {
        Ok(DatasetMetadata {
            name: self.name.to_string(),
            data_type: self.data_type.clone(),
            elements_per_item: self.elements_per_item,
            shape: self.shape(),
            max_shape: self.max_shape(),
            chunk_shape: self.chunk_shape()?,
            fill_value: self.fill_value()?,
        })
    }

    fn clone_root(root: &DatasetRoot) -> Dataset {
        let state = root.state.read();
        Self::new_root(
            root.name.clone(),
            root.data_type.clone(),
            root.elements_per_item,
            root.transform.clone(),
            RootState {
                shape: state.shape.clone(),
                chunk_shape: state.chunk_shape.clone(),
                fill_value: state.fill_value.clone(),
                backend: state.backend.clone(),
                backend_initialized: false,
                notify_unchanged_shape: state.notify_unchanged_shape,
            },
            root.events.clone(),
            HandleConfig::new(
                root.config.write_async.load(Ordering::Relaxed),
                root.config.input_transform.read().clone(),
            ),
        )
    }

    fn clone_view(&self, root: &DatasetRoot, shape: &[u64]) -> Dataset {
        let state = root.state.read();
        let max_shape = shape.iter().copied().map(Some).collect();
        let chunk_shape = state.chunk_shape.as_ref().map(|chunk_shape| {
            ChunkShape::from(
                self.transform
                    .axes()
                    .iter()
                    .map(|&axis| chunk_shape[axis])
                    .collect::<Vec<_>>(),
            )
        });
        Self::new_root(
            self.name.clone(),
            self.data_type.clone(),
            self.elements_per_item,
            root.transform.compose(&self.transform),
            RootState {
                shape: ShapeState::new(shape.to_vec(), max_shape, state.shape.storage_shape.clone()),
                chunk_shape,
                fill_value: state.fill_value.clone(),
                backend: state.backend.clone(),
                backend_initialized: false,
                notify_unchanged_shape: state.notify_unchanged_shape,
            },
            root.events.clone(),
            HandleConfig::new(self.write_async(), self.input_transform()),
        )
    }
}

impl Clone for Dataset {
    /// Create an independent root dataset sharing the backend of this dataset.
    ///
    /// The clone copies the shape, max shape, chunking hint and fill value, and shares the backend and shape listeners.
    /// It tracks its own shape, and [`set_backend`](Dataset::set_backend) on the clone does not affect the source.
    ///
    /// A clone of a view is a root with the shape of the view (which is also its original and max shape), mapped onto the same region of storage as the view.
    /// Its [`base`](Dataset::base) is [`None`].
    /// A clone of a view whose root has been dropped has no backend.
    fn clone(&self) -> Self {
        match &self.lineage {
            Lineage::Root(root) => Self::clone_root(root),
            Lineage::View { root, shape } => {
                if let Some(root) = root.upgrade() {
                    self.clone_view(&root, shape)
                } else {
                    log::warn!("cloning view of {} whose root has been dropped", self.name);
                    let max_shape = shape.iter().copied().map(Some).collect();
                    Self::new_root(
                        self.name.clone(),
                        self.data_type.clone(),
                        self.elements_per_item,
                        ViewTransform::identity(shape.len()),
                        RootState {
                            shape: ShapeState::new(shape.clone(), max_shape, shape.clone()),
                            chunk_shape: None,
                            fill_value: FillValue::default(),
                            backend: None,
                            backend_initialized: false,
                            notify_unchanged_shape: global_config().notify_unchanged_shape(),
                        },
                        Arc::new(EventDelegate::default()),
                        HandleConfig::new(self.write_async(), self.input_transform()),
                    )
                }
            }
        }
    }
}

/// Normalise a fill value to the size of an item.
///
/// A fill value may be the size of an element or the size of an item, an empty fill value is all zeros.
fn normalise_fill_value(
    fill_value: &FillValue,
    data_type: &DataType,
    elements_per_item: usize,
) -> Option<FillValue> {
    let item_size = data_type.size() * elements_per_item;
    let size = fill_value.size();
    if size == 0 || size == data_type.size() || size == item_size {
        fill_value.item_bytes(item_size).map(FillValue::new)
    } else {
        None
    }
}
