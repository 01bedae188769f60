use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;

use lazy_dataset::dataset::{
    ArrayBytes, DataType, Dataset, DatasetBuilder, DatasetError, FillValue, ShapeEvent,
};
use lazy_dataset::slice::Slice;
use lazy_dataset::storage::backend::MemoryBackend;
use lazy_dataset::storage::backend_adapter::UsageLogBackend;

fn dataset(shape: Vec<u64>) -> (Dataset, Arc<MemoryBackend>) {
    let memory = Arc::new(MemoryBackend::new(DataType::UInt8, shape.clone(), &FillValue::from(0u8)));
    let dataset = DatasetBuilder::new(shape, DataType::UInt8)
        .build("data", memory.clone())
        .unwrap();
    (dataset, memory)
}

/// A 6x8 dataset where each element holds `8 * row + column`.
fn dataset_6x8() -> Dataset {
    let elements = (0..48).collect::<Vec<u8>>();
    Dataset::from_memory("data", DataType::UInt8, vec![6, 8], elements, vec![Some(6), Some(8)]).unwrap()
}

#[test]
#[rustfmt::skip]
fn dataset_view_start_stop_step() -> Result<(), Box<dyn std::error::Error>> {
    let log_writer = Arc::new(Mutex::new(std::io::Cursor::new(Vec::<u8>::new())));
    let (dataset, memory) = dataset(vec![2, 3]);
    dataset.set_backend(Some(Arc::new(UsageLogBackend::new(memory.clone(), log_writer.clone(), String::new))))?;

    let view = dataset.slice_view_start_stop_step(Some(&[0, 1][..]), Some(&[2, 3][..]), Some(&[1, 1][..]))?;
    assert!(view.is_view());
    assert_eq!(view.shape(), vec![2, 2]);
    view.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1, 2, 3, 4])?;

    let log = String::from_utf8(log_writer.lock().get_ref().clone())?;
    assert!(log.contains("store_slice(start [0, 1] step [1, 1] shape [2, 2] in [2, 3], len=4) -> Ok(())\n"));
    assert_eq!(view.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::full()])?, vec![1, 2, 3, 4]);
    assert_eq!(memory.array_bytes().into_bytes(), vec![0, 1, 2, 0, 3, 4]);
    assert_eq!(dataset.shape(), vec![2, 3]);

    // Views never grow
    assert!(matches!(
        view.store_slice_elements::<u8>(&[Slice::full(), (1..3).into()], vec![0; 4]),
        Err(DatasetError::OutOfBounds { axis: 1, end: 3, max: 2, .. })
    ));
    assert!(matches!(
        dataset.slice_view_start_stop_step(Some(&[0][..]), None, None),
        Err(DatasetError::IncompatibleDimensionality(_))
    ));
    Ok(())
}

#[test]
#[rustfmt::skip]
fn dataset_view_chain_associativity() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = dataset_6x8();
    // rows 1..6, columns reversed
    let view1 = dataset.slice_view(&[(1..6).into(), Slice::new(Some(7), None, -1)])?;
    assert_eq!(view1.shape(), vec![5, 8]);
    let view2 = view1.transposed_view(&[1, 0])?;
    assert_eq!(view2.shape(), vec![8, 5]);
    let view3 = view2.slice_view(&[Slice::new(Some(1), None, 2), (1..4).into()])?;
    assert_eq!(view3.shape(), vec![4, 3]);
    assert!(!view3.base().unwrap().is_view());

    // view3[i][j] is dataset[2 + j][6 - 2i]
    let expected = (0..4u8)
        .flat_map(|i| (0..3u8).map(move |j| 8 * (2 + j) + (6 - 2 * i)))
        .collect::<Vec<u8>>();
    assert_eq!(view3.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::full()])?, expected);

    // The same region read directly from the root, then transposed
    let direct = dataset.retrieve_slice_ndarray::<u8>(&[(2..5).into(), Slice::new(Some(6), None, -2)])?;
    assert_eq!(view3.retrieve_slice_ndarray::<u8>(&[Slice::full(), Slice::full()])?, direct.t());

    // Writes follow the same mapping
    view3.store_slice_elements::<u8>(&[Slice::index(1), Slice::full()], vec![100, 101, 102])?;
    assert_eq!(dataset.retrieve_slice_elements::<u8>(&[(2..5).into(), Slice::index(4)])?, vec![100, 101, 102]);
    assert_eq!(dataset.retrieve_slice_elements::<u8>(&[(2..5).into(), Slice::index(6)])?, vec![22, 30, 38]);
    assert_eq!(dataset.shape(), vec![6, 8]);
    Ok(())
}

#[test]
#[rustfmt::skip]
fn dataset_view_transposed_reversed() -> Result<(), Box<dyn std::error::Error>> {
    let (dataset, memory) = dataset(vec![2, 3]);
    let transposed = dataset.transposed_view(&[1, 0])?;
    assert_eq!(transposed.shape(), vec![3, 2]);
    transposed.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1, 2, 3, 4, 5, 6])?;
    assert_eq!(memory.array_bytes().into_bytes(), vec![1, 3, 5, 2, 4, 6]);
    assert_eq!(transposed.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::index(1)])?, vec![2, 4, 6]);

    let reversed = dataset.slice_view(&[Slice::reversed(), Slice::full()])?;
    reversed.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1, 2, 3, 4, 5, 6])?;
    assert_eq!(memory.array_bytes().into_bytes(), vec![4, 5, 6, 1, 2, 3]);

    let both = reversed.transposed_view(&[1, 0])?.slice_view(&[Slice::reversed(), Slice::full()])?;
    assert_eq!(both.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::full()])?, vec![3, 6, 2, 5, 1, 4]);

    assert!(matches!(dataset.transposed_view(&[1, 1]), Err(DatasetError::InvalidPermutation(..))));
    Ok(())
}

#[test]
fn dataset_view_input_transforms() {
    let (dataset, memory) = dataset(vec![2, 3]);
    dataset.set_input_transform(Some(Arc::new(|data: ArrayBytes, _: &DataType| -> Result<ArrayBytes, String> {
        let shape = data.shape().to_vec();
        Ok(ArrayBytes::new(shape, data.into_bytes().into_iter().map(|b| b * 2).collect::<Vec<u8>>()))
    })));
    let view = dataset.slice_view(&[Slice::full(), (0..2).into()]).unwrap();
    view.set_input_transform(Some(Arc::new(|data: ArrayBytes, _: &DataType| -> Result<ArrayBytes, String> {
        let shape = data.shape().to_vec();
        Ok(ArrayBytes::new(shape, data.into_bytes().into_iter().map(|b| b + 1).collect::<Vec<u8>>()))
    })));
    // Derived after the hook was set, so it inherits it
    let nested = view.slice_view(&[Slice::full(), (1..2).into()]).unwrap();

    view.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1, 2, 3, 4]).unwrap();
    assert_eq!(memory.array_bytes().into_bytes(), vec![4, 6, 0, 8, 10, 0]);
    nested.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![10, 20]).unwrap();
    assert_eq!(memory.array_bytes().into_bytes(), vec![4, 22, 0, 8, 42, 0]);
}

#[test]
fn dataset_view_events() {
    let (dataset, _) = dataset(vec![2, 3]);
    let view = dataset.slice_view(&[Slice::full(), Slice::full()]).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    {
        let count = count.clone();
        view.add_shape_listener(Arc::new(move |event: &ShapeEvent| {
            assert_eq!(event.shape, vec![2, 3]);
            count.fetch_add(1, Ordering::Relaxed);
        }))
        .unwrap();
    }
    assert_eq!(dataset.num_shape_listeners().unwrap(), 1);
    view.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![0; 6])
        .unwrap();
    assert_eq!(count.load(Ordering::Relaxed), 1);
}

#[test]
#[rustfmt::skip]
fn dataset_clone_root() -> Result<(), Box<dyn std::error::Error>> {
    let (dataset, _) = dataset(vec![2, 3]);
    let clone = dataset.clone();
    assert!(!clone.is_view());
    assert!(clone.base().is_none());

    // Shared backend
    clone.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1, 2, 3, 4, 5, 6])?;
    assert_eq!(dataset.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::full()])?, vec![1, 2, 3, 4, 5, 6]);

    // Reconfiguring the clone does not affect the source
    let other = Arc::new(MemoryBackend::new(DataType::UInt8, vec![2, 3], &FillValue::from(9u8)));
    clone.set_backend(Some(other))?;
    clone.store_slice_elements::<u8>(&[Slice::index(0), Slice::full()], vec![0, 0, 0])?;
    assert_eq!(clone.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::full()])?, vec![0, 0, 0, 9, 9, 9]);
    assert_eq!(dataset.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::full()])?, vec![1, 2, 3, 4, 5, 6]);
    Ok(())
}

#[test]
#[rustfmt::skip]
fn dataset_clone_view() -> Result<(), Box<dyn std::error::Error>> {
    let (dataset, memory) = dataset(vec![2, 3]);
    let view = dataset.slice_view(&[Slice::full(), (1..3).into()])?.transposed_view(&[1, 0])?;
    let clone = view.clone();
    assert!(!clone.is_view());
    assert!(clone.base().is_none());
    assert_eq!(clone.shape(), vec![2, 2]);
    assert_eq!(clone.original_shape(), vec![2, 2]);
    assert_eq!(clone.max_shape(), vec![Some(2), Some(2)]);

    // The clone maps onto the same region of storage as the view
    clone.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![1, 2, 3, 4])?;
    assert_eq!(memory.array_bytes().into_bytes(), vec![0, 1, 3, 0, 2, 4]);
    assert_eq!(view.retrieve_slice_elements::<u8>(&[Slice::full(), Slice::full()])?, vec![1, 2, 3, 4]);
    assert!(matches!(
        clone.store_slice_elements::<u8>(&[(1..3).into(), Slice::full()], vec![0; 4]),
        Err(DatasetError::OutOfBounds { axis: 0, .. })
    ));

    // The clone is independent of the lifetime of the root
    drop(view);
    drop(dataset);
    clone.store_slice_elements::<u8>(&[Slice::index(0), Slice::index(0)], vec![7])?;
    assert_eq!(memory.array_bytes().into_bytes(), vec![0, 7, 3, 0, 2, 4]);
    Ok(())
}

#[test]
fn dataset_view_detached() {
    let (dataset, _) = dataset(vec![2, 3]);
    let view = dataset.slice_view(&[Slice::full(), (1..3).into()]).unwrap();
    drop(dataset);
    assert_eq!(view.shape(), vec![2, 2]);
    assert!(view.base().is_none());
    assert!(matches!(
        view.store_slice_elements::<u8>(&[Slice::full(), Slice::full()], vec![0; 4]),
        Err(DatasetError::DetachedView(name)) if name == "data"
    ));
    assert!(matches!(
        view.retrieve_slice(&[Slice::full(), Slice::full()]),
        Err(DatasetError::DetachedView(_))
    ));
}
