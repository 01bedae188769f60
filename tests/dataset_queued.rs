use std::sync::Arc;

use lazy_dataset::dataset::{ArrayBytes, DataType, Dataset, DatasetBuilder, FillValue, WriteOptions};
use lazy_dataset::slice::Slice;
use lazy_dataset::storage::backend::{MemoryBackend, QueuedBackend};
use lazy_dataset::storage::backend_adapter::PerformanceMetricsBackend;
use lazy_dataset::storage::StorageError;

struct Fixture {
    dataset: Dataset,
    memory: Arc<MemoryBackend>,
    queued: Arc<QueuedBackend>,
    metrics: Arc<PerformanceMetricsBackend>,
}

/// A queued dataset of 4 rows of 2 bytes, unbounded along the rows.
fn fixture(write_async: bool) -> Fixture {
    let memory = Arc::new(MemoryBackend::new(DataType::UInt8, vec![4, 2], &FillValue::from(0u8)));
    let queued = Arc::new(QueuedBackend::new(memory.clone()));
    let metrics = Arc::new(PerformanceMetricsBackend::new(queued.clone()));
    let dataset = DatasetBuilder::new(vec![4, 2], DataType::UInt8)
        .max_shape(vec![None, Some(2)])
        .write_async(write_async)
        .build("queued", metrics.clone())
        .unwrap();
    Fixture {
        dataset,
        memory,
        queued,
        metrics,
    }
}

#[test]
fn dataset_queued_writes() {
    let Fixture {
        dataset,
        memory,
        queued,
        metrics,
    } = fixture(true);
    assert!(dataset.write_async());
    for row in 0..6u8 {
        let row_u64 = u64::from(row);
        dataset
            .store_slice_elements::<u8>(&[(row_u64..row_u64 + 1).into(), Slice::full()], vec![row, row])
            .unwrap();
    }
    // The shape is committed as soon as a write is queued
    assert_eq!(dataset.shape(), vec![6, 2]);
    assert_eq!(metrics.queued_writes(), 6);
    assert_eq!(metrics.writes(), 0);
    assert_eq!(metrics.writable_checks(), 0);

    queued.flush();
    assert_eq!(queued.pending(), 0);
    assert_eq!(
        memory.array_bytes().into_bytes(),
        vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5]
    );
    assert!(queued.take_errors().is_empty());
}

#[test]
fn dataset_queued_reads_observe_writes() {
    let Fixture { dataset, .. } = fixture(true);
    dataset
        .store_slice_elements::<u8>(&[(4..8).into(), Slice::full()], vec![1; 8])
        .unwrap();
    // Reads flush the queue first
    assert_eq!(
        dataset
            .retrieve_slice_elements::<u8>(&[(3..8).into(), Slice::index(0)])
            .unwrap(),
        vec![0, 1, 1, 1, 1]
    );
}

#[test]
fn dataset_queued_mode_selection() {
    let Fixture {
        dataset,
        memory,
        metrics,
        ..
    } = fixture(false);
    assert!(!dataset.write_async());

    // Default mode of the dataset
    dataset
        .store_slice(&[Slice::index(0), Slice::full()], ArrayBytes::new(vec![2], vec![1, 1]))
        .unwrap();
    assert_eq!((metrics.writes(), metrics.queued_writes()), (1, 0));

    // Per-call mode
    dataset
        .store_slice_opt(
            &[Slice::index(1), Slice::full()],
            ArrayBytes::new(vec![2], vec![2, 2]),
            &WriteOptions::new().with_asynchronous(true),
        )
        .unwrap();
    assert_eq!((metrics.writes(), metrics.queued_writes()), (1, 1));

    // Per-handle mode, views inherit the mode of their source at creation
    dataset.set_write_async(true);
    let view = dataset.slice_view(&[(2..4).into(), Slice::full()]).unwrap();
    assert!(view.write_async());
    view.store_slice(&[Slice::index(0), Slice::full()], ArrayBytes::new(vec![2], vec![3, 3]))
        .unwrap();
    assert_eq!((metrics.writes(), metrics.queued_writes()), (1, 2));

    // Explicitly synchronous writes block, after the earlier queued writes
    view.store_slice_sync(&[Slice::index(1), Slice::full()], ArrayBytes::new(vec![2], vec![4, 4]))
        .unwrap();
    assert_eq!((metrics.writes(), metrics.queued_writes()), (2, 2));
    assert_eq!(
        memory.array_bytes().into_bytes(),
        vec![1, 1, 2, 2, 3, 3, 4, 4]
    );
}

#[test]
fn dataset_queued_failures() {
    let Fixture {
        dataset,
        memory,
        queued,
        ..
    } = fixture(true);
    memory.set_writable(false);

    // A queued write is accepted, its failure is reported by the backend
    dataset
        .store_slice_elements::<u8>(&[Slice::index(0), Slice::full()], vec![1, 1])
        .unwrap();
    queued.flush();
    let errors = queued.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], StorageError::ReadOnly));

    // A blocking write checks the permission up front
    assert!(dataset
        .store_slice_sync(&[Slice::index(0), Slice::full()], ArrayBytes::new(vec![2], vec![1, 1]))
        .is_err());
    assert_eq!(memory.array_bytes().into_bytes(), vec![0; 8]);
}
