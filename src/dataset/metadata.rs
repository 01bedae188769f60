use serde::{Deserialize, Serialize};

use super::{ArrayShape, ChunkShape, DataType, DatasetCreateError, FillValue, MaxShape};

/// A description of a dataset which can be persisted alongside its storage.
///
/// An example `JSON` document:
/// ```json
/// {
///     "name": "samples",
///     "data_type": "float32",
///     "elements_per_item": 1,
///     "shape": [10, 3],
///     "max_shape": [null, 3],
///     "chunk_shape": [5, 3],
///     "fill_value": [0, 0, 192, 127]
/// }
/// ```
///
/// A `null` max shape entry marks an unbounded axis.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct DatasetMetadata {
    /// The name of the dataset.
    pub name: String,
    /// The data type.
    pub data_type: DataType,
    /// The number of elements per item.
    #[serde(default = "default_elements_per_item")]
    pub elements_per_item: usize,
    /// The shape.
    pub shape: ArrayShape,
    /// The max shape.
    pub max_shape: MaxShape,
    /// The chunking hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_shape: Option<ChunkShape>,
    /// The fill value, as native-endian bytes of an item.
    #[serde(default)]
    pub fill_value: FillValue,
}

const fn default_elements_per_item() -> usize {
    1
}

impl DatasetMetadata {
    /// Serialize the metadata to a pretty-printed `JSON` string.
    #[must_use]
    pub fn to_string_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl TryFrom<&str> for DatasetMetadata {
    type Error = DatasetCreateError;

    fn try_from(metadata_json: &str) -> Result<Self, Self::Error> {
        Ok(serde_json::from_str(metadata_json)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        dataset::{Dataset, DatasetBuilder},
        slice::Slice,
        storage::backend::MemoryBackend,
    };

    use super::*;

    const JSON: &str = r#"{
    "name": "samples",
    "data_type": "float32",
    "elements_per_item": 1,
    "shape": [10, 3],
    "max_shape": [null, 3],
    "chunk_shape": [5, 3],
    "fill_value": [0, 0, 192, 127]
}"#;

    #[test]
    fn dataset_metadata_json() {
        let metadata = DatasetMetadata::try_from(JSON).unwrap();
        assert_eq!(metadata.data_type, DataType::Float32);
        assert_eq!(metadata.max_shape, vec![None, Some(3)]);
        assert_eq!(metadata.chunk_shape, Some(ChunkShape::try_from([5, 3]).unwrap()));
        assert_eq!(
            DatasetMetadata::try_from(metadata.to_string_pretty().as_str()).unwrap(),
            metadata
        );
        assert!(DatasetMetadata::try_from(r#"{"name": "samples"}"#).is_err());
    }

    #[test]
    fn dataset_metadata_defaults() {
        let metadata = DatasetMetadata::try_from(
            r#"{"name": "flags", "data_type": "bool", "shape": [4], "max_shape": [4]}"#,
        )
        .unwrap();
        assert_eq!(metadata.elements_per_item, 1);
        assert_eq!(metadata.chunk_shape, None);
        assert_eq!(metadata.fill_value, FillValue::default());
    }

    #[test]
    fn dataset_metadata_builder() {
        let metadata = DatasetMetadata::try_from(JSON).unwrap();
        let backend = Arc::new(MemoryBackend::new(
            DataType::Float32,
            vec![10, 3],
            &metadata.fill_value,
        ));
        let dataset: Dataset = DatasetBuilder::from_metadata(&metadata)
            .build(metadata.name.clone(), backend)
            .unwrap();
        assert_eq!(dataset.metadata().unwrap(), metadata);

        dataset
            .store_slice_elements::<f32>(&[(10..12).into(), Slice::full()], vec![1.0; 6])
            .unwrap();
        let grown = dataset.metadata().unwrap();
        assert_eq!(grown.shape, vec![12, 3]);
        assert_eq!(grown.max_shape, metadata.max_shape);
    }
}
