use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chunking hint: the shape of the physical tiles used by a backend. All dimensions must be non-zero.
///
/// Datasets carry the hint but never interpret it.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug, derive_more::Deref)]
#[serde(transparent)]
pub struct ChunkShape(Vec<NonZeroU64>);

/// A zero chunk dimension error.
#[derive(Copy, Clone, Debug, Error)]
#[error("chunk shape dimensions must be non-zero")]
pub struct ZeroChunkDimensionError;

impl ChunkShape {
    /// Return the number of elements of a chunk.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.0.iter().copied().map(NonZeroU64::get).product::<u64>()
    }

    /// Return the chunk shape as a vector of `u64`.
    #[must_use]
    pub fn to_array_shape(&self) -> Vec<u64> {
        self.0.iter().copied().map(NonZeroU64::get).collect()
    }
}

impl From<Vec<NonZeroU64>> for ChunkShape {
    fn from(value: Vec<NonZeroU64>) -> Self {
        ChunkShape(value)
    }
}

impl From<ChunkShape> for Vec<NonZeroU64> {
    fn from(val: ChunkShape) -> Self {
        val.0
    }
}

impl TryFrom<&[u64]> for ChunkShape {
    type Error = ZeroChunkDimensionError;

    fn try_from(value: &[u64]) -> Result<Self, Self::Error> {
        Ok(ChunkShape(
            value
                .iter()
                .map(|&i| NonZeroU64::new(i).ok_or(ZeroChunkDimensionError))
                .collect::<Result<_, _>>()?,
        ))
    }
}

impl TryFrom<Vec<u64>> for ChunkShape {
    type Error = ZeroChunkDimensionError;

    fn try_from(value: Vec<u64>) -> Result<Self, Self::Error> {
        ChunkShape::try_from(value.as_slice())
    }
}

impl<const N: usize> TryFrom<[u64; N]> for ChunkShape {
    type Error = ZeroChunkDimensionError;

    fn try_from(value: [u64; N]) -> Result<Self, Self::Error> {
        ChunkShape::try_from(value.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_shape() {
        let chunk_shape = ChunkShape::try_from([2, 3]).unwrap();
        assert_eq!(chunk_shape.len(), 2);
        assert_eq!(chunk_shape.num_elements(), 6);
        assert_eq!(chunk_shape.to_array_shape(), vec![2, 3]);
        assert!(ChunkShape::try_from(vec![2, 0]).is_err());
        assert_eq!(serde_json::to_string(&chunk_shape).unwrap(), "[2,3]");
    }
}
