use std::iter::FusedIterator;

use crate::{
    array_subset::{ArraySubset, IncompatibleArrayShapeError},
    dataset::ravel_indices,
};

use super::IndicesIterator;

/// Iterates over contiguous element runs of an array subset in an array.
///
/// Each item is a `(linearised index, run length)` pair.
/// Runs span the innermost axis when it has a unit step, otherwise each run is a single element.
pub struct ContiguousLinearisedIndicesIterator<'a> {
    inner: IndicesIterator,
    array_shape: &'a [u64],
    run_length: u64,
}

impl<'a> ContiguousLinearisedIndicesIterator<'a> {
    /// Create a new contiguous linearised indices iterator.
    ///
    /// # Errors
    /// Returns [`IncompatibleArrayShapeError`] if `array_shape` does not encapsulate `subset`.
    pub fn new(
        subset: &ArraySubset,
        array_shape: &'a [u64],
    ) -> Result<Self, IncompatibleArrayShapeError> {
        if !subset.inbounds(array_shape) {
            return Err(IncompatibleArrayShapeError::new(
                array_shape.to_vec(),
                subset.clone(),
            ));
        }
        let (outer, run_length) = match subset.dimensionality().checked_sub(1) {
            Some(last) if subset.step()[last] == 1 => {
                let mut shape = subset.shape().to_vec();
                let run_length = shape[last];
                shape[last] = run_length.min(1);
                let outer = ArraySubset::new_with_start_step_shape(
                    subset.start().to_vec(),
                    subset.step().to_vec(),
                    shape,
                )
                .map_err(|_| {
                    IncompatibleArrayShapeError::new(array_shape.to_vec(), subset.clone())
                })?;
                (outer, run_length)
            }
            _ => (subset.clone(), 1),
        };
        Ok(Self {
            inner: outer.iter_indices(),
            array_shape,
            run_length,
        })
    }
}

impl Iterator for ContiguousLinearisedIndicesIterator<'_> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|indices| (ravel_indices(&indices, self.array_shape), self.run_length))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ContiguousLinearisedIndicesIterator<'_> {}

impl FusedIterator for ContiguousLinearisedIndicesIterator<'_> {}
