use std::iter::FusedIterator;

use itertools::izip;

use crate::{array_subset::ArraySubset, dataset::ArrayIndices};

/// Iterates over element indices in an array subset.
///
/// Indices are visited in row-major (C) order, respecting the step of each axis.
pub struct IndicesIterator {
    subset: ArraySubset,
    index: u64,
    num_elements: u64,
}

impl IndicesIterator {
    /// Create a new indices iterator.
    #[must_use]
    pub fn new(subset: ArraySubset) -> Self {
        let num_elements = subset.num_elements();
        Self {
            subset,
            index: 0,
            num_elements,
        }
    }
}

impl Iterator for IndicesIterator {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.num_elements {
            return None;
        }
        let mut current = self.index;
        let mut indices = vec![0; self.subset.dimensionality()];
        for (out, &start, &step, &size) in izip!(
            indices.iter_mut().rev(),
            self.subset.start().iter().rev(),
            self.subset.step().iter().rev(),
            self.subset.shape().iter().rev(),
        ) {
            *out = start + (current % size) * step;
            current /= size;
        }
        self.index += 1;
        Some(indices)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.num_elements - self.index).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for IndicesIterator {}

impl FusedIterator for IndicesIterator {}
