//! Slices.
//!
//! A [`Slice`] is an unresolved `start:stop:step` selection along one axis with Python-like semantics:
//!  - `start` and `stop` may be omitted, in which case they default to the full extent of the axis in the direction of `step`,
//!  - negative `start` and `stop` count back from the end of the axis, and
//!  - `step` may be negative to select elements in reverse order, but must not be zero.
//!
//! A [`SliceNd`] is a slice resolved against a shape: a first index, a step and a count per axis.
//!
//! Slices are resolved in one of two modes:
//!  - *clamped* ([`SliceNd::new_clamped`]): selections beyond the shape are clamped to it. Used when creating views and reading.
//!  - *expandable* ([`SliceNd::new_expandable`]): selections may extend beyond the shape up to the max shape. Used when writing.

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use itertools::izip;
use thiserror::Error;

use crate::{
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    dataset::{ArrayIndices, ArrayShape},
};

/// An unresolved slice along one axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slice {
    start: Option<i64>,
    stop: Option<i64>,
    step: i64,
}

/// A slice resolution error.
#[derive(Clone, Debug, Error)]
pub enum SliceError {
    /// A slice has a zero step.
    #[error("slice {1} on axis {0} has a zero step")]
    ZeroStep(usize, Slice),
    /// A slice extends beyond the maximum extent of an axis.
    #[error("slice {slice} on axis {axis} extends to {end}, beyond the maximum extent {max}")]
    OutOfBounds {
        /// The axis.
        axis: usize,
        /// The slice.
        slice: Slice,
        /// The end (exclusive) of the slice.
        end: u64,
        /// The maximum extent of the axis.
        max: u64,
    },
    /// The number of slices does not match the dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
}

impl Slice {
    /// Create a new slice.
    #[must_use]
    pub const fn new(start: Option<i64>, stop: Option<i64>, step: i64) -> Self {
        Self { start, stop, step }
    }

    /// A slice selecting the full extent of an axis.
    #[must_use]
    pub const fn full() -> Self {
        Self::new(None, None, 1)
    }

    /// A slice selecting the full extent of an axis in reverse order.
    #[must_use]
    pub const fn reversed() -> Self {
        Self::new(None, None, -1)
    }

    /// A slice selecting the single element at `index`.
    #[must_use]
    pub const fn index(index: i64) -> Self {
        let stop = if index == -1 { None } else { Some(index + 1) };
        Self::new(Some(index), stop, 1)
    }

    /// The start of the slice.
    #[must_use]
    pub const fn start(&self) -> Option<i64> {
        self.start
    }

    /// The stop (exclusive) of the slice.
    #[must_use]
    pub const fn stop(&self) -> Option<i64> {
        self.stop
    }

    /// The step of the slice.
    #[must_use]
    pub const fn step(&self) -> i64 {
        self.step
    }

    /// Create one slice per axis from optional `start`, `stop` and `step` arrays.
    ///
    /// A missing array leaves the corresponding component at its default on every axis.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if a provided array does not have length `dimensionality`.
    pub fn from_start_stop_step(
        start: Option<&[i64]>,
        stop: Option<&[i64]>,
        step: Option<&[i64]>,
        dimensionality: usize,
    ) -> Result<Vec<Slice>, IncompatibleDimensionalityError> {
        for component in [start, stop, step].into_iter().flatten() {
            if component.len() != dimensionality {
                return Err(IncompatibleDimensionalityError::new(
                    component.len(),
                    dimensionality,
                ));
            }
        }
        Ok((0..dimensionality)
            .map(|axis| {
                Slice::new(
                    start.map(|start| start[axis]),
                    stop.map(|stop| stop[axis]),
                    step.map_or(1, |step| step[axis]),
                )
            })
            .collect())
    }

    /// Resolve the slice along an axis of length `len`.
    ///
    /// If `max` is [`Some`], the slice is resolved in expandable mode with `max` as the maximum extent (`Some(None)` is unbounded).
    /// Otherwise the slice is clamped to `len`.
    fn resolve(&self, axis: usize, len: u64, max: Option<Option<u64>>) -> Result<(u64, i64, u64), SliceError> {
        let step = self.step;
        if step == 0 {
            return Err(SliceError::ZeroStep(axis, *self));
        }
        let len = i128::from(len);
        let wrap = |index: i64| {
            let index = i128::from(index);
            if index < 0 {
                index + len
            } else {
                index
            }
        };
        let limit = match max {
            None => Some(len),
            Some(max) => max.map(i128::from),
        };
        let out_of_bounds = |end: i128| {
            let end = u64::try_from(end).unwrap_or(u64::MAX);
            let max = limit.map_or(u64::MAX, |limit| u64::try_from(limit).unwrap_or(u64::MAX));
            SliceError::OutOfBounds {
                axis,
                slice: *self,
                end,
                max,
            }
        };

        let (first, count) = if step > 0 {
            let mut start = self.start.map_or(0, wrap).max(0);
            let mut stop = self.stop.map_or(len, wrap).max(0);
            if max.is_none() {
                start = start.min(len);
                stop = stop.min(len);
            }
            let count = if stop > start {
                (stop - start + i128::from(step) - 1) / i128::from(step)
            } else {
                0
            };
            if count > 0 {
                if let Some(limit) = limit {
                    if stop > limit {
                        return Err(out_of_bounds(stop));
                    }
                }
            }
            (start, count)
        } else {
            let mut start = self.start.map_or(len - 1, wrap).max(-1);
            let stop = self.stop.map_or(-1, wrap).max(-1);
            if max.is_none() {
                start = start.min(len - 1);
            }
            let count = if start > stop {
                (start - stop - i128::from(step) - 1) / -i128::from(step)
            } else {
                0
            };
            if count > 0 {
                if let Some(limit) = limit {
                    if start >= limit {
                        return Err(out_of_bounds(start + 1));
                    }
                }
            }
            (start, count)
        };
        let first = if count == 0 {
            0
        } else {
            u64::try_from(first).unwrap_or_default()
        };
        Ok((first, step, u64::try_from(count).unwrap_or_default()))
    }
}

impl core::fmt::Display for Slice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        write!(f, ":")?;
        if let Some(stop) = self.stop {
            write!(f, "{stop}")?;
        }
        if self.step != 1 {
            write!(f, ":{}", self.step)?;
        }
        Ok(())
    }
}

impl Default for Slice {
    fn default() -> Self {
        Self::full()
    }
}

impl From<Range<u64>> for Slice {
    fn from(range: Range<u64>) -> Self {
        Self::new(
            Some(i64::try_from(range.start).unwrap_or(i64::MAX)),
            Some(i64::try_from(range.end).unwrap_or(i64::MAX)),
            1,
        )
    }
}

impl From<RangeFrom<u64>> for Slice {
    fn from(range: RangeFrom<u64>) -> Self {
        Self::new(Some(i64::try_from(range.start).unwrap_or(i64::MAX)), None, 1)
    }
}

impl From<RangeTo<u64>> for Slice {
    fn from(range: RangeTo<u64>) -> Self {
        Self::new(None, Some(i64::try_from(range.end).unwrap_or(i64::MAX)), 1)
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Self::full()
    }
}

/// A slice resolved against a shape.
///
/// Along each axis, the slice selects `shape[i]` elements starting at `start[i]` separated by `step[i]` (which may be negative).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SliceNd {
    start: ArrayIndices,
    step: Vec<i64>,
    shape: ArrayShape,
}

impl SliceNd {
    /// Create a slice selecting all of `shape`.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            step: vec![1; shape.len()],
            shape,
        }
    }

    /// Create a slice from its resolved components.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the lengths of `start`, `step` and `shape` do not match.
    pub fn new_with_start_step_shape(
        start: ArrayIndices,
        step: Vec<i64>,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != shape.len() {
            Err(IncompatibleDimensionalityError::new(start.len(), shape.len()))
        } else if step.len() != shape.len() {
            Err(IncompatibleDimensionalityError::new(step.len(), shape.len()))
        } else {
            Ok(Self { start, step, shape })
        }
    }

    /// Create a slice from its resolved components without validation.
    pub(crate) fn new_unchecked(start: ArrayIndices, step: Vec<i64>, shape: ArrayShape) -> Self {
        debug_assert_eq!(start.len(), shape.len());
        debug_assert_eq!(step.len(), shape.len());
        Self { start, step, shape }
    }

    /// Resolve `slices` against `shape`, clamping selections to the shape.
    ///
    /// # Errors
    /// Returns a [`SliceError`] if the number of slices does not match the dimensionality of `shape` or a slice has a zero step.
    pub fn new_clamped(slices: &[Slice], shape: &[u64]) -> Result<Self, SliceError> {
        Self::resolve(slices, shape, None)
    }

    /// Resolve `slices` against `shape`, allowing selections to extend up to `max_shape`.
    ///
    /// An axis with a `None` max shape is unbounded.
    ///
    /// # Errors
    /// Returns a [`SliceError`] if the number of slices does not match the dimensionality of `shape`, a slice has a zero step, or a slice extends beyond `max_shape`.
    pub fn new_expandable(
        slices: &[Slice],
        shape: &[u64],
        max_shape: &[Option<u64>],
    ) -> Result<Self, SliceError> {
        if max_shape.len() != shape.len() {
            return Err(IncompatibleDimensionalityError::new(max_shape.len(), shape.len()).into());
        }
        Self::resolve(slices, shape, Some(max_shape))
    }

    fn resolve(
        slices: &[Slice],
        shape: &[u64],
        max_shape: Option<&[Option<u64>]>,
    ) -> Result<Self, SliceError> {
        if slices.len() != shape.len() {
            return Err(IncompatibleDimensionalityError::new(slices.len(), shape.len()).into());
        }
        let mut start = Vec::with_capacity(shape.len());
        let mut step = Vec::with_capacity(shape.len());
        let mut count = Vec::with_capacity(shape.len());
        for (axis, (slice, &len)) in std::iter::zip(slices, shape).enumerate() {
            let max = max_shape.map(|max_shape| max_shape[axis]);
            let (first, axis_step, axis_count) = slice.resolve(axis, len, max)?;
            start.push(first);
            step.push(axis_step);
            count.push(axis_count);
        }
        Ok(Self {
            start,
            step,
            shape: count,
        })
    }

    /// Return the first index along each axis.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the step along each axis.
    #[must_use]
    pub fn step(&self) -> &[i64] {
        &self.step
    }

    /// Return the shape of the selection.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the slice.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    /// Return the number of elements selected.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Return the minimal extent (exclusive) along each axis required to contain the slice.
    ///
    /// An empty slice requires no extent.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        if self.num_elements() == 0 {
            return vec![0; self.dimensionality()];
        }
        izip!(&self.start, &self.step, &self.shape)
            .map(|(&start, &step, &count)| {
                if step > 0 {
                    start + step.unsigned_abs() * (count - 1) + 1
                } else {
                    start + 1
                }
            })
            .collect()
    }

    /// Return the minimal shape that contains both `shape` and this slice.
    #[must_use]
    pub fn expanded_shape(&self, shape: &[u64]) -> ArrayShape {
        std::iter::zip(self.end_exc(), shape)
            .map(|(end, &shape)| end.max(shape))
            .collect()
    }

    /// Returns true if the slice extends beyond `shape`.
    #[must_use]
    pub fn is_expanded(&self, shape: &[u64]) -> bool {
        std::iter::zip(self.end_exc(), shape).any(|(end, &shape)| end > shape)
    }

    /// Return the first axis where the slice extends beyond `max_shape`, as `(axis, end, max)`.
    #[must_use]
    pub fn exceeds(&self, max_shape: &[Option<u64>]) -> Option<(usize, u64, u64)> {
        std::iter::zip(self.end_exc(), max_shape)
            .enumerate()
            .find_map(|(axis, (end, max))| match max {
                Some(max) if end > *max => Some((axis, end, *max)),
                _ => None,
            })
    }

    /// Return the unresolved [`Slice`] selecting the same elements along `axis`.
    ///
    /// # Panics
    /// Panics if `axis` is not less than the dimensionality of the slice.
    #[must_use]
    pub fn axis_slice(&self, axis: usize) -> Slice {
        let start = i64::try_from(self.start()[axis]).unwrap_or(i64::MAX);
        let step = self.step()[axis];
        let stop = i128::from(start) + i128::from(step) * i128::from(self.shape()[axis]);
        let stop = if stop < 0 {
            None
        } else {
            Some(i64::try_from(stop).unwrap_or(i64::MAX))
        };
        Slice::new(Some(start), stop, step)
    }

    /// Convert the slice to an ascending [`ArraySubset`].
    ///
    /// Also returns the axes with a negative step, which are traversed in reverse by the slice relative to the subset.
    #[must_use]
    pub fn to_ascending(&self) -> (ArraySubset, Vec<usize>) {
        let mut start = Vec::with_capacity(self.dimensionality());
        let mut step = Vec::with_capacity(self.dimensionality());
        let mut reversed = Vec::new();
        for (axis, (&first, &axis_step, &count)) in
            izip!(&self.start, &self.step, &self.shape).enumerate()
        {
            let magnitude = axis_step.unsigned_abs();
            if axis_step < 0 {
                if count > 0 {
                    reversed.push(axis);
                    start.push(first - magnitude * (count - 1));
                } else {
                    start.push(first);
                }
            } else {
                start.push(first);
            }
            step.push(magnitude);
        }
        let subset = ArraySubset::new_with_start_step_shape(start, step, self.shape.clone())
            .unwrap_or_else(|_| ArraySubset::new_with_shape(self.shape.clone()));
        (subset, reversed)
    }
}

impl core::fmt::Display for SliceNd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "start {:?} step {:?} shape {:?}",
            self.start, self.step, self.shape
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_clamped(slice: Slice, len: u64) -> (u64, i64, u64) {
        let slice_nd = SliceNd::new_clamped(&[slice], &[len]).unwrap();
        (slice_nd.start()[0], slice_nd.step()[0], slice_nd.shape()[0])
    }

    #[test]
    fn slice_resolve_clamped() {
        assert_eq!(resolve_clamped(Slice::full(), 5), (0, 1, 5));
        assert_eq!(resolve_clamped((1..3).into(), 5), (1, 1, 2));
        assert_eq!(resolve_clamped((1..9).into(), 5), (1, 1, 4));
        assert_eq!(resolve_clamped(Slice::new(Some(-2), None, 1), 5), (3, 1, 2));
        assert_eq!(resolve_clamped(Slice::new(None, Some(-1), 2), 5), (0, 2, 2));
        assert_eq!(resolve_clamped(Slice::new(Some(0), Some(5), 2), 5), (0, 2, 3));
        assert_eq!(resolve_clamped(Slice::reversed(), 5), (4, -1, 5));
        assert_eq!(resolve_clamped(Slice::new(Some(3), Some(0), -2), 5), (3, -2, 2));
        assert_eq!(resolve_clamped(Slice::new(Some(9), None, -1), 5), (4, -1, 5));
        assert_eq!(resolve_clamped(Slice::index(-1), 5), (4, 1, 1));
        assert_eq!(resolve_clamped(Slice::index(2), 5), (2, 1, 1));
        assert_eq!(resolve_clamped((4..2).into(), 5), (0, 1, 0));
    }

    #[test]
    fn slice_resolve_zero_step() {
        assert!(matches!(
            SliceNd::new_clamped(&[Slice::new(None, None, 0)], &[5]),
            Err(SliceError::ZeroStep(0, _))
        ));
    }

    #[test]
    fn slice_resolve_dimensionality() {
        assert!(matches!(
            SliceNd::new_clamped(&[Slice::full()], &[5, 5]),
            Err(SliceError::IncompatibleDimensionality(_))
        ));
    }

    #[test]
    fn slice_resolve_expandable() {
        let slice_nd =
            SliceNd::new_expandable(&[Slice::full(), (2..6).into()], &[2, 3], &[Some(2), Some(10)])
                .unwrap();
        assert_eq!(slice_nd.start(), &[0, 2]);
        assert_eq!(slice_nd.shape(), &[2, 4]);
        assert!(slice_nd.is_expanded(&[2, 3]));
        assert_eq!(slice_nd.expanded_shape(&[2, 3]), vec![2, 6]);
        assert_eq!(slice_nd.exceeds(&[Some(2), Some(10)]), None);
        assert_eq!(slice_nd.exceeds(&[Some(2), Some(5)]), Some((1, 6, 5)));

        let unbounded =
            SliceNd::new_expandable(&[(100..101).into()], &[3], &[None]).unwrap();
        assert_eq!(unbounded.expanded_shape(&[3]), vec![101]);

        assert!(matches!(
            SliceNd::new_expandable(&[(2..11).into()], &[3], &[Some(10)]),
            Err(SliceError::OutOfBounds {
                axis: 0,
                end: 11,
                max: 10,
                ..
            })
        ));
    }

    #[test]
    fn slice_nd_to_ascending() {
        let slice_nd =
            SliceNd::new_clamped(&[Slice::reversed(), Slice::new(None, None, 2)], &[3, 5])
                .unwrap();
        let (subset, reversed) = slice_nd.to_ascending();
        assert_eq!(subset.start(), &[0, 0]);
        assert_eq!(subset.step(), &[1, 2]);
        assert_eq!(subset.shape(), &[3, 3]);
        assert_eq!(reversed, vec![0]);
    }

    #[test]
    fn slice_from_start_stop_step() {
        let slices =
            Slice::from_start_stop_step(Some(&[0, 1][..]), Some(&[2, 3][..]), None, 2).unwrap();
        assert_eq!(slices, vec![Slice::from(0..2), Slice::from(1..3)]);
        assert!(Slice::from_start_stop_step(Some(&[0][..]), None, None, 2).is_err());
        assert_eq!(Slice::new(Some(1), None, -1).to_string(), "1::-1");
        assert_eq!(Slice::from(1..3).to_string(), "1:3");
    }

    #[test]
    fn slice_nd_axis_slice() {
        let slice =
            SliceNd::new_clamped(&[Slice::reversed(), Slice::new(Some(1), None, 2)], &[3, 6])
                .unwrap();
        assert_eq!(slice.axis_slice(0), Slice::new(Some(2), None, -1));
        assert_eq!(slice.axis_slice(1), Slice::new(Some(1), Some(7), 2));
    }
}
