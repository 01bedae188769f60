use itertools::izip;

use crate::slice::SliceNd;

/// Maps the coordinates of a view onto the coordinates of its base.
///
/// Local axis `a` of the view corresponds to axis `axes[a]` of the base.
/// Along base axis `b`, local index `i` maps to base index `start[b] + step[b] * i`.
///
/// Transforms compose, so a view of a view holds a single transform onto the root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewTransform {
    axes: Vec<usize>,
    start: Vec<u64>,
    step: Vec<i64>,
}

impl ViewTransform {
    /// The identity transform for `dimensionality` axes.
    #[must_use]
    pub fn identity(dimensionality: usize) -> Self {
        Self {
            axes: (0..dimensionality).collect(),
            start: vec![0; dimensionality],
            step: vec![1; dimensionality],
        }
    }

    /// A transform selecting `slice` of the base, without reordering axes.
    #[must_use]
    pub fn from_slice(slice: &SliceNd) -> Self {
        Self {
            axes: (0..slice.dimensionality()).collect(),
            start: slice.start().to_vec(),
            step: slice.step().to_vec(),
        }
    }

    /// A transform reordering the axes of the base, where local axis `a` is base axis `order[a]`.
    ///
    /// Returns [`None`] if `order` is not a permutation.
    #[must_use]
    pub fn from_order(order: &[usize]) -> Option<Self> {
        let mut seen = vec![false; order.len()];
        for &axis in order {
            if axis >= order.len() || std::mem::replace(&mut seen[axis], true) {
                return None;
            }
        }
        Some(Self {
            axes: order.to_vec(),
            start: vec![0; order.len()],
            step: vec![1; order.len()],
        })
    }

    /// Return the base axis of each local axis.
    #[must_use]
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    /// Return the dimensionality.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.axes.len()
    }

    /// Returns true if the transform maps every coordinate onto itself.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.axes.iter().enumerate().all(|(i, &axis)| i == axis)
            && self.start.iter().all(|&start| start == 0)
            && self.step.iter().all(|&step| step == 1)
    }

    /// Returns true if the transform reorders axes.
    #[must_use]
    pub fn is_permuted(&self) -> bool {
        self.axes.iter().enumerate().any(|(i, &axis)| i != axis)
    }

    /// Compose with a transform `inner` that maps onto the local coordinates of this transform.
    ///
    /// The result maps the local coordinates of `inner` directly onto the base of this transform.
    #[must_use]
    pub fn compose(&self, inner: &ViewTransform) -> ViewTransform {
        let axes = inner.axes.iter().map(|&axis| self.axes[axis]).collect();
        let mut start = self.start.clone();
        let mut step = self.step.clone();
        for (axis_local, (&inner_start, &inner_step)) in
            std::iter::zip(&inner.start, &inner.step).enumerate()
        {
            let axis = self.axes[axis_local];
            start[axis] = offset(self.start[axis], self.step[axis], inner_start);
            step[axis] = self.step[axis] * inner_step;
        }
        ViewTransform { axes, start, step }
    }

    /// Map a `slice` in local coordinates onto the base.
    ///
    /// The returned slice is in base coordinates and base axis order.
    #[must_use]
    pub fn apply(&self, slice: &SliceNd) -> SliceNd {
        let dimensionality = self.dimensionality();
        let mut start = vec![0; dimensionality];
        let mut step = vec![1; dimensionality];
        let mut shape = vec![0; dimensionality];
        for (&axis, &local_start, &local_step, &local_count) in
            izip!(&self.axes, slice.start(), slice.step(), slice.shape())
        {
            start[axis] = offset(self.start[axis], self.step[axis], local_start);
            step[axis] = self.step[axis] * local_step;
            shape[axis] = local_count;
        }
        SliceNd::new_unchecked(start, step, shape)
    }

    /// Return the local shape of a view of a base with `base_shape`.
    #[must_use]
    pub fn local_shape(&self, base_shape: &[u64]) -> Vec<u64> {
        self.axes.iter().map(|&axis| base_shape[axis]).collect()
    }

    /// Return the axis order converting local data into base axis order.
    ///
    /// Axis `b` of the reordered data is local axis `order[b]`.
    #[must_use]
    pub fn data_order(&self) -> Vec<usize> {
        let mut order = vec![0; self.dimensionality()];
        for (axis_local, &axis) in self.axes.iter().enumerate() {
            order[axis] = axis_local;
        }
        order
    }
}

fn offset(start: u64, step: i64, index: u64) -> u64 {
    let offset = i128::from(start) + i128::from(step) * i128::from(index);
    u64::try_from(offset.max(0)).unwrap_or(u64::MAX)
}
