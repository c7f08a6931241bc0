// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Dense named-axis weight grids.
//!
//! A [`Grid`] owns an ordered set of [`Axis`] definitions and a dense backing
//! array of `f64` weights whose shape is exactly the tuple of axis sizes.
//! Two optional companions refine how the weights are reduced:
//!
//! * a boolean `constraint` marking coordinate combinations as physically
//!   invalid (excluded cells contribute nothing to sums and receive zero
//!   weight when normalizing), and
//! * a `multiplicity` array correcting for combinatorial duplication, so a
//!   sum treats permutation-equivalent configurations as one outcome scaled
//!   by its count.
//!
//! Weights are unnormalized non-negative masses unless the caller has
//! explicitly called [`Grid::normalize`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use ndarray::{ArrayD, ArrayViewD, Axis as NdAxis, Dimension, IxDyn, Slice, Zip};
use tracing::debug;

use crate::axis::Axis;
use crate::error::{GridError, GridResult};

fn broadcast_owned<T: Clone>(arr: &ArrayD<T>, shape: &[usize]) -> GridResult<ArrayD<T>> {
    arr.broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| GridError::NotBroadcastable {
            from: arr.shape().to_vec(),
            to: shape.to_vec(),
        })
}

/// Builder collecting named axis bindings in argument order.
#[derive(Default)]
pub struct GridBuilder {
    axes: Vec<Axis>,
    weights: Option<ArrayD<f64>>,
    constraint: Option<ArrayD<bool>>,
    multiplicity: Option<ArrayD<f64>>,
    pending: Option<GridError>,
}

impl GridBuilder {
    /// Bind an axis to an ordered coordinate sequence.
    pub fn coords<S, I>(mut self, name: S, values: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = f64>,
    {
        match Axis::new(name, values) {
            Ok(axis) => self.axes.push(axis),
            Err(err) => {
                if self.pending.is_none() {
                    self.pending = Some(err);
                }
            }
        }
        self
    }

    /// Bind an axis to a single scalar coordinate (size-1 axis).
    pub fn scalar<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.axes.push(Axis::scalar(name, value));
        self
    }

    /// Append a pre-built axis.
    pub fn axis(mut self, axis: Axis) -> Self {
        self.axes.push(axis);
        self
    }

    /// Supply initial backing weights instead of the zero default.
    pub fn weights(mut self, weights: ArrayD<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Mark coordinate combinations as excluded. The mask may use singleton
    /// dimensions and is broadcast to the grid shape at build time.
    pub fn constraint(mut self, mask: ArrayD<bool>) -> Self {
        self.constraint = Some(mask);
        self
    }

    /// Attach combinatorial multiplicity weights, broadcast like the
    /// constraint mask.
    pub fn multiplicity(mut self, weights: ArrayD<f64>) -> Self {
        self.multiplicity = Some(weights);
        self
    }

    pub fn build(self) -> GridResult<Grid> {
        if let Some(err) = self.pending {
            return Err(err);
        }
        if self.axes.is_empty() {
            return Err(GridError::NoAxes);
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].iter().any(|a| a.name() == axis.name()) {
                return Err(GridError::AxisCollision {
                    name: axis.name().to_string(),
                });
            }
        }
        let shape: Vec<usize> = self.axes.iter().map(Axis::len).collect();
        let weights = match self.weights {
            Some(w) => {
                if w.shape() != shape.as_slice() {
                    return Err(GridError::ShapeMismatch {
                        expected: shape,
                        got: w.shape().to_vec(),
                    });
                }
                w
            }
            None => ArrayD::zeros(IxDyn(&shape)),
        };
        let mut grid = Grid {
            axes: self.axes,
            weights,
            constraint: None,
            multiplicity: None,
        };
        if let Some(mask) = self.constraint {
            grid = grid.with_constraint(mask)?;
        }
        if let Some(mult) = self.multiplicity {
            grid = grid.with_multiplicity(mult)?;
        }
        Ok(grid)
    }
}

/// A dense array of weights indexed by one or more named axes.
#[derive(Clone, Debug)]
pub struct Grid {
    axes: Vec<Axis>,
    weights: ArrayD<f64>,
    constraint: Option<ArrayD<bool>>,
    multiplicity: Option<ArrayD<f64>>,
}

impl Grid {
    pub fn builder() -> GridBuilder {
        GridBuilder::default()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn shape(&self) -> &[usize] {
        self.weights.shape()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(Axis::name)
    }

    pub fn axis(&self, name: &str) -> GridResult<&Axis> {
        self.axes
            .iter()
            .find(|axis| axis.name() == name)
            .ok_or_else(|| GridError::UnknownAxis {
                name: name.to_string(),
            })
    }

    pub fn axis_index(&self, name: &str) -> GridResult<usize> {
        self.axes
            .iter()
            .position(|axis| axis.name() == name)
            .ok_or_else(|| GridError::UnknownAxis {
                name: name.to_string(),
            })
    }

    /// The (min, max) extent of the named axis.
    pub fn extent(&self, name: &str) -> GridResult<(f64, f64)> {
        Ok(self.axis(name)?.extent())
    }

    pub fn weights(&self) -> &ArrayD<f64> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.weights
    }

    /// Replace the backing weights. The shape must agree with the axes.
    pub fn set_weights(&mut self, weights: ArrayD<f64>) -> GridResult<()> {
        if weights.shape() != self.shape() {
            return Err(GridError::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: weights.shape().to_vec(),
            });
        }
        self.weights = weights;
        Ok(())
    }

    pub fn constraint(&self) -> Option<&ArrayD<bool>> {
        self.constraint.as_ref()
    }

    pub fn multiplicity(&self) -> Option<&ArrayD<f64>> {
        self.multiplicity.as_ref()
    }

    /// Attach an exclusion mask, broadcast to the grid shape.
    pub fn with_constraint(mut self, mask: ArrayD<bool>) -> GridResult<Self> {
        self.constraint = Some(broadcast_owned(&mask, self.shape())?);
        Ok(self)
    }

    /// Attach multiplicity weights, broadcast to the grid shape. Negative or
    /// non-finite entries are rejected.
    pub fn with_multiplicity(mut self, weights: ArrayD<f64>) -> GridResult<Self> {
        let full = broadcast_owned(&weights, self.shape())?;
        if let Some(&bad) = full.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(GridError::InvalidWeight { value: bad });
        }
        self.multiplicity = Some(full);
        Ok(self)
    }

    /// The combined per-cell reduction weight: multiplicity times the 0/1
    /// constraint mask. `None` when neither companion is present.
    pub fn point_weights(&self) -> Option<ArrayD<f64>> {
        match (&self.constraint, &self.multiplicity) {
            (None, None) => None,
            (Some(mask), None) => Some(mask.mapv(|keep| if keep { 1.0 } else { 0.0 })),
            (None, Some(mult)) => Some(mult.clone()),
            (Some(mask), Some(mult)) => {
                let mut combined = mult.clone();
                Zip::from(&mut combined)
                    .and(mask)
                    .for_each(|w, &keep| *w = if keep { *w } else { 0.0 });
                Some(combined)
            }
        }
    }

    fn resolve_axes(&self, names: &[&str]) -> GridResult<Vec<usize>> {
        names.iter().map(|name| self.axis_index(name)).collect()
    }

    fn axes_shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }

    fn check_shape(&self, values: &ArrayViewD<'_, f64>) -> GridResult<()> {
        // Checked against the axes, not the backing array: `normalize` lends
        // the weights out while the check runs.
        let expected = self.axes_shape();
        if values.shape() != expected.as_slice() {
            return Err(GridError::ShapeMismatch {
                expected,
                got: values.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Weighted sum of a caller-supplied array tabulated on this grid.
    ///
    /// With `axes = None` the reduction runs over every axis and applies the
    /// constraint/multiplicity weights. Summing over a named subset of axes
    /// is only defined for unconstrained grids.
    pub fn sum_of(
        &self,
        values: ArrayViewD<'_, f64>,
        axes: Option<&[&str]>,
        keepdims: bool,
    ) -> GridResult<ArrayD<f64>> {
        self.check_shape(&values)?;
        let indices = match axes {
            None => (0..self.ndim()).collect::<Vec<_>>(),
            Some(names) => {
                if self.constraint.is_some() || self.multiplicity.is_some() {
                    return Err(GridError::ConstrainedPartialSum);
                }
                self.resolve_axes(names)?
            }
        };
        let mut acc = match (axes, self.point_weights()) {
            (None, Some(w)) => &values * &w,
            _ => values.to_owned(),
        };
        let mut order = indices.clone();
        order.sort_unstable_by(|a, b| b.cmp(a));
        for idx in order {
            acc = acc.sum_axis(NdAxis(idx));
        }
        if keepdims {
            let mut sorted = indices;
            sorted.sort_unstable();
            for idx in sorted {
                acc = acc.insert_axis(NdAxis(idx));
            }
        }
        Ok(acc)
    }

    /// Weighted sum of the grid's own weights.
    pub fn sum(&self, axes: Option<&[&str]>, keepdims: bool) -> GridResult<ArrayD<f64>> {
        self.sum_of(self.weights.view(), axes, keepdims)
    }

    /// Full weighted sum collapsed to a scalar.
    pub fn total_of(&self, values: ArrayViewD<'_, f64>) -> GridResult<f64> {
        let acc = self.sum_of(values, None, false)?;
        Ok(acc.into_iter().sum())
    }

    /// Normalize a caller-supplied array in place so it sums to 1 along the
    /// named axes (all axes when `None`), respecting constraint and
    /// multiplicity weights.
    ///
    /// Slices whose weighted sum is exactly zero are left untouched rather
    /// than producing 0/0; the number of such slices is returned.
    pub fn normalize_of(
        &self,
        values: &mut ArrayD<f64>,
        axes: Option<&[&str]>,
    ) -> GridResult<usize> {
        self.check_shape(&values.view())?;
        if let Some(mask) = &self.constraint {
            Zip::from(values.view_mut())
                .and(mask)
                .for_each(|v, &keep| {
                    if !keep {
                        *v = 0.0;
                    }
                });
        }
        let norm = self.sum_of(values.view(), axes, true)?;
        let zero_slices = norm.iter().filter(|&&n| n == 0.0).count();
        if zero_slices > 0 {
            debug!(zero_slices, "normalize: leaving zero-sum slices unscaled");
        }
        let norm_view = norm
            .broadcast(values.raw_dim())
            .ok_or_else(|| GridError::NotBroadcastable {
                from: norm.shape().to_vec(),
                to: values.shape().to_vec(),
            })?;
        Zip::from(values.view_mut())
            .and(&norm_view)
            .for_each(|v, &n| {
                if n != 0.0 {
                    *v /= n;
                }
            });
        Ok(zero_slices)
    }

    /// Normalize the grid's own weights. See [`Grid::normalize_of`] for the
    /// zero-sum policy.
    pub fn normalize(&mut self, axes: Option<&[&str]>) -> GridResult<usize> {
        let mut weights = std::mem::take(&mut self.weights);
        let result = self.normalize_of(&mut weights, axes);
        self.weights = weights;
        result
    }

    /// Broadcast the grid onto one additional axis, replicating the data
    /// along it. Cells excluded by the constraint are filled with
    /// `missing_value`.
    pub fn expand(&self, axis: Axis, missing_value: f64) -> GridResult<Grid> {
        if self.axes.iter().any(|a| a.name() == axis.name()) {
            return Err(GridError::AxisCollision {
                name: axis.name().to_string(),
            });
        }
        let mut shape = self.shape().to_vec();
        shape.push(axis.len());
        let tail = NdAxis(self.ndim());
        let mut weights = self
            .weights
            .view()
            .insert_axis(tail)
            .broadcast(IxDyn(&shape))
            .ok_or_else(|| GridError::NotBroadcastable {
                from: self.shape().to_vec(),
                to: shape.clone(),
            })?
            .to_owned();
        let constraint = match &self.constraint {
            Some(mask) => {
                let full = mask
                    .view()
                    .insert_axis(tail)
                    .broadcast(IxDyn(&shape))
                    .ok_or_else(|| GridError::NotBroadcastable {
                        from: mask.shape().to_vec(),
                        to: shape.clone(),
                    })?
                    .to_owned();
                Zip::from(&mut weights).and(&full).for_each(|w, &keep| {
                    if !keep {
                        *w = missing_value;
                    }
                });
                Some(full)
            }
            None => None,
        };
        let multiplicity = match &self.multiplicity {
            Some(mult) => Some(broadcast_owned(
                &mult.view().insert_axis(tail).to_owned(),
                &shape,
            )?),
            None => None,
        };
        let mut axes = self.axes.clone();
        axes.push(axis);
        Ok(Grid {
            axes,
            weights,
            constraint,
            multiplicity,
        })
    }

    /// Contiguous slice along one named axis, carrying the corresponding
    /// slices of the weights, constraint, and multiplicity arrays.
    pub fn subgrid(&self, name: &str, range: Range<usize>) -> GridResult<Grid> {
        let idx = self.axis_index(name)?;
        let len = self.axes[idx].len();
        if range.start >= range.end || range.end > len {
            return Err(GridError::ShapeMismatch {
                expected: vec![len],
                got: vec![range.start, range.end],
            });
        }
        let axis = Axis::new(
            name,
            self.axes[idx]
                .values()
                .iter()
                .skip(range.start)
                .take(range.end - range.start)
                .copied(),
        )?;
        let slice = Slice::from(range);
        let mut axes = self.axes.clone();
        axes[idx] = axis;
        Ok(Grid {
            axes,
            weights: self.weights.slice_axis(NdAxis(idx), slice).to_owned(),
            constraint: self
                .constraint
                .as_ref()
                .map(|mask| mask.slice_axis(NdAxis(idx), slice).to_owned()),
            multiplicity: self
                .multiplicity
                .as_ref()
                .map(|mult| mult.slice_axis(NdAxis(idx), slice).to_owned()),
        })
    }

    /// For each coordinate combination of the non-reduced axes, the
    /// coordinate value of every reduced axis at which `values` is maximal.
    ///
    /// Ties resolve to the first occurrence in row-major axis order.
    pub fn getmax_of(
        &self,
        values: ArrayViewD<'_, f64>,
        axes: Option<&[&str]>,
    ) -> GridResult<BTreeMap<String, ArrayD<f64>>> {
        self.check_shape(&values)?;
        let reduced = match axes {
            None => (0..self.ndim()).collect::<Vec<_>>(),
            Some(names) => self.resolve_axes(names)?,
        };
        let kept: Vec<usize> = (0..self.ndim()).filter(|i| !reduced.contains(i)).collect();
        let mut order = kept.clone();
        order.extend(reduced.iter().copied());
        let permuted = values.view().permuted_axes(IxDyn(&order)).to_owned();
        let kept_shape: Vec<usize> = kept.iter().map(|&i| self.axes[i].len()).collect();
        let reduced_shape: Vec<usize> = reduced.iter().map(|&i| self.axes[i].len()).collect();
        let kept_len: usize = kept_shape.iter().product();
        let reduced_len: usize = reduced_shape.iter().product();
        let flat = permuted
            .into_shape(IxDyn(&[kept_len.max(1), reduced_len.max(1)]))
            .map_err(|_| GridError::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: values.shape().to_vec(),
            })?;
        let mut coords: Vec<Vec<f64>> = vec![Vec::with_capacity(kept_len); reduced.len()];
        for row in flat.outer_iter() {
            let mut best = 0usize;
            let mut best_value = f64::NEG_INFINITY;
            for (i, &v) in row.iter().enumerate() {
                if v > best_value {
                    best_value = v;
                    best = i;
                }
            }
            // Unravel the flat winner into per-axis indices, row-major.
            let mut rem = best;
            for (slot, &size) in reduced_shape.iter().enumerate().rev() {
                let loc = rem % size;
                rem /= size;
                coords[slot].push(self.axes[reduced[slot]].values()[loc]);
            }
        }
        let out_shape = kept_shape;
        let mut out = BTreeMap::new();
        for (slot, &axis_idx) in reduced.iter().enumerate() {
            let arr = ArrayD::from_shape_vec(IxDyn(&out_shape), coords[slot].clone()).map_err(
                |_| GridError::ShapeMismatch {
                    expected: out_shape.clone(),
                    got: vec![coords[slot].len()],
                },
            )?;
            out.insert(self.axes[axis_idx].name().to_string(), arr);
        }
        Ok(out)
    }

    /// Coordinates of the global maximum of the grid's own weights.
    pub fn getmax(&self, axes: Option<&[&str]>) -> GridResult<BTreeMap<String, ArrayD<f64>>> {
        self.getmax_of(self.weights.view(), axes)
    }

    /// Coordinates and value of the global maximum of `values`, reduced over
    /// every axis. First occurrence wins on ties.
    pub fn argmax_of(
        &self,
        values: ArrayViewD<'_, f64>,
    ) -> GridResult<(BTreeMap<String, f64>, f64)> {
        self.check_shape(&values)?;
        let mut best_value = f64::NEG_INFINITY;
        let mut best_index: Option<Vec<usize>> = None;
        for (idx, &v) in values.indexed_iter() {
            if v > best_value {
                best_value = v;
                best_index = Some(idx.slice().to_vec());
            }
        }
        let index = best_index.ok_or(GridError::NoAxes)?;
        let coords = self
            .axes
            .iter()
            .zip(&index)
            .map(|(axis, &i)| (axis.name().to_string(), axis.values()[i]))
            .collect();
        Ok((coords, best_value))
    }

    fn zip_with(&self, other: &Grid, op: impl Fn(f64, f64) -> f64) -> GridResult<Grid> {
        if self.shape() != other.shape() {
            return Err(GridError::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: other.shape().to_vec(),
            });
        }
        let mut out = self.clone();
        Zip::from(&mut out.weights)
            .and(&other.weights)
            .for_each(|a, &b| *a = op(*a, b));
        Ok(out)
    }

    /// Checked elementwise addition. Shapes must match exactly.
    pub fn add(&self, other: &Grid) -> GridResult<Grid> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Checked elementwise subtraction.
    pub fn sub(&self, other: &Grid) -> GridResult<Grid> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Checked elementwise multiplication.
    pub fn mul(&self, other: &Grid) -> GridResult<Grid> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Checked elementwise division.
    pub fn div(&self, other: &Grid) -> GridResult<Grid> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Elementwise map over the weights, preserving axes and companions.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Grid {
        let mut out = self.clone();
        out.weights.mapv_inplace(f);
        out
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, axis) in self.axes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", axis.len(), axis.name())?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn simple_grid() -> Grid {
        Grid::builder()
            .coords("x", vec![0.0, 1.0, 2.0])
            .coords("y", vec![10.0, 20.0])
            .build()
            .unwrap()
    }

    #[test]
    fn builder_preserves_argument_order() {
        let grid = Grid::builder()
            .scalar("amplitude", 1.0)
            .coords("frequency", vec![0.2, 1.0, 2.0])
            .scalar("offset", 0.0)
            .build()
            .unwrap();
        assert_eq!(grid.shape(), &[1, 3, 1]);
        let names: Vec<_> = grid.names().collect();
        assert_eq!(names, vec!["amplitude", "frequency", "offset"]);
    }

    #[test]
    fn duplicate_axis_names_rejected() {
        let err = Grid::builder()
            .scalar("x", 0.0)
            .coords("x", vec![1.0, 2.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, GridError::AxisCollision { .. }));
    }

    #[test]
    fn normalize_sums_to_one() {
        let mut grid = simple_grid();
        grid.weights_mut().fill(1.0);
        let zero = grid.normalize(None).unwrap();
        assert_eq!(zero, 0);
        let total = grid.total_of(grid.weights().view()).unwrap();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn normalize_leaves_zero_slices_untouched() {
        let mut grid = simple_grid();
        // One all-zero row along the normalization axis.
        grid.set_weights(
            array![[1.0, 1.0], [0.0, 0.0], [2.0, 2.0]].into_dyn(),
        )
        .unwrap();
        let zero = grid.normalize(Some(&["y"])).unwrap();
        assert_eq!(zero, 1);
        let w = grid.weights();
        assert_relative_eq!(w[[0, 0]] + w[[0, 1]], 1.0, epsilon = 1e-12);
        assert_eq!(w[[1, 0]], 0.0);
        assert_eq!(w[[1, 1]], 0.0);
        assert!(w.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn constrained_cells_contribute_zero_and_become_zero() {
        let mask = array![[true, false], [true, true], [true, true]].into_dyn();
        let mut grid = simple_grid().with_constraint(mask).unwrap();
        grid.weights_mut().fill(1.0);
        grid.normalize(None).unwrap();
        assert_eq!(grid.weights()[[0, 1]], 0.0);
        let total = grid.total_of(grid.weights().view()).unwrap();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn multiplicity_scales_sums() {
        let grid = Grid::builder()
            .coords("x", vec![0.0, 1.0])
            .weights(array![1.0, 1.0].into_dyn())
            .multiplicity(array![1.0, 2.0].into_dyn())
            .build()
            .unwrap();
        assert_relative_eq!(
            grid.total_of(grid.weights().view()).unwrap(),
            3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn partial_sum_on_constrained_grid_rejected() {
        let grid = simple_grid()
            .with_multiplicity(array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]].into_dyn())
            .unwrap();
        let err = grid.sum(Some(&["x"]), false).unwrap_err();
        assert!(matches!(err, GridError::ConstrainedPartialSum));
    }

    #[test]
    fn getmax_ties_resolve_to_first_occurrence() {
        let mut grid = simple_grid();
        grid.set_weights(array![[0.0, 5.0], [5.0, 0.0], [1.0, 1.0]].into_dyn())
            .unwrap();
        let (coords, value) = grid.argmax_of(grid.weights().view()).unwrap();
        assert_eq!(value, 5.0);
        assert_eq!(coords["x"], 0.0);
        assert_eq!(coords["y"], 20.0);
    }

    #[test]
    fn getmax_over_subset_keeps_remaining_axes() {
        let mut grid = simple_grid();
        grid.set_weights(array![[0.0, 5.0], [5.0, 0.0], [1.0, 7.0]].into_dyn())
            .unwrap();
        let out = grid.getmax_of(grid.weights().view(), Some(&["x"])).unwrap();
        let best_x = &out["x"];
        assert_eq!(best_x.shape(), &[2]);
        // Column 0 peaks at x=1, column 1 at x=2.
        assert_eq!(best_x[[0]], 1.0);
        assert_eq!(best_x[[1]], 2.0);
    }

    #[test]
    fn expand_fills_excluded_cells() {
        let mask = array![[true, false], [true, true], [true, true]].into_dyn();
        let mut grid = simple_grid().with_constraint(mask).unwrap();
        grid.weights_mut().fill(1.0);
        let bigger = grid
            .expand(Axis::new("z", vec![0.0, 1.0]).unwrap(), f64::NAN)
            .unwrap();
        assert_eq!(bigger.shape(), &[3, 2, 2]);
        assert!(bigger.weights()[[0, 1, 0]].is_nan());
        assert_eq!(bigger.weights()[[1, 1, 1]], 1.0);
    }

    #[test]
    fn arithmetic_rejects_shape_mismatch() {
        let a = simple_grid();
        let b = Grid::builder()
            .coords("x", vec![0.0, 1.0])
            .build()
            .unwrap();
        assert!(matches!(
            a.add(&b).unwrap_err(),
            GridError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn subgrid_slices_axis_and_weights() {
        let mut grid = simple_grid();
        grid.set_weights(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]].into_dyn())
            .unwrap();
        let sub = grid.subgrid("x", 1..3).unwrap();
        assert_eq!(sub.shape(), &[2, 2]);
        assert_eq!(sub.axis("x").unwrap().values().to_vec(), vec![1.0, 2.0]);
        assert_eq!(sub.weights()[[0, 0]], 3.0);
    }
}
