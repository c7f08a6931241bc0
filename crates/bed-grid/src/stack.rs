// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Scoped alignment of several grids into one broadcastable layout.
//!
//! A [`GridStack`] joins grids defined over disjoint axis sets into a single
//! global axis order (the first-seen union of member axis names) and hands
//! out axis-aligned views: a grid's own axes keep their relative order and a
//! singleton dimension stands in for every axis the grid does not own. With
//! every view aligned that way, ordinary `ndarray` co-broadcasting makes
//! elementwise expressions combine reads from independently defined grids.
//!
//! The stack never touches member data. All views borrow the grids, so the
//! alignment ends with the stack's scope on every exit path — the borrow
//! checker enforces the release half of the acquire/release contract.

use std::fmt;

use ndarray::{ArrayViewD, Axis as NdAxis};

use crate::axis::Axis;
use crate::error::{GridError, GridResult};
use crate::grid::Grid;

#[derive(Debug)]
struct StackAxis<'a> {
    axis: &'a Axis,
    member: usize,
}

/// A transient alignment scope over two or more grids.
#[derive(Debug)]
pub struct GridStack<'a> {
    grids: Vec<&'a Grid>,
    axes: Vec<StackAxis<'a>>,
    shape: Vec<usize>,
}

impl<'a> GridStack<'a> {
    /// Align the given grids. Axis names must be unique across all members;
    /// a duplicate (including the same grid listed twice) is a collision.
    pub fn new(grids: &[&'a Grid]) -> GridResult<Self> {
        let mut axes: Vec<StackAxis<'a>> = Vec::new();
        for (member, grid) in grids.iter().enumerate() {
            for axis in grid.axes() {
                if axes.iter().any(|sa| sa.axis.name() == axis.name()) {
                    return Err(GridError::AxisCollision {
                        name: axis.name().to_string(),
                    });
                }
                axes.push(StackAxis { axis, member });
            }
        }
        let shape = axes.iter().map(|sa| sa.axis.len()).collect();
        Ok(Self {
            grids: grids.to_vec(),
            axes,
            shape,
        })
    }

    /// The full Cartesian shape of the aligned layout.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn grids(&self) -> &[&'a Grid] {
        &self.grids
    }

    fn find(&self, name: &str) -> GridResult<(usize, &StackAxis<'a>)> {
        self.axes
            .iter()
            .enumerate()
            .find(|(_, sa)| sa.axis.name() == name)
            .ok_or_else(|| GridError::UnknownAxis {
                name: name.to_string(),
            })
    }

    /// Position of the named axis in the global order.
    pub fn axis_offset(&self, name: &str) -> GridResult<usize> {
        Ok(self.find(name)?.0)
    }

    /// The named axis itself.
    pub fn axis(&self, name: &str) -> GridResult<&'a Axis> {
        Ok(self.find(name)?.1.axis)
    }

    /// Coordinate values of the named axis, aligned to the stack: the axis
    /// sits at its global position and every other dimension is a singleton,
    /// so arithmetic between `coord` reads of different axes broadcasts to
    /// the full Cartesian layout.
    pub fn coord(&self, name: &str) -> GridResult<ArrayViewD<'a, f64>> {
        let (offset, sa) = self.find(name)?;
        let mut view = sa.axis.values().view().into_dyn();
        for _ in 0..offset {
            view = view.insert_axis(NdAxis(0));
        }
        while view.ndim() < self.ndim() {
            let at = view.ndim();
            view = view.insert_axis(NdAxis(at));
        }
        Ok(view)
    }

    /// A member grid's backing weights aligned to the stack, with singleton
    /// dimensions standing in for every axis the grid does not own.
    pub fn values(&self, grid: &Grid) -> GridResult<ArrayViewD<'a, f64>> {
        let member = self
            .grids
            .iter()
            .position(|g| std::ptr::eq(*g, grid))
            .ok_or(GridError::ForeignGrid)?;
        let mut view = self.grids[member].weights().view();
        for (pos, sa) in self.axes.iter().enumerate() {
            if sa.member != member {
                view = view.insert_axis(NdAxis(pos));
            }
        }
        Ok(view)
    }

    /// Nearest-coordinate lookup: for each `(axis name, value)` pair, the
    /// global axis position and the index of the closest coordinate.
    pub fn locate(&self, coords: &[(&str, f64)]) -> GridResult<Vec<(usize, usize)>> {
        coords
            .iter()
            .map(|&(name, value)| {
                let (offset, sa) = self.find(name)?;
                Ok((offset, sa.axis.nearest(value)))
            })
            .collect()
    }
}

impl fmt::Display for GridStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, grid) in self.grids.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{grid}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grids() -> (Grid, Grid, Grid) {
        let features = Grid::builder()
            .coords("y", vec![-1.0, 0.0, 1.0])
            .build()
            .unwrap();
        let designs = Grid::builder()
            .coords("t", vec![0.0, 1.0])
            .build()
            .unwrap();
        let params = Grid::builder()
            .coords("f", vec![0.5, 2.0])
            .scalar("a", 1.0)
            .build()
            .unwrap();
        (features, designs, params)
    }

    #[test]
    fn global_order_is_first_seen_union() {
        let (features, designs, params) = grids();
        let stack = GridStack::new(&[&features, &designs, &params]).unwrap();
        assert_eq!(stack.shape(), &[3, 2, 2, 1]);
        assert_eq!(stack.axis_offset("y").unwrap(), 0);
        assert_eq!(stack.axis_offset("t").unwrap(), 1);
        assert_eq!(stack.axis_offset("f").unwrap(), 2);
        assert_eq!(stack.axis_offset("a").unwrap(), 3);
    }

    #[test]
    fn duplicate_axis_name_is_a_collision() {
        let (features, _, _) = grids();
        let other = Grid::builder()
            .coords("y", vec![0.0, 2.0])
            .build()
            .unwrap();
        let err = GridStack::new(&[&features, &other]).unwrap_err();
        assert!(matches!(err, GridError::AxisCollision { .. }));
        // Listing the same grid twice collides on its own axis names.
        let err = GridStack::new(&[&features, &features]).unwrap_err();
        assert!(matches!(err, GridError::AxisCollision { .. }));
    }

    #[test]
    fn coord_views_broadcast_across_grids() {
        let (features, designs, params) = grids();
        let stack = GridStack::new(&[&features, &designs, &params]).unwrap();
        let y = stack.coord("y").unwrap();
        let t = stack.coord("t").unwrap();
        let f = stack.coord("f").unwrap();
        assert_eq!(y.shape(), &[3, 1, 1, 1]);
        assert_eq!(t.shape(), &[1, 2, 1, 1]);
        // A cross-grid expression lands on the full Cartesian shape.
        let mean = (&f * &t).mapv(f64::sin);
        let residual = &y - &mean;
        assert_eq!(residual.shape(), &[3, 2, 2, 1]);
        assert_relative_eq!(
            residual[[0, 1, 1, 0]],
            -1.0 - (2.0f64).sin(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn values_view_aligns_member_weights() {
        let (features, designs, mut params) = grids();
        params.weights_mut().fill(0.25);
        let stack = GridStack::new(&[&features, &designs, &params]).unwrap();
        let w = stack.values(&params).unwrap();
        assert_eq!(w.shape(), &[1, 1, 2, 1]);
        assert_relative_eq!(w[[0, 0, 1, 0]], 0.25, epsilon = 1e-12);
        // Member grids are never mutated by stacking.
        assert_eq!(params.shape(), &[2, 1]);
    }

    #[test]
    fn foreign_grid_lookup_fails() {
        let (features, designs, params) = grids();
        let stack = GridStack::new(&[&features, &designs]).unwrap();
        assert!(matches!(
            stack.values(&params).unwrap_err(),
            GridError::ForeignGrid
        ));
    }

    #[test]
    fn locate_picks_nearest_coordinates() {
        let (features, designs, params) = grids();
        let stack = GridStack::new(&[&features, &designs, &params]).unwrap();
        let loc = stack.locate(&[("y", 0.4), ("t", 10.0)]).unwrap();
        assert_eq!(loc, vec![(0, 1), (1, 1)]);
        assert!(stack.locate(&[("nope", 0.0)]).is_err());
    }
}
