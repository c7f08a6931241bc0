// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Named coordinate axes backing the grid types.

use ndarray::Array1;

use crate::error::{GridError, GridResult};

/// An immutable named dimension with an ordered set of coordinate values.
#[derive(Clone, Debug, PartialEq)]
pub struct Axis {
    name: String,
    values: Array1<f64>,
}

impl Axis {
    /// Construct an axis from a name and an ordered coordinate sequence.
    pub fn new<S, I>(name: S, values: I) -> GridResult<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = f64>,
    {
        let name = name.into();
        let values = Array1::from_iter(values);
        if values.is_empty() {
            return Err(GridError::EmptyAxis { name });
        }
        Ok(Self { name, values })
    }

    /// Construct a size-1 axis from a scalar binding.
    pub fn scalar<S: Into<String>>(name: S, value: f64) -> Self {
        Self {
            name: name.into(),
            values: Array1::from_elem(1, value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Coordinate values along the axis.
    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// The (min, max) extent of the coordinate values. Useful to set plot
    /// axis limits.
    pub fn extent(&self) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &v in self.values.iter() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        (lo, hi)
    }

    /// Index of the coordinate closest to `x`. Ties resolve to the earlier
    /// index.
    pub fn nearest(&self, x: f64) -> usize {
        let mut best = 0usize;
        let mut best_delta = f64::INFINITY;
        for (i, &v) in self.values.iter().enumerate() {
            let delta = (x - v).abs();
            if delta < best_delta {
                best_delta = delta;
                best = i;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_prefers_earlier_index_on_ties() {
        let axis = Axis::new("t", vec![0.0, 1.0, 2.0]).unwrap();
        assert_eq!(axis.nearest(0.5), 0);
        assert_eq!(axis.nearest(1.6), 2);
        assert_eq!(axis.nearest(-3.0), 0);
    }

    #[test]
    fn empty_axis_rejected() {
        let err = Axis::new("t", Vec::new()).unwrap_err();
        assert!(matches!(err, GridError::EmptyAxis { .. }));
    }

    #[test]
    fn scalar_axis_has_unit_length() {
        let axis = Axis::scalar("amplitude", 1.0);
        assert_eq!(axis.len(), 1);
        assert_eq!(axis.extent(), (1.0, 1.0));
    }
}
