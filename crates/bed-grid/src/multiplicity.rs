// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Combinatorial multiplicity weights for permutation-invariant axes.

use ndarray::{ArrayD, Dimension, IxDyn};

use crate::axis::Axis;
use crate::error::{GridError, GridResult};

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Multiplicity weights imposing permutation invariance on a set of axes
/// that represent an unordered selection.
///
/// All axes must carry identical coordinate values. The returned array is
/// shaped `[n; k]` for `k` axes of `n` values each: non-canonical orderings
/// (any index descending) get weight 0, and each canonical (non-decreasing)
/// ordering gets `k! / ∏ r_i!` where `r_i` are the lengths of runs of equal
/// indices — so a sum over the full grid counts every unordered combination
/// exactly once, scaled by the number of orderings that collapse onto it.
pub fn permutation_invariant(axes: &[&Axis]) -> GridResult<ArrayD<f64>> {
    let first = axes.first().ok_or(GridError::NoAxes)?;
    for axis in &axes[1..] {
        if axis.values() != first.values() {
            return Err(GridError::NonIdenticalAxes);
        }
    }
    let k = axes.len();
    let n = first.len();
    let kfact = factorial(k);
    let shape: Vec<usize> = vec![n; k];
    let mut out = ArrayD::zeros(IxDyn(&shape));
    for (idx, w) in out.indexed_iter_mut() {
        let idx = idx.slice();
        let mut run = 1usize;
        let mut denom = 1.0f64;
        let mut canonical = true;
        for i in 1..k {
            if idx[i] < idx[i - 1] {
                canonical = false;
                break;
            } else if idx[i] == idx[i - 1] {
                run += 1;
                denom *= run as f64;
            } else {
                run = 1;
            }
        }
        if canonical {
            *w = kfact / denom;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pair_weights_count_unordered_selections() {
        let a = Axis::new("a", vec![0.0, 1.0, 2.0]).unwrap();
        let b = Axis::new("b", vec![0.0, 1.0, 2.0]).unwrap();
        let w = permutation_invariant(&[&a, &b]).unwrap();
        assert_eq!(w.shape(), &[3, 3]);
        // Diagonal picks the same value twice: one ordering.
        assert_relative_eq!(w[[1, 1]], 1.0);
        // Canonical off-diagonal stands in for both orderings.
        assert_relative_eq!(w[[0, 2]], 2.0);
        assert_relative_eq!(w[[2, 0]], 0.0);
        // Total mass equals the full ordered grid.
        assert_relative_eq!(w.sum(), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn triple_weights_handle_partial_runs() {
        let vals = vec![0.0, 1.0];
        let a = Axis::new("a", vals.clone()).unwrap();
        let b = Axis::new("b", vals.clone()).unwrap();
        let c = Axis::new("c", vals).unwrap();
        let w = permutation_invariant(&[&a, &b, &c]).unwrap();
        // (0,0,1): three orderings collapse here, 3!/2! = 3.
        assert_relative_eq!(w[[0, 0, 1]], 3.0);
        assert_relative_eq!(w[[0, 0, 0]], 1.0);
        assert_relative_eq!(w.sum(), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_axes_rejected() {
        let a = Axis::new("a", vec![0.0, 1.0]).unwrap();
        let b = Axis::new("b", vec![0.0, 2.0]).unwrap();
        assert!(matches!(
            permutation_invariant(&[&a, &b]).unwrap_err(),
            GridError::NonIdenticalAxes
        ));
    }
}
