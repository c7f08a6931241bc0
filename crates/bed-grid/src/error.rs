// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use thiserror::Error;

/// Result alias used throughout the grid crate.
pub type GridResult<T> = Result<T, GridError>;

/// Errors produced while constructing or reducing grids.
#[derive(Debug, Error)]
pub enum GridError {
    /// An axis binding supplied no coordinate values.
    #[error("axis \"{name}\" has no coordinate values")]
    EmptyAxis { name: String },
    /// A grid must own at least one axis.
    #[error("a grid requires at least one axis")]
    NoAxes,
    /// The same axis name was bound twice, either within one grid or across
    /// the grids of a stack.
    #[error("axis name \"{name}\" is already bound")]
    AxisCollision { name: String },
    /// An operation referenced an axis name the grid does not own.
    #[error("\"{name}\" is not an axis of this grid")]
    UnknownAxis { name: String },
    /// An array does not match the shape declared by the grid's axes.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// A multiplicity weight was negative or non-finite.
    #[error("multiplicity weights must be finite and non-negative, got {value}")]
    InvalidWeight { value: f64 },
    /// An array could not be broadcast to the requested shape.
    #[error("cannot broadcast shape {from:?} to {to:?}")]
    NotBroadcastable { from: Vec<usize>, to: Vec<usize> },
    /// Permutation invariance requires every participating axis to carry the
    /// same coordinate values.
    #[error("permutation invariance requires identical axes")]
    NonIdenticalAxes,
    /// Partial-axis sums are not defined for grids carrying a constraint or
    /// multiplicity weights.
    #[error("sum over a subset of axes is unsupported on a constrained grid")]
    ConstrainedPartialSum,
    /// A stack lookup was made with a grid that is not a member of the stack.
    #[error("grid is not a member of this stack")]
    ForeignGrid,
}
