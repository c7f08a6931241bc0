// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Named-axis weight grids for Bayesian experiment design.
//!
//! The crate provides three layers:
//!
//! 1. [`Axis`] — an immutable name plus ordered coordinate values.
//! 2. [`Grid`] — a dense `f64` array over one or more axes, with optional
//!    exclusion constraints and combinatorial multiplicity weights folded
//!    into its sums and normalization.
//! 3. [`GridStack`] — a scoped alignment that lets elementwise expressions
//!    broadcast across grids defined over disjoint axis sets.
//!
//! Everything is plain in-memory `f64` on top of [`ndarray`]; there is no
//! sparse storage and no device backend.

pub mod axis;
pub mod error;
pub mod grid;
pub mod multiplicity;
pub mod stack;

pub use axis::Axis;
pub use error::{GridError, GridResult};
pub use grid::{Grid, GridBuilder};
pub use multiplicity::permutation_invariant;
pub use stack::GridStack;
