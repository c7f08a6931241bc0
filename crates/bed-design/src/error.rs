// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use bed_grid::GridError;
use thiserror::Error;

/// Result alias used throughout the design crate.
pub type DesignResult<T> = Result<T, DesignError>;

/// Errors produced while configuring or running an EIG calculation.
///
/// Structural problems surface at construction time; numeric problems are
/// detected eagerly per likelihood chunk. The zero-evidence degenerate case
/// is not represented here — it is absorbed by the documented zero-sum
/// policy and only counted on the report.
#[derive(Debug, Error)]
pub enum DesignError {
    /// A grid-level failure, including axis-name collisions across the
    /// parameter/feature/design grids.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// The likelihood array does not match `[features…, designs…, parameters…]`.
    #[error("likelihood shape mismatch: expected {expected:?}, got {got:?}")]
    LikelihoodShape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// A likelihood entry was negative or non-finite. Values are rejected,
    /// never clipped.
    #[error("invalid likelihood value {value} at index {index:?}")]
    InvalidLikelihood { value: f64, index: Vec<usize> },
    /// The prior array does not match the parameter grid's shape.
    #[error("prior shape mismatch: expected {expected:?}, got {got:?}")]
    PriorShape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// A prior entry was negative or non-finite.
    #[error("invalid prior value {value} at index {index:?}")]
    InvalidPrior { value: f64, index: Vec<usize> },
    /// The prior's weighted total differs from 1 beyond tolerance.
    #[error("prior probabilities must sum to 1, got {sum}")]
    PriorNotNormalized { sum: f64 },
    /// The memory budget cannot fit even a single design slice.
    #[error("memory limit of {budget} bytes is below the {required} bytes one design slice needs")]
    MemoryBudget { budget: usize, required: usize },
    /// Posterior extraction requires every feature and design axis to be
    /// pinned to a coordinate.
    #[error("axis \"{name}\" must be pinned to a coordinate value")]
    UnpinnedAxis { name: String },
    /// A pinned name is not a feature or design axis.
    #[error("\"{name}\" is not a feature or design axis")]
    UnknownAxis { name: String },
    /// The pinned observation point carries zero evidence, so Bayes' rule
    /// is undefined there.
    #[error("posterior is undefined at a zero-evidence observation")]
    ZeroEvidence,
}
