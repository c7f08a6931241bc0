// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Expected-information-gain evaluation for Bayesian optimal experiment
//! design.
//!
//! Built on [`bed_grid`]: callers discretize the parameter, feature, and
//! design spaces as grids, supply a likelihood (dense table or per-chunk
//! callback), and [`ExperimentDesigner`] scores every candidate design by
//! the expected reduction in parameter entropy. A memory budget bounds the
//! working set by partitioning the design axis into subgrids.

pub mod chunk;
pub mod designer;
pub mod error;

pub use chunk::SubgridPlan;
pub use designer::{EigReport, ExperimentDesigner, Likelihood};
pub use error::{DesignError, DesignResult};
