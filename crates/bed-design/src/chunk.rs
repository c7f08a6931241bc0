// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Memory-bounded partitioning of the design axis into subgrids.

use std::mem;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{DesignError, DesignResult};

/// Number of chunk-shaped `f64` buffers the evaluator holds at once: the
/// likelihood chunk itself plus one scratch array.
const CHUNK_BUFFERS: usize = 2;

/// The chunk layout used to keep the `[features × designs × parameters]`
/// working set under a memory budget.
///
/// Only the first design axis is partitioned. Every chunk spans the complete
/// feature and parameter ranges, so no parameter reduction is ever split
/// across chunks and chunked evaluation matches the unchunked result up to
/// floating-point summation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgridPlan {
    /// Subgrid length along the first design axis.
    pub chunk_len: usize,
    /// Number of subgrids covering the axis.
    pub chunk_count: usize,
    /// Bytes held live while one subgrid is evaluated.
    pub working_set_bytes: usize,
}

impl SubgridPlan {
    /// Plan subgrids for an axis of `axis_len` design values where each
    /// design value accounts for `slice_elems` likelihood elements.
    pub(crate) fn new(
        slice_elems: usize,
        axis_len: usize,
        memory_limit: Option<usize>,
    ) -> DesignResult<Self> {
        let per_slice = CHUNK_BUFFERS * mem::size_of::<f64>() * slice_elems;
        let chunk_len = match memory_limit {
            None => axis_len,
            Some(budget) => {
                let fit = budget / per_slice;
                if fit == 0 {
                    return Err(DesignError::MemoryBudget {
                        budget,
                        required: per_slice,
                    });
                }
                fit.min(axis_len)
            }
        };
        Ok(Self {
            chunk_len,
            chunk_count: axis_len.div_ceil(chunk_len),
            working_set_bytes: per_slice * chunk_len,
        })
    }

    /// The contiguous index ranges covering an axis of `axis_len` values.
    pub fn ranges(&self, axis_len: usize) -> Vec<Range<usize>> {
        (0..self.chunk_count)
            .map(|i| {
                let start = i * self.chunk_len;
                start..(start + self.chunk_len).min(axis_len)
            })
            .collect()
    }
}
