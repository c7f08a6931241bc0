// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Expected information gain over discretized experiment spaces.
//!
//! [`ExperimentDesigner`] scores every candidate design by how much an
//! observation made under it is expected to sharpen the parameter
//! posterior. For a normalized prior `P` and likelihood `L(f, p, d)`:
//!
//! 1. evidence `Z(f,d) = Σ_p P(p) L(f,p,d)`,
//! 2. posterior `Π(p|f,d) = P(p) L(f,p,d) / Z(f,d)` where `Z > 0`,
//! 3. posterior entropy `H(f,d) = -Σ_p Π log2 Π`,
//! 4. marginal `M(f,d) = Z(f,d) / Σ_f Z(f,d)`,
//! 5. `EIG(d) = H0 - Σ_f M(f,d) H(f,d)` with prior entropy
//!    `H0 = -Σ_p P log2 P`.
//!
//! `(f,d)` cells with zero evidence carry zero marginal mass and are
//! excluded from the expectation, so an un-normalizable posterior never
//! contaminates the sums; `0·log2 0` terms are likewise pinned to zero.
//!
//! The full tensor may exceed memory for fine discretizations, so the
//! evaluation walks contiguous subgrids of the first design axis (see
//! [`SubgridPlan`]); every subgrid spans the complete feature and parameter
//! ranges, which keeps chunked results identical to the unchunked ones up
//! to floating-point summation order. Subgrids are independent and are
//! evaluated in parallel, merged back in design order.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use bed_grid::{Grid, GridError, GridStack};
use ndarray::{s, Array1, Array2, ArrayD, Axis as NdAxis, Dimension, IxDyn, Slice, Zip};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::chunk::SubgridPlan;
use crate::error::{DesignError, DesignResult};

const PRIOR_TOLERANCE: f64 = 1e-6;

fn plogp(x: f64) -> f64 {
    if x > 0.0 {
        x * x.log2()
    } else {
        0.0
    }
}

fn flat_index(shape: &[usize], index: &[usize]) -> usize {
    index
        .iter()
        .zip(shape)
        .fold(0, |acc, (&i, &len)| acc * len + i)
}

fn weight_row(grid: &Grid) -> Array1<f64> {
    match grid.point_weights() {
        Some(w) => Array1::from_iter(w.iter().copied()),
        None => Array1::ones(grid.len()),
    }
}

fn find_invalid(values: &ArrayD<f64>) -> Option<(f64, Vec<usize>)> {
    values
        .indexed_iter()
        .find(|(_, &v)| !v.is_finite() || v < 0.0)
        .map(|(idx, &v)| (v, idx.slice().to_vec()))
}

/// The likelihood source: a dense table over the full
/// `[features…, designs…, parameters…]` layout, or a callback evaluated per
/// design-axis subgrid.
pub enum Likelihood {
    Table(ArrayD<f64>),
    Function(Box<dyn Fn(&GridStack<'_>) -> DesignResult<ArrayD<f64>> + Send + Sync>),
}

impl Likelihood {
    pub fn table(values: ArrayD<f64>) -> Self {
        Likelihood::Table(values)
    }

    /// Wrap a callback that tabulates the likelihood on a stack over
    /// (features, design subgrid, parameters). The callback must return an
    /// array at the stack's full shape.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&GridStack<'_>) -> DesignResult<ArrayD<f64>> + Send + Sync + 'static,
    {
        Likelihood::Function(Box::new(f))
    }
}

impl fmt::Debug for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Likelihood::Table(values) => {
                f.debug_tuple("Table").field(&values.shape()).finish()
            }
            Likelihood::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Everything `calculate_eig` produces beyond the raw curve: the optimum,
/// the entropy baseline, the chunk layout used, and how many degenerate
/// zero-evidence slices the zero-sum policy absorbed.
#[derive(Clone, Debug, Serialize)]
pub struct EigReport {
    /// Expected information gain in bits, indexed by design coordinates.
    pub eig: ArrayD<f64>,
    /// Design coordinate values at the EIG maximum (first occurrence wins
    /// on ties).
    pub best_design: BTreeMap<String, f64>,
    /// The EIG value at that maximum.
    pub best_eig: f64,
    /// Prior entropy `H0` in bits.
    pub prior_entropy: f64,
    /// The subgrid layout the evaluation ran with.
    pub plan: SubgridPlan,
    /// `(feature, design)` cells whose evidence summed to zero.
    pub zero_evidence_cells: usize,
    /// Designs whose evidence was zero for every feature; their EIG is 0.
    pub zero_evidence_designs: usize,
}

struct ChunkEig {
    eig: Vec<f64>,
    zero_cells: usize,
    zero_designs: usize,
}

/// Brute-force EIG evaluation over parameter, feature, and design grids.
///
/// The designer owns no grid data; it borrows the three grids and either a
/// likelihood table or a per-chunk likelihood callback. Axis names must be
/// unique across all three grids.
#[derive(Debug)]
pub struct ExperimentDesigner<'a> {
    parameters: &'a Grid,
    features: &'a Grid,
    designs: &'a Grid,
    likelihood: Likelihood,
    plan: SubgridPlan,
    nf: usize,
    np: usize,
    nd_rest: usize,
    d0_len: usize,
}

impl<'a> ExperimentDesigner<'a> {
    /// Validate the configuration and plan the design-axis subgrids.
    ///
    /// `memory_limit` bounds the evaluator's working set in bytes; `None`
    /// evaluates the whole design axis in one chunk. A table likelihood is
    /// shape-checked and value-checked here, a callback per chunk later.
    pub fn new(
        parameters: &'a Grid,
        features: &'a Grid,
        designs: &'a Grid,
        likelihood: Likelihood,
        memory_limit: Option<usize>,
    ) -> DesignResult<Self> {
        GridStack::new(&[features, designs, parameters])?;
        let nf = features.len();
        let np = parameters.len();
        let d0_len = designs.shape()[0];
        let nd_rest: usize = designs.shape()[1..].iter().product();
        if let Likelihood::Table(values) = &likelihood {
            let expected: Vec<usize> = features
                .shape()
                .iter()
                .chain(designs.shape())
                .chain(parameters.shape())
                .copied()
                .collect();
            if values.shape() != expected.as_slice() {
                return Err(DesignError::LikelihoodShape {
                    expected,
                    got: values.shape().to_vec(),
                });
            }
            if let Some((value, index)) = find_invalid(values) {
                return Err(DesignError::InvalidLikelihood { value, index });
            }
        }
        let plan = SubgridPlan::new(nf * nd_rest * np, d0_len, memory_limit)?;
        debug!(
            chunk_len = plan.chunk_len,
            chunk_count = plan.chunk_count,
            working_set_bytes = plan.working_set_bytes,
            "planned design-axis subgrids"
        );
        Ok(Self {
            parameters,
            features,
            designs,
            likelihood,
            plan,
            nf,
            np,
            nd_rest,
            d0_len,
        })
    }

    pub fn plan(&self) -> SubgridPlan {
        self.plan
    }

    fn check_prior(&self, prior: &ArrayD<f64>) -> DesignResult<()> {
        if prior.shape() != self.parameters.shape() {
            return Err(DesignError::PriorShape {
                expected: self.parameters.shape().to_vec(),
                got: prior.shape().to_vec(),
            });
        }
        if let Some((value, index)) = find_invalid(prior) {
            return Err(DesignError::InvalidPrior { value, index });
        }
        Ok(())
    }

    /// The likelihood values for one subgrid of the first design axis, at
    /// the chunk's `[features…, subgrid designs…, parameters…]` shape.
    fn chunk_likelihood(&self, range: Range<usize>) -> DesignResult<ArrayD<f64>> {
        match &self.likelihood {
            Likelihood::Table(values) => {
                let axis = NdAxis(self.features.ndim());
                Ok(values
                    .slice_axis(axis, Slice::from(range))
                    .to_owned())
            }
            Likelihood::Function(f) => {
                let first = self.designs.axes()[0].name().to_string();
                let sub = self.designs.subgrid(&first, range.clone())?;
                let stack = GridStack::new(&[self.features, &sub, self.parameters])?;
                let mut values = f(&stack)?;
                if values.shape() != stack.shape() {
                    return Err(DesignError::LikelihoodShape {
                        expected: stack.shape().to_vec(),
                        got: values.shape().to_vec(),
                    });
                }
                if let Some((value, mut index)) = find_invalid(&values) {
                    index[self.features.ndim()] += range.start;
                    return Err(DesignError::InvalidLikelihood { value, index });
                }
                if !values.is_standard_layout() {
                    values = values.as_standard_layout().to_owned();
                }
                Ok(values)
            }
        }
    }

    fn eig_chunk(
        &self,
        range: Range<usize>,
        prior: &Array1<f64>,
        wp: &Array1<f64>,
        wf: &Array1<f64>,
        h0: f64,
    ) -> DesignResult<ChunkEig> {
        let dc = range.len() * self.nd_rest;
        let chunk = self.chunk_likelihood(range)?;
        let got = chunk.shape().to_vec();
        let lik = chunk
            .into_shape((self.nf, dc, self.np))
            .map_err(|_| GridError::ShapeMismatch {
                expected: vec![self.nf, dc, self.np],
                got,
            })?;
        let mut z = Array2::<f64>::zeros((self.nf, dc));
        let mut ent = Array2::<f64>::zeros((self.nf, dc));
        let mut zero_cells = 0usize;
        Zip::from(lik.lanes(NdAxis(2)))
            .and(&mut z)
            .and(&mut ent)
            .for_each(|lane, zv, ev| {
                let mut evidence = 0.0;
                for ((&l, &p), &w) in lane.iter().zip(prior).zip(wp) {
                    evidence += w * p * l;
                }
                if evidence > 0.0 {
                    // ev accumulates Σ_p w·Π·log2 Π, i.e. -H(f,d).
                    let mut acc = 0.0;
                    for ((&l, &p), &w) in lane.iter().zip(prior).zip(wp) {
                        let post = p * l / evidence;
                        if post > 0.0 {
                            acc += w * post * post.log2();
                        }
                    }
                    *zv = evidence;
                    *ev = acc;
                } else {
                    zero_cells += 1;
                }
            });
        let mut eig = vec![0.0; dc];
        let mut zero_designs = 0usize;
        for d in 0..dc {
            let mut zsum = 0.0;
            for f in 0..self.nf {
                zsum += wf[f] * z[[f, d]];
            }
            if zsum > 0.0 {
                let mut acc = 0.0;
                for f in 0..self.nf {
                    let m = wf[f] * z[[f, d]] / zsum;
                    if m > 0.0 {
                        acc += m * (h0 + ent[[f, d]]);
                    }
                }
                // EIG is a mutual information; summation order can leave the
                // true zero an epsilon below it.
                eig[d] = acc.max(0.0);
            } else {
                zero_designs += 1;
            }
        }
        Ok(ChunkEig {
            eig,
            zero_cells,
            zero_designs,
        })
    }

    /// Expected information gain for every design, given a prior normalized
    /// over the parameter grid.
    pub fn calculate_eig(&self, prior: &ArrayD<f64>) -> DesignResult<EigReport> {
        self.check_prior(prior)?;
        let prior_flat = Array1::from_iter(prior.iter().copied());
        let wp = weight_row(self.parameters);
        let wf = weight_row(self.features);
        let total: f64 = prior_flat.iter().zip(&wp).map(|(&p, &w)| w * p).sum();
        if (total - 1.0).abs() > PRIOR_TOLERANCE {
            return Err(DesignError::PriorNotNormalized { sum: total });
        }
        let h0 = -prior_flat
            .iter()
            .zip(&wp)
            .map(|(&p, &w)| w * plogp(p))
            .sum::<f64>();
        let chunks: Vec<ChunkEig> = self
            .plan
            .ranges(self.d0_len)
            .into_par_iter()
            .map(|range| self.eig_chunk(range, &prior_flat, &wp, &wf, h0))
            .collect::<DesignResult<_>>()?;
        let mut eig_flat = Vec::with_capacity(self.d0_len * self.nd_rest);
        let mut zero_evidence_cells = 0;
        let mut zero_evidence_designs = 0;
        for chunk in chunks {
            eig_flat.extend(chunk.eig);
            zero_evidence_cells += chunk.zero_cells;
            zero_evidence_designs += chunk.zero_designs;
        }
        if zero_evidence_cells > 0 {
            warn!(
                zero_evidence_cells,
                zero_evidence_designs, "absorbed zero-evidence slices as zero contribution"
            );
        }
        let eig = ArrayD::from_shape_vec(IxDyn(self.designs.shape()), eig_flat).map_err(|_| {
            GridError::ShapeMismatch {
                expected: self.designs.shape().to_vec(),
                got: vec![self.d0_len * self.nd_rest],
            }
        })?;
        let (best_design, best_eig) = self.designs.argmax_of(eig.view()).map_err(DesignError::Grid)?;
        Ok(EigReport {
            eig,
            best_design,
            best_eig,
            prior_entropy: h0,
            plan: self.plan,
            zero_evidence_cells,
            zero_evidence_designs,
        })
    }

    fn marginal_chunk(
        &self,
        range: Range<usize>,
        prior: &ArrayD<f64>,
        nuisance: &[usize],
        wf: &Array1<f64>,
        h0m: f64,
    ) -> DesignResult<Vec<f64>> {
        let dc = range.len() * self.nd_rest;
        let chunk = self.chunk_likelihood(range)?;
        let fd_ndim = self.features.ndim() + self.designs.ndim();
        let p_ndim = self.parameters.ndim();
        // Joint mass P(p)·L; the prior broadcasts over the trailing
        // parameter axes.
        let buf = &chunk * prior;
        let mut z = buf.sum_axis(NdAxis(fd_ndim + p_ndim - 1));
        for ax in (fd_ndim..fd_ndim + p_ndim - 1).rev() {
            z = z.sum_axis(NdAxis(ax));
        }
        let mut order: Vec<usize> = nuisance.iter().map(|&i| fd_ndim + i).collect();
        order.sort_unstable_by(|a, b| b.cmp(a));
        let mut marg = buf;
        for ax in order {
            marg = marg.sum_axis(NdAxis(ax));
        }
        let kept = p_ndim - nuisance.len();
        let mut zb = z.view();
        for _ in 0..kept {
            let at = zb.ndim();
            zb = zb.insert_axis(NdAxis(at));
        }
        marg.zip_mut_with(&zb, |m, &zv| {
            *m = if zv > 0.0 { plogp(*m / zv) } else { 0.0 };
        });
        let mut ent = marg;
        for ax in (fd_ndim..fd_ndim + kept).rev() {
            ent = ent.sum_axis(NdAxis(ax));
        }
        let z_got = z.shape().to_vec();
        let z2 = z
            .into_shape((self.nf, dc))
            .map_err(|_| GridError::ShapeMismatch {
                expected: vec![self.nf, dc],
                got: z_got,
            })?;
        let ent_got = ent.shape().to_vec();
        let ent2 = ent
            .into_shape((self.nf, dc))
            .map_err(|_| GridError::ShapeMismatch {
                expected: vec![self.nf, dc],
                got: ent_got,
            })?;
        let mut eig = vec![0.0; dc];
        for d in 0..dc {
            let mut zsum = 0.0;
            for f in 0..self.nf {
                zsum += wf[f] * z2[[f, d]];
            }
            if zsum > 0.0 {
                let mut acc = 0.0;
                for f in 0..self.nf {
                    let m = wf[f] * z2[[f, d]] / zsum;
                    if m > 0.0 {
                        acc += m * (h0m + ent2[[f, d]]);
                    }
                }
                eig[d] = acc.max(0.0);
            }
        }
        Ok(eig)
    }

    /// EIG computed from the posterior marginalized over the named nuisance
    /// parameter axes: the information the experiment carries about the
    /// remaining parameters alone.
    ///
    /// Only defined for unconstrained, unweighted parameter grids.
    pub fn calculate_marginal_eig(
        &self,
        prior: &ArrayD<f64>,
        nuisance: &[&str],
    ) -> DesignResult<ArrayD<f64>> {
        if self.parameters.point_weights().is_some() {
            return Err(GridError::ConstrainedPartialSum.into());
        }
        self.check_prior(prior)?;
        let total: f64 = prior.iter().sum();
        if (total - 1.0).abs() > PRIOR_TOLERANCE {
            return Err(DesignError::PriorNotNormalized { sum: total });
        }
        let nuisance_idx: Vec<usize> = nuisance
            .iter()
            .map(|name| self.parameters.axis_index(name))
            .collect::<Result<_, _>>()?;
        let wf = weight_row(self.features);
        let mut pm = prior.clone();
        let mut order = nuisance_idx.clone();
        order.sort_unstable_by(|a, b| b.cmp(a));
        for ax in order {
            pm = pm.sum_axis(NdAxis(ax));
        }
        let h0m = -pm.iter().map(|&p| plogp(p)).sum::<f64>();
        let chunks: Vec<Vec<f64>> = self
            .plan
            .ranges(self.d0_len)
            .into_par_iter()
            .map(|range| self.marginal_chunk(range, prior, &nuisance_idx, &wf, h0m))
            .collect::<DesignResult<_>>()?;
        let eig_flat: Vec<f64> = chunks.into_iter().flatten().collect();
        ArrayD::from_shape_vec(IxDyn(self.designs.shape()), eig_flat).map_err(|_| {
            GridError::ShapeMismatch {
                expected: self.designs.shape().to_vec(),
                got: vec![self.d0_len * self.nd_rest],
            }
            .into()
        })
    }

    /// The parameter posterior at an observed outcome: every feature and
    /// design axis pinned to the coordinate nearest the given value.
    ///
    /// The prior need not be normalized — the evidence term rescales it —
    /// but a zero-evidence observation point is an error.
    pub fn posterior(
        &self,
        prior: &ArrayD<f64>,
        observed: &[(&str, f64)],
    ) -> DesignResult<ArrayD<f64>> {
        self.check_prior(prior)?;
        let mut f_pins: Vec<Option<usize>> = vec![None; self.features.ndim()];
        let mut d_pins: Vec<Option<usize>> = vec![None; self.designs.ndim()];
        for &(name, value) in observed {
            if let Ok(i) = self.features.axis_index(name) {
                f_pins[i] = Some(self.features.axes()[i].nearest(value));
            } else if let Ok(i) = self.designs.axis_index(name) {
                d_pins[i] = Some(self.designs.axes()[i].nearest(value));
            } else {
                return Err(DesignError::UnknownAxis {
                    name: name.to_string(),
                });
            }
        }
        let f_idx = Self::require_pins(f_pins, self.features)?;
        let d_idx = Self::require_pins(d_pins, self.designs)?;
        let start = (d_idx[0] / self.plan.chunk_len) * self.plan.chunk_len;
        let end = (start + self.plan.chunk_len).min(self.d0_len);
        let dc = (end - start) * self.nd_rest;
        let chunk = self.chunk_likelihood(start..end)?;
        let got = chunk.shape().to_vec();
        let lik = chunk
            .into_shape((self.nf, dc, self.np))
            .map_err(|_| GridError::ShapeMismatch {
                expected: vec![self.nf, dc, self.np],
                got,
            })?;
        let fi = flat_index(self.features.shape(), &f_idx);
        let mut local = d_idx;
        local[0] -= start;
        let mut chunk_d_shape = self.designs.shape().to_vec();
        chunk_d_shape[0] = end - start;
        let di = flat_index(&chunk_d_shape, &local);
        let lane = lik.slice(s![fi, di, ..]);
        let prior_flat = Array1::from_iter(prior.iter().copied());
        let wp = weight_row(self.parameters);
        let mut evidence = 0.0;
        for ((&l, &p), &w) in lane.iter().zip(&prior_flat).zip(&wp) {
            evidence += w * p * l;
        }
        if evidence <= 0.0 {
            return Err(DesignError::ZeroEvidence);
        }
        let post: Vec<f64> = lane
            .iter()
            .zip(&prior_flat)
            .map(|(&l, &p)| p * l / evidence)
            .collect();
        ArrayD::from_shape_vec(IxDyn(self.parameters.shape()), post).map_err(|_| {
            GridError::ShapeMismatch {
                expected: self.parameters.shape().to_vec(),
                got: vec![self.np],
            }
            .into()
        })
    }

    /// One sequential-design step: fold an observed outcome into the prior
    /// and re-score every design under the updated posterior.
    pub fn update(
        &self,
        prior: &ArrayD<f64>,
        observed: &[(&str, f64)],
    ) -> DesignResult<(ArrayD<f64>, EigReport)> {
        let post = self.posterior(prior, observed)?;
        let report = self.calculate_eig(&post)?;
        Ok((post, report))
    }

    fn require_pins(pins: Vec<Option<usize>>, grid: &Grid) -> DesignResult<Vec<usize>> {
        pins.into_iter()
            .enumerate()
            .map(|(i, pin)| {
                pin.ok_or_else(|| DesignError::UnpinnedAxis {
                    name: grid.axes()[i].name().to_string(),
                })
            })
            .collect()
    }
}

impl fmt::Display for ExperimentDesigner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GRID  parameters {}", self.parameters)?;
        writeln!(f, "GRID  features   {}", self.features)?;
        writeln!(f, "GRID  designs    {}", self.designs)?;
        let source = match &self.likelihood {
            Likelihood::Table(_) => "table",
            Likelihood::Function(_) => "callable",
        };
        writeln!(
            f,
            "LIKELIHOOD {source} [{} x {} x {}]",
            self.nf,
            self.d0_len * self.nd_rest,
            self.np
        )?;
        write!(
            f,
            "PLAN  {} chunk(s) of {} design value(s), {} byte working set",
            self.plan.chunk_count, self.plan.chunk_len, self.plan.working_set_bytes
        )
    }
}
