// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Sine-wave frequency estimation: pick the observation time that best
//! discriminates between candidate frequencies under Gaussian noise.

use approx::assert_relative_eq;
use bed_design::{DesignResult, ExperimentDesigner, Likelihood};
use bed_grid::{Grid, GridStack};
use ndarray::{Array1, ArrayD, IxDyn};
use statrs::distribution::{Continuous, Normal};

const SIGMA_Y: f64 = 0.1;

fn spaces() -> (Grid, Grid, Grid) {
    let params = Grid::builder()
        .scalar("amplitude", 1.0)
        .coords("frequency", vec![0.2, 1.0, 2.0])
        .scalar("offset", 0.0)
        .build()
        .unwrap();
    let features = Grid::builder()
        .coords("y_obs", Array1::linspace(-1.25, 1.25, 50))
        .build()
        .unwrap();
    let designs = Grid::builder()
        .coords("t_obs", Array1::linspace(0.0, 5.0, 10))
        .build()
        .unwrap();
    (params, features, designs)
}

fn gaussian_likelihood() -> Likelihood {
    Likelihood::function(|stack: &GridStack<'_>| -> DesignResult<ArrayD<f64>> {
        let noise = Normal::new(0.0, SIGMA_Y).unwrap();
        let y = stack.coord("y_obs")?;
        let t = stack.coord("t_obs")?;
        let amplitude = stack.coord("amplitude")?;
        let frequency = stack.coord("frequency")?;
        let offset = stack.coord("offset")?;
        let phase = &frequency * &(&t - &offset);
        let y_mean = &amplitude * &phase.mapv(f64::sin);
        let residual = &y - &y_mean;
        Ok(residual.mapv(|r| noise.pdf(r)))
    })
}

fn uniform_prior(params: &Grid) -> ArrayD<f64> {
    let mut prior = ArrayD::from_elem(IxDyn(params.shape()), 1.0);
    params.normalize_of(&mut prior, None).unwrap();
    prior
}

#[test]
fn eig_curve_peaks_away_from_the_degenerate_origin() {
    let (params, features, designs) = spaces();
    let designer = ExperimentDesigner::new(
        &params,
        &features,
        &designs,
        gaussian_likelihood(),
        None,
    )
    .unwrap();
    let prior = uniform_prior(&params);
    let report = designer.calculate_eig(&prior).unwrap();

    assert_eq!(report.eig.shape(), &[10]);
    assert_eq!(report.plan.chunk_len, 10);
    assert!(report.eig.iter().all(|&v| v >= 0.0 && v.is_finite()));
    assert_relative_eq!(report.prior_entropy, 3.0f64.log2(), epsilon = 1e-12);
    // At t_obs = 0 every frequency predicts sin(0) = 0, so the observation
    // cannot discriminate and the gain is (numerically) nil.
    assert!(report.eig[[0]] < 1e-9);
    // Somewhere in the interior the sine curves diverge.
    assert!(report.best_eig > 0.5);
    assert!(report.best_design["t_obs"] > 0.0);
    assert_eq!(report.best_design.len(), 1);
}

#[test]
fn chunked_evaluation_matches_unchunked() {
    let (params, features, designs) = spaces();
    let prior = uniform_prior(&params);

    let full = ExperimentDesigner::new(
        &params,
        &features,
        &designs,
        gaussian_likelihood(),
        None,
    )
    .unwrap();
    let reference = full.calculate_eig(&prior).unwrap();

    // 50 features x 3 parameters = 2400 bytes per design slice; a 9600 byte
    // budget forces 4-design subgrids.
    let bounded = ExperimentDesigner::new(
        &params,
        &features,
        &designs,
        gaussian_likelihood(),
        Some(9600),
    )
    .unwrap();
    let report = bounded.calculate_eig(&prior).unwrap();

    assert_eq!(report.plan.chunk_len, 4);
    assert_eq!(report.plan.chunk_count, 3);
    for (&a, &b) in report.eig.iter().zip(reference.eig.iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-9, epsilon = 1e-12);
    }
    assert_eq!(report.best_design, reference.best_design);
}

#[test]
fn table_and_callback_likelihoods_agree() {
    let (params, features, designs) = spaces();
    let prior = uniform_prior(&params);

    // Tabulate the same likelihood by hand on the full stack.
    let noise = Normal::new(0.0, SIGMA_Y).unwrap();
    let stack = GridStack::new(&[&features, &designs, &params]).unwrap();
    let y = stack.coord("y_obs").unwrap();
    let t = stack.coord("t_obs").unwrap();
    let frequency = stack.coord("frequency").unwrap();
    let table = (&y - &(&frequency * &t).mapv(f64::sin)).mapv(|r| noise.pdf(r));

    let from_table = ExperimentDesigner::new(
        &params,
        &features,
        &designs,
        Likelihood::table(table),
        None,
    )
    .unwrap();
    let from_callback = ExperimentDesigner::new(
        &params,
        &features,
        &designs,
        gaussian_likelihood(),
        None,
    )
    .unwrap();

    let a = from_table.calculate_eig(&prior).unwrap();
    let b = from_callback.calculate_eig(&prior).unwrap();
    for (&x, &y) in a.eig.iter().zip(b.eig.iter()) {
        assert_relative_eq!(x, y, max_relative = 1e-12, epsilon = 1e-12);
    }
}

#[test]
fn marginal_eig_brackets_the_joint_curve() {
    let (params, features, designs) = spaces();
    let prior = uniform_prior(&params);
    let designer = ExperimentDesigner::new(
        &params,
        &features,
        &designs,
        gaussian_likelihood(),
        Some(9600),
    )
    .unwrap();
    let joint = designer.calculate_eig(&prior).unwrap();

    // Marginalizing over a singleton nuisance axis changes nothing.
    let over_amplitude = designer
        .calculate_marginal_eig(&prior, &["amplitude"])
        .unwrap();
    for (&m, &j) in over_amplitude.iter().zip(joint.eig.iter()) {
        assert_relative_eq!(m, j, max_relative = 1e-9, epsilon = 1e-12);
    }

    // Marginalizing over the only informative axis leaves nothing to learn.
    let over_frequency = designer
        .calculate_marginal_eig(&prior, &["frequency"])
        .unwrap();
    for &m in over_frequency.iter() {
        assert!(m.abs() < 1e-9);
    }
}

#[test]
fn sequential_update_sharpens_the_posterior() {
    let (params, features, designs) = spaces();
    let prior = uniform_prior(&params);
    let designer = ExperimentDesigner::new(
        &params,
        &features,
        &designs,
        gaussian_likelihood(),
        None,
    )
    .unwrap();
    let first = designer.calculate_eig(&prior).unwrap();

    // Pretend we measured y = 0.9 at the recommended time.
    let t_best = first.best_design["t_obs"];
    let (posterior, second) = designer
        .update(&prior, &[("y_obs", 0.9), ("t_obs", t_best)])
        .unwrap();

    assert_relative_eq!(posterior.sum(), 1.0, epsilon = 1e-9);
    assert!(posterior.iter().all(|&p| p.is_finite() && p >= 0.0));
    // The updated prior is sharper than uniform, so less entropy remains.
    assert!(second.prior_entropy < first.prior_entropy);
    assert!(second.eig.iter().all(|&v| v >= 0.0));
}
