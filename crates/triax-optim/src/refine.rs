//! Non-linear refinement of calibration parameters.

use crate::backend::LmBackend;
use crate::problems::CalibrationProblem;
use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use triax_core::{CalibrationParams, MeasurementModel, ParamMask, Real};

/// Errors reported by [`refine`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefineError {
    #[error("need at least {needed} measurements to refine, got {got}")]
    NotEnoughMeasurements { needed: usize, got: usize },
    #[error("refinement did not converge after {iterations} evaluations")]
    NotConverged { iterations: usize },
    #[error("refinement produced non-finite values")]
    NonFinite,
}

struct FitStatistics {
    mse: Real,
    chi_sq: Real,
}

fn statistics<P: NllsProblem>(problem: &P, x: &DVector<Real>) -> FitStatistics {
    let r = problem.residuals_unweighted(x);
    let mse = if r.is_empty() {
        0.0
    } else {
        r.norm_squared() / r.len() as Real
    };
    FitStatistics {
        mse,
        chi_sq: problem.residuals(x).norm_squared(),
    }
}

/// Output of [`refine`] or [`linearize`].
#[derive(Debug, Clone)]
pub struct Refinement {
    pub params: CalibrationParams,
    /// Mean of the squared unwhitened residual components.
    pub mse: Real,
    /// Sum of the squared whitened residual components.
    pub chi_sq: Real,
    /// Whitened residual Jacobian over the free parameters at the solution.
    pub jacobian: DMatrix<Real>,
    /// Residual rows minus free parameters.
    pub dof: usize,
    /// Parameters that were held fixed.
    pub mask: ParamMask,
    /// `true` if every measurement carried a standard deviation.
    pub fully_weighted: bool,
    pub report: SolveReport,
}

/// Refine `initial` over `measurements` with Levenberg–Marquardt.
///
/// The parameters fixed by [`MeasurementModel::param_mask`] for
/// `common_axis` are excluded from the optimisation and keep the values of
/// `initial`. A solve that increases the
/// cost, or fails without improving it, is reported as
/// [`RefineError::NotConverged`].
pub fn refine<M: MeasurementModel>(
    model: &M,
    measurements: &[M::Measurement],
    initial: &CalibrationParams,
    common_axis: bool,
    opts: &SolveOptions,
) -> Result<Refinement, RefineError> {
    let mask = model.param_mask(common_axis);
    let num_free = mask.num_free();
    let needed = num_free.div_ceil(M::RESIDUAL_DIM);
    if measurements.len() < needed {
        return Err(RefineError::NotEnoughMeasurements {
            needed,
            got: measurements.len(),
        });
    }
    if !initial.is_finite() {
        return Err(RefineError::NonFinite);
    }

    let problem = CalibrationProblem::new(model, measurements, *initial, mask);
    let x0 = problem.initial_vector();
    let initial_cost = 0.5 * problem.residuals(&x0).norm_squared();

    let (x, report) = LmBackend.solve(&problem, x0, opts);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(RefineError::NonFinite);
    }
    let stats = statistics(&problem, &x);
    let final_cost = 0.5 * stats.chi_sq;
    if !final_cost.is_finite() {
        return Err(RefineError::NonFinite);
    }
    if final_cost > initial_cost || (!report.converged && final_cost >= initial_cost) {
        warn!(
            "refinement rejected: cost {:.6e} -> {:.6e} ({} evaluations)",
            initial_cost, final_cost, report.iterations
        );
        return Err(RefineError::NotConverged {
            iterations: report.iterations,
        });
    }
    if !report.converged {
        warn!(
            "refinement stopped without convergence, keeping improved estimate (cost {:.6e} -> {:.6e})",
            initial_cost, final_cost
        );
    }
    debug!(
        "refined {} measurements: cost {:.6e} -> {:.6e}, mse {:.6e}",
        measurements.len(),
        initial_cost,
        final_cost,
        stats.mse
    );

    Ok(Refinement {
        params: problem.params(&x),
        mse: stats.mse,
        chi_sq: stats.chi_sq,
        jacobian: problem.jacobian(&x),
        dof: problem.num_residuals().saturating_sub(num_free),
        mask,
        fully_weighted: problem.fully_weighted(),
        report,
    })
}

/// Evaluate `params` over `measurements` without optimising.
///
/// The returned [`Refinement`] carries the fit statistics and the whitened
/// Jacobian at `params`, so it can be passed to
/// [`crate::estimate_covariance`]. Its report records zero iterations.
pub fn linearize<M: MeasurementModel>(
    model: &M,
    measurements: &[M::Measurement],
    params: &CalibrationParams,
    common_axis: bool,
) -> Refinement {
    let mask = model.param_mask(common_axis);
    let problem = CalibrationProblem::new(model, measurements, *params, mask);
    let x = problem.initial_vector();
    let stats = statistics(&problem, &x);
    Refinement {
        params: *params,
        mse: stats.mse,
        chi_sq: stats.chi_sq,
        jacobian: problem.jacobian(&x),
        dof: problem.num_residuals().saturating_sub(mask.num_free()),
        mask,
        fully_weighted: problem.fully_weighted(),
        report: SolveReport {
            iterations: 0,
            final_cost: 0.5 * stats.chi_sq,
            converged: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triax_core::{KnownMagnitudeModel, KnownVectorModel, Mat3, Measurement, Vec3};

    fn dataset(truth: &CalibrationParams) -> Vec<triax_core::VectorMeasurement> {
        (0..20)
            .map(|i| {
                let a = i as Real * 0.7;
                let r = Vec3::new(a.cos() * 5.0, a.sin() * 5.0, 8.0 - i as Real * 0.8);
                let noise = Vec3::new(
                    ((i * 7) % 5) as Real - 2.0,
                    ((i * 3) % 5) as Real - 2.0,
                    ((i * 11) % 5) as Real - 2.0,
                ) * 1e-3;
                Measurement::new(truth.apply(&r) + noise, r)
            })
            .collect()
    }

    #[test]
    fn refinement_improves_perturbed_start() {
        let truth = CalibrationParams::new(
            Vec3::new(0.2, -0.3, 0.1),
            Mat3::new(0.02, 0.01, -0.01, 0.005, -0.01, 0.003, 0.002, -0.004, 0.015),
        );
        let data = dataset(&truth);
        let mut start = truth;
        start.bias += Vec3::new(0.1, -0.1, 0.05);
        start.cross_coupling[(0, 0)] += 0.02;

        let out = refine(&KnownVectorModel, &data, &start, false, &SolveOptions::default()).unwrap();
        assert!(out.params.max_abs_diff(&truth) < 1e-3);
        assert!(out.mse > 0.0 && out.mse < 1e-5);
        // unweighted: chi-square equals the residual sum of squares
        assert!((out.chi_sq - out.mse * 60.0).abs() < 1e-12);
        assert_eq!(out.dof, 60 - 12);
        assert_eq!(out.jacobian.shape(), (60, 12));
        assert!(!out.fully_weighted);
    }

    #[test]
    fn common_axis_entries_stay_fixed() {
        let truth = CalibrationParams::new(
            Vec3::new(0.2, -0.3, 0.1),
            Mat3::new(0.02, 0.01, -0.01, 0.0, -0.01, 0.003, 0.0, 0.0, 0.015),
        );
        let data = dataset(&truth);
        let out = refine(&KnownVectorModel, &data, &CalibrationParams::default(), true, &SolveOptions::default())
            .unwrap();
        assert_eq!(out.params.myx(), 0.0);
        assert_eq!(out.params.mzx(), 0.0);
        assert_eq!(out.params.mzy(), 0.0);
        assert_eq!(out.jacobian.ncols(), 9);
        assert!(out.params.max_abs_diff(&truth) < 1e-3);
    }

    #[test]
    fn magnitude_model_fixes_unobservable_entries_in_any_configuration() {
        let truth = CalibrationParams::new(
            Vec3::new(0.2, -0.3, 0.1),
            Mat3::new(0.02, 0.01, -0.01, 0.0, -0.01, 0.003, 0.0, 0.0, 0.015),
        );
        let data: Vec<_> = dataset(&truth)
            .into_iter()
            .map(|m| Measurement::new(m.observed, m.reference.norm()))
            .collect();
        let mut start = truth;
        start.bias += Vec3::new(0.02, -0.01, 0.01);
        let out = refine(&KnownMagnitudeModel, &data, &start, false, &SolveOptions::default())
            .unwrap();
        assert_eq!(out.mask, ParamMask::common_axis());
        assert_eq!(out.jacobian.ncols(), 9);
        assert_eq!(out.dof, 20 - 9);
        assert_eq!(out.params.myx(), 0.0);
        assert_eq!(out.params.mzx(), 0.0);
        assert_eq!(out.params.mzy(), 0.0);

        let lin = linearize(&KnownMagnitudeModel, &data, &truth, false);
        assert_eq!(lin.mask, ParamMask::common_axis());
    }

    #[test]
    fn too_few_measurements_is_rejected() {
        let data = dataset(&CalibrationParams::default());
        assert_eq!(
            refine(&KnownVectorModel, &data[..3], &CalibrationParams::default(), false, &SolveOptions::default())
                .unwrap_err(),
            RefineError::NotEnoughMeasurements { needed: 4, got: 3 }
        );
    }
}
