//! Calibration refinement as a dense least-squares problem.
//!
//! The optimisation vector holds only the free calibration parameters
//! (see [`ParamMask`]); fixed entries keep the values of the base estimate.
//! Residuals are `target - predict` for every measurement, stacked in
//! measurement order with [`MeasurementModel::RESIDUAL_DIM`] rows each, and
//! whitened by `1 / std_dev` when a measurement carries a standard deviation.

use crate::NllsProblem;
use nalgebra::{DMatrix, DVector};
use triax_core::{CalibrationParams, MeasurementModel, ParamMask, Real};

#[derive(Debug, Clone)]
pub struct CalibrationProblem<'a, M: MeasurementModel> {
    model: &'a M,
    measurements: &'a [M::Measurement],
    base: CalibrationParams,
    mask: ParamMask,
    free: Vec<usize>,
    scales: DVector<Real>,
}

impl<'a, M: MeasurementModel> CalibrationProblem<'a, M> {
    pub fn new(
        model: &'a M,
        measurements: &'a [M::Measurement],
        base: CalibrationParams,
        mask: ParamMask,
    ) -> Self {
        let dim = M::RESIDUAL_DIM;
        let mut scales = DVector::from_element(measurements.len() * dim, 1.0);
        for (i, m) in measurements.iter().enumerate() {
            if let Some(sigma) = model.std_dev(m).filter(|s| s.is_finite() && *s > 0.0) {
                scales.rows_mut(i * dim, dim).fill(1.0 / sigma);
            }
        }
        Self {
            model,
            measurements,
            base,
            mask,
            free: mask.free_indices(),
            scales,
        }
    }

    /// Reduced starting vector.
    pub fn initial_vector(&self) -> DVector<Real> {
        self.mask.pack(&self.base)
    }

    /// Full parameters for a reduced vector.
    pub fn params(&self, x: &DVector<Real>) -> CalibrationParams {
        self.mask.unpack(x, &self.base)
    }

    pub fn mask(&self) -> &ParamMask {
        &self.mask
    }

    /// `true` if every measurement carries a usable standard deviation.
    pub fn fully_weighted(&self) -> bool {
        self.measurements.iter().all(|m| {
            self.model
                .std_dev(m)
                .is_some_and(|s| s.is_finite() && s > 0.0)
        })
    }
}

impl<M: MeasurementModel> NllsProblem for CalibrationProblem<'_, M> {
    fn num_params(&self) -> usize {
        self.free.len()
    }

    fn num_residuals(&self) -> usize {
        self.measurements.len() * M::RESIDUAL_DIM
    }

    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
        let params = self.params(x);
        let dim = M::RESIDUAL_DIM;
        let mut r = DVector::zeros(self.num_residuals());
        for (i, m) in self.measurements.iter().enumerate() {
            r.rows_mut(i * dim, dim)
                .copy_from(&self.model.residual(&params, m));
        }
        r
    }

    fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let params = self.params(x);
        let dim = M::RESIDUAL_DIM;
        let mut j = DMatrix::zeros(self.num_residuals(), self.free.len());
        for (i, m) in self.measurements.iter().enumerate() {
            // residual = target - predict
            let jm = self.model.jacobian(&params, m);
            for (c, &idx) in self.free.iter().enumerate() {
                for row in 0..dim {
                    j[(i * dim + row, c)] = -jm[(row, idx)];
                }
            }
        }
        j
    }

    fn row_scales(&self) -> DVector<Real> {
        self.scales.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triax_core::{KnownVectorModel, Mat3, Measurement, Vec3};

    #[test]
    fn jacobian_matches_finite_differences_over_free_params() {
        let model = KnownVectorModel;
        let data = vec![
            Measurement::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.9, 2.1, 2.8)),
            Measurement::new(Vec3::new(-4.0, 0.5, 1.0), Vec3::new(-3.8, 0.4, 1.1)),
        ];
        let base = CalibrationParams::new(Vec3::new(0.1, 0.0, -0.1), Mat3::identity() * 0.01);
        let problem = CalibrationProblem::new(&model, &data, base, ParamMask::common_axis());
        let x = problem.initial_vector();
        assert_eq!(x.len(), 9);

        let analytic = problem.jacobian(&x);
        let h = 1e-7;
        for c in 0..x.len() {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[c] += h;
            xm[c] -= h;
            let numeric = (problem.residuals(&xp) - problem.residuals(&xm)) / (2.0 * h);
            assert!((analytic.column(c) - numeric).amax() < 1e-6, "column {c}");
        }
    }

    #[test]
    fn std_dev_whitens_rows() {
        let model = KnownVectorModel;
        let data = vec![
            Measurement::new(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros()).with_std_dev(0.5),
            Measurement::new(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros()),
        ];
        let problem =
            CalibrationProblem::new(&model, &data, CalibrationParams::default(), ParamMask::all_free());
        let r = problem.residuals(&problem.initial_vector());
        assert_eq!(r[0], 2.0);
        assert_eq!(r[3], 1.0);
        assert!(!problem.fully_weighted());
    }
}
