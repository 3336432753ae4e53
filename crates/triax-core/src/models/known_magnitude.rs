use super::{MagnitudeMeasurement, MeasurementModel};
use crate::{CalibrationParams, NUM_PARAMS, ParamIndex, ParamMask, Real, Vec3};
use nalgebra::{DMatrix, DVector};

/// Model for readings whose true signal magnitude is known.
///
/// Prediction: `|(I + M)^-1 (observed - b)|`, compared against the reference
/// magnitude. Only nine parameters are observable from magnitudes alone (a
/// rotation of the true frame leaves all norms unchanged), so the closed-form
/// fit returns an upper-triangular matrix, which is exactly the common-axis
/// parameterisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownMagnitudeModel;

impl KnownMagnitudeModel {
    /// Readings needed by the quadric fit: nine for a common magnitude (ten
    /// coefficients up to scale), ten when the magnitudes differ, which adds
    /// the weight of the magnitude term.
    pub const MIN_MEASUREMENTS: usize = 10;

    /// Corrected reading `(I + M)^-1 (observed - b)` and the inverse transform.
    fn corrected(params: &CalibrationParams, m: &MagnitudeMeasurement) -> Option<(Vec3, crate::Mat3)> {
        let t_inv = params.transform().try_inverse()?;
        Some((t_inv * (m.observed - params.bias), t_inv))
    }
}

impl MeasurementModel for KnownMagnitudeModel {
    type Measurement = MagnitudeMeasurement;

    const RESIDUAL_DIM: usize = 1;

    fn min_measurements(&self, _common_axis: bool) -> usize {
        Self::MIN_MEASUREMENTS
    }

    fn param_mask(&self, _common_axis: bool) -> ParamMask {
        ParamMask::common_axis()
    }

    fn target(&self, m: &MagnitudeMeasurement) -> DVector<Real> {
        DVector::from_element(1, m.reference)
    }

    fn predict(&self, params: &CalibrationParams, m: &MagnitudeMeasurement) -> DVector<Real> {
        let value = match Self::corrected(params, m) {
            Some((u, _)) => u.norm(),
            None => Real::INFINITY,
        };
        DVector::from_element(1, value)
    }

    fn jacobian(&self, params: &CalibrationParams, m: &MagnitudeMeasurement) -> DMatrix<Real> {
        let mut jac = DMatrix::zeros(1, NUM_PARAMS);
        let Some((u, t_inv)) = Self::corrected(params, m) else {
            return jac;
        };
        let norm = u.norm();
        if norm <= Real::EPSILON {
            return jac;
        }
        // d|u|/du = u^T / |u|, du/db = -T^-1, du/dT_ij = -T^-1 e_i u_j
        let w = t_inv.transpose() * u / norm;
        for i in 0..3 {
            jac[(0, ParamIndex::BX + i)] = -w[i];
            for j in 0..3 {
                jac[(0, ParamIndex::of_matrix_entry(i, j))] = -w[i] * u[j];
            }
        }
        jac
    }

    fn std_dev(&self, m: &MagnitudeMeasurement) -> Option<Real> {
        m.std_dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::numeric_jacobian;
    use crate::{Mat3, Measurement};

    fn params() -> CalibrationParams {
        CalibrationParams::new(
            Vec3::new(0.5, -0.3, 0.1),
            Mat3::new(0.03, 0.01, -0.02, 0.0, -0.015, 0.005, 0.0, 0.0, 0.02),
        )
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let p = params();
        let m = Measurement::new(Vec3::new(3.0, -7.5, 5.2), 9.81);
        let analytic = KnownMagnitudeModel.jacobian(&p, &m);
        let numeric = numeric_jacobian(&KnownMagnitudeModel, &p, &m);
        assert!(
            (analytic - numeric).amax() < 1e-6,
            "analytic and numeric jacobians differ"
        );
    }

    #[test]
    fn exact_reading_has_zero_residual() {
        let p = params();
        let true_value = Vec3::new(1.0, -2.0, 9.5);
        let m = Measurement::new(p.apply(&true_value), true_value.norm());
        assert!(KnownMagnitudeModel.residual_norm(&p, &m) < 1e-12);
    }

    #[test]
    fn singular_transform_is_an_outlier() {
        let p = CalibrationParams::new(Vec3::zeros(), -Mat3::identity());
        let m = Measurement::new(Vec3::new(1.0, 0.0, 0.0), 1.0);
        assert!(KnownMagnitudeModel.residual_norm(&p, &m).is_infinite());
    }
}
