//! Measurement models.
//!
//! A [`MeasurementModel`] maps a calibration-parameter candidate and one
//! measurement to a predicted value, and provides the partial derivatives of
//! that prediction with respect to the 12 calibration parameters.
//!
//! Two models are provided:
//! - [`KnownVectorModel`]: the true 3-vector is known for every measurement
//!   (known frame / known field direction).
//! - [`KnownMagnitudeModel`]: only the magnitude of the true signal is known
//!   (gravity norm, local field intensity).

use crate::{CalibrationParams, ParamMask, Real, Vec3};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

mod known_magnitude;
mod known_vector;

pub use known_magnitude::KnownMagnitudeModel;
pub use known_vector::KnownVectorModel;

/// One sensor reading paired with its reference value.
///
/// `R` is the reference: a [`Vec3`] for known-vector measurements or a
/// scalar magnitude for known-magnitude measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement<R> {
    /// Raw sensor reading.
    pub observed: Vec3,
    /// Expected (true) value, or the quantity needed to derive it.
    pub reference: R,
    /// Standard deviation of the reading noise, if known.
    #[serde(default)]
    pub std_dev: Option<Real>,
}

impl<R> Measurement<R> {
    pub fn new(observed: Vec3, reference: R) -> Self {
        Self {
            observed,
            reference,
            std_dev: None,
        }
    }

    pub fn with_std_dev(mut self, std_dev: Real) -> Self {
        self.std_dev = Some(std_dev);
        self
    }
}

/// Known-vector measurement (reference is the true 3-vector).
pub type VectorMeasurement = Measurement<Vec3>;
/// Known-magnitude measurement (reference is the true signal norm).
pub type MagnitudeMeasurement = Measurement<Real>;

/// Sensor measurement model used by the preliminary solver, the scoring
/// strategies and the refiner.
pub trait MeasurementModel {
    type Measurement: Clone + std::fmt::Debug;

    /// Number of residual rows contributed by one measurement.
    const RESIDUAL_DIM: usize;

    /// Minimal number of measurements that determine the model in closed form.
    fn min_measurements(&self, common_axis: bool) -> usize;

    /// Parameters held fixed when fitting in the requested configuration.
    ///
    /// Models that cannot observe some parameters fix them regardless of
    /// `common_axis`.
    fn param_mask(&self, common_axis: bool) -> ParamMask {
        ParamMask::for_common_axis(common_axis)
    }

    /// Value the prediction has to match for a perfect model.
    fn target(&self, m: &Self::Measurement) -> DVector<Real>;

    /// Predicted value for a parameter candidate.
    fn predict(&self, params: &CalibrationParams, m: &Self::Measurement) -> DVector<Real>;

    /// Jacobian of [`MeasurementModel::predict`] (`RESIDUAL_DIM x 12`).
    fn jacobian(&self, params: &CalibrationParams, m: &Self::Measurement) -> DMatrix<Real>;

    /// Standard deviation attached to a measurement, if any.
    fn std_dev(&self, m: &Self::Measurement) -> Option<Real>;

    /// `target - predict`.
    fn residual(&self, params: &CalibrationParams, m: &Self::Measurement) -> DVector<Real> {
        self.target(m) - self.predict(params, m)
    }

    /// Euclidean norm of [`MeasurementModel::residual`]; the scalar used for
    /// inlier classification.
    fn residual_norm(&self, params: &CalibrationParams, m: &Self::Measurement) -> Real {
        self.residual(params, m).norm()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::NUM_PARAMS;

    /// Central finite-difference Jacobian of `predict`.
    pub fn numeric_jacobian<M: MeasurementModel>(
        model: &M,
        params: &CalibrationParams,
        m: &M::Measurement,
    ) -> DMatrix<Real> {
        let h = 1e-6;
        let x0 = params.to_vector();
        let mut jac = DMatrix::zeros(M::RESIDUAL_DIM, NUM_PARAMS);
        for k in 0..NUM_PARAMS {
            let mut xp = x0;
            let mut xm = x0;
            xp[k] += h;
            xm[k] -= h;
            let fp = model.predict(&CalibrationParams::from_vector(&xp), m);
            let fm = model.predict(&CalibrationParams::from_vector(&xm), m);
            jac.set_column(k, &((fp - fm) / (2.0 * h)));
        }
        jac
    }
}
