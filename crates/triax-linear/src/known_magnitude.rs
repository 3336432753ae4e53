//! Preliminary fit for measurements with a known reference magnitude.
//!
//! With `T = I + M`, the sensor equation implies
//! `|T^-1 (x - b)|^2 = g^2` for every reading `x` of a signal with norm `g`.
//! Writing `A = T^-T T^-1` and `v = A b` gives the quadric
//!
//! ```text
//! x^T A x - 2 v^T x + k = g^2,    k = b^T A b
//! ```
//!
//! When every reading shares the same magnitude the constant absorbs `g^2`
//! and the quadric is homogeneous in its ten coefficients
//! `(a11, a22, a33, a12, a13, a23, v, c)`; it is solved as the null vector of
//! the design matrix and rescaled so that `(x - b)^T A (x - b) = g^2`.
//! Otherwise `g^2` enters as an eleventh column and the null vector is
//! normalised by its coefficient. Readings are centred and scaled to unit
//! RMS radius first for conditioning.
//!
//! The Cholesky factor `A = L L^T` yields the upper-triangular
//! `T^-1 = L^T`, hence an upper-triangular `M`: magnitudes alone cannot tell
//! rotated frames apart, so this is the common-axis solution whichever
//! configuration is requested.

use crate::math::null_vector;
use crate::{LinearError, LinearFit};
use nalgebra::DMatrix;
use triax_core::{
    CalibrationParams, KnownMagnitudeModel, MagnitudeMeasurement, Mat3, Real, Vec3,
};

/// Relative spread of the squared reference magnitudes below which they are
/// treated as one magnitude.
const EQUAL_MAGNITUDE_TOLERANCE: Real = 1e-9;

/// Quadric fit of bias and upper-triangular matrix from known-magnitude
/// measurements.
pub fn fit_known_magnitude(
    measurements: &[MagnitudeMeasurement],
    _common_axis: bool,
) -> Result<CalibrationParams, LinearError> {
    let n = measurements.len();
    if n < KnownMagnitudeModel::MIN_MEASUREMENTS {
        return Err(LinearError::NotEnoughMeasurements {
            needed: KnownMagnitudeModel::MIN_MEASUREMENTS,
            got: n,
        });
    }
    if measurements
        .iter()
        .any(|m| !(m.reference.is_finite() && m.reference > 0.0))
    {
        return Err(LinearError::Degenerate("reference magnitudes must be positive"));
    }

    let centroid = measurements
        .iter()
        .fold(Vec3::zeros(), |acc, m| acc + m.observed)
        / n as Real;
    let scale = (measurements
        .iter()
        .map(|m| (m.observed - centroid).norm_squared())
        .sum::<Real>()
        / n as Real)
        .sqrt();
    if !(scale.is_finite() && scale > 0.0) {
        return Err(LinearError::Degenerate("readings are coincident"));
    }

    let g2: Vec<Real> = measurements.iter().map(|m| m.reference * m.reference).collect();
    let g2_mean = g2.iter().sum::<Real>() / n as Real;
    let equal = g2
        .iter()
        .all(|g| (g - g2_mean).abs() <= EQUAL_MAGNITUDE_TOLERANCE * g2_mean);

    let cols = if equal { 10 } else { 11 };
    let mut a = DMatrix::<Real>::zeros(n, cols);
    for (k, m) in measurements.iter().enumerate() {
        let p = (m.observed - centroid) / scale;
        let (x, y, z) = (p.x, p.y, p.z);
        a[(k, 0)] = x * x;
        a[(k, 1)] = y * y;
        a[(k, 2)] = z * z;
        a[(k, 3)] = 2.0 * x * y;
        a[(k, 4)] = 2.0 * x * z;
        a[(k, 5)] = 2.0 * y * z;
        a[(k, 6)] = -2.0 * x;
        a[(k, 7)] = -2.0 * y;
        a[(k, 8)] = -2.0 * z;
        a[(k, 9)] = 1.0;
        if !equal {
            a[(k, 10)] = -g2[k] / g2_mean;
        }
    }

    let mut theta = null_vector(&a)
        .ok_or(LinearError::Degenerate("readings do not determine an ellipsoid"))?;
    if theta[0] + theta[1] + theta[2] < 0.0 {
        theta.neg_mut();
    }
    let shape = Mat3::new(
        theta[0], theta[3], theta[4], //
        theta[3], theta[1], theta[5], //
        theta[4], theta[5], theta[2],
    );
    let v = Vec3::new(theta[6], theta[7], theta[8]);

    let chol = shape
        .cholesky()
        .ok_or(LinearError::Degenerate("quadric is not an ellipsoid"))?;
    // centre of the quadric in normalised coordinates
    let center = chol.solve(&v);

    // (p - center)^T shape (p - center) = level * g^2 / g2_mean
    let level = if equal {
        v.dot(&center) - theta[9]
    } else {
        theta[10]
    };
    if !(level.is_finite() && level > 0.0) {
        return Err(LinearError::Degenerate("quadric is not an ellipsoid"));
    }

    // A = shape * g2_mean / (level * scale^2) in sensor units
    let a_sensor = shape * (g2_mean / (level * scale * scale));
    let chol = a_sensor
        .cholesky()
        .ok_or(LinearError::Degenerate("quadric is not an ellipsoid"))?;
    let t_inv = chol.l().transpose();
    let transform = t_inv
        .try_inverse()
        .ok_or(LinearError::Degenerate("singular shape matrix"))?;
    let bias = centroid + center * scale;

    let params = CalibrationParams::new(bias, transform - Mat3::identity());
    if !params.is_finite() {
        return Err(LinearError::Degenerate("non-finite parameters"));
    }
    Ok(params.with_common_axis())
}

impl LinearFit for KnownMagnitudeModel {
    fn linear_fit(
        &self,
        measurements: &[MagnitudeMeasurement],
        common_axis: bool,
    ) -> Result<CalibrationParams, LinearError> {
        fit_known_magnitude(measurements, common_axis)
    }
}
