//! Scalar and matrix type definitions.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// Full calibration parameter vector (see [`crate::ParamIndex`]).
pub type ParamVec = SVector<Real, 12>;
/// Covariance over the full calibration parameter vector.
pub type Cov12 = SMatrix<Real, 12, 12>;

/// Median of a slice (average of the two middle values for even lengths).
///
/// Returns `None` for empty input. NaN values are ordered last.
pub fn median(values: &[Real]) -> Option<Real> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}
