//! Preliminary fit for measurements with a known reference vector.
//!
//! The sensor equation `observed = b + (I + M) r` rearranges to
//!
//! ```text
//! observed_i - r_i = b_i + sum_j M_ij r_j
//! ```
//!
//! which is linear in the unknowns and decouples per axis row `i`: each row
//! has the bias component and the free entries of matrix row `i` as
//! unknowns. Under the common-axis assumption the fixed entries are dropped
//! from their rows' design matrices and stay zero.

use crate::math::solve_least_squares;
use crate::{LinearError, LinearFit};
use nalgebra::{DMatrix, DVector};
use triax_core::{
    CalibrationParams, KnownVectorModel, Mat3, ParamIndex, ParamMask, Real, Vec3,
    VectorMeasurement,
};

/// Least-squares fit of bias and matrix from known-vector measurements.
pub fn fit_known_vector(
    measurements: &[VectorMeasurement],
    common_axis: bool,
) -> Result<CalibrationParams, LinearError> {
    let n = measurements.len();
    if n < KnownVectorModel::MIN_MEASUREMENTS {
        return Err(LinearError::NotEnoughMeasurements {
            needed: KnownVectorModel::MIN_MEASUREMENTS,
            got: n,
        });
    }

    let mask = ParamMask::for_common_axis(common_axis);
    let mut bias = Vec3::zeros();
    let mut matrix = Mat3::zeros();

    for row in 0..3 {
        let free_cols: Vec<usize> = (0..3)
            .filter(|&col| !mask.is_fixed(ParamIndex::of_matrix_entry(row, col)))
            .collect();

        let mut a = DMatrix::<Real>::zeros(n, 1 + free_cols.len());
        let mut b = DVector::<Real>::zeros(n);
        for (k, m) in measurements.iter().enumerate() {
            a[(k, 0)] = 1.0;
            for (c, &col) in free_cols.iter().enumerate() {
                a[(k, 1 + c)] = m.reference[col];
            }
            b[k] = m.observed[row] - m.reference[row];
        }

        let x = solve_least_squares(&a, &b)
            .ok_or(LinearError::Degenerate("reference vectors do not span the axis row"))?;
        bias[row] = x[0];
        for (c, &col) in free_cols.iter().enumerate() {
            matrix[(row, col)] = x[1 + c];
        }
    }

    Ok(CalibrationParams::new(bias, matrix))
}

impl LinearFit for KnownVectorModel {
    fn linear_fit(
        &self,
        measurements: &[VectorMeasurement],
        common_axis: bool,
    ) -> Result<CalibrationParams, LinearError> {
        fit_known_vector(measurements, common_axis)
    }
}
