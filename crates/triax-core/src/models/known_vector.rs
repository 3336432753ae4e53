use super::{MeasurementModel, VectorMeasurement};
use crate::{CalibrationParams, NUM_PARAMS, ParamIndex, Real};
use nalgebra::{DMatrix, DVector};

/// Model for readings whose true 3-vector is known.
///
/// Prediction: `b + (I + M) r`. The model is linear in the parameters and
/// every axis row depends on at most four unknowns (`b_i` and row `i` of
/// `M`), so four measurements in general position determine it.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownVectorModel;

impl KnownVectorModel {
    pub const MIN_MEASUREMENTS: usize = 4;
}

impl MeasurementModel for KnownVectorModel {
    type Measurement = VectorMeasurement;

    const RESIDUAL_DIM: usize = 3;

    fn min_measurements(&self, _common_axis: bool) -> usize {
        Self::MIN_MEASUREMENTS
    }

    fn target(&self, m: &VectorMeasurement) -> DVector<Real> {
        DVector::from_column_slice(m.observed.as_slice())
    }

    fn predict(&self, params: &CalibrationParams, m: &VectorMeasurement) -> DVector<Real> {
        let p = params.apply(&m.reference);
        DVector::from_column_slice(p.as_slice())
    }

    fn jacobian(&self, _params: &CalibrationParams, m: &VectorMeasurement) -> DMatrix<Real> {
        let mut jac = DMatrix::zeros(3, NUM_PARAMS);
        for row in 0..3 {
            jac[(row, row)] = 1.0;
            for col in 0..3 {
                jac[(row, ParamIndex::of_matrix_entry(row, col))] = m.reference[col];
            }
        }
        jac
    }

    fn std_dev(&self, m: &VectorMeasurement) -> Option<Real> {
        m.std_dev
    }
}
