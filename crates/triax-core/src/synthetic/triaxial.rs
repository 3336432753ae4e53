//! Synthetic triaxial sensor datasets.
//!
//! True signals are spread over the sphere of radius
//! [`DatasetSpec::magnitude`], passed through the sensor model and
//! perturbed with Gaussian noise. A deterministic subset of the readings
//! receives a much larger perturbation and serves as gross outliers.

use super::noise::{GaussianNoise, uniform, unit_vector};
use crate::{CalibrationParams, Mat3, Measurement, Real, Vec3};

/// Parameters of a synthetic dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetSpec {
    /// Number of measurements.
    pub count: usize,
    /// Fraction of measurements turned into outliers, in `[0, 1]`.
    pub outlier_fraction: Real,
    /// Magnitude of the true signal.
    pub magnitude: Real,
    /// Noise standard deviation on inliers.
    pub inlier_std_dev: Real,
    /// Noise standard deviation on outliers.
    pub outlier_std_dev: Real,
    /// Attach `inlier_std_dev` to every measurement as its standard deviation.
    pub attach_std_dev: bool,
    pub seed: u64,
}

impl Default for DatasetSpec {
    fn default() -> Self {
        Self {
            count: 100,
            outlier_fraction: 0.0,
            magnitude: 9.81,
            inlier_std_dev: 0.0,
            outlier_std_dev: 1.0,
            attach_std_dev: false,
            seed: 0,
        }
    }
}

/// Generated measurements together with their ground-truth labels.
#[derive(Debug, Clone)]
pub struct SyntheticDataset<R> {
    pub measurements: Vec<Measurement<R>>,
    /// `true` for measurements that were turned into outliers.
    pub outliers: Vec<bool>,
    /// Quality score per measurement, `1 / (1 + |perturbation|)`.
    pub quality_scores: Vec<Real>,
}

/// Deterministic calibration parameters with entries drawn uniformly from
/// `[-bias_range, bias_range]` and `[-matrix_range, matrix_range]`.
pub fn random_params(
    seed: u64,
    bias_range: Real,
    matrix_range: Real,
    common_axis: bool,
) -> CalibrationParams {
    let sym = |idx: usize| 2.0 * uniform(seed, idx, 17) - 1.0;
    let bias = Vec3::new(sym(0), sym(1), sym(2)) * bias_range;
    let mut m = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            m[(r, c)] = sym(3 + 3 * r + c) * matrix_range;
        }
    }
    let params = CalibrationParams::new(bias, m);
    if common_axis {
        params.with_common_axis()
    } else {
        params
    }
}

/// Outlier labels: exactly `round(fraction * count)` indices, chosen by a
/// seeded shuffle.
fn outlier_labels(spec: &DatasetSpec) -> Vec<bool> {
    let num_outliers = ((spec.outlier_fraction.clamp(0.0, 1.0) * spec.count as Real).round()
        as usize)
        .min(spec.count);
    let mut keys: Vec<(Real, usize)> = (0..spec.count)
        .map(|i| (uniform(spec.seed, i, 29), i))
        .collect();
    keys.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut labels = vec![false; spec.count];
    for &(_, idx) in keys.iter().take(num_outliers) {
        labels[idx] = true;
    }
    labels
}

fn generate<R>(
    params: &CalibrationParams,
    spec: &DatasetSpec,
    make_reference: impl Fn(&Vec3) -> R,
) -> SyntheticDataset<R> {
    let outliers = outlier_labels(spec);
    let inlier_noise = GaussianNoise::new(spec.seed ^ 0xA5A5, spec.inlier_std_dev);
    let outlier_noise = GaussianNoise::new(spec.seed ^ 0x5A5A, spec.outlier_std_dev);

    let mut measurements = Vec::with_capacity(spec.count);
    let mut quality_scores = Vec::with_capacity(spec.count);
    for (i, &is_outlier) in outliers.iter().enumerate() {
        let true_value = unit_vector(spec.seed, i) * spec.magnitude;
        let perturbation = if is_outlier {
            outlier_noise.sample_vec3(i)
        } else {
            inlier_noise.sample_vec3(i)
        };
        let mut m = Measurement::new(
            params.apply(&true_value) + perturbation,
            make_reference(&true_value),
        );
        if spec.attach_std_dev {
            m.std_dev = Some(spec.inlier_std_dev);
        }
        measurements.push(m);
        quality_scores.push(1.0 / (1.0 + perturbation.norm()));
    }

    SyntheticDataset {
        measurements,
        outliers,
        quality_scores,
    }
}

/// Known-vector dataset: every reference is the true signal.
pub fn known_vector_dataset(params: &CalibrationParams, spec: &DatasetSpec) -> SyntheticDataset<Vec3> {
    generate(params, spec, |t| *t)
}

/// Known-magnitude dataset: every reference is the true signal's norm.
pub fn known_magnitude_dataset(
    params: &CalibrationParams,
    spec: &DatasetSpec,
) -> SyntheticDataset<Real> {
    generate(params, spec, |t| t.norm())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlier_count_follows_fraction() {
        let spec = DatasetSpec {
            count: 40,
            outlier_fraction: 0.25,
            ..DatasetSpec::default()
        };
        let data = known_vector_dataset(&CalibrationParams::default(), &spec);
        assert_eq!(data.outliers.iter().filter(|o| **o).count(), 10);
    }

    #[test]
    fn noise_free_inliers_follow_the_model() {
        let params = random_params(3, 0.5, 0.05, false);
        let spec = DatasetSpec {
            count: 30,
            outlier_fraction: 0.2,
            outlier_std_dev: 5.0,
            seed: 8,
            ..DatasetSpec::default()
        };
        let data = known_vector_dataset(&params, &spec);
        for (m, &is_outlier) in data.measurements.iter().zip(&data.outliers) {
            let err = (params.apply(&m.reference) - m.observed).norm();
            if is_outlier {
                assert!(err > 0.0);
            } else {
                assert!(err < 1e-12);
            }
        }
    }

    #[test]
    fn common_axis_params_have_zero_lower_triangle() {
        let p = random_params(1, 1.0, 0.1, true);
        assert_eq!(p.myx(), 0.0);
        assert_eq!(p.mzx(), 0.0);
        assert_eq!(p.mzy(), 0.0);
        assert!(p.mxy() != 0.0);
    }
}
