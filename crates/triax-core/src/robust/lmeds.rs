use super::{RobustMethod, Score, ScoringStrategy};
use crate::{Real, median};

/// Least median of squares.
///
/// `Score::value` is the median squared residual over all measurements;
/// lower is better. The configured threshold is not used while searching:
/// it acts as a stop threshold (the search ends once the median squared
/// residual drops below `threshold^2`) and as a lower bound for the inlier
/// threshold, which is otherwise derived from a robust estimate of the
/// residual standard deviation.
#[derive(Debug, Clone, Copy)]
pub struct Lmeds {
    /// Multiple of the robust standard deviation used to classify inliers.
    pub inlier_factor: Real,
}

impl Lmeds {
    pub const DEFAULT_INLIER_FACTOR: Real = 1.5;
}

impl Default for Lmeds {
    fn default() -> Self {
        Self {
            inlier_factor: Self::DEFAULT_INLIER_FACTOR,
        }
    }
}

/// Rousseeuw's consistency-corrected standard deviation for the median
/// squared residual of `n` residuals from a `subset_size` fit.
pub(crate) fn robust_std_dev(median_sq: Real, n: usize, subset_size: usize) -> Real {
    let correction = if n > subset_size {
        1.0 + 5.0 / (n - subset_size) as Real
    } else {
        1.0
    };
    1.4826 * correction * median_sq.max(0.0).sqrt()
}

pub(crate) fn median_score(
    residuals: &[Real],
    threshold: Real,
    subset_size: usize,
    inlier_factor: Real,
) -> Score {
    let squared: Vec<Real> = residuals.iter().map(|r| r * r).collect();
    let med = median(&squared).unwrap_or(Real::INFINITY);
    let robust = inlier_factor * robust_std_dev(med, residuals.len(), subset_size);
    let inlier_threshold = if robust.is_finite() {
        robust.max(threshold)
    } else {
        threshold
    };
    let inlier_count = residuals.iter().filter(|&&r| r <= inlier_threshold).count();
    Score {
        value: if med.is_nan() { Real::INFINITY } else { med },
        inlier_count,
        inlier_threshold,
    }
}

pub(crate) fn median_should_stop(best: &Score, threshold: Real) -> bool {
    best.value <= threshold * threshold
}

impl ScoringStrategy for Lmeds {
    fn method(&self) -> RobustMethod {
        RobustMethod::Lmeds
    }

    fn score(&self, residuals: &[Real], threshold: Real, subset_size: usize) -> Score {
        median_score(residuals, threshold, subset_size, self.inlier_factor)
    }

    fn is_better(&self, candidate: &Score, best: &Score) -> bool {
        candidate.value < best.value
    }

    fn should_stop(&self, best: &Score, threshold: Real) -> bool {
        median_should_stop(best, threshold)
    }
}
