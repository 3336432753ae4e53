use super::{RobustMethod, Score, ScoringStrategy};
use crate::Real;

/// Truncated quadratic cost (M-estimator sample consensus).
///
/// `Score::value` is `sum(min(r^2, threshold^2))`; lower is better. Inliers
/// contribute their squared residual and outliers a constant penalty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Msac;

impl ScoringStrategy for Msac {
    fn method(&self) -> RobustMethod {
        RobustMethod::Msac
    }

    fn score(&self, residuals: &[Real], threshold: Real, _subset_size: usize) -> Score {
        let cap = threshold * threshold;
        let mut cost = 0.0;
        let mut inlier_count = 0;
        for &r in residuals {
            if r <= threshold {
                inlier_count += 1;
                cost += r * r;
            } else {
                cost += cap;
            }
        }
        Score {
            value: cost,
            inlier_count,
            inlier_threshold: threshold,
        }
    }

    fn is_better(&self, candidate: &Score, best: &Score) -> bool {
        candidate.value < best.value
    }
}
