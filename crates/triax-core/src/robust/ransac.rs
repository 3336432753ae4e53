use super::{RobustMethod, Score, ScoringStrategy};
use crate::Real;

/// Inlier-count scoring.
///
/// `Score::value` is the sum of inlier residuals and only breaks ties
/// between candidates with the same inlier count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ransac;

/// Count residuals within `threshold` and sum them.
pub(crate) fn count_score(residuals: &[Real], threshold: Real) -> Score {
    let mut inlier_count = 0;
    let mut inlier_sum = 0.0;
    for &r in residuals {
        if r <= threshold {
            inlier_count += 1;
            inlier_sum += r;
        }
    }
    Score {
        value: inlier_sum,
        inlier_count,
        inlier_threshold: threshold,
    }
}

pub(crate) fn count_is_better(candidate: &Score, best: &Score) -> bool {
    candidate.inlier_count > best.inlier_count
        || (candidate.inlier_count == best.inlier_count && candidate.value < best.value)
}

impl ScoringStrategy for Ransac {
    fn method(&self) -> RobustMethod {
        RobustMethod::Ransac
    }

    fn score(&self, residuals: &[Real], threshold: Real, _subset_size: usize) -> Score {
        count_score(residuals, threshold)
    }

    fn is_better(&self, candidate: &Score, best: &Score) -> bool {
        count_is_better(candidate, best)
    }
}
