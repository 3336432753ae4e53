use super::lmeds::{median_score, median_should_stop};
use super::{Lmeds, RobustMethod, Sampling, Score, ScoringStrategy};
use crate::Real;

/// Progressive least median of squares.
///
/// Quality-ranked subset sampling as in [`super::Prosac`] combined with the
/// median scoring of [`super::Lmeds`].
#[derive(Debug, Clone, Copy)]
pub struct Promeds {
    /// Multiple of the robust standard deviation used to classify inliers.
    pub inlier_factor: Real,
}

impl Default for Promeds {
    fn default() -> Self {
        Self {
            inlier_factor: Lmeds::DEFAULT_INLIER_FACTOR,
        }
    }
}

impl ScoringStrategy for Promeds {
    fn method(&self) -> RobustMethod {
        RobustMethod::Promeds
    }

    fn sampling(&self) -> Sampling {
        Sampling::QualityRanked
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
