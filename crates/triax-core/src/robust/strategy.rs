//! Scoring strategy interface and method selection.

use super::{Lmeds, Msac, Promeds, Prosac, Ransac};
use crate::Real;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Goodness of one candidate model over the full measurement set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Strategy-defined goodness value (see each strategy for its meaning).
    pub value: Real,
    /// Number of measurements classified as inliers.
    pub inlier_count: usize,
    /// Residual threshold used for the inlier classification.
    pub inlier_threshold: Real,
}

/// Order in which measurement subsets are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Uniformly random subsets.
    Uniform,
    /// PROSAC progressive sampling over measurements sorted by quality score.
    QualityRanked,
}

/// Scoring rule of a robust estimator.
///
/// Implementations only decide how subsets are ordered and how a candidate
/// is scored; the sampling loop, adaptive iteration bound and bookkeeping
/// are shared (see [`crate::robust::estimate`]).
pub trait ScoringStrategy: fmt::Debug {
    fn method(&self) -> RobustMethod;

    fn sampling(&self) -> Sampling {
        Sampling::Uniform
    }

    /// Whether per-measurement quality scores must be supplied.
    fn requires_quality_scores(&self) -> bool {
        self.sampling() == Sampling::QualityRanked
    }

    /// Score a candidate from its residuals over all measurements.
    ///
    /// `threshold` is the configured residual threshold and `subset_size`
    /// the number of measurements used to build the candidate.
    fn score(&self, residuals: &[Real], threshold: Real, subset_size: usize) -> Score;

    /// `true` if `candidate` should replace `best`.
    fn is_better(&self, candidate: &Score, best: &Score) -> bool;

    /// Early termination once the best score is good enough.
    fn should_stop(&self, _best: &Score, _threshold: Real) -> bool {
        false
    }
}

/// Robust estimation method identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobustMethod {
    /// Random sample consensus: maximise the inlier count.
    Ransac,
    /// Least median of squares: minimise the median squared residual.
    #[default]
    Lmeds,
    /// M-estimator sample consensus: minimise truncated squared residuals.
    Msac,
    /// Progressive sample consensus: RANSAC scoring with quality-ranked sampling.
    Prosac,
    /// Progressive least median of squares: LMedS scoring with quality-ranked sampling.
    Promeds,
}

impl RobustMethod {
    pub const ALL: [RobustMethod; 5] = [
        RobustMethod::Ransac,
        RobustMethod::Lmeds,
        RobustMethod::Msac,
        RobustMethod::Prosac,
        RobustMethod::Promeds,
    ];

    /// Build the scoring strategy for this method with default settings.
    pub fn strategy(self) -> Box<dyn ScoringStrategy> {
        self.strategy_with_inlier_factor(Lmeds::DEFAULT_INLIER_FACTOR)
    }

    /// Build the scoring strategy for this method.
    ///
    /// `inlier_factor` only affects the median-based methods.
    pub fn strategy_with_inlier_factor(self, inlier_factor: Real) -> Box<dyn ScoringStrategy> {
        match self {
            RobustMethod::Ransac => Box::new(Ransac),
            RobustMethod::Lmeds => Box::new(Lmeds { inlier_factor }),
            RobustMethod::Msac => Box::new(Msac),
            RobustMethod::Prosac => Box::new(Prosac),
            RobustMethod::Promeds => Box::new(Promeds { inlier_factor }),
        }
    }

    pub fn requires_quality_scores(self) -> bool {
        matches!(self, RobustMethod::Prosac | RobustMethod::Promeds)
    }

    pub fn name(self) -> &'static str {
        match self {
            RobustMethod::Ransac => "RANSAC",
            RobustMethod::Lmeds => "LMedS",
            RobustMethod::Msac => "MSAC",
            RobustMethod::Prosac => "PROSAC",
            RobustMethod::Promeds => "PROMedS",
        }
    }
}

impl fmt::Display for RobustMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
