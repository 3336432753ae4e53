use super::{CalibrationEstimate, CalibrationListener, CalibrationReport, SessionState};
use crate::preliminary::PreliminarySolver;
use crate::{CalibrationConfig, CalibrationError};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use triax_core::robust::estimate;
use triax_core::{
    CalibrationParams, Cov12, InliersData, Mat3, Real, RobustMethod, RobustObserver, Vec3,
};
use triax_linear::LinearFit;
use triax_optim::{
    CovarianceScaling, Refinement, SolveOptions, estimate_covariance, linearize, refine,
};

type BoxedListener<M> = Box<dyn CalibrationListener<M>>;

/// Robust calibration session over one measurement model.
///
/// The session owns its configuration, measurements, optional quality scores
/// and listener, and stores the result of the last successful
/// [`CalibrationSession::calibrate`]. While `calibrate()` runs the session is
/// in [`SessionState::Running`] and every mutator returns
/// [`CalibrationError::Locked`]; mutators check the lock before validating
/// their argument.
pub struct CalibrationSession<M: LinearFit> {
    model: M,
    method: RobustMethod,
    config: CalibrationConfig,
    measurements: Option<Arc<[M::Measurement]>>,
    quality_scores: Option<Arc<[Real]>>,
    listener: Option<BoxedListener<M>>,
    state: SessionState,
    estimate: Option<CalibrationEstimate>,
    inliers: Option<InliersData>,
    iterations: usize,
}

impl<M: LinearFit + fmt::Debug> fmt::Debug for CalibrationSession<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationSession")
            .field("model", &self.model)
            .field("method", &self.method)
            .field("state", &self.state)
            .field("config", &self.config)
            .field(
                "num_measurements",
                &self.measurements.as_ref().map(|m| m.len()),
            )
            .field("has_quality_scores", &self.quality_scores.is_some())
            .field("has_listener", &self.listener.is_some())
            .field("estimate", &self.estimate)
            .finish()
    }
}

/// Forwards robust-loop notifications to the session listener.
struct ListenerBridge<'s, M: LinearFit> {
    session: &'s mut CalibrationSession<M>,
    listener: &'s mut Option<BoxedListener<M>>,
}

impl<M: LinearFit> RobustObserver for ListenerBridge<'_, M> {
    fn on_iteration(&mut self, iteration: usize) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_iteration(self.session, iteration);
        }
    }

    fn on_progress(&mut self, progress: f32) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_progress(self.session, progress);
        }
    }
}

impl<M: LinearFit + Clone> CalibrationSession<M> {
    /// Session using the default method (LMedS).
    pub fn new(model: M) -> Self {
        Self::with_method(model, RobustMethod::default())
    }

    pub fn with_method(model: M, method: RobustMethod) -> Self {
        Self {
            model,
            method,
            config: CalibrationConfig::default(),
            measurements: None,
            quality_scores: None,
            listener: None,
            state: SessionState::Idle,
            estimate: None,
            inliers: None,
            iterations: 0,
        }
    }

    /// Session with measurements already attached.
    pub fn with_measurements(
        model: M,
        measurements: Vec<M::Measurement>,
        method: RobustMethod,
    ) -> Self {
        let mut session = Self::with_method(model, method);
        session.measurements = Some(measurements.into());
        session
    }

    // ─────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn method(&self) -> RobustMethod {
        self.method
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn measurements(&self) -> Option<&[M::Measurement]> {
        self.measurements.as_deref()
    }

    pub fn quality_scores(&self) -> Option<&[Real]> {
        self.quality_scores.as_deref()
    }

    /// Minimum number of measurements of the model under the current
    /// common-axis setting.
    pub fn min_measurements(&self) -> usize {
        self.model.min_measurements(self.config.common_axis)
    }

    /// Measurements per preliminary subset.
    pub fn subset_size(&self) -> usize {
        self.config.effective_subset_size(self.min_measurements())
    }

    /// `true` if [`CalibrationSession::calibrate`] would start.
    pub fn is_ready(&self) -> bool {
        self.ready_measurements().is_ok()
    }

    fn ready_measurements(&self) -> Result<Arc<[M::Measurement]>, CalibrationError> {
        let Some(measurements) = self.measurements.as_ref() else {
            return Err(CalibrationError::NotReady("no measurements".into()));
        };
        let needed = self.subset_size();
        if measurements.len() < needed {
            return Err(CalibrationError::NotReady(format!(
                "need at least {needed} measurements, got {}",
                measurements.len()
            )));
        }
        if self.method.requires_quality_scores() {
            match self.quality_scores.as_ref() {
                None => {
                    return Err(CalibrationError::NotReady(format!(
                        "{} requires quality scores",
                        self.method
                    )));
                }
                Some(q) if q.len() != measurements.len() => {
                    return Err(CalibrationError::NotReady(format!(
                        "expected {} quality scores, got {}",
                        measurements.len(),
                        q.len()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(Arc::clone(measurements))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutators (Idle only)
    // ─────────────────────────────────────────────────────────────────────

    fn ensure_idle(&self) -> Result<(), CalibrationError> {
        if self.is_running() {
            return Err(CalibrationError::Locked);
        }
        Ok(())
    }

    fn clear_result(&mut self) {
        self.estimate = None;
        self.inliers = None;
        self.iterations = 0;
    }

    fn update_config(
        &mut self,
        update: impl FnOnce(&mut CalibrationConfig),
    ) -> Result<(), CalibrationError> {
        self.ensure_idle()?;
        let mut config = self.config.clone();
        update(&mut config);
        config.validate(self.model.min_measurements(config.common_axis))?;
        self.config = config;
        Ok(())
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: CalibrationConfig) -> Result<(), CalibrationError> {
        self.update_config(|c| *c = config)
    }

    pub fn set_method(&mut self, method: RobustMethod) -> Result<(), CalibrationError> {
        self.ensure_idle()?;
        self.method = method;
        Ok(())
    }

    /// Residual threshold (inlier threshold, or stop threshold for the
    /// median-based methods).
    pub fn set_threshold(&mut self, threshold: Real) -> Result<(), CalibrationError> {
        self.update_config(|c| c.robust.threshold = threshold)
    }

    pub fn set_confidence(&mut self, confidence: Real) -> Result<(), CalibrationError> {
        self.update_config(|c| c.robust.confidence = confidence)
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<(), CalibrationError> {
        self.update_config(|c| c.robust.max_iterations = max_iterations)
    }

    pub fn set_progress_delta(&mut self, progress_delta: f32) -> Result<(), CalibrationError> {
        self.update_config(|c| c.robust.progress_delta = progress_delta)
    }

    pub fn set_seed(&mut self, seed: u64) -> Result<(), CalibrationError> {
        self.update_config(|c| c.robust.seed = seed)
    }

    /// Measurements per preliminary subset; `None` restores the model minimum.
    pub fn set_subset_size(&mut self, subset_size: Option<usize>) -> Result<(), CalibrationError> {
        self.update_config(|c| c.subset_size = subset_size)
    }

    pub fn set_common_axis(&mut self, common_axis: bool) -> Result<(), CalibrationError> {
        self.update_config(|c| c.common_axis = common_axis)
    }

    pub fn set_linear_preliminary(&mut self, linear: bool) -> Result<(), CalibrationError> {
        self.update_config(|c| c.linear_preliminary = linear)
    }

    pub fn set_refine_preliminary(&mut self, refine: bool) -> Result<(), CalibrationError> {
        self.update_config(|c| c.refine_preliminary = refine)
    }

    pub fn set_refine_result(&mut self, refine: bool) -> Result<(), CalibrationError> {
        self.update_config(|c| c.refine_result = refine)
    }

    pub fn set_keep_covariance(&mut self, keep: bool) -> Result<(), CalibrationError> {
        self.update_config(|c| c.keep_covariance = keep)
    }

    pub fn set_initial_guess(
        &mut self,
        initial_guess: Option<CalibrationParams>,
    ) -> Result<(), CalibrationError> {
        self.update_config(|c| c.initial_guess = initial_guess)
    }

    pub fn set_inlier_factor(&mut self, inlier_factor: Real) -> Result<(), CalibrationError> {
        self.update_config(|c| c.inlier_factor = inlier_factor)
    }

    pub fn set_solve_options(&mut self, solve: SolveOptions) -> Result<(), CalibrationError> {
        self.update_config(|c| c.solve = solve)
    }

    /// Per-measurement quality scores (higher is better).
    ///
    /// Stored for every method; only PROSAC and PROMedS consult them.
    pub fn set_quality_scores(
        &mut self,
        quality_scores: Option<Vec<Real>>,
    ) -> Result<(), CalibrationError> {
        self.ensure_idle()?;
        if let Some(q) = &quality_scores {
            if q.is_empty() || q.iter().any(|v| !v.is_finite()) {
                return Err(CalibrationError::InvalidConfiguration(
                    "quality scores must be non-empty and finite".into(),
                ));
            }
        }
        self.quality_scores = quality_scores.map(Into::into);
        Ok(())
    }

    pub fn set_measurements(
        &mut self,
        measurements: Vec<M::Measurement>,
    ) -> Result<(), CalibrationError> {
        self.ensure_idle()?;
        self.measurements = Some(measurements.into());
        self.clear_result();
        Ok(())
    }

    pub fn set_listener(
        &mut self,
        listener: Option<Box<dyn CalibrationListener<M>>>,
    ) -> Result<(), CalibrationError> {
        self.ensure_idle()?;
        self.listener = listener;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calibration
    // ─────────────────────────────────────────────────────────────────────

    /// Run the robust estimation end to end.
    ///
    /// Fails with [`CalibrationError::Locked`] when called from a listener,
    /// and with [`CalibrationError::NotReady`] before any state change when
    /// [`CalibrationSession::is_ready`] is `false`. Otherwise the session
    /// enters [`SessionState::Running`], notifies the listener, and returns
    /// to [`SessionState::Idle`] on success and on failure. Results of a
    /// previous run are cleared first.
    pub fn calibrate(&mut self) -> Result<(), CalibrationError> {
        self.ensure_idle()?;
        let measurements = self.ready_measurements()?;
        let quality_scores = self.quality_scores.clone();

        self.state = SessionState::Running;
        self.clear_result();

        let mut listener = self.listener.take();
        if let Some(l) = listener.as_mut() {
            l.on_calibrate_start(self);
        }

        info!(
            "{} calibration of {} measurements (subset size {}, common axis {})",
            self.method,
            measurements.len(),
            self.subset_size(),
            self.config.common_axis
        );
        let result = self.run(&measurements, quality_scores.as_deref(), &mut listener);
        match &result {
            Ok(()) => {
                if let Some(estimate) = &self.estimate {
                    info!(
                        "calibration finished after {} iterations: mse {:.6e}, chi^2 {:.6e}",
                        self.iterations, estimate.mse, estimate.chi_sq
                    );
                }
            }
            Err(e) => warn!("calibration failed: {e}"),
        }

        if let Some(l) = listener.as_mut() {
            l.on_calibrate_end(self);
        }
        self.listener = listener;
        self.state = SessionState::Idle;
        result
    }

    fn run(
        &mut self,
        measurements: &[M::Measurement],
        quality_scores: Option<&[Real]>,
        listener: &mut Option<BoxedListener<M>>,
    ) -> Result<(), CalibrationError> {
        let model = self.model.clone();
        let config = self.config.clone();
        let strategy = self.method.strategy_with_inlier_factor(config.inlier_factor);
        let mut solver = PreliminarySolver::new(model.clone(), measurements, config.clone());

        let outcome = {
            let mut bridge = ListenerBridge {
                session: self,
                listener,
            };
            estimate(
                &mut solver,
                strategy.as_ref(),
                quality_scores,
                &config.robust,
                &mut bridge,
            )?
        };
        debug!(
            "robust loop: {} iterations, {} inliers, outlier ratio {:.3}",
            outcome.iterations, outcome.inliers.num_inliers, outcome.inliers.outlier_ratio
        );

        let inlier_set: Vec<M::Measurement> = outcome
            .inliers
            .inlier_indices()
            .into_iter()
            .map(|i| measurements[i].clone())
            .collect();
        let estimate = finalize(&model, &config, &inlier_set, outcome.candidate);

        self.estimate = Some(estimate);
        self.inliers = Some(outcome.inliers);
        self.iterations = outcome.iterations;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Results
    // ─────────────────────────────────────────────────────────────────────

    pub fn estimate(&self) -> Option<&CalibrationEstimate> {
        self.estimate.as_ref()
    }

    pub fn estimated_params(&self) -> Option<CalibrationParams> {
        self.estimate.as_ref().map(|e| e.params)
    }

    fn estimated_with(&self, f: impl Fn(&CalibrationParams) -> Real) -> Option<Real> {
        self.estimate.as_ref().map(|e| f(&e.params))
    }

    pub fn estimated_bias(&self) -> Option<Vec3> {
        self.estimate.as_ref().map(|e| e.params.bias)
    }

    pub fn estimated_bx(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::bx)
    }

    pub fn estimated_by(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::by)
    }

    pub fn estimated_bz(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::bz)
    }

    /// Scale and cross-coupling matrix `M`.
    pub fn estimated_matrix(&self) -> Option<Mat3> {
        self.estimate.as_ref().map(|e| e.params.cross_coupling)
    }

    pub fn estimated_sx(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::sx)
    }

    pub fn estimated_sy(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::sy)
    }

    pub fn estimated_sz(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::sz)
    }

    pub fn estimated_mxy(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::mxy)
    }

    pub fn estimated_mxz(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::mxz)
    }

    pub fn estimated_myx(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::myx)
    }

    pub fn estimated_myz(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::myz)
    }

    pub fn estimated_mzx(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::mzx)
    }

    pub fn estimated_mzy(&self) -> Option<Real> {
        self.estimated_with(CalibrationParams::mzy)
    }

    pub fn estimated_covariance(&self) -> Option<&Cov12> {
        self.estimate.as_ref().and_then(|e| e.covariance.as_ref())
    }

    pub fn estimated_mse(&self) -> Option<Real> {
        self.estimate.as_ref().map(|e| e.mse)
    }

    pub fn estimated_chi_sq(&self) -> Option<Real> {
        self.estimate.as_ref().map(|e| e.chi_sq)
    }

    pub fn inliers_data(&self) -> Option<&InliersData> {
        self.inliers.as_ref()
    }

    /// Scored iterations of the last successful run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn report(&self) -> Option<CalibrationReport> {
        let estimate = self.estimate.as_ref()?;
        let inliers = self.inliers.as_ref()?;
        Some(CalibrationReport {
            method: self.method,
            common_axis: self.config.common_axis,
            params: estimate.params,
            covariance: estimate.covariance,
            mse: estimate.mse,
            chi_sq: estimate.chi_sq,
            num_measurements: inliers.inliers.len(),
            num_inliers: inliers.num_inliers,
            outlier_ratio: inliers.outlier_ratio,
            inlier_threshold: inliers.threshold,
            iterations: self.iterations,
        })
    }
}

/// Result refinement, statistics and covariance of the robust winner.
fn finalize<M: LinearFit>(
    model: &M,
    config: &CalibrationConfig,
    inliers: &[M::Measurement],
    candidate: CalibrationParams,
) -> CalibrationEstimate {
    let common_axis = config.common_axis;
    let fit: Refinement = if config.refine_result {
        match refine(model, inliers, &candidate, common_axis, &config.solve) {
            Ok(refined) => refined,
            Err(e) => {
                warn!("result refinement failed, keeping robust estimate: {e}");
                let lin = linearize(model, inliers, &candidate, common_axis);
                return CalibrationEstimate {
                    params: candidate,
                    covariance: None,
                    mse: lin.mse,
                    chi_sq: lin.chi_sq,
                };
            }
        }
    } else if config.refine_preliminary {
        linearize(model, inliers, &candidate, common_axis)
    } else {
        return CalibrationEstimate {
            params: candidate,
            covariance: None,
            mse: 0.0,
            chi_sq: 0.0,
        };
    };

    let covariance = if config.keep_covariance {
        estimate_covariance(&fit, CovarianceScaling::for_refinement(&fit))
            .inspect_err(|e| warn!("covariance not available: {e}"))
            .ok()
    } else {
        None
    };

    CalibrationEstimate {
        params: fit.params,
        covariance,
        mse: fit.mse,
        chi_sq: fit.chi_sq,
    }
}
