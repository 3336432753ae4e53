//! End-to-end behaviour of the calibration session.

use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;
use triax_core::synthetic::triaxial::{
    DatasetSpec, SyntheticDataset, known_magnitude_dataset, known_vector_dataset, random_params,
};
use triax_core::{
    CalibrationParams, KnownMagnitudeModel, KnownVectorModel, Measurement, ParamIndex,
    RobustMethod, Vec3, VectorMeasurement,
};
use triax_optim::SolveOptions;
use triax_pipeline::{
    CalibrationConfig, CalibrationError, CalibrationListener, CalibrationReport,
    KnownVectorCalibrator, SessionState, factory,
};

fn clean_dataset(
    seed: u64,
    common_axis: bool,
    outlier_fraction: f64,
) -> (CalibrationParams, SyntheticDataset<Vec3>) {
    let truth = random_params(seed, 0.5, 0.03, common_axis);
    let data = known_vector_dataset(
        &truth,
        &DatasetSpec {
            count: 80,
            outlier_fraction,
            seed,
            ..DatasetSpec::default()
        },
    );
    (truth, data)
}

#[test]
fn noise_free_data_is_recovered_by_every_method() -> Result<()> {
    for method in RobustMethod::ALL {
        for common_axis in [false, true] {
            let (truth, data) = clean_dataset(21, common_axis, 0.3);
            let mut session = factory::create(KnownVectorModel, data.measurements, method);
            session.set_common_axis(common_axis)?;
            session.set_threshold(1e-6)?;
            session.set_quality_scores(Some(data.quality_scores))?;
            session.calibrate()?;

            let fit = session.estimated_params().unwrap();
            assert!(
                fit.max_abs_diff(&truth) < 1e-8,
                "{method} common_axis={common_axis}: diff {}",
                fit.max_abs_diff(&truth)
            );
            let inliers = session.inliers_data().unwrap();
            assert_eq!(inliers.num_inliers, 56, "{method}");
            for (flag, outlier) in inliers.inliers.iter().zip(&data.outliers) {
                assert_eq!(*flag, !outlier);
            }
            if common_axis {
                assert_eq!(session.estimated_myx(), Some(0.0));
                assert_eq!(session.estimated_mzx(), Some(0.0));
                assert_eq!(session.estimated_mzy(), Some(0.0));
            }
            assert_eq!(session.state(), SessionState::Idle);
        }
    }
    Ok(())
}

#[test]
fn noisy_majority_is_fitted_and_outliers_flagged() -> Result<()> {
    let truth = random_params(33, 0.8, 0.04, false);
    let data = known_vector_dataset(
        &truth,
        &DatasetSpec {
            count: 200,
            outlier_fraction: 0.25,
            inlier_std_dev: 1e-3,
            outlier_std_dev: 2.0,
            seed: 33,
            ..DatasetSpec::default()
        },
    );

    for method in RobustMethod::ALL {
        let mut session = factory::create(KnownVectorModel, data.measurements.clone(), method);
        session.set_quality_scores(Some(data.quality_scores.clone()))?;
        session.calibrate()?;

        let estimate = session.estimate().unwrap();
        assert!(
            estimate.params.max_abs_diff(&truth) < 5e-3,
            "{method}: diff {}",
            estimate.params.max_abs_diff(&truth)
        );
        assert!(estimate.mse > 0.0 && estimate.mse < 1e-5, "{method}: mse {}", estimate.mse);
        assert!(estimate.chi_sq > 0.0);
        assert!(estimate.covariance.is_some());

        let inliers = session.inliers_data().unwrap();
        let flagged = inliers
            .inliers
            .iter()
            .zip(&data.outliers)
            .filter(|(inlier, outlier)| **outlier && !**inlier)
            .count();
        assert!(flagged >= 48, "{method}: only {flagged} of 50 outliers flagged");
    }
    Ok(())
}

#[test]
fn common_axis_covariance_has_zero_rows_for_fixed_entries() -> Result<()> {
    let truth = random_params(44, 0.5, 0.03, true);
    let data = known_vector_dataset(
        &truth,
        &DatasetSpec {
            count: 120,
            inlier_std_dev: 5e-3,
            seed: 44,
            ..DatasetSpec::default()
        },
    );
    let mut session = factory::create_default(KnownVectorModel, data.measurements);
    session.set_common_axis(true)?;
    session.set_threshold(0.05)?;
    session.calibrate()?;

    let cov = session.estimated_covariance().unwrap();
    for fixed in [ParamIndex::MYX, ParamIndex::MZX, ParamIndex::MZY] {
        for j in 0..12 {
            assert_eq!(cov[(fixed, j)], 0.0);
            assert_eq!(cov[(j, fixed)], 0.0);
        }
    }
    for free in [ParamIndex::BX, ParamIndex::SY, ParamIndex::MXY, ParamIndex::MYZ] {
        assert!(cov[(free, free)] > 0.0);
    }
    let estimate = session.estimate().unwrap();
    assert_eq!(estimate.bias_std_dev().unwrap()[0], cov[(0, 0)].sqrt());
    Ok(())
}

fn magnitude_dataset(seed: u64, inlier_std_dev: f64) -> (CalibrationParams, SyntheticDataset<f64>) {
    let truth = random_params(seed, 0.3, 0.02, true);
    let data = known_magnitude_dataset(
        &truth,
        &DatasetSpec {
            count: 150,
            outlier_fraction: 0.2,
            inlier_std_dev,
            seed,
            ..DatasetSpec::default()
        },
    );
    (truth, data)
}

#[test]
fn magnitude_data_is_recovered_by_every_method() -> Result<()> {
    let (truth, data) = magnitude_dataset(55, 0.0);
    for method in RobustMethod::ALL {
        for common_axis in [false, true] {
            let mut session =
                factory::create(KnownMagnitudeModel, data.measurements.clone(), method);
            session.set_common_axis(common_axis)?;
            session.set_threshold(1e-6)?;
            session.set_quality_scores(Some(data.quality_scores.clone()))?;
            session.calibrate()?;

            let fit = session.estimated_params().unwrap();
            assert!(
                fit.max_abs_diff(&truth) < 1e-7,
                "{method} common_axis={common_axis}: diff {}",
                fit.max_abs_diff(&truth)
            );
            let inliers = session.inliers_data().unwrap();
            assert_eq!(inliers.num_inliers, 120, "{method}");
            for (flag, outlier) in inliers.inliers.iter().zip(&data.outliers) {
                assert_eq!(*flag, !outlier, "{method}");
            }
        }
    }
    Ok(())
}

#[test]
fn magnitude_covariance_covers_the_observable_parameters() -> Result<()> {
    let (truth, data) = magnitude_dataset(56, 1e-3);
    let mut session = factory::create_default(KnownMagnitudeModel, data.measurements);
    session.set_common_axis(false)?;
    session.set_threshold(1e-2)?;
    session.calibrate()?;

    let fit = session.estimated_params().unwrap();
    assert!(fit.max_abs_diff(&truth) < 5e-3, "diff {}", fit.max_abs_diff(&truth));
    assert_eq!(session.estimated_myx(), Some(0.0));
    assert_eq!(session.estimated_mzx(), Some(0.0));
    assert_eq!(session.estimated_mzy(), Some(0.0));

    let cov = session.estimated_covariance().unwrap();
    for fixed in ParamIndex::COMMON_AXIS_FIXED {
        for j in 0..12 {
            assert_eq!(cov[(fixed, j)], 0.0);
            assert_eq!(cov[(j, fixed)], 0.0);
        }
    }
    for free in [ParamIndex::BX, ParamIndex::BZ, ParamIndex::SX, ParamIndex::MXY, ParamIndex::MYZ] {
        assert!(cov[(free, free)] > 0.0);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Refinement switches
// ─────────────────────────────────────────────────────────────────────────────

fn noisy_vectors(seed: u64) -> Vec<VectorMeasurement> {
    let truth = random_params(seed, 0.5, 0.03, false);
    known_vector_dataset(
        &truth,
        &DatasetSpec {
            count: 60,
            inlier_std_dev: 2e-3,
            seed,
            ..DatasetSpec::default()
        },
    )
    .measurements
}

#[test]
fn without_refinement_statistics_stay_neutral() -> Result<()> {
    let mut session = factory::create_default(KnownVectorModel, noisy_vectors(61));
    session.set_refine_result(false)?;
    session.set_refine_preliminary(false)?;
    session.set_threshold(0.05)?;
    session.calibrate()?;

    assert_eq!(session.estimated_mse(), Some(0.0));
    assert_eq!(session.estimated_chi_sq(), Some(0.0));
    assert!(session.estimated_covariance().is_none());
    assert!(session.estimated_params().is_some());
    Ok(())
}

#[test]
fn preliminary_refinement_alone_produces_statistics() -> Result<()> {
    let mut session = factory::create_default(KnownVectorModel, noisy_vectors(62));
    session.set_refine_result(false)?;
    session.set_refine_preliminary(true)?;
    session.set_subset_size(Some(8))?;
    session.set_threshold(0.05)?;
    session.calibrate()?;

    assert!(session.estimated_mse().unwrap() > 0.0);
    assert!(session.estimated_chi_sq().unwrap() > 0.0);
    assert!(session.estimated_covariance().is_some());
    Ok(())
}

#[test]
fn keep_covariance_off_drops_only_the_covariance() -> Result<()> {
    let mut session = factory::create_default(KnownVectorModel, noisy_vectors(63));
    session.set_keep_covariance(false)?;
    session.set_threshold(0.05)?;
    session.calibrate()?;

    assert!(session.estimated_covariance().is_none());
    assert!(session.estimated_mse().unwrap() > 0.0);
    Ok(())
}

#[test]
fn non_linear_preliminary_solver_uses_initial_guess() -> Result<()> {
    let (truth, data) = clean_dataset(64, false, 0.1);
    let mut session = factory::create(KnownVectorModel, data.measurements, RobustMethod::Ransac);
    session.set_linear_preliminary(false)?;
    session.set_initial_guess(Some(CalibrationParams::default()))?;
    session.set_threshold(1e-4)?;
    session.set_max_iterations(200)?;
    session.calibrate()?;

    let fit = session.estimated_params().unwrap();
    assert!(fit.max_abs_diff(&truth) < 1e-7, "diff {}", fit.max_abs_diff(&truth));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Readiness and validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn readiness_follows_measurements_and_quality_scores() -> Result<()> {
    let mut session = KnownVectorCalibrator::new(KnownVectorModel);
    assert_eq!(session.method(), RobustMethod::Lmeds);
    assert!(!session.is_ready());
    assert!(matches!(session.calibrate(), Err(CalibrationError::NotReady(_))));
    assert_eq!(session.state(), SessionState::Idle);

    let (_, data) = clean_dataset(71, false, 0.0);
    session.set_measurements(data.measurements[..3].to_vec())?;
    assert!(!session.is_ready());

    session.set_measurements(data.measurements.clone())?;
    assert!(session.is_ready());

    session.set_subset_size(Some(81))?;
    assert!(!session.is_ready());
    session.set_subset_size(None)?;

    session.set_method(RobustMethod::Prosac)?;
    assert!(!session.is_ready());
    session.set_quality_scores(Some(vec![1.0; 79]))?;
    assert!(!session.is_ready());
    assert!(matches!(session.calibrate(), Err(CalibrationError::NotReady(_))));
    session.set_quality_scores(Some(data.quality_scores))?;
    assert!(session.is_ready());

    // quality scores are kept but ignored by non-ranked methods
    session.set_method(RobustMethod::Msac)?;
    assert!(session.is_ready());
    assert_eq!(session.quality_scores().map(<[f64]>::len), Some(80));
    Ok(())
}

#[test]
fn invalid_values_are_rejected_and_leave_config_untouched() {
    let mut session = KnownVectorCalibrator::new(KnownVectorModel);
    let before = session.config().clone();

    let invalid = [
        session.set_subset_size(Some(3)),
        session.set_threshold(0.0),
        session.set_threshold(f64::NAN),
        session.set_confidence(1.0),
        session.set_confidence(0.0),
        session.set_max_iterations(0),
        session.set_progress_delta(1.5),
        session.set_inlier_factor(-2.0),
        session.set_solve_options(SolveOptions {
            max_iters: 0,
            ..SolveOptions::default()
        }),
        session.set_initial_guess(Some(CalibrationParams::new(
            Vec3::new(f64::INFINITY, 0.0, 0.0),
            Default::default(),
        ))),
        session.set_quality_scores(Some(Vec::new())),
        session.set_quality_scores(Some(vec![1.0, f64::NAN])),
    ];
    for result in invalid {
        assert!(
            matches!(result, Err(CalibrationError::InvalidConfiguration(_))),
            "{result:?}"
        );
    }
    assert_eq!(session.config(), &before);
    assert!(session.quality_scores().is_none());
}

#[test]
fn all_degenerate_data_fails_and_leaves_no_result() -> Result<()> {
    let reference = Vec3::new(1.0, 2.0, 9.0);
    let observed = CalibrationParams::default().apply(&reference);
    let measurements = vec![Measurement::new(observed, reference); 12];

    let record = Rc::new(RefCell::new(Record::default()));
    let mut session = factory::create_default(KnownVectorModel, measurements);
    session.set_max_iterations(5)?;
    session.set_listener(Some(Box::new(Recorder(Rc::clone(&record)))))?;

    let err = session.calibrate().unwrap_err();
    assert_eq!(
        err,
        CalibrationError::EstimationFailed {
            iterations: 0,
            degenerate: 50
        }
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.estimate().is_none());
    assert!(session.inliers_data().is_none());
    assert!(session.report().is_none());

    let record = record.borrow();
    assert_eq!((record.starts, record.ends), (1, 1));
    assert!(record.iterations.is_empty());
    Ok(())
}

#[test]
fn replacing_measurements_discards_the_previous_result() -> Result<()> {
    let (_, data) = clean_dataset(73, false, 0.0);
    let mut session = factory::create_default(KnownVectorModel, data.measurements.clone());
    session.calibrate()?;
    assert!(session.estimate().is_some());
    assert!(session.iterations() > 0);

    session.set_measurements(data.measurements[..40].to_vec())?;
    assert!(session.estimate().is_none());
    assert!(session.inliers_data().is_none());
    assert!(session.report().is_none());
    assert_eq!(session.iterations(), 0);
    Ok(())
}

#[test]
fn failed_run_clears_previous_result() -> Result<()> {
    let (_, data) = clean_dataset(72, false, 0.0);
    let mut session = factory::create_default(KnownVectorModel, data.measurements);
    session.calibrate()?;
    assert!(session.estimate().is_some());

    let reference = Vec3::new(0.0, 0.0, 9.81);
    session.set_measurements(vec![Measurement::new(reference, reference); 6])?;
    session.set_max_iterations(2)?;
    assert!(session.calibrate().is_err());
    assert!(session.estimate().is_none());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener and locking
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Record {
    starts: usize,
    ends: usize,
    iterations: Vec<usize>,
    progress: Vec<f32>,
    states: Vec<SessionState>,
    mutations: Vec<Result<(), CalibrationError>>,
    result_seen_at_end: bool,
}

struct Recorder(Rc<RefCell<Record>>);

fn try_every_mutator(s: &mut KnownVectorCalibrator) -> Vec<Result<(), CalibrationError>> {
    vec![
        s.set_threshold(0.1),
        s.set_threshold(-1.0),
        s.set_confidence(0.9),
        s.set_max_iterations(10),
        s.set_progress_delta(0.5),
        s.set_seed(1),
        s.set_subset_size(Some(5)),
        s.set_subset_size(Some(1)),
        s.set_common_axis(true),
        s.set_linear_preliminary(false),
        s.set_refine_preliminary(true),
        s.set_refine_result(false),
        s.set_keep_covariance(false),
        s.set_initial_guess(None),
        s.set_inlier_factor(2.0),
        s.set_solve_options(SolveOptions::default()),
        s.set_config(CalibrationConfig::default()),
        s.set_method(RobustMethod::Ransac),
        s.set_quality_scores(None),
        s.set_quality_scores(Some(Vec::new())),
        s.set_measurements(Vec::new()),
        s.set_listener(None),
        s.calibrate(),
    ]
}

impl CalibrationListener<KnownVectorModel> for Recorder {
    fn on_calibrate_start(&mut self, session: &mut KnownVectorCalibrator) {
        let mutations = try_every_mutator(session);
        let mut r = self.0.borrow_mut();
        r.starts += 1;
        r.states.push(session.state());
        r.mutations.extend(mutations);
    }

    fn on_calibrate_end(&mut self, session: &mut KnownVectorCalibrator) {
        let mutations = try_every_mutator(session);
        let mut r = self.0.borrow_mut();
        r.ends += 1;
        r.states.push(session.state());
        r.mutations.extend(mutations);
        r.result_seen_at_end = session.estimate().is_some();
    }

    fn on_iteration(&mut self, session: &mut KnownVectorCalibrator, iteration: usize) {
        let lock = session.set_seed(99);
        let mut r = self.0.borrow_mut();
        r.iterations.push(iteration);
        r.states.push(session.state());
        r.mutations.push(lock);
    }

    fn on_progress(&mut self, session: &mut KnownVectorCalibrator, progress: f32) {
        let lock = session.calibrate();
        let mut r = self.0.borrow_mut();
        r.progress.push(progress);
        r.mutations.push(lock);
    }
}

#[test]
fn listener_sees_a_locked_running_session() -> Result<()> {
    let (truth, data) = clean_dataset(81, false, 0.2);
    let record = Rc::new(RefCell::new(Record::default()));
    let mut session = factory::create(KnownVectorModel, data.measurements, RobustMethod::Msac);
    session.set_threshold(1e-6)?;
    session.set_progress_delta(0.01)?;
    session.set_listener(Some(Box::new(Recorder(Rc::clone(&record)))))?;
    let config_before = session.config().clone();

    session.calibrate()?;

    {
        let r = record.borrow();
        assert_eq!((r.starts, r.ends), (1, 1));
        assert!(r.result_seen_at_end);
        assert!(r.states.iter().all(|s| *s == SessionState::Running));
        assert!(!r.mutations.is_empty());
        for result in &r.mutations {
            assert_eq!(result, &Err(CalibrationError::Locked));
        }
        assert!(!r.iterations.is_empty());
        assert_eq!(r.iterations[0], 1);
        assert!(r.iterations.windows(2).all(|w| w[1] == w[0] + 1));
        assert!(r.progress.windows(2).all(|w| w[1] > w[0]));
        assert!(r.progress.iter().all(|p| *p > 0.0 && *p <= 1.0));
    }

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.config(), &config_before);
    assert_eq!(session.method(), RobustMethod::Msac);
    assert_eq!(session.measurements().map(<[VectorMeasurement]>::len), Some(80));
    assert!(session.estimated_params().unwrap().max_abs_diff(&truth) < 1e-8);

    // the listener survives the run
    session.calibrate()?;
    assert_eq!(record.borrow().starts, 2);

    session.set_listener(None)?;
    session.calibrate()?;
    assert_eq!(record.borrow().starts, 2);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialisation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn config_survives_json_round_trip() -> Result<()> {
    let mut session = KnownVectorCalibrator::new(KnownVectorModel);
    session.set_common_axis(true)?;
    session.set_subset_size(Some(10))?;
    session.set_threshold(0.25)?;
    session.set_seed(7)?;

    let json = session.config().to_json_string()?;
    let restored = CalibrationConfig::from_json_str(&json)?;
    assert_eq!(&restored, session.config());

    let mut other = KnownVectorCalibrator::new(KnownVectorModel);
    other.set_config(restored)?;
    assert!(other.config().common_axis);
    assert_eq!(other.subset_size(), 10);
    Ok(())
}

#[test]
fn report_serialises_to_json() -> Result<()> {
    let mut session = factory::create_default(KnownVectorModel, noisy_vectors(91));
    session.set_threshold(0.05)?;
    session.calibrate()?;

    let report = session.report().unwrap();
    assert_eq!(report.method, RobustMethod::Lmeds);
    assert_eq!(report.num_measurements, 60);
    assert_eq!(report.iterations, session.iterations());

    let json = serde_json::to_string(&report)?;
    assert!(json.contains("\"method\":\"lmeds\""));
    let back: CalibrationReport = serde_json::from_str(&json)?;
    assert_eq!(back.num_inliers, report.num_inliers);
    assert!(back.params.max_abs_diff(&report.params) < 1e-12);
    assert!((back.mse - report.mse).abs() <= 1e-12 * report.mse.abs());
    assert_eq!(back.covariance.is_some(), report.covariance.is_some());
    Ok(())
}
