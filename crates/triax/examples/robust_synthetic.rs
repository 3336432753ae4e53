//! Robust accelerometer calibration with synthetic data.
//!
//! This example runs every robust method on the same contaminated dataset:
//! 1. Generate readings of a known gravity vector with 30% gross outliers
//! 2. Calibrate with RANSAC, LMedS, MSAC, PROSAC and PROMedS
//! 3. Compare the estimates with ground truth and print the uncertainty
//!
//! Run with: `cargo run -p triax --example robust_synthetic`

use anyhow::Result;
use triax::prelude::*;
use triax::synthetic::triaxial::{DatasetSpec, known_vector_dataset, random_params};

/// Prints progress of a calibration run.
struct ProgressPrinter;

impl CalibrationListener<KnownVectorModel> for ProgressPrinter {
    fn on_calibrate_start(&mut self, session: &mut KnownVectorCalibrator) {
        println!("  {} started", session.method());
    }

    fn on_progress(&mut self, _session: &mut KnownVectorCalibrator, progress: f32) {
        println!("    progress {:>5.1}%", progress * 100.0);
    }
}

fn main() -> Result<()> {
    println!("=== Robust Triaxial Calibration (Synthetic Data) ===\n");

    let truth = random_params(2024, 0.3, 0.02, false);
    let spec = DatasetSpec {
        count: 300,
        outlier_fraction: 0.3,
        inlier_std_dev: 2e-3,
        outlier_std_dev: 0.5,
        seed: 2024,
        ..DatasetSpec::default()
    };
    let data = known_vector_dataset(&truth, &spec);
    println!(
        "Generated {} measurements ({} outliers)\n",
        data.measurements.len(),
        data.outliers.iter().filter(|o| **o).count()
    );

    println!("Ground truth:");
    println!(
        "  bias = [{:.5}, {:.5}, {:.5}]",
        truth.bx(),
        truth.by(),
        truth.bz()
    );
    println!(
        "  scale = [{:.5}, {:.5}, {:.5}]\n",
        truth.sx(),
        truth.sy(),
        truth.sz()
    );

    for method in RobustMethod::ALL {
        let mut session = triax::factory::create(KnownVectorModel, data.measurements.clone(), method);
        session.set_threshold(1e-2)?;
        session.set_progress_delta(0.25)?;
        session.set_quality_scores(Some(data.quality_scores.clone()))?;
        session.set_listener(Some(Box::new(ProgressPrinter)))?;
        session.calibrate()?;

        let Some(report) = session.report() else {
            continue;
        };
        let estimate = session.estimate().and_then(|e| e.bias_std_dev());
        println!(
            "  {:<8} iterations={:<4} inliers={:<4} mse={:.3e} |error|max={:.2e}",
            method.name(),
            report.iterations,
            report.num_inliers,
            report.mse,
            report.params.max_abs_diff(&truth)
        );
        if let Some(sigma) = estimate {
            println!(
                "           bias sigma = [{:.2e}, {:.2e}, {:.2e}]",
                sigma.x, sigma.y, sigma.z
            );
        }
    }

    let mut session = KnownVectorCalibrator::with_measurements(
        KnownVectorModel,
        data.measurements,
        RobustMethod::Lmeds,
    );
    session.calibrate()?;
    if let Some(report) = session.report() {
        println!("\nLMedS report:\n{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
