use crate::{
    config::Config,
    output::{create_output, report_path},
    raw_data::load_raw_samples,
};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use shaper_tune_core::{
    Axis, CalibrationData, CalibrationResult, Matrix, ShaperKind, find_best_shaper,
    process_accelerometer_data, report::write_shaper_report,
};
use std::{io::Write, path::PathBuf};

#[derive(Args)]
pub struct CalibrateArgs {
    /// Raw accelerometer capture (`time, accel_x, accel_y, accel_z` rows).
    pub input: PathBuf,

    /// Path to the configuration file (TOML or JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Upper bound on shaper smoothing; 0 disables it.
    #[arg(long)]
    pub max_smoothing: Option<f64>,

    /// PSD the shapers are fitted against (all, x, y or z).
    #[arg(long)]
    pub axis: Option<Axis>,

    /// Comma-separated shaper families to evaluate.
    #[arg(long, value_delimiter = ',')]
    pub shapers: Option<Vec<ShaperKind>>,

    /// Tag included in the report file name.
    #[arg(long)]
    pub name: Option<String>,

    /// Directory the report is written to.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Also write the fitted shapers as JSON to this path.
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary<'a> {
    axis: Axis,
    recommended: &'a CalibrationResult,
    shapers: &'a [CalibrationResult],
}

impl CalibrateArgs {
    pub fn run(&self) -> Result<()> {
        tracing_subscriber::fmt::init();

        let config = self.load_config()?;
        config.validate()?;

        let samples = load_raw_samples(&self.input, &config.input)?;
        let mut data = calibration_data(&samples, config.input.batch_size)?;
        if data.is_empty() {
            anyhow::bail!(
                "insufficient data in {}: {} samples do not fill one analysis window",
                self.input.display(),
                samples.rows()
            );
        }
        data.normalize_to_frequencies();

        let options = config.calibrate_options();
        let results = find_best_shaper(&mut data, &options)?;
        let best = results.best();
        let axis = options.axis;
        for shaper in results.all_shapers() {
            println!(
                "{}: {:.1} Hz, vibrations {:.1}%, smoothing {:.3}, max_accel {:.0} mm/sec^2",
                shaper.name(),
                shaper.freq,
                shaper.vibrs * 100.0,
                shaper.smoothing,
                shaper.max_accel
            );
        }
        println!(
            "Recommended shaper_type_{axis} = {}, shaper_freq_{axis} = {:.1} Hz",
            best.name(),
            best.freq
        );

        let report = report_path(
            &config.output.dir,
            &config.output.name,
            &self.input,
            chrono::Local::now(),
        );
        write_shaper_report(create_output(&report)?, &data, &results)
            .with_context(|| format!("failed to write {}", report.display()))?;
        println!("Wrote shaper report to {}", report.display());

        if let Some(summary_path) = &self.summary {
            let summary = Summary {
                axis,
                recommended: best,
                shapers: results.all_shapers(),
            };
            let mut out = create_output(summary_path)?;
            serde_json::to_writer_pretty(&mut out, &summary)
                .with_context(|| format!("failed to write {}", summary_path.display()))?;
            out.flush()
                .with_context(|| format!("failed to write {}", summary_path.display()))?;
        }

        Ok(())
    }

    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(max_smoothing) = self.max_smoothing {
            config.calibration.max_smoothing = Some(max_smoothing);
        }
        if let Some(axis) = self.axis {
            config.calibration.axis = axis;
        }
        if let Some(shapers) = &self.shapers {
            config.calibration.shapers = shapers.clone();
        }
        if let Some(name) = &self.name {
            config.output.name = name.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        Ok(config)
    }
}

/// Frequency response of the whole capture, or of consecutive batches merged
/// into a running average when `batch_size` is set.
pub fn calibration_data(samples: &Matrix, batch_size: usize) -> Result<CalibrationData> {
    if batch_size == 0 {
        return process_accelerometer_data(samples.view()).context("failed to analyze capture");
    }

    let mut total: Option<CalibrationData> = None;
    for (idx, batch) in samples.batches(batch_size).enumerate() {
        let data = process_accelerometer_data(batch)
            .with_context(|| format!("failed to analyze batch {idx}"))?;
        if data.is_empty() {
            tracing::warn!("batch {idx} is too short to analyze, skipping");
            continue;
        }
        match total.as_mut() {
            None => total = Some(data),
            Some(total) => {
                if let Err(err) = total.add_data(&data) {
                    tracing::warn!("skipping batch {idx}: {err}");
                }
            }
        }
    }
    Ok(total.unwrap_or_default())
}
