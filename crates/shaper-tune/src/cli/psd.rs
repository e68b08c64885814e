use crate::{
    cli::calibrate::calibration_data, config::Config, output::create_output,
    raw_data::load_raw_samples,
};
use anyhow::{Context, Result};
use clap::Args;
use shaper_tune_core::report::write_calibration_data;
use std::path::PathBuf;

#[derive(Args)]
pub struct PsdArgs {
    /// Raw accelerometer capture (`time, accel_x, accel_y, accel_z` rows).
    pub input: PathBuf,

    /// Path the PSD table is written to.
    pub output: PathBuf,

    /// Path to the configuration file (TOML or JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl PsdArgs {
    pub fn run(&self) -> Result<()> {
        tracing_subscriber::fmt::init();

        let config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.validate()?;

        let samples = load_raw_samples(&self.input, &config.input)?;
        let data = calibration_data(&samples, config.input.batch_size)?;
        if data.is_empty() {
            tracing::warn!(
                "{} samples do not fill one analysis window, writing an empty table",
                samples.rows()
            );
        }

        write_calibration_data(create_output(&self.output)?, &data)
            .with_context(|| format!("failed to write {}", self.output.display()))?;
        println!("Wrote PSD to {}", self.output.display());

        Ok(())
    }
}
