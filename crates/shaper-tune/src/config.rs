use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shaper_tune_core::{Axis, CalibrateOptions, ShaperKind};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Smallest smoothing cap that still leaves room for a usable shaper.
const MIN_MAX_SMOOTHING: f64 = 0.05;

/// Calibration run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Shaper fitting settings
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Raw capture loading settings
    #[serde(default)]
    pub input: InputConfig,

    /// Report destination
    #[serde(default)]
    pub output: OutputConfig,
}

/// Shaper fitting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Upper bound on shaper smoothing; absent or non-positive disables it
    pub max_smoothing: Option<f64>,

    /// Which PSD the shapers are fitted against
    #[serde(default)]
    pub axis: Axis,

    /// Shaper families to evaluate
    #[serde(default = "default_shapers")]
    pub shapers: Vec<ShaperKind>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_smoothing: None,
            axis: Axis::default(),
            shapers: default_shapers(),
        }
    }
}

/// Raw capture loading settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Rows kept from a capture; longer captures are strided down
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Rows closer than `1 / max_sample_rate` seconds to the previous kept
    /// row are dropped; 0 keeps every row
    #[serde(default)]
    pub max_sample_rate: f64,

    /// Rows per batch when processing a capture piecewise; 0 processes it
    /// whole
    #[serde(default)]
    pub batch_size: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            max_sample_rate: 0.0,
            batch_size: 0,
        }
    }
}

/// Report destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory reports are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Tag included in report file names
    #[serde(default = "default_output_name")]
    pub name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            name: default_output_name(),
        }
    }
}

fn default_shapers() -> Vec<ShaperKind> {
    ShaperKind::AUTOTUNE.to_vec()
}

fn default_max_rows() -> usize {
    50_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_output_name() -> String {
    "default".to_string()
}

impl Config {
    /// Load configuration from a file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content).or_else(|_| Self::from_json(&content)),
        }
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config as TOML")
    }

    /// Parse configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse config as JSON")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(max_smoothing) = self
            .calibration
            .max_smoothing
            .filter(|m| *m > 0.0 && *m < MIN_MAX_SMOOTHING)
        {
            anyhow::bail!(
                "calibration.max_smoothing must be at least {MIN_MAX_SMOOTHING}, got {max_smoothing}"
            );
        }
        if self.calibration.shapers.is_empty() {
            anyhow::bail!("calibration.shapers cannot be empty");
        }
        if self.input.max_rows == 0 {
            anyhow::bail!("input.max_rows must be positive");
        }
        if self.input.max_sample_rate.is_nan() || self.input.max_sample_rate < 0.0 {
            anyhow::bail!(
                "input.max_sample_rate cannot be negative, got {}",
                self.input.max_sample_rate
            );
        }
        if self.output.name.is_empty() {
            anyhow::bail!("output.name cannot be empty");
        }

        Ok(())
    }

    /// Options handed to the shaper selector.
    pub fn calibrate_options(&self) -> CalibrateOptions {
        CalibrateOptions {
            max_smoothing: self.calibration.max_smoothing.unwrap_or(0.0),
            axis: self.calibration.axis,
            shapers: self.calibration.shapers.clone(),
        }
    }
}
