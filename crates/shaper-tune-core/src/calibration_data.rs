//! Per-axis frequency response of one or more resonance captures.

use crate::{
    error::{CalibrateError, Result},
    interp::resample,
    matrix::{ACCEL_COLUMNS, MIN_SAMPLE_COLUMNS, MatrixView, TIME_COLUMN},
    spectrum::{welch_psd, window_size},
};
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Bins below this frequency are zeroed by normalization.
pub const MIN_FREQ: f64 = 5.0;
/// Bins above this frequency are ignored by shaper fitting and reports.
pub const MAX_FREQ: f64 = 200.0;
/// Added to the bin frequency when normalizing, keeps DC finite.
const NORMALIZE_OFFSET: f64 = 0.1;

/// Which PSD of a [`CalibrationData`] record to look at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Sum of the X, Y and Z PSDs.
    #[default]
    All,
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn name(self) -> &'static str {
        match self {
            Axis::All => "all",
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = CalibrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "xyz" => Ok(Axis::All),
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(CalibrateError::UnknownAxis(s.to_string())),
        }
    }
}

/// Frequency bins and the aligned X, Y, Z and summed PSDs.
///
/// All five sequences always have the same length. A record built from too
/// few samples is empty.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationData {
    freq_bins: Vec<f64>,
    psd_sum: Vec<f64>,
    psd_x: Vec<f64>,
    psd_y: Vec<f64>,
    psd_z: Vec<f64>,
    data_sets: usize,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self::empty()
    }
}

impl CalibrationData {
    /// A record holding no bins, standing for one capture that was too short.
    pub fn empty() -> Self {
        Self {
            freq_bins: Vec::new(),
            psd_sum: Vec::new(),
            psd_x: Vec::new(),
            psd_y: Vec::new(),
            psd_z: Vec::new(),
            data_sets: 1,
        }
    }

    /// Build a record from per-axis PSDs on a shared grid. The summed PSD is
    /// derived from the three axes.
    pub fn from_axes(
        freq_bins: Vec<f64>,
        psd_x: Vec<f64>,
        psd_y: Vec<f64>,
        psd_z: Vec<f64>,
    ) -> Result<Self> {
        let expected = freq_bins.len();
        for actual in [psd_x.len(), psd_y.len(), psd_z.len()] {
            if actual != expected {
                return Err(CalibrateError::ShapeMismatch { expected, actual });
            }
        }
        let psd_sum = psd_x
            .iter()
            .zip(&psd_y)
            .zip(&psd_z)
            .map(|((x, y), z)| x + y + z)
            .collect();
        Ok(Self {
            freq_bins,
            psd_sum,
            psd_x,
            psd_y,
            psd_z,
            data_sets: 1,
        })
    }

    pub fn len(&self) -> usize {
        self.freq_bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freq_bins.is_empty()
    }

    /// Number of captures averaged into this record.
    pub fn data_sets(&self) -> usize {
        self.data_sets
    }

    pub fn freq_bins(&self) -> &[f64] {
        &self.freq_bins
    }

    pub fn psd_sum(&self) -> &[f64] {
        &self.psd_sum
    }

    pub fn psd_x(&self) -> &[f64] {
        &self.psd_x
    }

    pub fn psd_y(&self) -> &[f64] {
        &self.psd_y
    }

    pub fn psd_z(&self) -> &[f64] {
        &self.psd_z
    }

    pub fn psd(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::All => &self.psd_sum,
            Axis::X => &self.psd_x,
            Axis::Y => &self.psd_y,
            Axis::Z => &self.psd_z,
        }
    }

    fn psd_arrays_mut(&mut self) -> [&mut Vec<f64>; 4] {
        [
            &mut self.psd_sum,
            &mut self.psd_x,
            &mut self.psd_y,
            &mut self.psd_z,
        ]
    }

    /// Divide every PSD by `frequency + 0.1` and zero the bins below
    /// [`MIN_FREQ`].
    pub fn normalize_to_frequencies(&mut self) {
        let freq_bins = std::mem::take(&mut self.freq_bins);
        for psd in self.psd_arrays_mut() {
            for (value, &freq) in psd.iter_mut().zip(&freq_bins) {
                *value /= freq + NORMALIZE_OFFSET;
                if freq < MIN_FREQ {
                    *value = 0.0;
                }
            }
        }
        self.freq_bins = freq_bins;
    }

    /// Fold `other` into this record as a running average weighted by the
    /// number of captures each side already holds. `other` is resampled onto
    /// this record's frequency grid first.
    pub fn add_data(&mut self, other: &CalibrationData) -> Result<()> {
        if other.len() != self.len() {
            tracing::warn!(
                "refusing to merge calibration data with {} bins into {} bins",
                other.len(),
                self.len()
            );
            return Err(CalibrateError::ShapeMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }

        let this_sets = self.data_sets as f64;
        let other_sets = other.data_sets as f64;
        let joined = this_sets + other_sets;
        let freq_bins = std::mem::take(&mut self.freq_bins);
        let others = [&other.psd_sum, &other.psd_x, &other.psd_y, &other.psd_z];
        for (psd, other_psd) in self.psd_arrays_mut().into_iter().zip(others) {
            let other_normalized = resample(&freq_bins, &other.freq_bins, other_psd);
            for (value, other_value) in psd.iter_mut().zip(other_normalized) {
                *value = (*value * this_sets + other_value * other_sets) / joined;
            }
        }
        self.freq_bins = freq_bins;
        self.data_sets += other.data_sets;
        Ok(())
    }

    /// Keep only the bins at or below `max_freq`.
    pub fn truncate_to_frequency(&mut self, max_freq: f64) {
        let keep = self.freq_bins.partition_point(|&f| f <= max_freq);
        self.freq_bins.truncate(keep);
        for psd in self.psd_arrays_mut() {
            psd.truncate(keep);
        }
    }
}

/// Compute the per-axis frequency response of a raw capture.
///
/// The sampling frequency is derived from the first and last timestamps. A
/// capture with no more samples than one Welch block yields an empty record.
pub fn process_accelerometer_data(samples: MatrixView<'_>) -> Result<CalibrationData> {
    if samples.cols() < MIN_SAMPLE_COLUMNS {
        return Err(CalibrateError::TooFewColumns {
            required: MIN_SAMPLE_COLUMNS,
            actual: samples.cols(),
        });
    }

    let n = samples.rows();
    if n < 2 {
        return Ok(CalibrationData::empty());
    }
    let duration = samples.get(n - 1, TIME_COLUMN) - samples.get(0, TIME_COLUMN);
    if duration.is_nan() || duration <= 0.0 {
        tracing::warn!("capture has non-increasing timestamps, duration {duration}");
        return Ok(CalibrationData::empty());
    }
    let sampling_freq = n as f64 / duration;
    let Some(nfft) = window_size(sampling_freq) else {
        tracing::warn!("sampling frequency {sampling_freq} Hz is out of range");
        return Ok(CalibrationData::empty());
    };
    if n <= nfft {
        tracing::debug!("{n} samples do not fill a {nfft} sample window");
        return Ok(CalibrationData::empty());
    }

    tracing::debug!("Number of samples: {n}");
    tracing::debug!("Time duration: {duration}");
    tracing::debug!("Sampling frequency: {sampling_freq}");
    tracing::debug!("Window size: {nfft}");

    let mut planner = FftPlanner::new();
    let [x, y, z] = ACCEL_COLUMNS
        .map(|col| welch_psd(&mut planner, &samples.column(col), sampling_freq, nfft));
    CalibrationData::from_axes(x.freqs, x.power, y.power, z.power)
}
