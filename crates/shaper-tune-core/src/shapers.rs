// Input shaper catalog
//
// Closed-form impulse sequences for the common input shaper families.
// Each generator takes the shaper frequency and the damping ratio it is
// designed for and returns up to MAX_PULSE_LEN (amplitude, time) pulses.

use crate::error::CalibrateError;
use serde::{Deserialize, Serialize};
use std::{f64::consts::PI, fmt, str::FromStr};

pub const MAX_PULSE_LEN: usize = 5;
/// EI-family shapers target 1/20 residual vibration.
pub const SHAPER_VIBRATION_REDUCTION: f64 = 20.0;
pub const DEFAULT_DAMPING_RATIO: f64 = 0.1;

/// Impulse sequence produced by a shaper family.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shaper {
    amplitudes: [f64; MAX_PULSE_LEN],
    time_offsets: [f64; MAX_PULSE_LEN],
    len: usize,
}

impl Shaper {
    fn from_pulses<const N: usize>(amplitudes: [f64; N], time_offsets: [f64; N]) -> Self {
        const { assert!(N > 0 && N <= MAX_PULSE_LEN) };
        let mut shaper = Self {
            amplitudes: [0.0; MAX_PULSE_LEN],
            time_offsets: [0.0; MAX_PULSE_LEN],
            len: N,
        };
        shaper.amplitudes[..N].copy_from_slice(&amplitudes);
        shaper.time_offsets[..N].copy_from_slice(&time_offsets);
        shaper
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes[..self.len]
    }

    pub fn time_offsets(&self) -> &[f64] {
        &self.time_offsets[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of pulse amplitudes, used to normalize the shaper to unit gain.
    pub fn amplitude_sum(&self) -> f64 {
        self.amplitudes().iter().sum()
    }

    /// Time of the last pulse.
    pub fn duration(&self) -> f64 {
        self.time_offsets()[self.len - 1]
    }

    /// Iterate `(amplitude, time)` pairs.
    pub fn pulses(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.amplitudes()
            .iter()
            .copied()
            .zip(self.time_offsets().iter().copied())
    }
}

/// The shaper families known to the calibrator, in catalog order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaperKind {
    #[serde(rename = "zv")]
    Zv,
    #[serde(rename = "mzv")]
    Mzv,
    #[serde(rename = "zvd")]
    Zvd,
    #[serde(rename = "ei")]
    Ei,
    #[serde(rename = "2hump_ei")]
    TwoHumpEi,
    #[serde(rename = "3hump_ei")]
    ThreeHumpEi,
}

impl ShaperKind {
    pub const ALL: [ShaperKind; 6] = [
        ShaperKind::Zv,
        ShaperKind::Mzv,
        ShaperKind::Zvd,
        ShaperKind::Ei,
        ShaperKind::TwoHumpEi,
        ShaperKind::ThreeHumpEi,
    ];

    /// Families evaluated by auto-tuning unless configured otherwise.
    pub const AUTOTUNE: [ShaperKind; 5] = [
        ShaperKind::Zv,
        ShaperKind::Mzv,
        ShaperKind::Ei,
        ShaperKind::TwoHumpEi,
        ShaperKind::ThreeHumpEi,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ShaperKind::Zv => "zv",
            ShaperKind::Mzv => "mzv",
            ShaperKind::Zvd => "zvd",
            ShaperKind::Ei => "ei",
            ShaperKind::TwoHumpEi => "2hump_ei",
            ShaperKind::ThreeHumpEi => "3hump_ei",
        }
    }

    /// Lowest shaper frequency worth sweeping for this family, in Hz.
    pub const fn min_freq(self) -> f64 {
        match self {
            ShaperKind::Zv => 21.0,
            ShaperKind::Mzv => 23.0,
            ShaperKind::Zvd => 29.0,
            ShaperKind::Ei => 29.0,
            ShaperKind::TwoHumpEi => 39.0,
            ShaperKind::ThreeHumpEi => 48.0,
        }
    }

    pub fn generate(self, shaper_freq: f64, damping_ratio: f64) -> Shaper {
        match self {
            ShaperKind::Zv => zv_shaper(shaper_freq, damping_ratio),
            ShaperKind::Mzv => mzv_shaper(shaper_freq, damping_ratio),
            ShaperKind::Zvd => zvd_shaper(shaper_freq, damping_ratio),
            ShaperKind::Ei => ei_shaper(shaper_freq, damping_ratio),
            ShaperKind::TwoHumpEi => two_hump_ei_shaper(shaper_freq, damping_ratio),
            ShaperKind::ThreeHumpEi => three_hump_ei_shaper(shaper_freq, damping_ratio),
        }
    }
}

impl fmt::Display for ShaperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShaperKind {
    type Err = CalibrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ShaperKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| CalibrateError::UnknownShaper(s.to_string()))
    }
}

// Per-half-period decay K and damped period t_d
fn damped_params(shaper_freq: f64, damping_ratio: f64, decay_scale: f64) -> (f64, f64) {
    let df = (1.0 - damping_ratio * damping_ratio).sqrt();
    let k = (-decay_scale * damping_ratio * PI / df).exp();
    let t_d = 1.0 / (shaper_freq * df);
    (k, t_d)
}

fn zv_shaper(shaper_freq: f64, damping_ratio: f64) -> Shaper {
    let (k, t_d) = damped_params(shaper_freq, damping_ratio, 1.0);
    Shaper::from_pulses([1.0, k], [0.0, 0.5 * t_d])
}

fn zvd_shaper(shaper_freq: f64, damping_ratio: f64) -> Shaper {
    let (k, t_d) = damped_params(shaper_freq, damping_ratio, 1.0);
    Shaper::from_pulses([1.0, k, k * k], [0.0, 0.5 * t_d, t_d])
}

fn mzv_shaper(shaper_freq: f64, damping_ratio: f64) -> Shaper {
    let (k, t_d) = damped_params(shaper_freq, damping_ratio, 0.75);
    let a1 = 1.0 - 1.0 / 2f64.sqrt();
    let a2 = (2f64.sqrt() - 1.0) * k;
    let a3 = a1 * k * k;
    Shaper::from_pulses([a1, a2, a3], [0.0, 0.375 * t_d, 0.75 * t_d])
}

fn ei_shaper(shaper_freq: f64, damping_ratio: f64) -> Shaper {
    let v_tol = 1.0 / SHAPER_VIBRATION_REDUCTION;
    let (k, t_d) = damped_params(shaper_freq, damping_ratio, 1.0);
    let a1 = 0.25 * (1.0 + v_tol);
    let a2 = 0.5 * (1.0 - v_tol) * k;
    let a3 = a1 * k * k;
    Shaper::from_pulses([a1, a2, a3], [0.0, 0.5 * t_d, t_d])
}

fn two_hump_ei_shaper(shaper_freq: f64, damping_ratio: f64) -> Shaper {
    let v_tol = 1.0 / SHAPER_VIBRATION_REDUCTION;
    let (k, t_d) = damped_params(shaper_freq, damping_ratio, 1.0);
    let v2 = v_tol * v_tol;
    let x = (v2 * ((1.0 - v2).sqrt() + 1.0)).cbrt();
    let a1 = (3.0 * x * x + 2.0 * x + 3.0 * v2) / (16.0 * x);
    let a2 = (0.5 - a1) * k;
    let a3 = a2 * k;
    let a4 = a1 * k * k * k;
    Shaper::from_pulses([a1, a2, a3, a4], [0.0, 0.5 * t_d, t_d, 1.5 * t_d])
}

fn three_hump_ei_shaper(shaper_freq: f64, damping_ratio: f64) -> Shaper {
    let v_tol = 1.0 / SHAPER_VIBRATION_REDUCTION;
    let (k, t_d) = damped_params(shaper_freq, damping_ratio, 1.0);
    let k2 = k * k;
    let a1 = 0.0625 * (1.0 + 3.0 * v_tol + 2.0 * (2.0 * (v_tol + 1.0) * v_tol).sqrt());
    let a2 = 0.25 * (1.0 - v_tol) * k;
    let a3 = (0.5 * (1.0 + v_tol) - 2.0 * a1) * k2;
    let a4 = a2 * k2;
    let a5 = a1 * k2 * k2;
    Shaper::from_pulses(
        [a1, a2, a3, a4, a5],
        [0.0, 0.5 * t_d, t_d, 1.5 * t_d, 2.0 * t_d],
    )
}
