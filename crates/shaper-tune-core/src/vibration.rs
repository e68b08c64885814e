// Residual vibration, smoothing and acceleration limits of a shaper

use crate::shapers::{SHAPER_VIBRATION_REDUCTION, Shaper};
use std::f64::consts::{PI, SQRT_2};

/// Smoothing the max-acceleration search must stay under.
pub const TARGET_SMOOTHING: f64 = 0.12;
/// Square corner velocity used when estimating smoothing.
pub const SMOOTHING_SCV: f64 = 5.0;
/// Bisection stops once the bracket is narrower than this.
const BISECT_TOLERANCE: f64 = 1e-8;

/// Remaining vibration of a shaper against a PSD.
#[derive(Clone, Debug, PartialEq)]
pub struct VibrationEstimate {
    /// Fraction of the above-threshold energy left after shaping.
    pub ratio: f64,
    /// Per-bin residual amplitude of the shaper.
    pub vals: Vec<f64>,
}

/// Residual vibration amplitude of `shaper` at each of `test_freqs`, for a
/// system with `damping_ratio`. 1.0 means no reduction.
pub fn estimate_shaper(shaper: &Shaper, damping_ratio: f64, test_freqs: &[f64]) -> Vec<f64> {
    let inv_d = 1.0 / shaper.amplitude_sum();
    let t_last = shaper.duration();
    let df = (1.0 - damping_ratio * damping_ratio).sqrt();
    test_freqs
        .iter()
        .map(|&freq| {
            let omega = 2.0 * PI * freq;
            let damping = damping_ratio * omega;
            let omega_d = omega * df;
            let (mut sum_s, mut sum_c) = (0.0, 0.0);
            for (a, t) in shaper.pulses() {
                let w = a * (-damping * (t_last - t)).exp();
                sum_s += w * (omega_d * t).sin();
                sum_c += w * (omega_d * t).cos();
            }
            (sum_s * sum_s + sum_c * sum_c).sqrt() * inv_d
        })
        .collect()
}

/// Estimate how much of the vibration energy in `psd` is left once `shaper`
/// is applied.
///
/// A shaper can only reduce vibrations by [`SHAPER_VIBRATION_REDUCTION`], so
/// energy below `max(psd) / 20` is treated as noise on both sides of the
/// ratio.
pub fn estimate_remaining_vibrations(
    shaper: &Shaper,
    damping_ratio: f64,
    freq_bins: &[f64],
    psd: &[f64],
) -> VibrationEstimate {
    debug_assert_eq!(freq_bins.len(), psd.len());
    let vals = estimate_shaper(shaper, damping_ratio, freq_bins);
    let vibr_threshold = psd.iter().copied().fold(0.0, f64::max) / SHAPER_VIBRATION_REDUCTION;

    let remaining: f64 = vals
        .iter()
        .zip(psd)
        .map(|(v, p)| (v * p - vibr_threshold).max(0.0))
        .sum();
    let all: f64 = psd.iter().map(|p| (p - vibr_threshold).max(0.0)).sum();

    let ratio = if all > 0.0 { remaining / all } else { 0.0 };
    VibrationEstimate { ratio, vals }
}

/// Positional smoothing `shaper` introduces at `accel` with square corner
/// velocity `scv`. The larger of the 90 and 180 degree offsets is returned.
pub fn get_shaper_smoothing(shaper: &Shaper, accel: f64, scv: f64) -> f64 {
    let half_accel = accel * 0.5;
    let inv_d = 1.0 / shaper.amplitude_sum();
    let ts = shaper.pulses().map(|(a, t)| a * t).sum::<f64>() * inv_d;

    let mut offset_90 = 0.0;
    let mut offset_180 = 0.0;
    for (a, t) in shaper.pulses() {
        let dt = t - ts;
        if t >= ts {
            offset_90 += a * (scv + half_accel * dt) * dt;
        }
        offset_180 += a * half_accel * dt * dt;
    }
    offset_90 *= inv_d * SQRT_2;
    offset_180 *= inv_d;
    offset_90.max(offset_180)
}

/// Largest value for which the monotonically decreasing predicate holds.
///
/// The bracket starts at 1.0, is halved until the predicate holds, or doubled
/// while it does, then refined by bisection. Returns 0.0 when the predicate
/// never holds and the upper end when it never fails.
pub fn bisect(mut holds: impl FnMut(f64) -> bool) -> f64 {
    let mut left = 1.0;
    let mut right = 1.0;
    while !holds(left) {
        right = left;
        left *= 0.5;
        if left == 0.0 {
            return 0.0;
        }
    }
    if left == right {
        while holds(right) {
            right *= 2.0;
            if !right.is_finite() {
                return f64::MAX;
            }
        }
    }
    while right - left > BISECT_TOLERANCE {
        let middle = (left + right) * 0.5;
        if holds(middle) {
            left = middle;
        } else {
            right = middle;
        }
    }
    left
}

/// Highest acceleration keeping the shaper's smoothing within
/// [`TARGET_SMOOTHING`].
pub fn find_shaper_max_accel(shaper: &Shaper) -> f64 {
    bisect(|accel| get_shaper_smoothing(shaper, accel, SMOOTHING_SCV) <= TARGET_SMOOTHING)
}
