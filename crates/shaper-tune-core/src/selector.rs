//! Shaper frequency sweep and cross-family selection.
//!
//! For every enabled shaper family the candidate frequencies are walked from
//! the top of the range down. Each candidate is scored on its worst-case
//! residual vibration over a few damping ratios and on the smoothing it
//! introduces. Candidates are plain owned values: whatever is not kept as
//! the family's result is dropped with its per-bin profile.

use crate::{
    calibration_data::{Axis, CalibrationData, MAX_FREQ},
    error::{CalibrateError, Result},
    shapers::{DEFAULT_DAMPING_RATIO, Shaper, ShaperKind},
    vibration::{estimate_remaining_vibrations, find_shaper_max_accel, get_shaper_smoothing},
};
use serde::{Deserialize, Serialize};

/// Highest shaper frequency considered, in Hz.
pub const MAX_SHAPER_FREQ: f64 = 150.0;
/// Distance between candidate shaper frequencies, in Hz.
pub const SHAPER_FREQ_STEP: f64 = 0.2;
/// Damping ratios every candidate is stress-tested against.
pub const TEST_DAMPING_RATIOS: [f64; 3] = [0.075, 0.1, 0.15];
/// Acceleration and square corner velocity smoothing is compared at.
const SCORING_ACCEL: f64 = 5000.0;
const SCORING_SCV: f64 = 5.0;
/// `max_smoothing` values at or below this disable the smoothing cap.
const SMOOTHING_EPSILON: f64 = 1e-6;

/// Knobs for [`find_best_shaper`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrateOptions {
    /// Upper bound on shaper smoothing. Zero or less disables the bound.
    #[serde(default)]
    pub max_smoothing: f64,

    /// PSD the shapers are fitted against.
    #[serde(default)]
    pub axis: Axis,

    /// Families to evaluate. Evaluation follows catalog order regardless of
    /// the order given here.
    #[serde(default = "default_shapers")]
    pub shapers: Vec<ShaperKind>,
}

impl Default for CalibrateOptions {
    fn default() -> Self {
        Self {
            max_smoothing: 0.0,
            axis: Axis::All,
            shapers: default_shapers(),
        }
    }
}

fn default_shapers() -> Vec<ShaperKind> {
    ShaperKind::AUTOTUNE.to_vec()
}

/// Best parameters found for one shaper family.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub shaper: ShaperKind,
    pub freq: f64,
    /// Worst-case residual amplitude per frequency bin.
    #[serde(skip)]
    pub vals: Vec<f64>,
    pub vibrs: f64,
    pub smoothing: f64,
    pub score: f64,
    pub max_accel: f64,
}

impl CalibrationResult {
    pub fn name(&self) -> &'static str {
        self.shaper.name()
    }
}

/// Outcome of [`find_best_shaper`]: one result per evaluated family and the
/// index of the recommended one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationResults {
    all_shapers: Vec<CalibrationResult>,
    best_index: usize,
}

impl CalibrationResults {
    /// Assemble results from already fitted families. `best_index` must point
    /// into `all_shapers`.
    pub fn from_parts(all_shapers: Vec<CalibrationResult>, best_index: usize) -> Result<Self> {
        if best_index >= all_shapers.len() {
            return Err(CalibrateError::NoShapers);
        }
        Ok(Self {
            all_shapers,
            best_index,
        })
    }

    pub fn best(&self) -> &CalibrationResult {
        &self.all_shapers[self.best_index]
    }

    pub fn all_shapers(&self) -> &[CalibrationResult] {
        &self.all_shapers
    }
}

/// Candidate shaper frequencies for `shaper`, ascending.
pub fn test_frequencies(shaper: ShaperKind) -> Vec<f64> {
    let min_freq = shaper.min_freq();
    if min_freq > MAX_SHAPER_FREQ {
        return Vec::new();
    }
    let count = ((MAX_SHAPER_FREQ - min_freq) / SHAPER_FREQ_STEP + 1e-9).floor() as usize + 1;
    (0..count)
        .map(|i| min_freq + i as f64 * SHAPER_FREQ_STEP)
        .collect()
}

fn evaluate_candidate(
    shaper_kind: ShaperKind,
    shaper: &Shaper,
    test_freq: f64,
    shaper_smoothing: f64,
    freq_bins: &[f64],
    psd: &[f64],
) -> CalibrationResult {
    let mut shaper_vals = vec![0.0_f64; freq_bins.len()];
    let mut shaper_vibrations: f64 = 0.0;
    for damping_ratio in TEST_DAMPING_RATIOS {
        let estimate = estimate_remaining_vibrations(shaper, damping_ratio, freq_bins, psd);
        for (max, val) in shaper_vals.iter_mut().zip(&estimate.vals) {
            *max = max.max(*val);
        }
        shaper_vibrations = shaper_vibrations.max(estimate.ratio);
    }
    let max_accel = find_shaper_max_accel(shaper);
    let shaper_score = shaper_smoothing
        * (shaper_vibrations.powf(1.5) + shaper_vibrations * 0.2 + 0.01);
    CalibrationResult {
        shaper: shaper_kind,
        freq: test_freq,
        vals: shaper_vals,
        vibrs: shaper_vibrations,
        smoothing: shaper_smoothing,
        score: shaper_score,
        max_accel,
    }
}

/// Sweep the frequencies of one shaper family against `psd` and return its
/// best candidate, or `None` when the family has no candidate frequencies.
///
/// The candidate with the least residual vibration is the starting choice; a
/// candidate with less than 10% more vibration and a lower score replaces
/// it. With a smoothing cap, the sweep stops at the first candidate over the
/// cap once a best exists, returning the least-vibration candidate so far.
pub fn fit_shaper(
    shaper_kind: ShaperKind,
    freq_bins: &[f64],
    psd: &[f64],
    max_smoothing: f64,
) -> Option<CalibrationResult> {
    let cap = (max_smoothing > SMOOTHING_EPSILON).then_some(max_smoothing);
    let test_freqs = test_frequencies(shaper_kind);
    let mut results: Vec<CalibrationResult> = Vec::with_capacity(test_freqs.len());
    let mut best: Option<usize> = None;

    for &test_freq in test_freqs.iter().rev() {
        let shaper = shaper_kind.generate(test_freq, DEFAULT_DAMPING_RATIO);
        let shaper_smoothing = get_shaper_smoothing(&shaper, SCORING_ACCEL, SCORING_SCV);
        match (cap, best) {
            (Some(cap), Some(best_idx)) if shaper_smoothing > cap => {
                tracing::debug!(
                    "{shaper_kind}: smoothing {shaper_smoothing:.4} over {cap} at {test_freq:.1} Hz, \
                     stopping after {} candidates",
                    results.len()
                );
                return Some(results.swap_remove(best_idx));
            }
            _ => {}
        }

        let candidate = evaluate_candidate(
            shaper_kind,
            &shaper,
            test_freq,
            shaper_smoothing,
            freq_bins,
            psd,
        );
        if best.is_none_or(|idx| results[idx].vibrs > candidate.vibrs) {
            best = Some(results.len());
        }
        results.push(candidate);
    }

    let selected = select_lower_score(&results, best?);
    Some(results.swap_remove(selected))
}

/// Index of the lowest-score candidate whose vibrations stay within 10% of
/// `results[best_idx]`, scanning in order; `best_idx` when none improves.
fn select_lower_score(results: &[CalibrationResult], best_idx: usize) -> usize {
    let best_vibrs = results[best_idx].vibrs;
    let mut selected = best_idx;
    for (idx, result) in results.iter().enumerate() {
        if result.vibrs < best_vibrs * 1.1 && result.score < results[selected].score {
            selected = idx;
        }
    }
    selected
}

/// Whether a later family's `candidate` takes over the recommendation.
fn replaces_best(candidate: &CalibrationResult, best: &CalibrationResult) -> bool {
    candidate.score * 1.2 < best.score
        || (candidate.score * 1.05 < best.score && candidate.smoothing * 1.1 < best.smoothing)
}

/// Fit every enabled shaper family to the calibration data and pick the
/// recommended one.
///
/// The record is first restricted to bins at or below 200 Hz. A later family
/// replaces the current recommendation when its score is 1.2 times lower, or
/// when its score is 1.05 times lower and its smoothing 1.1 times lower.
pub fn find_best_shaper(
    calibration_data: &mut CalibrationData,
    options: &CalibrateOptions,
) -> Result<CalibrationResults> {
    calibration_data.truncate_to_frequency(MAX_FREQ);
    if calibration_data.is_empty() {
        return Err(CalibrateError::EmptyCalibrationData);
    }
    let freq_bins = calibration_data.freq_bins();
    let psd = calibration_data.psd(options.axis);

    let mut all_shapers: Vec<CalibrationResult> = Vec::new();
    let mut best_index: Option<usize> = None;
    for shaper_kind in ShaperKind::ALL {
        if !options.shapers.contains(&shaper_kind) {
            continue;
        }
        let Some(result) = fit_shaper(shaper_kind, freq_bins, psd, options.max_smoothing) else {
            tracing::warn!("{shaper_kind}: no candidate frequencies below {MAX_SHAPER_FREQ} Hz");
            continue;
        };
        tracing::info!(
            "Fitted shaper '{}' frequency = {:.1} Hz (vibrations = {:.1}%, smoothing ~= {:.3}, \
             score = {:.4}, max_accel = {:.0} mm/sec^2)",
            result.name(),
            result.freq,
            result.vibrs * 100.0,
            result.smoothing,
            result.score,
            result.max_accel
        );

        if best_index.is_none_or(|idx| replaces_best(&result, &all_shapers[idx])) {
            best_index = Some(all_shapers.len());
        }
        all_shapers.push(result);
    }

    let best_index = best_index.ok_or(CalibrateError::NoShapers)?;
    let best = &all_shapers[best_index];
    tracing::info!("Recommended shaper is {} @ {:.1} Hz", best.name(), best.freq);
    Ok(CalibrationResults {
        all_shapers,
        best_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resonance_psd(center: f64) -> (Vec<f64>, Vec<f64>) {
        let freq_bins: Vec<f64> = (0..=100).map(|i| i as f64 * 2.0).collect();
        let psd = freq_bins
            .iter()
            .map(|f| {
                let d = (f - center) / 4.0;
                1000.0 * (-d * d).exp()
            })
            .collect();
        (freq_bins, psd)
    }

    fn scored(freq: f64, vibrs: f64, smoothing: f64, score: f64) -> CalibrationResult {
        CalibrationResult {
            shaper: ShaperKind::Zv,
            freq,
            vals: Vec::new(),
            vibrs,
            smoothing,
            score,
            max_accel: 0.0,
        }
    }

    fn sweep(kind: ShaperKind, freq_bins: &[f64], psd: &[f64]) -> Vec<CalibrationResult> {
        test_frequencies(kind)
            .iter()
            .rev()
            .map(|&freq| {
                let shaper = kind.generate(freq, DEFAULT_DAMPING_RATIO);
                let smoothing = get_shaper_smoothing(&shaper, SCORING_ACCEL, SCORING_SCV);
                evaluate_candidate(kind, &shaper, freq, smoothing, freq_bins, psd)
            })
            .collect()
    }

    #[test]
    fn test_frequencies_span_to_max() {
        let freqs = test_frequencies(ShaperKind::Zv);
        assert_eq!(freqs[0], 21.0);
        assert_eq!(freqs.len(), 646);
        assert!((freqs[freqs.len() - 1] - MAX_SHAPER_FREQ).abs() < 1e-9);
    }

    #[test]
    fn fit_shaper_tracks_the_resonance() {
        let (freq_bins, psd) = resonance_psd(60.0);
        let result = fit_shaper(ShaperKind::Mzv, &freq_bins, &psd, 0.0).unwrap();
        assert_eq!(result.shaper, ShaperKind::Mzv);
        assert_eq!(result.vals.len(), freq_bins.len());
        assert!(result.vibrs < 0.1, "{}", result.vibrs);
        assert!(result.freq > 40.0 && result.freq < 100.0, "{}", result.freq);
        let expected =
            result.smoothing * (result.vibrs.powf(1.5) + result.vibrs * 0.2 + 0.01);
        assert!((result.score - expected).abs() < 1e-15);
    }

    #[test]
    fn smoothing_cap_bounds_the_result() {
        let (freq_bins, psd) = resonance_psd(30.0);
        let capped = fit_shaper(ShaperKind::Ei, &freq_bins, &psd, 0.12).unwrap();
        assert!(capped.smoothing <= 0.12, "{}", capped.smoothing);
        let shaper = ShaperKind::Ei.generate(capped.freq, DEFAULT_DAMPING_RATIO);
        assert_eq!(
            get_shaper_smoothing(&shaper, SCORING_ACCEL, SCORING_SCV),
            capped.smoothing
        );
    }

    #[test]
    fn cap_over_first_candidate_still_returns_it() {
        let (freq_bins, psd) = resonance_psd(60.0);
        let result = fit_shaper(ShaperKind::ThreeHumpEi, &freq_bins, &psd, 1e-5).unwrap();
        let top = *test_frequencies(ShaperKind::ThreeHumpEi).last().unwrap();
        assert_eq!(result.freq, top);
    }

    #[test]
    fn lower_score_within_vibration_margin_is_selected() {
        let results = [
            scored(60.0, 0.105, 0.05, 0.8),
            scored(50.0, 0.100, 0.10, 1.0),
            scored(40.0, 0.120, 0.02, 0.1),
            scored(30.0, 0.109, 0.04, 0.6),
        ];
        assert_eq!(select_lower_score(&results, 1), 3);

        let results = [
            scored(60.0, 0.111, 0.05, 0.8),
            scored(50.0, 0.100, 0.10, 1.0),
        ];
        assert_eq!(select_lower_score(&results, 1), 1);
    }

    #[test]
    fn fit_shaper_trades_vibration_margin_for_score() {
        // A lone low-frequency peak is damped more by lower shaper
        // frequencies, which smooth more.
        let freq_bins = [0.0, 6.0, 12.0];
        let psd = [0.0, 1.0, 0.0];
        let candidates = sweep(ShaperKind::Zv, &freq_bins, &psd);
        let least_vibration = candidates
            .iter()
            .reduce(|best, c| if best.vibrs > c.vibrs { c } else { best })
            .unwrap();

        let result = fit_shaper(ShaperKind::Zv, &freq_bins, &psd, 0.0).unwrap();
        assert_ne!(result.freq, least_vibration.freq);
        assert!(result.vibrs > least_vibration.vibrs);
        assert!(result.vibrs < least_vibration.vibrs * 1.1);
        assert!(result.score < least_vibration.score);
        let lowest_eligible = candidates
            .iter()
            .filter(|c| c.vibrs < least_vibration.vibrs * 1.1)
            .map(|c| c.score)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.score, lowest_eligible);
    }

    #[test]
    fn replacement_needs_a_clearly_better_score() {
        let best = scored(50.0, 0.05, 0.10, 1.0);
        assert!(replaces_best(&scored(60.0, 0.05, 0.20, 0.8), &best));
        assert!(!replaces_best(&scored(60.0, 0.05, 0.20, 0.85), &best));
    }

    #[test]
    fn replacement_accepts_smaller_gain_with_less_smoothing() {
        let best = scored(50.0, 0.05, 0.10, 1.0);
        assert!(replaces_best(&scored(60.0, 0.05, 0.09, 0.9), &best));
        // Score 1.05 times lower but smoothing only 5% lower.
        assert!(!replaces_best(&scored(60.0, 0.05, 0.095, 0.9), &best));
        // Smoothing much lower but score gain under 5%.
        assert!(!replaces_best(&scored(60.0, 0.05, 0.01, 0.96), &best));
    }

    #[test]
    fn find_best_shaper_reports_each_enabled_family() {
        let (freq_bins, psd) = resonance_psd(45.0);
        let zeros = vec![0.0; psd.len()];
        let mut data =
            CalibrationData::from_axes(freq_bins, psd, zeros.clone(), zeros).unwrap();
        let results = find_best_shaper(&mut data, &CalibrateOptions::default()).unwrap();
        let names: Vec<&str> = results.all_shapers().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["zv", "mzv", "ei", "2hump_ei", "3hump_ei"]);
        assert!(results.all_shapers().contains(results.best()));
        assert_eq!(data.len(), 101);
    }

    #[test]
    fn find_best_shaper_follows_catalog_order() {
        let (freq_bins, psd) = resonance_psd(45.0);
        let zeros = vec![0.0; psd.len()];
        let mut data =
            CalibrationData::from_axes(freq_bins, psd, zeros.clone(), zeros).unwrap();
        let options = CalibrateOptions {
            shapers: vec![ShaperKind::Ei, ShaperKind::Zvd, ShaperKind::Zv],
            ..CalibrateOptions::default()
        };
        let results = find_best_shaper(&mut data, &options).unwrap();
        let names: Vec<&str> = results.all_shapers().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["zv", "zvd", "ei"]);
    }

    #[test]
    fn find_best_shaper_rejects_empty_inputs() {
        let mut empty = CalibrationData::empty();
        assert!(matches!(
            find_best_shaper(&mut empty, &CalibrateOptions::default()),
            Err(CalibrateError::EmptyCalibrationData)
        ));

        let (freq_bins, psd) = resonance_psd(45.0);
        let zeros = vec![0.0; psd.len()];
        let mut data =
            CalibrationData::from_axes(freq_bins, psd, zeros.clone(), zeros).unwrap();
        let options = CalibrateOptions {
            shapers: Vec::new(),
            ..CalibrateOptions::default()
        };
        assert!(matches!(
            find_best_shaper(&mut data, &options),
            Err(CalibrateError::NoShapers)
        ));
    }
}
