use shaper_tune_core::{
    Axis, CalibrateOptions, CalibrationData, Matrix, ShaperKind, find_best_shaper,
    process_accelerometer_data, vibration::estimate_shaper,
};
use std::f64::consts::PI;

const SAMPLE_RATE: f64 = 1000.0;

fn sine_capture(freq: f64, samples: usize) -> Matrix {
    let mut matrix = Matrix::with_capacity(samples, 4);
    for i in 0..samples {
        let t = i as f64 / SAMPLE_RATE;
        let x = 1000.0 * (2.0 * PI * freq * t).sin();
        matrix.push_row(&[t, x, 0.0, 0.0]).unwrap();
    }
    matrix
}

fn peak_frequency(data: &CalibrationData, axis: Axis) -> f64 {
    let psd = data.psd(axis);
    let mut peak = 0;
    for i in 0..psd.len() {
        if psd[i] > psd[peak] {
            peak = i;
        }
    }
    data.freq_bins()[peak]
}

/// Pulse amplitudes and times of `kind` tuned to `shaper_freq` with damping
/// 0.1, written out from the textbook formulas.
fn pulses(kind: ShaperKind, shaper_freq: f64) -> (Vec<f64>, Vec<f64>) {
    let zeta: f64 = 0.1;
    let df = (1.0 - zeta * zeta).sqrt();
    let t_d = 1.0 / (shaper_freq * df);
    let k = (-zeta * PI / df).exp();
    let v: f64 = 0.05;
    match kind {
        ShaperKind::Zv => (vec![1.0, k], vec![0.0, 0.5 * t_d]),
        ShaperKind::Zvd => (vec![1.0, k, k * k], vec![0.0, 0.5 * t_d, t_d]),
        ShaperKind::Mzv => {
            let k = (-0.75 * zeta * PI / df).exp();
            let a1 = 1.0 - 0.5 * 2f64.sqrt();
            (
                vec![a1, (2f64.sqrt() - 1.0) * k, a1 * k * k],
                vec![0.0, 0.375 * t_d, 0.75 * t_d],
            )
        }
        ShaperKind::Ei => {
            let a1 = 0.25 * (1.0 + v);
            (
                vec![a1, 0.5 * (1.0 - v) * k, a1 * k * k],
                vec![0.0, 0.5 * t_d, t_d],
            )
        }
        ShaperKind::TwoHumpEi => {
            let x = (v * v * ((1.0 - v * v).sqrt() + 1.0)).cbrt();
            let a1 = (3.0 * x * x + 2.0 * x + 3.0 * v * v) / (16.0 * x);
            let a2 = (0.5 - a1) * k;
            (
                vec![a1, a2, a2 * k, a1 * k.powi(3)],
                vec![0.0, 0.5 * t_d, t_d, 1.5 * t_d],
            )
        }
        ShaperKind::ThreeHumpEi => {
            let a1 = 0.0625 * (1.0 + 3.0 * v + 2.0 * (2.0 * (v + 1.0) * v).sqrt());
            let a2 = 0.25 * (1.0 - v) * k;
            let a3 = (0.5 * (1.0 + v) - 2.0 * a1) * k.powi(2);
            (
                vec![a1, a2, a3, a2 * k.powi(2), a1 * k.powi(4)],
                vec![0.0, 0.5 * t_d, t_d, 1.5 * t_d, 2.0 * t_d],
            )
        }
    }
}

fn closed_form_response(kind: ShaperKind, shaper_freq: f64, freq: f64, damping_ratio: f64) -> f64 {
    let (amplitudes, times) = pulses(kind, shaper_freq);
    let t_last = times[times.len() - 1];
    let omega = 2.0 * PI * freq;
    let omega_d = omega * (1.0 - damping_ratio * damping_ratio).sqrt();
    let mut re = 0.0;
    let mut im = 0.0;
    for (a, t) in amplitudes.iter().zip(&times) {
        let w = a * (-damping_ratio * omega * (t_last - t)).exp();
        re += w * (omega_d * t).cos();
        im += w * (omega_d * t).sin();
    }
    re.hypot(im) / amplitudes.iter().sum::<f64>()
}

/// Share of the PSD energy above the noise floor left after shaping, worst
/// case over the tested damping ratios.
fn closed_form_vibrations(
    kind: ShaperKind,
    shaper_freq: f64,
    freq_bins: &[f64],
    psd: &[f64],
) -> f64 {
    let threshold = psd.iter().copied().fold(0.0, f64::max) / 20.0;
    let all: f64 = psd.iter().map(|p| (p - threshold).max(0.0)).sum();
    [0.075, 0.1, 0.15]
        .into_iter()
        .map(|damping_ratio| {
            let remaining: f64 = freq_bins
                .iter()
                .zip(psd)
                .map(|(&f, p)| {
                    let v = closed_form_response(kind, shaper_freq, f, damping_ratio);
                    (v * p - threshold).max(0.0)
                })
                .sum();
            remaining / all
        })
        .fold(0.0, f64::max)
}

#[test]
fn sine_capture_peaks_at_its_frequency() {
    let capture = sine_capture(50.0, 20_000);
    let data = process_accelerometer_data(capture.view()).unwrap();
    assert!(!data.is_empty());
    assert_eq!(data.freq_bins().len(), data.psd_x().len());
    assert_eq!(data.psd_sum(), data.psd_x());
    assert!(data.psd_x().iter().all(|p| *p >= 0.0));

    let spacing = data.freq_bins()[1] - data.freq_bins()[0];
    let peak = peak_frequency(&data, Axis::X);
    assert!((peak - 50.0).abs() <= spacing, "peak at {peak} Hz");
}

#[test]
fn recommended_shaper_damps_the_resonance() {
    let capture = sine_capture(50.0, 20_000);
    let mut data = process_accelerometer_data(capture.view()).unwrap();
    data.normalize_to_frequencies();

    let results = find_best_shaper(&mut data, &CalibrateOptions::default()).unwrap();
    let best = results.best();
    assert!(best.vibrs < 0.2, "{} left {}", best.name(), best.vibrs);
    assert!(best.freq >= 25.0 && best.freq <= 150.0, "{}", best.freq);
    assert_eq!(results.all_shapers().len(), ShaperKind::AUTOTUNE.len());
    assert!(data.freq_bins().iter().all(|f| *f <= 200.0));

    let shaper = best.shaper.generate(best.freq, 0.1);
    let response = estimate_shaper(&shaper, 0.1, &[50.0])[0];
    let expected = closed_form_response(best.shaper, best.freq, 50.0, 0.1);
    assert!((response - expected).abs() < 1e-12, "{response} vs {expected}");

    for result in results.all_shapers() {
        let expected =
            closed_form_vibrations(result.shaper, result.freq, data.freq_bins(), data.psd_sum());
        assert!(
            (result.vibrs - expected).abs() < 1e-9,
            "{}: {} vs {expected}",
            result.name(),
            result.vibrs
        );
    }
}

#[test]
fn short_capture_yields_empty_record() {
    let capture = sine_capture(50.0, 100);
    let data = process_accelerometer_data(capture.view()).unwrap();
    assert!(data.is_empty());
    assert_eq!(data.len(), 0);
}

#[test]
fn merging_a_copy_keeps_values() {
    let capture = sine_capture(50.0, 4_000);
    let mut data = process_accelerometer_data(capture.view()).unwrap();
    let copy = data.clone();
    data.add_data(&copy).unwrap();
    assert_eq!(data.data_sets(), 2);
    assert_eq!(data.psd_x(), copy.psd_x());
    assert_eq!(data.psd_sum(), copy.psd_sum());
}

#[test]
fn merging_three_records_is_their_mean() {
    let freqs = vec![0.0, 10.0, 20.0, 30.0];
    let make = |scale: f64| {
        CalibrationData::from_axes(
            freqs.clone(),
            freqs.iter().map(|f| scale * (f + 1.0)).collect(),
            vec![scale; 4],
            vec![0.5 * scale; 4],
        )
        .unwrap()
    };
    let (a, b, c) = (make(1.0), make(2.0), make(6.0));

    let mut merged = a.clone();
    merged.add_data(&b).unwrap();
    merged.add_data(&c).unwrap();
    assert_eq!(merged.data_sets(), 3);

    for i in 0..freqs.len() {
        let mean_x = (a.psd_x()[i] + b.psd_x()[i] + c.psd_x()[i]) / 3.0;
        let mean_sum = (a.psd_sum()[i] + b.psd_sum()[i] + c.psd_sum()[i]) / 3.0;
        assert!((merged.psd_x()[i] - mean_x).abs() < 1e-12);
        assert!((merged.psd_sum()[i] - mean_sum).abs() < 1e-12);
    }
}

#[test]
fn merging_mismatched_records_fails() {
    let capture = sine_capture(50.0, 4_000);
    let mut data = process_accelerometer_data(capture.view()).unwrap();
    let short = CalibrationData::from_axes(vec![0.0], vec![1.0], vec![1.0], vec![1.0]).unwrap();
    let before = data.clone();
    assert!(data.add_data(&short).is_err());
    assert_eq!(data, before);
}

#[test]
fn batches_cover_the_capture() {
    let capture = sine_capture(50.0, 20_000);
    let mut merged: Option<CalibrationData> = None;
    for batch in capture.batches(5_000) {
        let data = process_accelerometer_data(batch).unwrap();
        match merged.as_mut() {
            Some(merged) => merged.add_data(&data).unwrap(),
            None => merged = Some(data),
        }
    }
    let merged = merged.unwrap();
    assert_eq!(merged.data_sets(), 4);
    let spacing = merged.freq_bins()[1] - merged.freq_bins()[0];
    assert!((peak_frequency(&merged, Axis::All) - 50.0).abs() <= spacing);
}
