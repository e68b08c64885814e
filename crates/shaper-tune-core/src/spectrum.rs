//! Power spectral density estimation with Welch's method.
//!
//! A signal is cut into half-overlapping blocks of `nfft` samples, each block
//! is detrended and windowed, transformed with a forward FFT, and the
//! one-sided power of every block is averaged per frequency bin.

use rustfft::{FftPlanner, num_complex::Complex64};
use std::f64::consts::PI;

/// Length of one Welch block in seconds.
pub const WINDOW_T_SEC: f64 = 0.5;
/// Exponent of the raised-cosine window.
const WINDOW_POWER: i32 = 6;

/// One-sided power spectral density of a single signal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Psd {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
}

impl Psd {
    pub fn len(&self) -> usize {
        self.power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }
}

/// Smallest power of two not below `sampling_freq * WINDOW_T_SEC`, at least
/// 2. `None` when the window would not fit in a `usize`.
pub fn window_size(sampling_freq: f64) -> Option<usize> {
    let span = (sampling_freq * WINDOW_T_SEC).ceil();
    if !span.is_finite() || span >= usize::MAX as f64 {
        return None;
    }
    if span > 2.0 {
        (span as usize).checked_next_power_of_two()
    } else {
        Some(2)
    }
}

/// Generalized Hann window `(0.5 * (1 - cos(2 pi i / (n - 1))))^6`.
pub fn raised_cosine_window(nfft: usize) -> Vec<f64> {
    let denom = (nfft.max(2) - 1) as f64;
    (0..nfft)
        .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos())).powi(WINDOW_POWER))
        .collect()
}

/// Cut `x` into blocks of `window_size` samples, each starting
/// `window_size - overlap` samples after the previous one. Samples past the
/// end of `x` are zero.
pub fn split_into_windows(x: &[f64], window_size: usize, overlap: usize) -> Vec<Vec<f64>> {
    let step = window_size - overlap;
    if step == 0 || x.len() < overlap {
        return Vec::new();
    }
    let count = (x.len() - overlap) / step;
    (0..count)
        .map(|w| {
            let start = w * step;
            (0..window_size)
                .map(|j| x.get(start + j).copied().unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// Welch estimate of the one-sided PSD of `x` sampled at `sampling_freq`.
///
/// Returns `nfft / 2 + 1` bins from DC to Nyquist, with bin `i` at
/// `i * sampling_freq / nfft`.
pub fn welch_psd(
    planner: &mut FftPlanner<f64>,
    x: &[f64],
    sampling_freq: f64,
    nfft: usize,
) -> Psd {
    let window = raised_cosine_window(nfft);
    let scale = 1.0 / window.iter().map(|w| w * w).sum::<f64>();
    let blocks = split_into_windows(x, nfft, nfft / 2);
    let bins = nfft / 2 + 1;
    let freqs: Vec<f64> = (0..bins)
        .map(|i| i as f64 * sampling_freq / nfft as f64)
        .collect();
    if blocks.is_empty() {
        return Psd {
            power: vec![0.0; bins],
            freqs,
        };
    }

    let fft = planner.plan_fft_forward(nfft);
    let mut buffer = vec![Complex64::new(0.0, 0.0); nfft];
    let mut power = vec![0.0; bins];
    for block in &blocks {
        let mean = block.iter().sum::<f64>() / nfft as f64;
        for ((slot, &sample), &w) in buffer.iter_mut().zip(block).zip(&window) {
            *slot = Complex64::new(w * (sample - mean), 0.0);
        }
        fft.process(&mut buffer);
        for (acc, bin) in power.iter_mut().zip(&buffer) {
            *acc += bin.norm_sqr() * 2.0 * scale / sampling_freq;
        }
    }

    let n_blocks = blocks.len() as f64;
    for acc in &mut power {
        *acc /= n_blocks;
    }
    Psd { freqs, power }
}
