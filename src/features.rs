//! Feature extraction
//!
//! Turns a full analysis window into a single scalar feature:
//! - amplitude: mean absolute value across all channels and frames
//! - spectral: relative beta band power via Welch's method, averaged across
//!   channels, expressed as beta / (theta + alpha)

use crate::buffer::SlidingWindowBuffer;
use crate::config::{BandConfig, FeatureStrategy, EPSILON};
use rustfft::{num_complex::Complex, FftPlanner};

/// Welch segment length cap; segments are `min(256, window length)` samples
const MAX_SEGMENT_LEN: usize = 256;

/// Extracts a scalar feature from the analysis window
#[derive(Debug, Clone)]
pub enum FeatureExtractor {
    Amplitude,
    Spectral { bands: BandConfig },
}

impl FeatureExtractor {
    pub fn new(strategy: FeatureStrategy) -> Self {
        match strategy {
            FeatureStrategy::Amplitude => FeatureExtractor::Amplitude,
            FeatureStrategy::Spectral { bands } => FeatureExtractor::Spectral { bands },
        }
    }

    /// Compute the feature over the current window contents
    pub fn extract(&self, window: &SlidingWindowBuffer, sample_rate_hz: f64) -> f64 {
        match self {
            FeatureExtractor::Amplitude => mean_absolute_amplitude(window),
            FeatureExtractor::Spectral { bands } => {
                beta_ratio(window, sample_rate_hz, bands)
            }
        }
    }
}

/// Mean of absolute values over every channel and frame in the window
fn mean_absolute_amplitude(window: &SlidingWindowBuffer) -> f64 {
    let count = window.len() * window.channels();
    if count == 0 {
        return 0.0;
    }
    let sum = window.fold(0.0, |acc, v| acc + v.abs());
    sum / count as f64
}

/// Relative beta power ratio: beta / (theta + alpha), with each band's power
/// taken relative to the total power across the reference range.
fn beta_ratio(window: &SlidingWindowBuffer, sample_rate_hz: f64, bands: &BandConfig) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let channels = window.snapshot_channels();
    let nperseg = MAX_SEGMENT_LEN.min(window.len());

    // Average the per-channel spectra for a global reading.
    let mut avg_psd: Vec<f64> = Vec::new();
    let mut freqs: Vec<f64> = Vec::new();
    for series in &channels {
        let (f, psd) = welch_psd(series, sample_rate_hz, nperseg);
        if avg_psd.is_empty() {
            avg_psd = psd;
            freqs = f;
        } else {
            for (acc, p) in avg_psd.iter_mut().zip(psd) {
                *acc += p;
            }
        }
    }
    for p in avg_psd.iter_mut() {
        *p /= channels.len() as f64;
    }

    let total_range = bands.total_range();
    let total_power = band_power(&freqs, &avg_psd, total_range);
    if total_power == 0.0 {
        return 0.0;
    }

    let rel_theta = band_power(&freqs, &avg_psd, bands.theta) / total_power;
    let rel_alpha = band_power(&freqs, &avg_psd, bands.alpha) / total_power;
    let rel_beta = band_power(&freqs, &avg_psd, bands.beta) / total_power;

    rel_beta / (rel_theta + rel_alpha + EPSILON)
}

/// Summed PSD over the half-open band `[low, high)`
fn band_power(freqs: &[f64], psd: &[f64], band: (f64, f64)) -> f64 {
    freqs
        .iter()
        .zip(psd)
        .filter(|(f, _)| **f >= band.0 && **f < band.1)
        .map(|(_, p)| p)
        .sum()
}

/// One-sided power spectral density by Welch's method: periodic Hann window,
/// 50% overlap, per-segment mean removal, density scaling.
pub fn welch_psd(x: &[f64], sample_rate_hz: f64, nperseg: usize) -> (Vec<f64>, Vec<f64>) {
    let nperseg = nperseg.min(x.len());
    debug_assert!(nperseg >= 2);
    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let n_bins = nperseg / 2 + 1;

    let hann: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / nperseg as f64).cos()))
        .collect();
    let window_power: f64 = hann.iter().map(|w| w * w).sum();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut accum = vec![0.0; n_bins];
    let mut segments = 0usize;
    let mut start = 0usize;
    while start + nperseg <= x.len() {
        let segment = &x[start..start + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;

        let mut buffer: Vec<Complex<f64>> = segment
            .iter()
            .zip(&hann)
            .map(|(&v, &w)| Complex::new((v - mean) * w, 0.0))
            .collect();
        fft.process(&mut buffer);

        for (bin, value) in buffer.iter().take(n_bins).enumerate() {
            accum[bin] += value.norm_sqr();
        }
        segments += 1;
        start += step;
    }

    let scale = 1.0 / (sample_rate_hz * window_power * segments.max(1) as f64);
    let mut psd: Vec<f64> = accum.iter().map(|a| a * scale).collect();
    // One-sided spectrum: interior bins carry both halves.
    for bin in 1..n_bins {
        let is_nyquist = nperseg % 2 == 0 && bin == n_bins - 1;
        if !is_nyquist {
            psd[bin] *= 2.0;
        }
    }

    let freqs = (0..n_bins)
        .map(|bin| bin as f64 * sample_rate_hz / nperseg as f64)
        .collect();
    (freqs, psd)
}
