//! Pipeline configuration
//!
//! A single immutable configuration value is passed to the pipeline at
//! construction. The two presets mirror the production parameter sets:
//! amplitude scoring over a 5 s window with min-max calibration, and
//! spectral scoring over a 4 s window with percentile calibration.

use crate::error::FocusError;
use serde::{Deserialize, Serialize};

/// Default acquisition sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 250.0;

/// Default EEG channel count (frontal/central/parietal/occipital pairs)
pub const DEFAULT_CHANNEL_COUNT: usize = 8;

/// Epsilon guarding divisions in normalization and band ratios
pub const EPSILON: f64 = 1e-6;

/// Minimum history entries before the percentile normalizer produces a score
pub const MIN_PERCENTILE_HISTORY: usize = 10;

/// Signal conditioning applied to incoming chunks before buffering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ConditioningMode {
    /// No conditioning; chunks pass through unmodified
    Off,
    /// High-pass (DC/drift removal) followed by a powerline notch
    HighPassNotch {
        highpass_hz: f64,
        notch_hz: f64,
        notch_q: f64,
    },
    /// Block DC-offset removal followed by a band-pass
    BandPass { low_hz: f64, high_hz: f64 },
}

impl ConditioningMode {
    /// 1 Hz high-pass with a 50 Hz notch (Q = 30)
    pub fn highpass_notch() -> Self {
        ConditioningMode::HighPassNotch {
            highpass_hz: 1.0,
            notch_hz: 50.0,
            notch_q: 30.0,
        }
    }

    /// 1-40 Hz band-pass
    pub fn bandpass() -> Self {
        ConditioningMode::BandPass {
            low_hz: 1.0,
            high_hz: 40.0,
        }
    }
}

/// Frequency band edges for the spectral feature (Hz, half-open ranges)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    pub theta: (f64, f64),
    pub alpha: (f64, f64),
    pub beta: (f64, f64),
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            theta: (4.0, 8.0),
            alpha: (8.0, 12.0),
            beta: (12.0, 30.0),
        }
    }
}

impl BandConfig {
    /// Reference range for relative power: spans theta through beta
    pub fn total_range(&self) -> (f64, f64) {
        (self.theta.0, self.beta.1)
    }
}

/// Feature extraction strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum FeatureStrategy {
    /// Mean absolute amplitude of the conditioned window
    Amplitude,
    /// Relative beta band power ratio via Welch spectral density
    Spectral { bands: BandConfig },
}

impl FeatureStrategy {
    /// Whether a larger feature value indicates more or less focus
    pub fn polarity(&self) -> Polarity {
        match self {
            // Louder broadband activity reads as noise/distraction.
            FeatureStrategy::Amplitude => Polarity::HigherIsDistracted,
            // Beta dominance over theta+alpha reads as engagement.
            FeatureStrategy::Spectral { .. } => Polarity::HigherIsFocused,
        }
    }
}

/// Direction in which the raw feature correlates with focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsFocused,
    HigherIsDistracted,
}

/// Adaptive normalization strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum NormalizerStrategy {
    /// Widen-only running min/max, output in [0, 1]
    MinMax,
    /// Percentile rank within a rolling history, output in [-1, 1]
    Percentile { history_seconds: f64 },
}

/// Streak bonus parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Raw score above which the streak grows
    pub good_threshold: f64,
    /// Raw score below which the streak resets
    pub bad_threshold: f64,
    /// Streak increment per good window
    pub step: f64,
    /// Multiplicative decay applied between the thresholds
    pub decay: f64,
    /// Bonus contributed per streak unit
    pub growth_rate: f64,
    /// Upper bound on the bonus
    pub bonus_cap: f64,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            good_threshold: 0.5,
            bad_threshold: 0.0,
            step: 1.0,
            decay: 0.9,
            growth_rate: 0.02,
            bonus_cap: 0.2,
        }
    }
}

/// Score smoothing parameters; each stage is optional and composable
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Maximum change per emitted score (rate limiting)
    pub max_change: Option<f64>,
    /// Exponential smoothing factor in (0, 1)
    pub ema_alpha: Option<f64>,
    /// Streak/combo bonus for sustained focus
    pub streak: Option<StreakConfig>,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Acquisition sample rate (Hz)
    pub sample_rate_hz: f64,
    /// Number of channels per sample
    pub channel_count: usize,
    /// Analysis window length (seconds)
    pub window_seconds: f64,
    /// Polling/update interval (seconds)
    pub update_interval_secs: f64,
    /// Seconds of stream discarded at session start while the signal settles
    pub skip_seconds: f64,
    /// Signal conditioning applied to incoming chunks
    pub conditioning: ConditioningMode,
    /// Feature extraction strategy
    pub feature: FeatureStrategy,
    /// Adaptive normalization strategy
    pub normalizer: NormalizerStrategy,
    /// Score smoothing stages
    pub smoothing: SmoothingConfig,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self::amplitude()
    }
}

impl FocusConfig {
    /// Amplitude variant: mean absolute amplitude, min-max calibration,
    /// rate-limited output. 5 s window, 0.5 s updates.
    pub fn amplitude() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            channel_count: DEFAULT_CHANNEL_COUNT,
            window_seconds: 5.0,
            update_interval_secs: 0.5,
            skip_seconds: 10.0,
            conditioning: ConditioningMode::highpass_notch(),
            feature: FeatureStrategy::Amplitude,
            normalizer: NormalizerStrategy::MinMax,
            smoothing: SmoothingConfig {
                max_change: Some(0.2),
                ema_alpha: None,
                streak: None,
            },
        }
    }

    /// Spectral variant: beta ratio over Welch PSD, percentile calibration
    /// against 60 s of history. 4 s window, 0.2 s updates.
    pub fn spectral() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            channel_count: DEFAULT_CHANNEL_COUNT,
            window_seconds: 4.0,
            update_interval_secs: 0.2,
            skip_seconds: 5.0,
            conditioning: ConditioningMode::bandpass(),
            feature: FeatureStrategy::Spectral {
                bands: BandConfig::default(),
            },
            normalizer: NormalizerStrategy::Percentile {
                history_seconds: 60.0,
            },
            smoothing: SmoothingConfig::default(),
        }
    }

    /// Window length in samples (rounded down)
    pub fn window_len(&self) -> usize {
        (self.window_seconds * self.sample_rate_hz) as usize
    }

    /// Capacity of the percentile history, if that strategy is selected
    pub fn history_capacity(&self) -> Option<usize> {
        match self.normalizer {
            NormalizerStrategy::Percentile { history_seconds } => {
                Some((history_seconds / self.update_interval_secs) as usize)
            }
            NormalizerStrategy::MinMax => None,
        }
    }

    /// Validate the configuration before constructing a pipeline
    pub fn validate(&self) -> Result<(), FocusError> {
        if !(self.sample_rate_hz > 0.0) {
            return Err(FocusError::InvalidConfig(format!(
                "sample_rate_hz must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        if self.channel_count == 0 {
            return Err(FocusError::InvalidConfig(
                "channel_count must be at least 1".to_string(),
            ));
        }
        if self.window_len() == 0 {
            return Err(FocusError::InvalidConfig(format!(
                "window of {} s at {} Hz holds no samples",
                self.window_seconds, self.sample_rate_hz
            )));
        }
        if !(self.update_interval_secs > 0.0) {
            return Err(FocusError::InvalidConfig(
                "update_interval_secs must be positive".to_string(),
            ));
        }
        if self.skip_seconds < 0.0 {
            return Err(FocusError::InvalidConfig(
                "skip_seconds must not be negative".to_string(),
            ));
        }

        let nyquist = self.sample_rate_hz / 2.0;
        match self.conditioning {
            ConditioningMode::Off => {}
            ConditioningMode::HighPassNotch {
                highpass_hz,
                notch_hz,
                notch_q,
            } => {
                if !(highpass_hz > 0.0 && highpass_hz < nyquist) {
                    return Err(FocusError::InvalidConfig(format!(
                        "high-pass cutoff {} Hz outside (0, {}) Hz",
                        highpass_hz, nyquist
                    )));
                }
                if !(notch_hz > 0.0 && notch_hz < nyquist) {
                    return Err(FocusError::InvalidConfig(format!(
                        "notch frequency {} Hz outside (0, {}) Hz",
                        notch_hz, nyquist
                    )));
                }
                if !(notch_q > 0.0) {
                    return Err(FocusError::InvalidConfig(
                        "notch Q must be positive".to_string(),
                    ));
                }
            }
            ConditioningMode::BandPass { low_hz, high_hz } => {
                if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
                    return Err(FocusError::InvalidConfig(format!(
                        "band-pass edges ({}, {}) Hz must satisfy 0 < low < high < {} Hz",
                        low_hz, high_hz, nyquist
                    )));
                }
            }
        }

        if let FeatureStrategy::Spectral { bands } = self.feature {
            for (name, (lo, hi)) in [
                ("theta", bands.theta),
                ("alpha", bands.alpha),
                ("beta", bands.beta),
            ] {
                if !(lo >= 0.0 && lo < hi && hi <= nyquist) {
                    return Err(FocusError::InvalidConfig(format!(
                        "{} band ({}, {}) Hz must satisfy 0 <= low < high <= {} Hz",
                        name, lo, hi, nyquist
                    )));
                }
            }
        }

        if let NormalizerStrategy::Percentile { history_seconds } = self.normalizer {
            let capacity = (history_seconds / self.update_interval_secs) as usize;
            if capacity < MIN_PERCENTILE_HISTORY {
                return Err(FocusError::InvalidConfig(format!(
                    "percentile history of {} s at {} s updates holds {} entries, need at least {}",
                    history_seconds, self.update_interval_secs, capacity, MIN_PERCENTILE_HISTORY
                )));
            }
        }

        if let Some(max_change) = self.smoothing.max_change {
            if !(max_change > 0.0) {
                return Err(FocusError::InvalidConfig(
                    "max_change must be positive".to_string(),
                ));
            }
        }
        if let Some(alpha) = self.smoothing.ema_alpha {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(FocusError::InvalidConfig(format!(
                    "ema_alpha {} outside (0, 1)",
                    alpha
                )));
            }
        }
        if let Some(streak) = self.smoothing.streak {
            if streak.bad_threshold > streak.good_threshold {
                return Err(FocusError::InvalidConfig(
                    "streak bad_threshold must not exceed good_threshold".to_string(),
                ));
            }
            if !(streak.decay >= 0.0 && streak.decay <= 1.0) {
                return Err(FocusError::InvalidConfig(
                    "streak decay must lie in [0, 1]".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(FocusConfig::amplitude().validate().is_ok());
        assert!(FocusConfig::spectral().validate().is_ok());
    }

    #[test]
    fn test_window_len_rounds_down() {
        let mut config = FocusConfig::amplitude();
        config.sample_rate_hz = 250.0;
        config.window_seconds = 5.0;
        assert_eq!(config.window_len(), 1250);

        config.window_seconds = 0.999;
        // 249.75 samples rounds down to 249
        assert_eq!(config.window_len(), 249);
    }

    #[test]
    fn test_rejects_zero_channels() {
        let mut config = FocusConfig::amplitude();
        config.channel_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_band_above_nyquist() {
        let mut config = FocusConfig::spectral();
        config.sample_rate_hz = 50.0; // Nyquist 25 Hz < beta upper edge 30 Hz
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_short_percentile_history() {
        let mut config = FocusConfig::spectral();
        config.normalizer = NormalizerStrategy::Percentile {
            history_seconds: 1.0,
        };
        config.update_interval_secs = 0.2; // 5 entries < 10
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_bandpass() {
        let mut config = FocusConfig::amplitude();
        config.conditioning = ConditioningMode::BandPass {
            low_hz: 40.0,
            high_hz: 1.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_capacity() {
        let config = FocusConfig::spectral();
        // 60 s / 0.2 s = 300 entries
        assert_eq!(config.history_capacity(), Some(300));
        assert_eq!(FocusConfig::amplitude().history_capacity(), None);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = FocusConfig::spectral();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: FocusConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, loaded);
    }
}
