//! Adaptive normalization
//!
//! Maps raw feature values onto a bounded score using calibration state
//! accumulated over the session:
//! - min-max: widen-only running extremes, output in [0, 1]
//! - percentile: rank within a rolling history, output in [-1, 1]
//!
//! Calibration state serializes to JSON so it can be carried across sessions.

use crate::config::{FocusConfig, NormalizerStrategy, EPSILON, MIN_PERCENTILE_HISTORY};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A normalized feature value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    /// Strategy-native value: [0, 1] for min-max, [-1, 1] for percentile
    pub value: f64,
    /// The same value mapped onto [-1, 1]
    pub bipolar: f64,
}

/// Adaptive normalizer with session calibration state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum AdaptiveNormalizer {
    MinMax(MinMaxCalibration),
    Percentile(PercentileCalibration),
}

impl AdaptiveNormalizer {
    pub fn new(config: &FocusConfig) -> Self {
        match config.normalizer {
            NormalizerStrategy::MinMax => AdaptiveNormalizer::MinMax(MinMaxCalibration::default()),
            NormalizerStrategy::Percentile { history_seconds } => {
                let capacity = (history_seconds / config.update_interval_secs) as usize;
                AdaptiveNormalizer::Percentile(PercentileCalibration::new(capacity))
            }
        }
    }

    /// Fold the feature into the calibration state and normalize it
    pub fn normalize(&mut self, feature: f64) -> Normalized {
        match self {
            AdaptiveNormalizer::MinMax(calibration) => {
                let value = calibration.normalize(feature);
                Normalized {
                    value,
                    bipolar: value * 2.0 - 1.0,
                }
            }
            AdaptiveNormalizer::Percentile(calibration) => {
                let value = calibration.normalize(feature);
                Normalized {
                    value,
                    bipolar: value,
                }
            }
        }
    }

    /// Load calibration state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize calibration state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Widen-only running min/max calibration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxCalibration {
    /// Smallest feature seen this session (only ever decreases)
    min: Option<f64>,
    /// Largest feature seen this session (only ever increases)
    max: Option<f64>,
}

impl MinMaxCalibration {
    fn normalize(&mut self, feature: f64) -> f64 {
        let min = self.min.map_or(feature, |m| m.min(feature));
        let max = self.max.map_or(feature, |m| m.max(feature));
        self.min = Some(min);
        self.max = Some(max);

        let span = max - min;
        if span == 0.0 {
            0.5
        } else {
            (feature - min) / (span + EPSILON)
        }
    }
}

/// Rolling-history percentile calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileCalibration {
    history: VecDeque<f64>,
    capacity: usize,
}

impl PercentileCalibration {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn normalize(&mut self, feature: f64) -> f64 {
        self.history.push_back(feature);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        if self.history.len() < MIN_PERCENTILE_HISTORY {
            // Not enough statistics yet; stay neutral.
            return 0.0;
        }

        let mut below = 0usize;
        let mut at_or_below = 0usize;
        for &v in &self.history {
            if v < feature {
                below += 1;
            }
            if v <= feature {
                at_or_below += 1;
            }
        }
        // Mean rank: ties land on the midpoint, so a flat history reads as
        // the 50th percentile.
        let percentile = 100.0 * (below + at_or_below) as f64 / (2 * self.history.len()) as f64;
        percentile / 50.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FocusConfig;

    fn minmax() -> AdaptiveNormalizer {
        AdaptiveNormalizer::new(&FocusConfig::amplitude())
    }

    fn percentile() -> AdaptiveNormalizer {
        // spectral preset: 60 s history at 0.2 s updates = capacity 300
        AdaptiveNormalizer::new(&FocusConfig::spectral())
    }

    #[test]
    fn test_minmax_first_value_is_neutral() {
        let mut normalizer = minmax();
        let n = normalizer.normalize(42.0);
        assert!((n.value - 0.5).abs() < 1e-12);
        assert!(n.bipolar.abs() < 1e-12);
    }

    #[test]
    fn test_minmax_monotonic_ramp_is_nondecreasing() {
        let mut normalizer = minmax();
        let mut last = f64::NEG_INFINITY;
        for i in 0..50 {
            let n = normalizer.normalize(i as f64);
            assert!(n.value >= last - 1e-12, "decreased at step {}", i);
            assert!((0.0..=1.0).contains(&n.value));
            last = n.value;
        }
    }

    #[test]
    fn test_minmax_widens_only() {
        let mut normalizer = minmax();
        normalizer.normalize(0.0);
        normalizer.normalize(10.0);
        // A mid-range value maps against the widened extremes.
        let n = normalizer.normalize(5.0);
        assert!((n.value - 0.5).abs() < 0.01);

        // Values inside the seen range never move the extremes back in.
        let n = normalizer.normalize(10.0);
        assert!(n.value > 0.99);
        let n = normalizer.normalize(0.0);
        assert!(n.value < 0.01);
    }

    #[test]
    fn test_percentile_warmup_is_neutral() {
        let mut normalizer = percentile();
        for i in 0..MIN_PERCENTILE_HISTORY - 1 {
            let n = normalizer.normalize(i as f64);
            assert_eq!(n.value, 0.0, "entry {} should be neutral", i);
        }
    }

    #[test]
    fn test_percentile_constant_history_reads_median() {
        let mut normalizer = percentile();
        let mut last = Normalized {
            value: 0.0,
            bipolar: 0.0,
        };
        for _ in 0..20 {
            last = normalizer.normalize(7.5);
        }
        // rank 50 maps to 0.0
        assert!(last.value.abs() < 1e-9, "got {}", last.value);
    }

    #[test]
    fn test_percentile_extremes() {
        let mut normalizer = percentile();
        for i in 0..20 {
            normalizer.normalize(i as f64);
        }
        // A new maximum ranks above everything but itself.
        let n = normalizer.normalize(100.0);
        assert!(n.value > 0.9, "got {}", n.value);
        // A new minimum ranks below everything but itself.
        let n = normalizer.normalize(-100.0);
        assert!(n.value < -0.9, "got {}", n.value);
    }

    #[test]
    fn test_percentile_history_bounded() {
        let mut calibration = PercentileCalibration::new(5);
        for i in 0..12 {
            calibration.normalize(i as f64);
        }
        assert_eq!(calibration.history_len(), 5);
    }

    #[test]
    fn test_calibration_serialization_round_trip() {
        let mut normalizer = minmax();
        normalizer.normalize(1.0);
        normalizer.normalize(9.0);

        let json = normalizer.to_json().unwrap();
        let mut loaded = AdaptiveNormalizer::from_json(&json).unwrap();

        // The restored extremes keep normalizing identically.
        let a = normalizer.normalize(5.0);
        let b = loaded.normalize(5.0);
        assert_eq!(a.value, b.value);
    }
}
