//! Score smoothing
//!
//! Rate-limits and optionally exponentially smooths the normalized score so
//! the emitted value never jumps, plus an optional streak bonus that rewards
//! sustained focus. All stages operate on the [-1, 1] focus score.

use crate::config::SmoothingConfig;

/// Stateful smoother; one instance per pipeline, reset at session start
#[derive(Debug, Clone)]
pub struct ScoreSmoother {
    config: SmoothingConfig,
    /// Previously emitted score; the first value passes through unclamped
    last_emitted: Option<f64>,
    /// Exponential smoothing state, starts neutral
    ema: f64,
    /// Consecutive-focus streak counter
    streak: f64,
}

impl ScoreSmoother {
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            config,
            last_emitted: None,
            ema: 0.0,
            streak: 0.0,
        }
    }

    /// The last emitted score, if any
    pub fn last_score(&self) -> Option<f64> {
        self.last_emitted
    }

    /// Current streak counter (grows while raw scores stay good)
    pub fn streak(&self) -> f64 {
        self.streak
    }

    /// Smooth a raw score in [-1, 1] into the next emitted score
    pub fn smooth(&mut self, raw: f64) -> f64 {
        let mut value = raw;

        if let (Some(max_change), Some(prev)) = (self.config.max_change, self.last_emitted) {
            value = value.clamp(prev - max_change, prev + max_change);
        }

        if let Some(alpha) = self.config.ema_alpha {
            value = alpha * value + (1.0 - alpha) * self.ema;
            self.ema = value;
        }

        if let Some(streak) = self.config.streak {
            if raw > streak.good_threshold {
                self.streak += streak.step;
            } else if raw < streak.bad_threshold {
                self.streak = 0.0;
            } else {
                self.streak *= streak.decay;
            }
            let bonus = (self.streak * streak.growth_rate).min(streak.bonus_cap);
            if value > 0.0 {
                value = (value + bonus).clamp(-1.0, 1.0);
            }
        }

        self.last_emitted = Some(value);
        value
    }

    /// Forget all smoothing state
    pub fn reset(&mut self) {
        self.last_emitted = None;
        self.ema = 0.0;
        self.streak = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreakConfig;

    fn rate_limited(max_change: f64) -> ScoreSmoother {
        ScoreSmoother::new(SmoothingConfig {
            max_change: Some(max_change),
            ema_alpha: None,
            streak: None,
        })
    }

    #[test]
    fn test_first_value_passes_unclamped() {
        let mut smoother = rate_limited(0.2);
        assert_eq!(smoother.smooth(0.9), 0.9);
    }

    #[test]
    fn test_rate_limit_clamps_large_jump() {
        let mut smoother = rate_limited(0.2);
        smoother.smooth(0.0);
        // From 0.0 a raw 1.0 is clamped to exactly 0.2.
        assert_eq!(smoother.smooth(1.0), 0.2);
    }

    #[test]
    fn test_rate_limit_passes_small_change() {
        let mut smoother = rate_limited(0.2);
        smoother.smooth(0.0);
        assert_eq!(smoother.smooth(0.05), 0.05);
    }

    #[test]
    fn test_rate_limit_applies_downward() {
        let mut smoother = rate_limited(0.2);
        smoother.smooth(0.5);
        assert!((smoother.smooth(-1.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_ema_formula() {
        let mut smoother = ScoreSmoother::new(SmoothingConfig {
            max_change: None,
            ema_alpha: Some(0.25),
            streak: None,
        });
        // State starts at 0: first output is alpha * raw.
        assert!((smoother.smooth(1.0) - 0.25).abs() < 1e-12);
        // Second: 0.25 * 1.0 + 0.75 * 0.25 = 0.4375
        assert!((smoother.smooth(1.0) - 0.4375).abs() < 1e-12);
    }

    #[test]
    fn test_streak_grows_and_caps() {
        let mut smoother = ScoreSmoother::new(SmoothingConfig {
            max_change: None,
            ema_alpha: None,
            streak: Some(StreakConfig::default()),
        });
        // Default: step 1, growth 0.02, cap 0.2.
        let first = smoother.smooth(0.6);
        assert!((first - 0.62).abs() < 1e-12);

        for _ in 0..30 {
            smoother.smooth(0.6);
        }
        // Bonus saturated at the cap.
        assert!((smoother.smooth(0.6) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_streak_resets_on_bad_score() {
        let mut smoother = ScoreSmoother::new(SmoothingConfig {
            max_change: None,
            ema_alpha: None,
            streak: Some(StreakConfig::default()),
        });
        for _ in 0..5 {
            smoother.smooth(0.6);
        }
        assert!(smoother.streak() > 0.0);

        smoother.smooth(-0.5);
        assert_eq!(smoother.streak(), 0.0);
    }

    #[test]
    fn test_streak_decays_between_thresholds() {
        let mut smoother = ScoreSmoother::new(SmoothingConfig {
            max_change: None,
            ema_alpha: None,
            streak: Some(StreakConfig::default()),
        });
        for _ in 0..10 {
            smoother.smooth(0.6);
        }
        let before = smoother.streak();
        smoother.smooth(0.2); // between bad (0.0) and good (0.5)
        assert!((smoother.streak() - before * 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_bonus_skips_negative_scores() {
        let mut smoother = ScoreSmoother::new(SmoothingConfig {
            max_change: None,
            ema_alpha: None,
            streak: Some(StreakConfig {
                bad_threshold: -0.9,
                ..StreakConfig::default()
            }),
        });
        for _ in 0..10 {
            smoother.smooth(0.6);
        }
        // Streak is alive, but a negative score receives no bonus.
        let v = smoother.smooth(-0.3);
        assert_eq!(v, -0.3);
    }

    #[test]
    fn test_bonus_result_clamped() {
        let mut smoother = ScoreSmoother::new(SmoothingConfig {
            max_change: None,
            ema_alpha: None,
            streak: Some(StreakConfig::default()),
        });
        for _ in 0..30 {
            smoother.smooth(0.99);
        }
        assert!(smoother.smooth(0.99) <= 1.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut smoother = rate_limited(0.2);
        smoother.smooth(0.8);
        smoother.reset();
        assert_eq!(smoother.last_score(), None);
        // Post-reset value passes unclamped again.
        assert_eq!(smoother.smooth(-0.9), -0.9);
    }
}
