//! Pipeline orchestration
//!
//! This module provides the core streaming API: a stateful `FocusPipeline`
//! fed with incremental sample chunks, emitting a smoothed focus score once
//! the analysis window is full.
//!
//! Pipeline stages per chunk:
//! 1. SignalConditioner - filter/denoise the incoming block
//! 2. SlidingWindowBuffer - retain the most recent window of frames
//! 3. FeatureExtractor - collapse the window to a scalar feature
//! 4. AdaptiveNormalizer - calibrate the feature against session statistics
//! 5. ScoreSmoother - rate-limit/smooth into the emitted score

use crate::buffer::SlidingWindowBuffer;
use crate::conditioner::SignalConditioner;
use crate::config::{FocusConfig, Polarity};
use crate::error::FocusError;
use crate::features::FeatureExtractor;
use crate::normalizer::AdaptiveNormalizer;
use crate::smoother::ScoreSmoother;
use crate::types::{SampleChunk, ScoreUpdate};
use chrono::Utc;
use log::warn;

/// Stateful focus scoring pipeline.
///
/// Each instance exclusively owns its window, calibration, and smoothing
/// state; sessions do not share pipelines.
pub struct FocusPipeline {
    config: FocusConfig,
    conditioner: SignalConditioner,
    window: SlidingWindowBuffer,
    extractor: FeatureExtractor,
    normalizer: AdaptiveNormalizer,
    smoother: ScoreSmoother,
}

impl FocusPipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: FocusConfig) -> Result<Self, FocusError> {
        config.validate()?;
        let conditioner = SignalConditioner::new(config.conditioning, config.sample_rate_hz);
        let window = SlidingWindowBuffer::new(config.window_len(), config.channel_count);
        let extractor = FeatureExtractor::new(config.feature);
        let normalizer = AdaptiveNormalizer::new(&config);
        let smoother = ScoreSmoother::new(config.smoothing);
        Ok(Self {
            config,
            conditioner,
            window,
            extractor,
            normalizer,
            smoother,
        })
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    /// Whether the analysis window has filled
    pub fn is_ready(&self) -> bool {
        self.window.is_full()
    }

    /// Window fill ratio in [0, 1], for warm-up progress display
    pub fn warmup_progress(&self) -> f64 {
        self.window.fill_ratio()
    }

    /// Feed one chunk of new samples.
    ///
    /// Returns `None` while the window is warming up, when the chunk is
    /// empty, or when the chunk is malformed (logged, never an error).
    pub fn push_chunk(&mut self, chunk: &SampleChunk) -> Option<ScoreUpdate> {
        if chunk.is_empty() {
            return None;
        }
        if chunk.channel_count() != self.config.channel_count {
            warn!(
                "dropping chunk: expected {} channels, got {}",
                self.config.channel_count,
                chunk.channel_count()
            );
            return None;
        }
        if let Err(e) = chunk.validate() {
            warn!("dropping chunk: {}", e);
            return None;
        }

        let conditioned = self.conditioner.condition(chunk);

        let mut frame = vec![0.0; self.config.channel_count];
        for t in 0..conditioned.frame_count() {
            for (ch, series) in conditioned.samples.iter().enumerate() {
                frame[ch] = series[t];
            }
            self.window.push_frame(&frame);
        }

        if !self.window.is_full() {
            return None;
        }

        let raw_feature = self
            .extractor
            .extract(&self.window, self.config.sample_rate_hz);
        let normalized = self.normalizer.normalize(raw_feature);

        // Uniform contract: +1 focused, -1 distracted. Features that grow
        // with distraction are inverted here.
        let oriented = match self.config.feature.polarity() {
            Polarity::HigherIsFocused => normalized.bipolar,
            Polarity::HigherIsDistracted => -normalized.bipolar,
        };
        let score = self.smoother.smooth(oriented);

        Some(ScoreUpdate {
            score,
            raw_feature,
            normalized: normalized.value,
            at: Utc::now(),
        })
    }

    /// Serialize the calibration state to JSON
    pub fn save_calibration(&self) -> Result<String, FocusError> {
        Ok(self.normalizer.to_json()?)
    }

    /// Restore calibration state saved by `save_calibration`
    pub fn load_calibration(&mut self, json: &str) -> Result<(), FocusError> {
        self.normalizer = AdaptiveNormalizer::from_json(json)?;
        Ok(())
    }

    /// Drop window contents and smoothing state; calibration is retained
    pub fn reset(&mut self) {
        self.window.clear();
        self.smoother.reset();
    }

    /// Discard the calibration accumulated this session
    pub fn reset_calibration(&mut self) {
        self.normalizer = AdaptiveNormalizer::new(&self.config);
    }
}
