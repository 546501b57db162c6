//! Core types for the focus pipeline
//!
//! This module defines the data that flows through the pipeline: incoming
//! multi-channel sample chunks and outgoing score updates.

use crate::error::FocusError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block of multi-channel samples in arrival (time) order.
///
/// Data is channel-major: `samples[ch][t]` is channel `ch` at frame `t`,
/// matching the layout acquisition buffers hand out. All channels must hold
/// the same number of frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleChunk {
    pub samples: Vec<Vec<f64>>,
}

impl SampleChunk {
    /// Create a chunk from channel-major data
    pub fn new(samples: Vec<Vec<f64>>) -> Self {
        Self { samples }
    }

    /// A chunk with the given channel count and no frames
    pub fn empty(channel_count: usize) -> Self {
        Self {
            samples: vec![Vec::new(); channel_count],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.samples.len()
    }

    /// Frames per channel (0 for an empty chunk)
    pub fn frame_count(&self) -> usize {
        self.samples.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Check that every channel holds the same number of frames
    pub fn validate(&self) -> Result<(), FocusError> {
        let frames = self.frame_count();
        for (idx, channel) in self.samples.iter().enumerate() {
            if channel.len() != frames {
                return Err(FocusError::MalformedChunk(format!(
                    "channel {} holds {} frames, expected {}",
                    idx,
                    channel.len(),
                    frames
                )));
            }
        }
        Ok(())
    }
}

/// One emitted focus score.
///
/// `score` follows the uniform sign convention: +1 fully focused/calm,
/// -1 fully distracted/noisy, 0 neutral or uncalibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    /// Smoothed focus score in [-1, 1]
    pub score: f64,
    /// Raw feature value before normalization
    pub raw_feature: f64,
    /// Normalized value before polarity mapping and smoothing
    pub normalized: f64,
    /// When the score was computed
    pub at: DateTime<Utc>,
}
