//! Signal conditioning
//!
//! Removes DC offset and line noise from incoming chunks before they reach
//! the analysis window. Filters are applied zero-phase along the time axis
//! of each channel. Blocks shorter than the filter settling length pass
//! through unmodified so warm-up never fails.

use crate::config::ConditioningMode;
use crate::filters::{butterworth_high_pass, butterworth_low_pass, filtfilt, Biquad};
use crate::types::SampleChunk;
use log::debug;

/// Filter order used for the Butterworth stages
const BUTTERWORTH_ORDER: usize = 4;

/// Conditions sample chunks according to the configured mode
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    cascade: Vec<Biquad>,
    /// Subtract the per-channel mean of each block before filtering
    subtract_block_mean: bool,
}

impl SignalConditioner {
    pub fn new(mode: ConditioningMode, sample_rate_hz: f64) -> Self {
        match mode {
            ConditioningMode::Off => Self {
                cascade: Vec::new(),
                subtract_block_mean: false,
            },
            ConditioningMode::HighPassNotch {
                highpass_hz,
                notch_hz,
                notch_q,
            } => {
                let mut cascade =
                    butterworth_high_pass(sample_rate_hz, highpass_hz, BUTTERWORTH_ORDER);
                cascade.push(Biquad::notch(sample_rate_hz, notch_hz, notch_q));
                Self {
                    cascade,
                    subtract_block_mean: false,
                }
            }
            ConditioningMode::BandPass { low_hz, high_hz } => {
                let mut cascade = butterworth_high_pass(sample_rate_hz, low_hz, BUTTERWORTH_ORDER);
                cascade.extend(butterworth_low_pass(
                    sample_rate_hz,
                    high_hz,
                    BUTTERWORTH_ORDER,
                ));
                Self {
                    cascade,
                    subtract_block_mean: true,
                }
            }
        }
    }

    /// Condition a chunk, returning a new chunk with the same frame count.
    pub fn condition(&self, chunk: &SampleChunk) -> SampleChunk {
        if chunk.is_empty() || (self.cascade.is_empty() && !self.subtract_block_mean) {
            return chunk.clone();
        }

        let mut out = Vec::with_capacity(chunk.channel_count());
        let mut fell_back = false;
        for channel in &chunk.samples {
            let mut series = channel.clone();
            if self.subtract_block_mean {
                let mean = series.iter().sum::<f64>() / series.len() as f64;
                for v in series.iter_mut() {
                    *v -= mean;
                }
            }
            match filtfilt(&self.cascade, &series) {
                Some(filtered) => out.push(filtered),
                None => {
                    // Block shorter than the settling length; emit it as-is
                    // (minus any block-mean removal already applied).
                    fell_back = true;
                    out.push(series);
                }
            }
        }
        if fell_back {
            debug!(
                "chunk of {} frames below filter settling length, passed through unfiltered",
                chunk.frame_count()
            );
        }
        SampleChunk::new(out)
    }
}
