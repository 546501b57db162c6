//! Session recording artifact
//!
//! Raw samples, channel labels, and annotation events accumulated over a
//! session, persisted as JSON for offline analysis. Annotation onsets are
//! relative to the start of the recording; a duration of 0 means the
//! annotated segment extends to the next annotation.

use crate::error::FocusError;
use crate::types::SampleChunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ground-truth marker placed during acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Seconds from recording start
    pub onset_secs: f64,
    /// Segment length; 0 extends to the next annotation
    pub duration_secs: f64,
    pub label: String,
}

/// A persisted acquisition session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sample_rate_hz: f64,
    pub channel_labels: Vec<String>,
    /// Raw samples, channel-major (`samples[ch][t]`)
    pub samples: Vec<Vec<f64>>,
    pub annotations: Vec<Annotation>,
}

impl Recording {
    pub fn new(sample_rate_hz: f64, channel_labels: Vec<String>) -> Self {
        let channels = channel_labels.len();
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            sample_rate_hz,
            channel_labels,
            samples: vec![Vec::new(); channels],
            annotations: Vec::new(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_labels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.samples.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate_hz
    }

    /// Append a chunk of raw frames
    pub fn append_chunk(&mut self, chunk: &SampleChunk) -> Result<(), FocusError> {
        if chunk.channel_count() != self.channel_count() {
            return Err(FocusError::ChannelMismatch {
                expected: self.channel_count(),
                actual: chunk.channel_count(),
            });
        }
        chunk.validate()?;
        for (series, new_samples) in self.samples.iter_mut().zip(&chunk.samples) {
            series.extend_from_slice(new_samples);
        }
        Ok(())
    }

    /// Place an annotation at the current end of the recording
    pub fn annotate(&mut self, label: &str, duration_secs: f64) {
        self.annotations.push(Annotation {
            onset_secs: self.duration_secs(),
            duration_secs,
            label: label.to_string(),
        });
    }

    /// Check structural invariants (used after deserialization)
    pub fn validate(&self) -> Result<(), FocusError> {
        if !(self.sample_rate_hz > 0.0) {
            return Err(FocusError::InvalidRecording(
                "sample rate must be positive".to_string(),
            ));
        }
        if self.samples.len() != self.channel_labels.len() {
            return Err(FocusError::InvalidRecording(format!(
                "{} channel series but {} labels",
                self.samples.len(),
                self.channel_labels.len()
            )));
        }
        let frames = self.frame_count();
        if self.samples.iter().any(|c| c.len() != frames) {
            return Err(FocusError::InvalidRecording(
                "channels hold unequal frame counts".to_string(),
            ));
        }
        for annotation in &self.annotations {
            if annotation.onset_secs < 0.0 || annotation.duration_secs < 0.0 {
                return Err(FocusError::InvalidRecording(format!(
                    "annotation '{}' has negative onset or duration",
                    annotation.label
                )));
            }
        }
        Ok(())
    }

    /// Load a recording from JSON, validating its structure
    pub fn from_json(json: &str) -> Result<Self, FocusError> {
        let recording: Recording = serde_json::from_str(json)?;
        recording.validate()?;
        Ok(recording)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, FocusError> {
        Ok(serde_json::to_string(self)?)
    }
}
