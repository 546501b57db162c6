//! Offline analysis of persisted recordings
//!
//! Cleans a recording (powerline notch + band-pass, zero-phase) and converts
//! it into a labeled tabular series: one row per frame with a time index,
//! one column per channel, and a `Label` column derived from the session's
//! annotations.

use crate::error::FocusError;
use crate::filters::{butterworth_high_pass, butterworth_low_pass, filtfilt, Biquad};
use crate::recording::{Annotation, Recording};
use log::debug;
use std::io::Write;

/// Label applied to frames no annotation covers
pub const DEFAULT_LABEL: &str = "unlabeled";

const NOTCH_HZ: f64 = 50.0;
const NOTCH_Q: f64 = 30.0;
const BAND_LOW_HZ: f64 = 1.0;
const BAND_HIGH_HZ: f64 = 40.0;
const BUTTERWORTH_ORDER: usize = 4;

/// Apply the standard cleaning filters (50 Hz notch, 1-40 Hz band-pass) to
/// every channel. Recordings too short for the filters pass through.
pub fn clean(recording: &Recording) -> Recording {
    let rate = recording.sample_rate_hz;
    let mut cascade = vec![Biquad::notch(rate, NOTCH_HZ, NOTCH_Q)];
    cascade.extend(butterworth_high_pass(rate, BAND_LOW_HZ, BUTTERWORTH_ORDER));
    cascade.extend(butterworth_low_pass(rate, BAND_HIGH_HZ, BUTTERWORTH_ORDER));

    let samples = recording
        .samples
        .iter()
        .map(|series| {
            filtfilt(&cascade, series).unwrap_or_else(|| {
                debug!(
                    "recording of {} frames below filter settling length, kept unfiltered",
                    series.len()
                );
                series.clone()
            })
        })
        .collect();

    Recording {
        samples,
        ..recording.clone()
    }
}

/// Tabular view of a recording with per-frame labels
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSeries {
    /// Seconds from recording start, one entry per frame
    pub time: Vec<f64>,
    pub channel_labels: Vec<String>,
    /// Channel-major data aligned with `time`
    pub data: Vec<Vec<f64>>,
    /// One label per frame
    pub labels: Vec<String>,
}

/// Map annotations onto per-frame labels.
///
/// Each annotation covers `[onset, onset + duration]`; a zero duration
/// extends to the next annotation's onset (or the end of the recording for
/// the last one). Later annotations win at shared boundaries.
pub fn label_series(recording: &Recording) -> LabeledSeries {
    let frames = recording.frame_count();
    let rate = recording.sample_rate_hz;
    let time: Vec<f64> = (0..frames).map(|t| t as f64 / rate).collect();
    let mut labels = vec![DEFAULT_LABEL.to_string(); frames];

    let mut events: Vec<&Annotation> = recording.annotations.iter().collect();
    events.sort_by(|a, b| a.onset_secs.total_cmp(&b.onset_secs));

    for (idx, event) in events.iter().enumerate() {
        let start = event.onset_secs;
        let end = if event.duration_secs > 0.0 {
            start + event.duration_secs
        } else if let Some(next) = events.get(idx + 1) {
            next.onset_secs
        } else {
            recording.duration_secs()
        };
        for (t, slot) in time.iter().zip(labels.iter_mut()) {
            if *t >= start && *t <= end {
                *slot = event.label.clone();
            }
        }
    }

    LabeledSeries {
        time,
        channel_labels: recording.channel_labels.clone(),
        data: recording.samples.clone(),
        labels,
    }
}

/// Write a labeled series as CSV: `time`, one column per channel, `Label`
pub fn write_csv<W: Write>(series: &LabeledSeries, writer: W) -> Result<(), FocusError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["time".to_string()];
    header.extend(series.channel_labels.iter().cloned());
    header.push("Label".to_string());
    csv_writer.write_record(&header)?;

    for (t, label) in series.labels.iter().enumerate() {
        let mut row = vec![series.time[t].to_string()];
        for channel in &series.data {
            row.push(channel[t].to_string());
        }
        row.push(label.clone());
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
