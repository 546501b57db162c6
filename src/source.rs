//! Sample sources
//!
//! The engine pulls data through the `SampleSource` trait: a cursor-based
//! "give me everything after frame N" interface matching how acquisition
//! buffers accumulate. `SessionControl` carries the device lifecycle
//! (start/stop/annotate/release). Three sources ship with the crate:
//!
//! - `SyntheticSource`: clock-driven multi-tone generator for demos/tests
//! - `ManualSource`: queue of predetermined chunks for deterministic tests
//! - `NdjsonSource`: chunks as JSON lines from any reader, so an external
//!   bridge process can feed real hardware over stdin

use crate::error::FocusError;
use crate::types::SampleChunk;
use log::debug;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::BufRead;
use std::time::Instant;

/// Standard 8-electrode cap montage
pub const DEFAULT_MONTAGE: [&str; 8] = ["F3", "F4", "C3", "C4", "P3", "P4", "O1", "O2"];

/// Something that accumulates frames and hands out the new ones on demand
pub trait SampleSource {
    fn sample_rate(&self) -> f64;

    fn channel_labels(&self) -> &[String];

    /// Return all frames after `since_cursor` together with the new cursor.
    /// The chunk may be empty when nothing new has arrived.
    fn get_new_samples(&mut self, since_cursor: u64) -> Result<(SampleChunk, u64), FocusError>;

    /// True once the source can never produce more data (end of file/queue).
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Acquisition lifecycle operations
pub trait SessionControl {
    fn start(&mut self) -> Result<(), FocusError>;

    fn stop(&mut self) -> Result<(), FocusError>;

    /// Mark a ground-truth segment starting now. A duration of 0 means the
    /// segment extends to the next annotation.
    fn annotate(&mut self, label: &str, duration_secs: f64) -> Result<(), FocusError>;

    /// Release the underlying device/handle. Called last during teardown.
    fn release(&mut self) -> Result<(), FocusError>;
}

/// One synthesized tone component
#[derive(Debug, Clone, Copy)]
pub struct ToneSpec {
    pub freq_hz: f64,
    pub amplitude: f64,
}

#[derive(Debug)]
enum SyntheticClock {
    /// Frames appear as wall-clock time passes after `start()`
    Wall(Option<Instant>),
    /// Frames appear only via `advance_frames` (tests)
    Manual { available: usize },
}

/// Deterministic multi-tone signal generator.
///
/// Mimics a device buffer: frames accumulate internally and polls slice out
/// whatever lies beyond the caller's cursor. Channels carry the same tone
/// mix with a per-channel phase offset so they are not bit-identical.
pub struct SyntheticSource {
    sample_rate_hz: f64,
    labels: Vec<String>,
    tones: Vec<ToneSpec>,
    clock: SyntheticClock,
    /// Accumulated frames, channel-major
    generated: Vec<Vec<f64>>,
    running: bool,
}

impl SyntheticSource {
    pub fn new(sample_rate_hz: f64, labels: Vec<String>, tones: Vec<ToneSpec>) -> Self {
        let channels = labels.len();
        Self {
            sample_rate_hz,
            labels,
            tones,
            clock: SyntheticClock::Wall(None),
            generated: vec![Vec::new(); channels],
            running: false,
        }
    }

    /// Wall-clock source over the default montage: a dominant alpha tone
    /// with some beta, resembling a relaxed recording.
    pub fn eeg_default(sample_rate_hz: f64) -> Self {
        let labels = DEFAULT_MONTAGE.iter().map(|s| s.to_string()).collect();
        Self::new(
            sample_rate_hz,
            labels,
            vec![
                ToneSpec {
                    freq_hz: 10.0,
                    amplitude: 20.0,
                },
                ToneSpec {
                    freq_hz: 20.0,
                    amplitude: 6.0,
                },
            ],
        )
    }

    /// Manually-clocked source for deterministic tests
    pub fn manual(sample_rate_hz: f64, labels: Vec<String>, tones: Vec<ToneSpec>) -> Self {
        let mut source = Self::new(sample_rate_hz, labels, tones);
        source.clock = SyntheticClock::Manual { available: 0 };
        source
    }

    /// Make `frames` more frames available (manual clock only)
    pub fn advance_frames(&mut self, frames: usize) {
        if let SyntheticClock::Manual { available } = &mut self.clock {
            *available += frames;
        }
    }

    fn target_frames(&self) -> usize {
        match &self.clock {
            SyntheticClock::Wall(Some(started)) => {
                (started.elapsed().as_secs_f64() * self.sample_rate_hz) as usize
            }
            SyntheticClock::Wall(None) => 0,
            SyntheticClock::Manual { available } => *available,
        }
    }

    fn synthesize_up_to(&mut self, target: usize) {
        let current = self.generated.first().map(|c| c.len()).unwrap_or(0);
        for t in current..target {
            let time = t as f64 / self.sample_rate_hz;
            for (ch, series) in self.generated.iter_mut().enumerate() {
                let phase_offset = ch as f64 * 0.1;
                let value: f64 = self
                    .tones
                    .iter()
                    .map(|tone| {
                        tone.amplitude
                            * (2.0 * std::f64::consts::PI * tone.freq_hz * time + phase_offset)
                                .sin()
                    })
                    .sum();
                series.push(value);
            }
        }
    }
}

impl SampleSource for SyntheticSource {
    fn sample_rate(&self) -> f64 {
        self.sample_rate_hz
    }

    fn channel_labels(&self) -> &[String] {
        &self.labels
    }

    fn get_new_samples(&mut self, since_cursor: u64) -> Result<(SampleChunk, u64), FocusError> {
        if !self.running {
            return Err(FocusError::Source(
                "synthetic source polled before start".to_string(),
            ));
        }
        let target = self.target_frames();
        self.synthesize_up_to(target);

        let total = self.generated.first().map(|c| c.len()).unwrap_or(0);
        let since = (since_cursor as usize).min(total);
        let samples = self
            .generated
            .iter()
            .map(|series| series[since..].to_vec())
            .collect();
        Ok((SampleChunk::new(samples), total as u64))
    }
}

impl SessionControl for SyntheticSource {
    fn start(&mut self) -> Result<(), FocusError> {
        self.running = true;
        if let SyntheticClock::Wall(started) = &mut self.clock {
            *started = Some(Instant::now());
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), FocusError> {
        self.running = false;
        Ok(())
    }

    fn annotate(&mut self, label: &str, duration_secs: f64) -> Result<(), FocusError> {
        debug!("synthetic source annotation '{}' ({} s)", label, duration_secs);
        Ok(())
    }

    fn release(&mut self) -> Result<(), FocusError> {
        Ok(())
    }
}

/// In-memory source of predetermined chunks, useful for tests and playback
pub struct ManualSource {
    sample_rate_hz: f64,
    labels: Vec<String>,
    queue: VecDeque<SampleChunk>,
    cursor: u64,
}

impl ManualSource {
    pub fn new(
        sample_rate_hz: f64,
        labels: Vec<String>,
        chunks: impl IntoIterator<Item = SampleChunk>,
    ) -> Self {
        Self {
            sample_rate_hz,
            labels,
            queue: chunks.into_iter().collect(),
            cursor: 0,
        }
    }
}

impl SampleSource for ManualSource {
    fn sample_rate(&self) -> f64 {
        self.sample_rate_hz
    }

    fn channel_labels(&self) -> &[String] {
        &self.labels
    }

    fn get_new_samples(&mut self, _since_cursor: u64) -> Result<(SampleChunk, u64), FocusError> {
        match self.queue.pop_front() {
            Some(chunk) => {
                self.cursor += chunk.frame_count() as u64;
                Ok((chunk, self.cursor))
            }
            None => Ok((SampleChunk::empty(self.labels.len()), self.cursor)),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

impl SessionControl for ManualSource {
    fn start(&mut self) -> Result<(), FocusError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), FocusError> {
        Ok(())
    }

    fn annotate(&mut self, _label: &str, _duration_secs: f64) -> Result<(), FocusError> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), FocusError> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ChunkLine {
    samples: Vec<Vec<f64>>,
}

/// Reads chunks as newline-delimited JSON (`{"samples": [[...], ...]}`,
/// channel-major) from any `BufRead`, one line per poll.
pub struct NdjsonSource<R: BufRead> {
    reader: R,
    sample_rate_hz: f64,
    labels: Vec<String>,
    cursor: u64,
    exhausted: bool,
}

impl<R: BufRead> NdjsonSource<R> {
    pub fn new(reader: R, sample_rate_hz: f64, labels: Vec<String>) -> Self {
        Self {
            reader,
            sample_rate_hz,
            labels,
            cursor: 0,
            exhausted: false,
        }
    }
}

impl<R: BufRead> SampleSource for NdjsonSource<R> {
    fn sample_rate(&self) -> f64 {
        self.sample_rate_hz
    }

    fn channel_labels(&self) -> &[String] {
        &self.labels
    }

    fn get_new_samples(&mut self, _since_cursor: u64) -> Result<(SampleChunk, u64), FocusError> {
        if self.exhausted {
            return Ok((SampleChunk::empty(self.labels.len()), self.cursor));
        }
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| FocusError::Source(format!("read failed: {}", e)))?;
            if read == 0 {
                self.exhausted = true;
                return Ok((SampleChunk::empty(self.labels.len()), self.cursor));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed: ChunkLine = serde_json::from_str(trimmed)
                .map_err(|e| FocusError::MalformedChunk(format!("bad chunk line: {}", e)))?;
            let chunk = SampleChunk::new(parsed.samples);
            chunk.validate()?;
            self.cursor += chunk.frame_count() as u64;
            return Ok((chunk, self.cursor));
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<R: BufRead> SessionControl for NdjsonSource<R> {
    fn start(&mut self) -> Result<(), FocusError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), FocusError> {
        Ok(())
    }

    fn annotate(&mut self, _label: &str, _duration_secs: f64) -> Result<(), FocusError> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), FocusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ch{}", i + 1)).collect()
    }

    #[test]
    fn test_manual_source_pops_in_order() {
        let chunks = vec![
            SampleChunk::new(vec![vec![1.0, 2.0]]),
            SampleChunk::new(vec![vec![3.0]]),
        ];
        let mut source = ManualSource::new(250.0, labels(1), chunks);

        let (chunk, cursor) = source.get_new_samples(0).unwrap();
        assert_eq!(chunk.samples[0], vec![1.0, 2.0]);
        assert_eq!(cursor, 2);
        assert!(!source.is_exhausted());

        let (chunk, cursor) = source.get_new_samples(cursor).unwrap();
        assert_eq!(chunk.samples[0], vec![3.0]);
        assert_eq!(cursor, 3);
        assert!(source.is_exhausted());

        let (chunk, cursor) = source.get_new_samples(cursor).unwrap();
        assert!(chunk.is_empty());
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_synthetic_manual_clock() {
        let mut source = SyntheticSource::manual(
            250.0,
            labels(2),
            vec![ToneSpec {
                freq_hz: 10.0,
                amplitude: 1.0,
            }],
        );
        source.start().unwrap();

        source.advance_frames(10);
        let (chunk, cursor) = source.get_new_samples(0).unwrap();
        assert_eq!(chunk.frame_count(), 10);
        assert_eq!(chunk.channel_count(), 2);
        assert_eq!(cursor, 10);

        // No advance: nothing new.
        let (chunk, cursor) = source.get_new_samples(cursor).unwrap();
        assert!(chunk.is_empty());
        assert_eq!(cursor, 10);

        // Values stay within the tone amplitude.
        source.advance_frames(100);
        let (chunk, _) = source.get_new_samples(cursor).unwrap();
        for series in &chunk.samples {
            for v in series {
                assert!(v.abs() <= 1.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_synthetic_poll_before_start_errors() {
        let mut source = SyntheticSource::manual(250.0, labels(1), vec![]);
        assert!(source.get_new_samples(0).is_err());
    }

    #[test]
    fn test_ndjson_source_reads_lines() {
        let input = "{\"samples\": [[1.0, 2.0], [3.0, 4.0]]}\n\n{\"samples\": [[5.0], [6.0]]}\n";
        let mut source = NdjsonSource::new(Cursor::new(input), 250.0, labels(2));

        let (chunk, cursor) = source.get_new_samples(0).unwrap();
        assert_eq!(chunk.samples, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(cursor, 2);

        // Blank line is skipped transparently.
        let (chunk, cursor) = source.get_new_samples(cursor).unwrap();
        assert_eq!(chunk.frame_count(), 1);
        assert_eq!(cursor, 3);

        let (chunk, _) = source.get_new_samples(cursor).unwrap();
        assert!(chunk.is_empty());
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_ndjson_source_rejects_bad_line() {
        let mut source = NdjsonSource::new(Cursor::new("not json\n"), 250.0, labels(1));
        assert!(source.get_new_samples(0).is_err());
    }

    #[test]
    fn test_default_montage_labels() {
        let source = SyntheticSource::eeg_default(250.0);
        assert_eq!(source.channel_labels().len(), 8);
        assert_eq!(source.channel_labels()[0], "F3");
        assert_eq!(source.channel_labels()[7], "O2");
    }
}
