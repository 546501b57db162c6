//! Score sinks
//!
//! Downstream consumers of emitted scores. Delivery failures are surfaced as
//! errors for the session runner to log; they must never tear down the loop.

use crate::error::FocusError;
use crate::types::ScoreUpdate;
use std::io::Write;

/// Accepts emitted focus scores
pub trait ScoreSink {
    fn deliver(&mut self, update: &ScoreUpdate) -> Result<(), FocusError>;
}

impl<T: ScoreSink + ?Sized> ScoreSink for Box<T> {
    fn deliver(&mut self, update: &ScoreUpdate) -> Result<(), FocusError> {
        (**self).deliver(update)
    }
}

/// Renders each score as a console meter: `FOCUS: -0.23 |███░░░░|`
pub struct ConsoleSink<W: Write> {
    writer: W,
    bar_len: usize,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bar_len: 20,
        }
    }

    pub fn with_bar_len(writer: W, bar_len: usize) -> Self {
        Self { writer, bar_len }
    }
}

impl<W: Write> ScoreSink for ConsoleSink<W> {
    fn deliver(&mut self, update: &ScoreUpdate) -> Result<(), FocusError> {
        // Map [-1, 1] onto bar cells.
        let pos = (((update.score + 1.0) / 2.0) * self.bar_len as f64) as usize;
        let pos = pos.min(self.bar_len);
        let bar: String = "█".repeat(pos) + &"░".repeat(self.bar_len - pos);
        writeln!(self.writer, "FOCUS: {:+.2} |{}|", update.score, bar)
            .and_then(|_| self.writer.flush())
            .map_err(|e| FocusError::Sink(format!("console write failed: {}", e)))
    }
}

/// Writes one JSON object per score, newline-delimited
pub struct NdjsonSink<W: Write> {
    writer: W,
    flush: bool,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W, flush: bool) -> Self {
        Self { writer, flush }
    }
}

impl<W: Write> ScoreSink for NdjsonSink<W> {
    fn deliver(&mut self, update: &ScoreUpdate) -> Result<(), FocusError> {
        let line = serde_json::to_string(update)?;
        writeln!(self.writer, "{}", line)
            .map_err(|e| FocusError::Sink(format!("ndjson write failed: {}", e)))?;
        if self.flush {
            self.writer
                .flush()
                .map_err(|e| FocusError::Sink(format!("ndjson flush failed: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn update(score: f64) -> ScoreUpdate {
        ScoreUpdate {
            score,
            raw_feature: 1.5,
            normalized: 0.75,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_console_bar_neutral() {
        let mut out = Vec::new();
        ConsoleSink::with_bar_len(&mut out, 10)
            .deliver(&update(0.0))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("FOCUS: +0.00"));
        // Score 0 fills half the bar.
        assert_eq!(text.matches('█').count(), 5);
        assert_eq!(text.matches('░').count(), 5);
    }

    #[test]
    fn test_console_bar_extremes() {
        let mut out = Vec::new();
        ConsoleSink::with_bar_len(&mut out, 10)
            .deliver(&update(1.0))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('█').count(), 10);
        assert_eq!(text.matches('░').count(), 0);

        let mut out = Vec::new();
        ConsoleSink::with_bar_len(&mut out, 10)
            .deliver(&update(-1.0))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('█').count(), 0);
    }

    #[test]
    fn test_ndjson_sink_round_trips() {
        let mut out = Vec::new();
        NdjsonSink::new(&mut out, true).deliver(&update(0.42)).unwrap();

        let text = String::from_utf8(out).unwrap();
        let parsed: ScoreUpdate = serde_json::from_str(text.trim()).unwrap();
        assert!((parsed.score - 0.42).abs() < 1e-12);
        assert!((parsed.normalized - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ndjson_one_line_per_score() {
        let mut out = Vec::new();
        {
            let mut sink = NdjsonSink::new(&mut out, false);
            sink.deliver(&update(0.1)).unwrap();
            sink.deliver(&update(0.2)).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
