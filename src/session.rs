//! Session lifecycle
//!
//! `SessionRunner` drives the single-threaded, pull-based poll loop: request
//! new samples since the last cursor, feed them through the pipeline, hand
//! scores to the sink, sleep, repeat. Cancellation is cooperative via
//! `StopFlag`; teardown (stop acquisition, keep the recording, release the
//! device) runs on every exit path, including loop errors.

use crate::error::FocusError;
use crate::pipeline::FocusPipeline;
use crate::recording::Recording;
use crate::sink::ScoreSink;
use crate::source::{SampleSource, SessionControl};
use crate::types::SampleChunk;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Shared cancellation flag. Clone it into an interrupt handler; the running
/// session finishes its current poll cycle and tears down in order.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened over one `run()`
#[derive(Debug)]
pub struct SessionSummary {
    pub session_id: Uuid,
    /// Frames fed to the pipeline (after the skip window)
    pub frames_processed: u64,
    /// Scores the pipeline emitted (whether or not delivery succeeded)
    pub scores_emitted: u64,
    /// Error that ended the loop early, already logged
    pub loop_error: Option<String>,
    /// Accumulated raw data, present unless recording was disabled
    pub recording: Option<Recording>,
}

/// Polling loop over a sample source, pipeline, and score sink
pub struct SessionRunner<S, K>
where
    S: SampleSource + SessionControl,
    K: ScoreSink,
{
    source: S,
    sink: K,
    pipeline: FocusPipeline,
    stop: StopFlag,
    record: bool,
    max_duration: Option<Duration>,
}

impl<S, K> SessionRunner<S, K>
where
    S: SampleSource + SessionControl,
    K: ScoreSink,
{
    pub fn new(source: S, sink: K, pipeline: FocusPipeline) -> Self {
        Self {
            source,
            sink,
            pipeline,
            stop: StopFlag::new(),
            record: true,
            max_duration: None,
        }
    }

    /// Handle for cooperative cancellation
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Bound the session to a wall-clock duration
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Skip accumulating raw samples (scores only)
    pub fn without_recording(mut self) -> Self {
        self.record = false;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pipeline(&self) -> &FocusPipeline {
        &self.pipeline
    }

    /// Restore pipeline calibration before running
    pub fn load_calibration(&mut self, json: &str) -> Result<(), FocusError> {
        self.pipeline.load_calibration(json)
    }

    /// Serialize pipeline calibration after running
    pub fn save_calibration(&self) -> Result<String, FocusError> {
        self.pipeline.save_calibration()
    }

    /// Run the acquisition loop until stopped, bounded, exhausted, or failed.
    ///
    /// Only a failure to start acquisition is returned as an error; loop
    /// errors are logged, recorded in the summary, and still tear down
    /// cleanly so captured data survives.
    pub fn run(&mut self) -> Result<SessionSummary, FocusError> {
        self.source.start()?;
        info!(
            "session started: {} channels at {} Hz",
            self.source.channel_labels().len(),
            self.source.sample_rate()
        );

        let started = Instant::now();
        let mut recording = Recording::new(
            self.source.sample_rate(),
            self.source.channel_labels().to_vec(),
        );
        let session_id = recording.session_id;

        let config = self.pipeline.config();
        let update_interval = Duration::from_secs_f64(config.update_interval_secs);
        let skip_frames = (config.skip_seconds * config.sample_rate_hz) as u64;

        let mut cursor: u64 = 0;
        let mut frames_processed: u64 = 0;
        let mut scores_emitted: u64 = 0;
        let mut loop_error: Option<String> = None;

        loop {
            if self.stop.is_set() {
                info!("stop requested, finishing session");
                break;
            }
            if let Some(max) = self.max_duration {
                if started.elapsed() >= max {
                    info!("session duration reached");
                    break;
                }
            }

            match self.source.get_new_samples(cursor) {
                Ok((chunk, next_cursor)) => {
                    let chunk = trim_skipped(chunk, cursor, skip_frames);
                    cursor = next_cursor;

                    if !chunk.is_empty() {
                        if self.record {
                            if let Err(e) = recording.append_chunk(&chunk) {
                                warn!("dropping chunk from recording: {}", e);
                            }
                        }
                        frames_processed += chunk.frame_count() as u64;

                        if let Some(update) = self.pipeline.push_chunk(&chunk) {
                            scores_emitted += 1;
                            if let Err(e) = self.sink.deliver(&update) {
                                warn!("score delivery failed: {}", e);
                            }
                        } else if !self.pipeline.is_ready() {
                            debug!(
                                "calibrating window... {:.0}%",
                                self.pipeline.warmup_progress() * 100.0
                            );
                        }
                    }
                }
                Err(e) => {
                    error!("acquisition error, shutting down: {}", e);
                    loop_error = Some(e.to_string());
                    break;
                }
            }

            if self.source.is_exhausted() {
                debug!("sample source exhausted");
                break;
            }
            std::thread::sleep(update_interval);
        }

        // Teardown runs regardless of how the loop ended. Data integrity
        // takes priority over a clean disconnect.
        if let Err(e) = self.source.stop() {
            warn!("failed to stop acquisition: {}", e);
        }
        let recording = self.record.then_some(recording);
        if let Err(e) = self.source.release() {
            warn!("device release failed (data already captured): {}", e);
        }

        Ok(SessionSummary {
            session_id,
            frames_processed,
            scores_emitted,
            loop_error,
            recording,
        })
    }
}

/// Drop the leading frames of `chunk` that fall inside the skip window
fn trim_skipped(chunk: SampleChunk, cursor: u64, skip_frames: u64) -> SampleChunk {
    if cursor >= skip_frames || chunk.is_empty() {
        return chunk;
    }
    let drop = ((skip_frames - cursor) as usize).min(chunk.frame_count());
    if drop == 0 {
        return chunk;
    }
    SampleChunk::new(
        chunk
            .samples
            .iter()
            .map(|series| series[drop..].to_vec())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConditioningMode, FeatureStrategy, FocusConfig, NormalizerStrategy, SmoothingConfig,
    };
    use crate::source::ManualSource;
    use crate::types::ScoreUpdate;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config() -> FocusConfig {
        FocusConfig {
            sample_rate_hz: 10.0,
            channel_count: 1,
            window_seconds: 1.0,
            update_interval_secs: 0.001,
            skip_seconds: 0.0,
            conditioning: ConditioningMode::Off,
            feature: FeatureStrategy::Amplitude,
            normalizer: NormalizerStrategy::MinMax,
            smoothing: SmoothingConfig::default(),
        }
    }

    /// Sink that collects every delivered update
    #[derive(Clone, Default)]
    struct VecSink(Rc<RefCell<Vec<ScoreUpdate>>>);

    impl ScoreSink for VecSink {
        fn deliver(&mut self, update: &ScoreUpdate) -> Result<(), FocusError> {
            self.0.borrow_mut().push(update.clone());
            Ok(())
        }
    }

    /// Sink that always fails
    struct FailingSink;

    impl ScoreSink for FailingSink {
        fn deliver(&mut self, _update: &ScoreUpdate) -> Result<(), FocusError> {
            Err(FocusError::Sink("connection refused".to_string()))
        }
    }

    /// Source that errors on the second poll; records lifecycle calls
    struct FlakySource {
        labels: Vec<String>,
        polls: usize,
        stopped: Rc<RefCell<bool>>,
        released: Rc<RefCell<bool>>,
    }

    impl SampleSource for FlakySource {
        fn sample_rate(&self) -> f64 {
            10.0
        }
        fn channel_labels(&self) -> &[String] {
            &self.labels
        }
        fn get_new_samples(
            &mut self,
            _since: u64,
        ) -> Result<(SampleChunk, u64), FocusError> {
            self.polls += 1;
            if self.polls >= 2 {
                Err(FocusError::Source("device vanished".to_string()))
            } else {
                Ok((SampleChunk::new(vec![vec![1.0; 5]]), 5))
            }
        }
    }

    impl SessionControl for FlakySource {
        fn start(&mut self) -> Result<(), FocusError> {
            Ok(())
        }
        fn stop(&mut self) -> Result<(), FocusError> {
            *self.stopped.borrow_mut() = true;
            Ok(())
        }
        fn annotate(&mut self, _label: &str, _duration: f64) -> Result<(), FocusError> {
            Ok(())
        }
        fn release(&mut self) -> Result<(), FocusError> {
            *self.released.borrow_mut() = true;
            // Disconnect hiccups are logged and suppressed by the runner.
            Err(FocusError::Source("bluetooth timeout".to_string()))
        }
    }

    fn chunk_of(value: f64, frames: usize) -> SampleChunk {
        SampleChunk::new(vec![vec![value; frames]])
    }

    #[test]
    fn test_run_processes_queue_and_records() {
        let source = ManualSource::new(
            10.0,
            vec!["F3".to_string()],
            vec![chunk_of(0.0, 10), chunk_of(1.0, 5), chunk_of(2.0, 5)],
        );
        let sink = VecSink::default();
        let pipeline = FocusPipeline::new(fast_config()).unwrap();

        let mut runner = SessionRunner::new(source, sink.clone(), pipeline);
        let summary = runner.run().unwrap();

        assert_eq!(summary.frames_processed, 20);
        // Window fills on the first chunk; every chunk after warm-up scores.
        assert_eq!(summary.scores_emitted, 3);
        assert_eq!(sink.0.borrow().len(), 3);
        assert!(summary.loop_error.is_none());

        let recording = summary.recording.unwrap();
        assert_eq!(recording.frame_count(), 20);
        assert_eq!(recording.channel_labels, vec!["F3".to_string()]);
    }

    #[test]
    fn test_sink_failure_does_not_abort() {
        let source = ManualSource::new(
            10.0,
            vec!["F3".to_string()],
            vec![chunk_of(0.0, 10), chunk_of(1.0, 10)],
        );
        let pipeline = FocusPipeline::new(fast_config()).unwrap();

        let mut runner = SessionRunner::new(source, FailingSink, pipeline);
        let summary = runner.run().unwrap();

        // Both scores were emitted even though every delivery failed.
        assert_eq!(summary.scores_emitted, 2);
        assert!(summary.loop_error.is_none());
    }

    #[test]
    fn test_source_error_still_tears_down() {
        let stopped = Rc::new(RefCell::new(false));
        let released = Rc::new(RefCell::new(false));
        let source = FlakySource {
            labels: vec!["F3".to_string()],
            polls: 0,
            stopped: stopped.clone(),
            released: released.clone(),
        };
        let pipeline = FocusPipeline::new(fast_config()).unwrap();

        let mut runner = SessionRunner::new(source, VecSink::default(), pipeline);
        let summary = runner.run().unwrap();

        assert!(summary.loop_error.is_some());
        // Teardown ran: acquisition stopped, release attempted (its failure
        // was suppressed), and the first chunk survived.
        assert!(*stopped.borrow());
        assert!(*released.borrow());
        assert_eq!(summary.recording.unwrap().frame_count(), 5);
    }

    #[test]
    fn test_stop_flag_preempts_loop() {
        let source = ManualSource::new(10.0, vec!["F3".to_string()], vec![chunk_of(0.0, 10)]);
        let pipeline = FocusPipeline::new(fast_config()).unwrap();

        let mut runner = SessionRunner::new(source, VecSink::default(), pipeline);
        runner.stop_flag().trigger();
        let summary = runner.run().unwrap();

        assert_eq!(summary.frames_processed, 0);
        assert_eq!(summary.scores_emitted, 0);
    }

    #[test]
    fn test_skip_seconds_discards_leading_frames() {
        let mut config = fast_config();
        config.skip_seconds = 1.0; // 10 frames at 10 Hz
        let source = ManualSource::new(
            10.0,
            vec!["F3".to_string()],
            vec![chunk_of(9.0, 15), chunk_of(1.0, 5)],
        );
        let pipeline = FocusPipeline::new(config).unwrap();

        let mut runner = SessionRunner::new(source, VecSink::default(), pipeline);
        let summary = runner.run().unwrap();

        // 20 frames arrived, the first 10 were discarded.
        assert_eq!(summary.frames_processed, 10);
        assert_eq!(summary.recording.unwrap().frame_count(), 10);
    }

    #[test]
    fn test_without_recording() {
        let source = ManualSource::new(10.0, vec!["F3".to_string()], vec![chunk_of(0.0, 10)]);
        let pipeline = FocusPipeline::new(fast_config()).unwrap();

        let mut runner =
            SessionRunner::new(source, VecSink::default(), pipeline).without_recording();
        let summary = runner.run().unwrap();
        assert!(summary.recording.is_none());
    }
}
