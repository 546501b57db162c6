//! Neurofocus - real-time focus scoring engine for streaming multi-channel EEG
//!
//! Computes a bounded focus score from an incrementally arriving brain-signal
//! stream through a deterministic pipeline: signal conditioning → sliding
//! window → feature extraction → adaptive normalization → score smoothing.
//!
//! ## Modules
//!
//! - **Pipeline**: chunk-in, score-out streaming core (`FocusPipeline`)
//! - **Session**: pull-based polling loop with cooperative shutdown
//!   (`SessionRunner`)
//! - **Recording/Analysis**: raw-sample artifacts and offline labeled export
//!
//! Scores follow one convention everywhere: +1 fully focused, -1 fully
//! distracted, 0 neutral or uncalibrated.

pub mod analysis;
pub mod buffer;
pub mod conditioner;
pub mod config;
pub mod error;
pub mod features;
pub mod filters;
pub mod normalizer;
pub mod pipeline;
pub mod recording;
pub mod session;
pub mod sink;
pub mod smoother;
pub mod source;
pub mod types;

pub use config::{ConditioningMode, FeatureStrategy, FocusConfig, NormalizerStrategy};
pub use error::FocusError;
pub use pipeline::FocusPipeline;
pub use recording::{Annotation, Recording};
pub use session::{SessionRunner, SessionSummary, StopFlag};
pub use sink::{ConsoleSink, NdjsonSink, ScoreSink};
pub use source::{ManualSource, NdjsonSource, SampleSource, SessionControl, SyntheticSource};
pub use types::{SampleChunk, ScoreUpdate};

/// Engine version embedded in emitted artifacts
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for emitted artifacts
pub const PRODUCER_NAME: &str = "neurofocus";
