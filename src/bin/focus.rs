//! Focus CLI - command-line interface for the neurofocus engine
//!
//! Commands:
//! - run: live scoring session (synthetic signal, file, or stdin)
//! - record: interactive labeled recording, saved as a JSON artifact
//! - analyze: clean a recorded artifact and export a labeled CSV

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use neurofocus::analysis;
use neurofocus::recording::Recording;
use neurofocus::session::{SessionRunner, SessionSummary};
use neurofocus::sink::{ConsoleSink, NdjsonSink, ScoreSink};
use neurofocus::source::{
    NdjsonSource, SampleSource, SessionControl, SyntheticSource, DEFAULT_MONTAGE,
};
use neurofocus::{FocusConfig, FocusError, ENGINE_VERSION};

/// Focus - real-time focus scoring for streaming EEG
#[derive(Parser)]
#[command(name = "focus")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score focus from streaming brain signals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a live scoring session
    Run {
        /// Pipeline preset
        #[arg(long, default_value = "amplitude")]
        preset: Preset,

        /// Session length in seconds
        #[arg(long, default_value = "60")]
        seconds: f64,

        /// Sample source: "synthetic", "-" for NDJSON chunks on stdin,
        /// or a path to an NDJSON chunk file
        #[arg(long, default_value = "synthetic")]
        source: String,

        /// Score output format
        #[arg(long, default_value = "console")]
        output: OutputKind,

        /// Save the raw recording artifact here at teardown
        #[arg(long)]
        record: Option<PathBuf>,

        /// Load normalizer calibration from file
        #[arg(long)]
        load_calibration: Option<PathBuf>,

        /// Save normalizer calibration to file after the session
        #[arg(long)]
        save_calibration: Option<PathBuf>,

        /// Acquisition sample rate (Hz)
        #[arg(long, default_value = "250.0")]
        sample_rate: f64,

        /// Channel count for NDJSON sources
        #[arg(long, default_value = "8")]
        channels: usize,

        /// Override the analysis window length (seconds)
        #[arg(long)]
        window_seconds: Option<f64>,

        /// Override the poll interval (seconds)
        #[arg(long)]
        update_interval: Option<f64>,

        /// Override the skip window (seconds)
        #[arg(long)]
        skip_seconds: Option<f64>,
    },

    /// Record a labeled session interactively
    Record {
        /// Output path for the recording artifact
        #[arg(short, long)]
        output: PathBuf,

        /// Acquisition sample rate (Hz)
        #[arg(long, default_value = "250.0")]
        sample_rate: f64,
    },

    /// Clean a recorded artifact and export a labeled CSV
    Analyze {
        /// Recording artifact path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// CSV output path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Skip the notch/band-pass cleaning step
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Mean absolute amplitude with min-max calibration
    Amplitude,
    /// Welch beta-ratio with percentile calibration
    Spectral,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputKind {
    /// Console meter, one line per score
    Console,
    /// Newline-delimited JSON score records
    Ndjson,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FocusCliError> {
    match cli.command {
        Commands::Run {
            preset,
            seconds,
            source,
            output,
            record,
            load_calibration,
            save_calibration,
            sample_rate,
            channels,
            window_seconds,
            update_interval,
            skip_seconds,
        } => {
            let mut config = match preset {
                Preset::Amplitude => FocusConfig::amplitude(),
                Preset::Spectral => FocusConfig::spectral(),
            };
            config.sample_rate_hz = sample_rate;
            if let Some(w) = window_seconds {
                config.window_seconds = w;
            }
            if let Some(u) = update_interval {
                config.update_interval_secs = u;
            }
            if let Some(s) = skip_seconds {
                config.skip_seconds = s;
            }

            let options = RunOptions {
                seconds,
                output,
                record,
                load_calibration,
                save_calibration,
            };

            match source.as_str() {
                "synthetic" => {
                    config.channel_count = DEFAULT_MONTAGE.len();
                    cmd_run(SyntheticSource::eeg_default(sample_rate), config, options)
                }
                "-" => {
                    config.channel_count = channels;
                    let source = NdjsonSource::new(
                        BufReader::new(io::stdin()),
                        sample_rate,
                        channel_labels(channels),
                    );
                    cmd_run(source, config, options)
                }
                path => {
                    config.channel_count = channels;
                    let file = fs::File::open(path)?;
                    let source = NdjsonSource::new(
                        BufReader::new(file),
                        sample_rate,
                        channel_labels(channels),
                    );
                    cmd_run(source, config, options)
                }
            }
        }

        Commands::Record {
            output,
            sample_rate,
        } => cmd_record(&output, sample_rate),

        Commands::Analyze { input, output, raw } => cmd_analyze(&input, &output, raw),
    }
}

struct RunOptions {
    seconds: f64,
    output: OutputKind,
    record: Option<PathBuf>,
    load_calibration: Option<PathBuf>,
    save_calibration: Option<PathBuf>,
}

fn cmd_run<S>(source: S, config: FocusConfig, options: RunOptions) -> Result<(), FocusCliError>
where
    S: SampleSource + SessionControl,
{
    let pipeline = neurofocus::FocusPipeline::new(config)?;

    let sink: Box<dyn ScoreSink> = match options.output {
        OutputKind::Console => Box::new(ConsoleSink::new(io::stdout())),
        OutputKind::Ndjson => Box::new(NdjsonSink::new(io::stdout(), true)),
    };

    let mut runner = SessionRunner::new(source, sink, pipeline)
        .with_max_duration(Duration::from_secs_f64(options.seconds));
    if options.record.is_none() {
        runner = runner.without_recording();
    }

    if let Some(path) = &options.load_calibration {
        let json = fs::read_to_string(path)?;
        runner.load_calibration(&json)?;
    }

    let summary = runner.run()?;

    if let Some(path) = &options.save_calibration {
        fs::write(path, runner.save_calibration()?)?;
    }
    if let Some(path) = &options.record {
        persist_recording(&summary, path)?;
    }

    eprintln!(
        "session {}: {} frames, {} scores{}",
        summary.session_id,
        summary.frames_processed,
        summary.scores_emitted,
        summary
            .loop_error
            .as_ref()
            .map(|e| format!(", ended early: {}", e))
            .unwrap_or_default()
    );

    if summary.loop_error.is_some() {
        Err(FocusCliError::SessionAborted)
    } else {
        Ok(())
    }
}

fn persist_recording(summary: &SessionSummary, path: &Path) -> Result<(), FocusCliError> {
    if let Some(recording) = &summary.recording {
        fs::write(path, recording.to_json()?)?;
        eprintln!("recording saved to {}", path.display());
    }
    Ok(())
}

fn cmd_record(output: &Path, sample_rate: f64) -> Result<(), FocusCliError> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(FocusCliError::NotInteractive);
    }

    let mut source = SyntheticSource::eeg_default(sample_rate);
    source.start()?;
    let started = Instant::now();

    println!("--- RECORDING ---");
    println!("The stream is live. Mark segments with labels as you go.");

    let mut recording = Recording::new(sample_rate, source.channel_labels().to_vec());
    let stdin = io::stdin();

    loop {
        println!();
        println!("{}", "=".repeat(30));
        println!("Type a label ('focus', 'distracted', ...)");
        println!("Type 'exit' to save and quit.");
        println!("{}", "=".repeat(30));
        print!("Current activity label: ");
        io::stdout().flush()?;

        let mut label = String::new();
        if stdin.lock().read_line(&mut label)? == 0 {
            break;
        }
        let label = label.trim().to_string();
        if label.is_empty() {
            continue;
        }
        if label.eq_ignore_ascii_case("exit") {
            break;
        }

        print!("How many seconds to record '{}'? ", label);
        io::stdout().flush()?;
        let mut duration = String::new();
        stdin.lock().read_line(&mut duration)?;
        let duration: f64 = match duration.trim().parse() {
            Ok(d) => d,
            Err(_) => {
                println!("Invalid number. Skipping.");
                continue;
            }
        };

        println!(">>> RECORDING: {} for {} seconds", label, duration);
        source.annotate(&label, duration)?;
        recording.annotations.push(neurofocus::Annotation {
            onset_secs: started.elapsed().as_secs_f64(),
            duration_secs: duration,
            label,
        });

        let mut remaining = duration;
        while remaining > 0.0 {
            print!("Recording... {:.0}s remaining\r", remaining);
            io::stdout().flush()?;
            std::thread::sleep(Duration::from_secs(1));
            remaining -= 1.0;
        }
        println!(">>> DONE");
    }

    // Teardown: drain the stream, stop, save, then release.
    println!("Stopping acquisition...");
    let (chunk, _) = source.get_new_samples(0)?;
    recording.append_chunk(&chunk)?;
    source.stop()?;

    fs::write(output, recording.to_json()?)?;
    println!("Saved {} to {}", recording.session_id, output.display());

    if let Err(e) = source.release() {
        log::warn!("device release failed (data already saved): {}", e);
    }
    Ok(())
}

fn cmd_analyze(input: &Path, output: &Path, raw: bool) -> Result<(), FocusCliError> {
    let json = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::Read::read_to_string(&mut io::stdin(), &mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let recording = Recording::from_json(&json)?;
    if recording.frame_count() == 0 {
        return Err(FocusCliError::EmptyRecording);
    }

    let cleaned = if raw {
        recording
    } else {
        analysis::clean(&recording)
    };
    let series = analysis::label_series(&cleaned);

    if output.to_string_lossy() == "-" {
        analysis::write_csv(&series, io::stdout())?;
    } else {
        let file = fs::File::create(output)?;
        analysis::write_csv(&series, file)?;
        eprintln!(
            "labeled series ({} frames, {} channels) written to {}",
            series.time.len(),
            series.channel_labels.len(),
            output.display()
        );
    }
    Ok(())
}

fn channel_labels(count: usize) -> Vec<String> {
    if count == DEFAULT_MONTAGE.len() {
        DEFAULT_MONTAGE.iter().map(|s| s.to_string()).collect()
    } else {
        (0..count).map(|i| format!("ch{}", i + 1)).collect()
    }
}

// Error types

#[derive(Debug)]
enum FocusCliError {
    Io(io::Error),
    Engine(FocusError),
    Json(serde_json::Error),
    SessionAborted,
    NotInteractive,
    EmptyRecording,
}

impl From<io::Error> for FocusCliError {
    fn from(e: io::Error) -> Self {
        FocusCliError::Io(e)
    }
}

impl From<FocusError> for FocusCliError {
    fn from(e: FocusError) -> Self {
        FocusCliError::Engine(e)
    }
}

impl From<serde_json::Error> for FocusCliError {
    fn from(e: serde_json::Error) -> Self {
        FocusCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FocusCliError> for CliError {
    fn from(e: FocusCliError) -> Self {
        match e {
            FocusCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FocusCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check configuration and input format".to_string()),
            },
            FocusCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FocusCliError::SessionAborted => CliError {
                code: "SESSION_ABORTED".to_string(),
                message: "session ended early on an acquisition error".to_string(),
                hint: Some("Captured data was saved; check the device connection".to_string()),
            },
            FocusCliError::NotInteractive => CliError {
                code: "NOT_INTERACTIVE".to_string(),
                message: "record requires an interactive terminal".to_string(),
                hint: Some("Run from a TTY to enter labels".to_string()),
            },
            FocusCliError::EmptyRecording => CliError {
                code: "EMPTY_RECORDING".to_string(),
                message: "recording holds no samples".to_string(),
                hint: Some("Record a session before analyzing it".to_string()),
            },
        }
    }
}
