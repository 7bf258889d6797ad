//! `stride-replay`: run recorded accelerometer samples through the motion
//! pipeline.
//!
//! Input is JSON lines, one sample per line:
//!
//! ```text
//! {"x":0.1,"y":0.2,"z":9.7,"timestampMillis":1700000000000}
//! ```
//!
//! Every emitted `MotionEvent` is printed to stdout as a JSON line.
//! Notifications and diagnostics go to the log on stderr.
//!
//! # Usage
//!
//! ```bash
//! stride-replay walk.jsonl
//! stride-replay --config tuning.toml --full-reset < run.jsonl
//! stride-replay --control start@0 --control reset@500 walk.jsonl
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use stride_sense::notify::{Notifier, TracingNotifier};
use stride_sense::{ControlCommand, MotionPipeline, MotionSample, PipelineConfig, Result, StrideError};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stride-replay",
    version,
    about = "Replay accelerometer samples through the step, activity and fall pipeline",
    long_about = None,
)]
struct Args {
    /// JSON-lines sample file. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// TOML pipeline configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Clear all signal state on start/reset, not just the step counters.
    #[arg(long, default_value_t = false)]
    full_reset: bool,

    /// Apply a control command before the sample with this line index,
    /// written `command@index` (e.g. `reset@120`). Repeatable.
    #[arg(long = "control", value_parser = parse_control)]
    controls: Vec<(ControlCommand, usize)>,

    /// Print the final session state as JSON after the last sample.
    #[arg(long, default_value_t = false)]
    summary: bool,

    /// Log level: off, trace, debug, info, warn, error. `RUST_LOG` directives
    /// take precedence when set.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn parse_control(text: &str) -> std::result::Result<(ControlCommand, usize), String> {
    let (name, index) = text
        .split_once('@')
        .ok_or_else(|| format!("expected command@index, got '{text}'"))?;
    let command = name.parse::<ControlCommand>().map_err(|e| e.to_string())?;
    let index = index.parse::<usize>().map_err(|e| format!("bad index '{index}': {e}"))?;
    Ok((command, index))
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.code(), error = %err, "Replay failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if args.full_reset {
        config.full_reset_on_start = true;
    }

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let notifier = TracingNotifier;
    let mut pipeline = MotionPipeline::new(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut index = 0usize;
    let mut skipped = 0usize;
    let mut emitted = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let sample: MotionSample = match serde_json::from_str(line) {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(line = line_no + 1, error = %err, "Skipping malformed sample");
                skipped += 1;
                continue;
            }
        };

        for (command, _) in args.controls.iter().filter(|(_, at)| *at == index) {
            let state = pipeline.apply(*command);
            tracing::info!(command = %command, state = ?state, sample = index, "Control applied");
        }

        let output = pipeline.process_sample(&sample);
        for notification in &output.notifications {
            notifier.notify(notification);
        }
        for event in &output.events {
            writeln!(out, "{}", serde_json::to_string(event)?)?;
            emitted += 1;
        }
        index += 1;
    }

    if args.summary {
        writeln!(out, "{}", serde_json::to_string(&pipeline.state())?)?;
    }
    out.flush()?;

    tracing::info!(
        samples = index,
        skipped,
        events = emitted,
        step_count = pipeline.step_count(),
        activity = %pipeline.activity_type(),
        "Replay complete"
    );

    if index == 0 && skipped > 0 {
        return Err(StrideError::Config("no valid samples in input".into()));
    }
    Ok(())
}
