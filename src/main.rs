// src/main.rs
//
// Replay driver. Reads hand-landmark frames as JSON lines, runs them
// through the gesture pipeline (or the calibration wizard) and writes the
// resulting events as JSON lines to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gesture_control::adaptive::{LearningEngine, SnapshotCell};
use gesture_control::calibration::{
    CalibrationData, CalibrationEngine, CalibrationStep, CursorMapper, ObservedGesture,
    SampleOutcome,
};
use gesture_control::detection::{GestureClassifier, HandFrame, JointObservation};
use gesture_control::pipeline::{GesturePipeline, PipelineEvent};
use gesture_control::storage::{self, BlobStore, FileBlobStore, CALIBRATION_KEY};
use gesture_control::types::Config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines, Stdout};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Gesture control replay driver
#[derive(Parser, Debug)]
#[command(name = "gesture-control")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Defaults to `run` over stdin
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file path
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Replay landmark frames through the gesture pipeline
    Run {
        /// JSON-lines frame file; `-` or nothing reads stdin
        input: Option<PathBuf>,
    },

    /// Run the calibration wizard over recorded frames
    Calibrate {
        /// JSON-lines frame file; `-` or nothing reads stdin
        input: Option<PathBuf>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Calibrate { .. } => "calibrate",
        }
    }

    /// `None` reads stdin
    fn input(&self) -> Option<&Path> {
        let input = match self {
            Self::Run { input } | Self::Calibrate { input } => input.as_deref(),
        };
        input.filter(|p| *p != Path::new("-"))
    }
}

/// One line of replay input.
#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp: f64,
    #[serde(default = "full_confidence")]
    detection_confidence: f32,
    joints: Vec<JointObservation>,
}

fn full_confidence() -> f32 {
    1.0
}

fn parse_frame(line: &str) -> Result<HandFrame> {
    let record: FrameRecord = serde_json::from_str(line).context("Malformed frame record")?;
    Ok(HandFrame::from_observations(
        &record.joints,
        record.detection_confidence,
        record.timestamp,
    ))
}

type FrameLines = Lines<BufReader<Box<dyn AsyncRead + Unpin + Send>>>;

async fn open_input(input: Option<&Path>) -> Result<FrameLines> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = match input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    Ok(BufReader::new(reader).lines())
}

/// Next parseable frame; malformed lines are logged and skipped.
async fn next_frame(lines: &mut FrameLines, line_no: &mut usize) -> Result<Option<HandFrame>> {
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        *line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match parse_frame(&line) {
            Ok(frame) => return Ok(Some(frame)),
            Err(e) => warn!("⚠️  Skipping line {}: {:#}", line_no, e),
        }
    }
    Ok(None)
}

async fn write_event(out: &mut Stdout, event: &PipelineEvent) -> Result<()> {
    let mut json = serde_json::to_string(event).context("Failed to encode event")?;
    json.push('\n');
    out.write_all(json.as_bytes())
        .await
        .context("Failed to write event")?;
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gesture_control={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run { input: None });

    // Logging level lives in the config, so read it before the subscriber exists
    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);

    info!("✋ Gesture control starting ({})", command.name());
    let config = match loaded {
        Ok(config) => {
            info!("✓ Configuration loaded from {}", cli.config.display());
            config
        }
        Err(e) => {
            warn!("⚠️  Using default configuration: {:#}", e);
            Config::default()
        }
    };

    let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(&config.storage.dir)?);
    info!("✓ State directory: {}", config.storage.dir);

    match command {
        Command::Run { .. } => run(config, store, command.input()).await,
        Command::Calibrate { .. } => calibrate(config, store, command.input()).await,
    }
}

// ============================================================================
// RUN
// ============================================================================

async fn run(config: Config, store: Arc<dyn BlobStore>, input: Option<&Path>) -> Result<()> {
    let calibration: CalibrationData = storage::load_json_or_default(store.as_ref(), CALIBRATION_KEY);
    if !calibration.is_calibrated {
        info!("📐 No calibration found, cursor uses plain screen scaling");
    }

    let snapshots = SnapshotCell::default();
    let mut engine = LearningEngine::restore(config.learning.clone(), snapshots.clone(), store.as_ref());
    if calibration.is_calibrated && engine.statistics().training_samples == 0 {
        engine.seed_from_calibration(&calibration.gesture_thresholds);
    }

    let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let learning = tokio::spawn(engine.run(feedback_rx, store.clone(), Some(report_tx)));

    let cursor = CursorMapper::new(&calibration, &config);
    let mut pipeline = GesturePipeline::new(&config, snapshots)
        .with_feedback(feedback_tx)
        .with_cursor(cursor);

    let mut lines = open_input(input).await?;
    let mut out = tokio::io::stdout();
    let mut line_no = 0usize;

    while let Some(frame) = next_frame(&mut lines, &mut line_no).await? {
        let ctx = pipeline.process_frame(&frame);
        debug!(
            "frame {} t={:.3} {:?} → {:?}",
            ctx.frame_id, ctx.timestamp, ctx.classification.label, ctx.rescored.label
        );

        while let Ok(report) = report_rx.try_recv() {
            pipeline.record_learning_cycle(report);
        }
        for event in pipeline.event_bus().drain() {
            write_event(&mut out, &event).await?;
        }
    }

    let summary = pipeline.metrics().summary();
    // Dropping the pipeline closes the feedback channel and stops the engine
    drop(pipeline);

    let engine = learning.await.context("Learning task failed")?;
    while let Some(report) = report_rx.recv().await {
        write_event(&mut out, &PipelineEvent::LearningCycleCompleted(report)).await?;
    }
    out.flush().await.context("Failed to flush output")?;

    info!(
        "📊 {} frames ({} with a hand), {} events, {} debounced",
        summary.total_frames, summary.frames_with_hand, summary.stabilized_events, summary.debounced_frames
    );
    info!(
        "📊 Metrics: {}",
        serde_json::to_string(&summary).context("Failed to encode metrics")?
    );
    info!(
        "🧠 Learning: {}",
        serde_json::to_string(&engine.statistics()).context("Failed to encode statistics")?
    );
    Ok(())
}

// ============================================================================
// CALIBRATE
// ============================================================================

async fn calibrate(config: Config, store: Arc<dyn BlobStore>, input: Option<&Path>) -> Result<()> {
    let classifier = GestureClassifier::from_config(&config.recognition);
    let min_confidence = config.recognition.min_landmark_confidence;

    let mut wizard = CalibrationEngine::with_store(config.calibration.clone(), store);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    wizard.subscribe(move |event| {
        // Receiver outlives the wizard; a failed send only loses a notification
        let _ = event_tx.send(event.clone());
    });

    wizard.start_calibration();
    // Nothing to collect on the introduction screen
    wizard.next_step();

    let mut lines = open_input(input).await?;
    let mut out = tokio::io::stdout();
    let mut line_no = 0usize;

    while let Some(frame) = next_frame(&mut lines, &mut line_no).await? {
        let Some(hand) = frame.complete(min_confidence) else {
            continue;
        };
        let classification = classifier.classify_pose(&hand);
        let outcome = wizard.process_sample(&ObservedGesture {
            label: classification.label,
            confidence: classification.confidence,
            hand,
        });
        if let SampleOutcome::Advanced(step) = outcome {
            info!("📐 {}: {}", step.title(), step.instructions());
        }

        while let Ok(event) = event_rx.try_recv() {
            if let Some(event) = PipelineEvent::from_calibration(&event) {
                write_event(&mut out, &event).await?;
            }
        }

        if outcome == SampleOutcome::Completed {
            break;
        }
    }
    out.flush().await.context("Failed to flush output")?;

    let status = wizard.status();
    if status.current_step != CalibrationStep::Completed {
        warn!(
            "⚠️  Input ended during '{}' ({} samples), calibration not saved",
            status.current_step.title(),
            status.samples_collected
        );
        wizard.cancel_calibration();
    }
    Ok(())
}
