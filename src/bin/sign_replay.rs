use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use fingerspell::{
    FeedbackGate, FeedbackOutcome, FeedbackPoll, FrameOutcome, LocalCoach, Recognizer,
    RecognizerBuilder, RecognizerConfig,
};
use serde::Serialize;

#[path = "sign_replay/frame_reader.rs"]
mod frame_reader;
#[path = "sign_replay/summary_report_formatter.rs"]
mod summary_report_formatter;

use frame_reader::{read_frames, ReplayFrame};
use summary_report_formatter::{write_summary, ReplaySummary};

#[derive(Debug, Parser)]
#[command(name = "sign_replay")]
#[command(about = "Replay a recorded hand-landmark capture through the letter recognizer")]
struct Args {
    /// JSON-lines capture, one `{"hand_present": .., "landmarks": ..}` object per frame.
    #[arg(long)]
    frames: PathBuf,
    /// Nearest-neighbour reference set (JSON).
    #[arg(long, env = "FINGERSPELL_MODEL")]
    model: Option<PathBuf>,
    /// Recognizer configuration (JSON); defaults apply to omitted fields.
    #[arg(long, env = "FINGERSPELL_CONFIG")]
    config: Option<PathBuf>,
    /// Letter the signer is practicing; enables coaching feedback.
    #[arg(long)]
    target: Option<String>,
    /// Delay between frames, to replay at capture speed.
    #[arg(long, default_value_t = 0)]
    frame_interval_ms: u64,
    /// Write a JSON summary report here.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FrameLine<'a> {
    line: usize,
    outcome: &'a FrameOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<&'a FeedbackOutcome>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fingerspell=info,sign_replay=info".into()),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => RecognizerConfig::load(path).map_err(|err| err.to_string())?,
        None => RecognizerConfig::default(),
    };
    if let Some(model) = args.model.as_ref() {
        config.model_path = Some(model.to_string_lossy().to_string());
    }
    if config.model_path.is_none() {
        return Err(
            "A reference set is required: pass --model or set model_path in --config.".to_string(),
        );
    }

    let frames = read_frames(&args.frames)?;
    if frames.is_empty() {
        return Err(format!("Capture '{}' contains no frames.", args.frames.display()));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| format!("Failed to start async runtime: {err}"))?;

    let summary = runtime.block_on(replay(&args, config, frames))?;

    if let Some(out) = args.out.as_ref() {
        write_summary(out, &summary)?;
        tracing::info!(path = %out.display(), "summary written");
    }
    Ok(())
}

async fn replay(
    args: &Args,
    config: RecognizerConfig,
    frames: Vec<ReplayFrame>,
) -> Result<ReplaySummary, String> {
    let gate = args
        .target
        .as_ref()
        .map(|_| FeedbackGate::new(Arc::new(LocalCoach), config.feedback.clone()));
    let mut recognizer = build_recognizer(config, gate)?;
    let mut summary = ReplaySummary::new(
        Utc::now().to_rfc3339(),
        args.frames.display().to_string(),
        args.target.clone(),
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let interval = Duration::from_millis(args.frame_interval_ms);

    for frame in frames {
        let submitted = frame.landmarks.and_then(|landmarks| {
            recognizer.submit_frame(frame.hand_present, landmarks.as_ref())
        });
        let outcome = match submitted {
            Ok(outcome) => outcome,
            Err(err) if err.is_fatal() => {
                return Err(format!("line {}: {err}", frame.line));
            }
            Err(err) => {
                tracing::warn!(line = frame.line, error = %err, "frame rejected");
                summary.record_rejected();
                continue;
            }
        };
        summary.record_outcome(&outcome);

        let feedback = frame_feedback(&mut recognizer, args.target.as_deref(), &outcome).await;
        if let Some(feedback) = feedback.as_ref() {
            summary.record_feedback(feedback);
        }

        let line = FrameLine {
            line: frame.line,
            outcome: &outcome,
            feedback: feedback.as_ref(),
        };
        serde_json::to_writer(&mut out, &line)
            .map_err(|err| format!("Failed to serialize frame outcome: {err}"))?;
        out.write_all(b"\n")
            .map_err(|err| format!("Failed to write frame outcome: {err}"))?;

        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    tracing::info!(
        frames = summary.frame_count,
        stable = summary.stable_frames,
        undetermined = summary.undetermined_frames,
        rejected = summary.rejected_frames,
        "replay finished"
    );
    Ok(summary)
}

/// Requests coaching for a stable frame and reports whatever feedback settled,
/// including canned texts the gate answers with immediately.
async fn frame_feedback(
    recognizer: &mut Recognizer,
    target: Option<&str>,
    outcome: &FrameOutcome,
) -> Option<FeedbackOutcome> {
    let mut poll = match target {
        Some(target) if outcome.stable().is_some() => recognizer.request_feedback(target),
        _ => recognizer.poll_feedback(),
    };
    if poll == FeedbackPoll::Pending {
        // Let the advice task run before polling it again.
        tokio::task::yield_now().await;
        poll = recognizer.poll_feedback();
    }
    match poll {
        FeedbackPoll::Ready(feedback) => Some(feedback),
        FeedbackPoll::Idle | FeedbackPoll::Pending => None,
    }
}

fn build_recognizer(
    config: RecognizerConfig,
    gate: Option<FeedbackGate>,
) -> Result<Recognizer, String> {
    let mut builder = RecognizerBuilder::new(config);
    if let Some(gate) = gate {
        builder = builder.with_feedback_gate(gate);
    }
    builder.build().map_err(|err| err.to_string())
}
