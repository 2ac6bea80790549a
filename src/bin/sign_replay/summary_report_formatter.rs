use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use fingerspell::{FeedbackOutcome, FrameOutcome};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub generated_at: String,
    pub capture_path: String,
    pub target_label: Option<String>,
    pub frame_count: usize,
    pub waiting_frames: usize,
    pub undetermined_frames: usize,
    pub stable_frames: usize,
    pub stable_labels: BTreeMap<String, usize>,
    pub rejected_frames: usize,
    pub feedback: FeedbackCounts,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackCounts {
    pub ok: usize,
    pub throttled: usize,
    pub failed: usize,
}

impl ReplaySummary {
    pub fn new(generated_at: String, capture_path: String, target_label: Option<String>) -> Self {
        Self {
            generated_at,
            capture_path,
            target_label,
            frame_count: 0,
            waiting_frames: 0,
            undetermined_frames: 0,
            stable_frames: 0,
            stable_labels: BTreeMap::new(),
            rejected_frames: 0,
            feedback: FeedbackCounts::default(),
        }
    }

    pub fn record_outcome(&mut self, outcome: &FrameOutcome) {
        self.frame_count += 1;
        match outcome {
            FrameOutcome::Waiting => self.waiting_frames += 1,
            FrameOutcome::Undetermined => self.undetermined_frames += 1,
            FrameOutcome::Stable { decision, .. } => {
                self.stable_frames += 1;
                *self.stable_labels.entry(decision.label.clone()).or_default() += 1;
            }
        }
    }

    pub fn record_rejected(&mut self) {
        self.frame_count += 1;
        self.rejected_frames += 1;
    }

    pub fn record_feedback(&mut self, outcome: &FeedbackOutcome) {
        match outcome {
            FeedbackOutcome::Ok(_) => self.feedback.ok += 1,
            FeedbackOutcome::Throttled(_) => self.feedback.throttled += 1,
            FeedbackOutcome::Failed(_) => self.feedback.failed += 1,
        }
    }
}

/// Writes the summary as pretty JSON, creating missing parent directories.
pub fn write_summary(path: &Path, summary: &ReplaySummary) -> Result<(), String> {
    let mut json = serde_json::to_string_pretty(summary)
        .map_err(|err| format!("Failed to serialize replay summary: {err}"))?;
    json.push('\n');

    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|err| format!("Failed to create '{}': {err}", dir.display()))?,
        _ => {}
    }
    fs::write(path, json).map_err(|err| format!("Failed to write '{}': {err}", path.display()))
}
