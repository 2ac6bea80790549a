use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;

/// Index of the wrist landmark; every feature is expressed relative to it.
pub const WRIST: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point2 {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// One hand's landmarks for one video frame, in normalized image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: Vec<Point2>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Builds a frame from interleaved `[x0, y0, x1, y1, ...]` values.
    pub fn from_flat(values: &[f32]) -> Result<Self, RecognitionError> {
        if values.len() % 2 != 0 {
            return Err(RecognitionError::UnpairedCoordinate {
                values: values.len(),
            });
        }
        Ok(Self {
            points: values
                .chunks_exact(2)
                .map(|xy| Point2::new(xy[0], xy[1]))
                .collect(),
        })
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl From<Vec<Point2>> for LandmarkFrame {
    fn from(points: Vec<Point2>) -> Self {
        Self::new(points)
    }
}

/// Wrist-relative `(x, y)` pairs, two scalars per landmark.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeatureVector(Vec<f32>);

impl NormalizedFeatureVector {
    pub(crate) fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Classifier output for one full window. `labels` is the adapter's class
/// order and is index-aligned with `probabilities`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionDistribution {
    pub labels: Vec<String>,
    pub probabilities: Vec<f32>,
}

impl PredictionDistribution {
    pub fn new(labels: Vec<String>, probabilities: Vec<f32>) -> Self {
        Self {
            labels,
            probabilities,
        }
    }

    pub fn probability_of(&self, label: &str) -> Option<f32> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.probabilities.get(i).copied())
    }

    /// Highest-probability label; ties go to the earliest class.
    pub fn argmax(&self) -> Option<RankedLabel> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &p) in self.probabilities.iter().enumerate() {
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((i, p));
            }
        }
        best.and_then(|(i, p)| self.ranked(i, p))
    }

    /// Highest-probability label other than `label`; ties go to the earliest class.
    pub fn runner_up(&self, label: &str) -> Option<RankedLabel> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &p) in self.probabilities.iter().enumerate() {
            if self.labels.get(i).map(String::as_str) == Some(label) {
                continue;
            }
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((i, p));
            }
        }
        best.and_then(|(i, p)| self.ranked(i, p))
    }

    fn ranked(&self, index: usize, probability: f32) -> Option<RankedLabel> {
        self.labels.get(index).map(|label| RankedLabel {
            label: label.clone(),
            probability,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLabel {
    pub label: String,
    pub probability: f32,
}

impl RankedLabel {
    /// Rounded integer percentage, e.g. `85`.
    pub fn percent(&self) -> u32 {
        (self.probability * 100.0).round().max(0.0) as u32
    }

    /// One-decimal percentage string, e.g. `"85.0%"`.
    pub fn percent_one_decimal(&self) -> String {
        format!("{:.1}%", self.probability * 100.0)
    }
}

/// Extra guidance attached to a stable decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hint {
    /// Top-2 probabilities are within the ambiguity margin.
    CloseCall { alternative: String },
    /// Top-2 labels both belong to a configured confusable set.
    Confusable { tip: String },
}

impl std::fmt::Display for Hint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CloseCall { alternative } => write!(f, "maybe it's {alternative}?"),
            Self::Confusable { tip } => f.write_str(tip),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StableDecision {
    pub label: String,
    pub confidence: f32,
    pub confidence_pct: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_up: Option<RankedLabel>,
    pub hints: Vec<Hint>,
}

impl StableDecision {
    /// Integer confidence string, e.g. `"85%"`.
    pub fn confidence_string(&self) -> String {
        format!("{}%", self.confidence_pct)
    }

    pub fn runner_up_label(&self) -> Option<&str> {
        self.runner_up.as_ref().map(|r| r.label.as_str())
    }
}

/// Result of feeding one frame into a [`crate::Recognizer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// Window not full yet, or just reset by a detection gap.
    Waiting,
    /// Window classified but the smoother has not seen enough agreement.
    /// Carries no label.
    Undetermined,
    Stable {
        raw_label: String,
        decision: StableDecision,
    },
}

impl FrameOutcome {
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    pub fn stable(&self) -> Option<&StableDecision> {
        match self {
            Self::Stable { decision, .. } => Some(decision),
            _ => None,
        }
    }

    pub fn raw_label(&self) -> Option<&str> {
        match self {
            Self::Waiting | Self::Undetermined => None,
            Self::Stable { raw_label, .. } => Some(raw_label),
        }
    }
}
