use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    #[serde(default = "default_num_landmarks")]
    pub num_landmarks: usize,
    #[serde(default = "default_history_length")]
    pub history_length: usize,
    #[serde(default = "default_stability_run")]
    pub stability_run: usize,
    /// Top-1 minus top-2 probability below which a close-call hint is attached.
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: f32,
    #[serde(default = "default_confusable_sets")]
    pub confusable_sets: Vec<ConfusableSet>,
    /// Nearest-neighbour reference set, used when no classifier is injected.
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl RecognizerConfig {
    pub const DEFAULT_SEQUENCE_LENGTH: usize = 10;
    pub const DEFAULT_NUM_LANDMARKS: usize = 21;
    pub const DEFAULT_HISTORY_LENGTH: usize = 5;
    pub const DEFAULT_STABILITY_RUN: usize = 3;
    pub const DEFAULT_AMBIGUITY_MARGIN: f32 = 0.20;

    pub fn load(path: &Path) -> Result<Self, RecognitionError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| RecognitionError::io("read recognizer config", e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| RecognitionError::json("parse recognizer config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Length of one normalized per-frame feature vector.
    pub fn feature_len(&self) -> usize {
        self.num_landmarks * 2
    }

    /// Length of a flattened full window, the classifier's input shape.
    pub fn window_len(&self) -> usize {
        self.sequence_length * self.feature_len()
    }

    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.sequence_length == 0 {
            return Err(RecognitionError::invalid_config(
                "sequence_length must be >= 1",
            ));
        }
        if self.num_landmarks == 0 {
            return Err(RecognitionError::invalid_config("num_landmarks must be >= 1"));
        }
        if self.stability_run == 0 {
            return Err(RecognitionError::invalid_config("stability_run must be >= 1"));
        }
        if self.stability_run > self.history_length {
            return Err(RecognitionError::invalid_config(format!(
                "stability_run ({}) cannot exceed history_length ({})",
                self.stability_run, self.history_length
            )));
        }
        if !(0.0..=1.0).contains(&self.ambiguity_margin) {
            return Err(RecognitionError::invalid_config(format!(
                "ambiguity_margin must lie in [0, 1], got {}",
                self.ambiguity_margin
            )));
        }
        for set in &self.confusable_sets {
            if set.labels.len() < 2 {
                return Err(RecognitionError::invalid_config(format!(
                    "confusable set {:?} needs at least two labels",
                    set.labels
                )));
            }
        }
        self.feedback.validate()
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            sequence_length: Self::DEFAULT_SEQUENCE_LENGTH,
            num_landmarks: Self::DEFAULT_NUM_LANDMARKS,
            history_length: Self::DEFAULT_HISTORY_LENGTH,
            stability_run: Self::DEFAULT_STABILITY_RUN,
            ambiguity_margin: Self::DEFAULT_AMBIGUITY_MARGIN,
            confusable_sets: default_confusable_sets(),
            model_path: None,
            feedback: FeedbackConfig::default(),
        }
    }
}

/// Labels that are visually close enough to warrant a disambiguation tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusableSet {
    pub labels: BTreeSet<String>,
    pub tip: String,
}

impl ConfusableSet {
    pub fn new<I, S>(labels: I, tip: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            tip: tip.into(),
        }
    }

    pub fn contains_pair(&self, a: &str, b: &str) -> bool {
        self.labels.contains(a) && self.labels.contains(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_throttled_message")]
    pub throttled_message: String,
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

impl FeedbackConfig {
    pub const DEFAULT_COOLDOWN_SECS: u64 = 10;
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.request_timeout_ms == 0 {
            return Err(RecognitionError::invalid_config(
                "feedback.request_timeout_ms must be >= 1",
            ));
        }
        Ok(())
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: Self::DEFAULT_COOLDOWN_SECS,
            request_timeout_ms: Self::DEFAULT_REQUEST_TIMEOUT_MS,
            throttled_message: default_throttled_message(),
            failure_message: default_failure_message(),
        }
    }
}

fn default_sequence_length() -> usize {
    RecognizerConfig::DEFAULT_SEQUENCE_LENGTH
}
fn default_num_landmarks() -> usize {
    RecognizerConfig::DEFAULT_NUM_LANDMARKS
}
fn default_history_length() -> usize {
    RecognizerConfig::DEFAULT_HISTORY_LENGTH
}
fn default_stability_run() -> usize {
    RecognizerConfig::DEFAULT_STABILITY_RUN
}
fn default_ambiguity_margin() -> f32 {
    RecognizerConfig::DEFAULT_AMBIGUITY_MARGIN
}
fn default_confusable_sets() -> Vec<ConfusableSet> {
    vec![ConfusableSet::new(
        ["R", "U", "V"],
        "Try adjusting finger spacing!",
    )]
}
fn default_cooldown_secs() -> u64 {
    FeedbackConfig::DEFAULT_COOLDOWN_SECS
}
fn default_request_timeout_ms() -> u64 {
    FeedbackConfig::DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_throttled_message() -> String {
    "Still thinking... keep practicing!".to_string()
}
fn default_failure_message() -> String {
    "Sorry, coaching tips are unavailable right now. Keep practicing!".to_string()
}
