use crate::config::RecognizerConfig;
use crate::error::RecognitionError;
use crate::feedback::{FeedbackGate, FeedbackPoll, FeedbackRequest, FeedbackTicket};
use crate::pipeline::traits::Classifier;
use crate::recognition::{
    normalize_landmarks, Analysis, ConfidenceAnalyzer, RecentPredictionHistory, SequenceWindow,
};
use crate::types::{FrameOutcome, LandmarkFrame, PredictionDistribution, StableDecision};

const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

/// One recognition stream: its own window, history and pending feedback.
///
/// Frames must be submitted in capture order. The feedback gate, if any, may be
/// shared with other recognizers.
pub struct Recognizer {
    config: RecognizerConfig,
    classifier: Box<dyn Classifier>,
    analyzer: ConfidenceAnalyzer,
    window: SequenceWindow,
    history: RecentPredictionHistory,
    feedback_gate: Option<FeedbackGate>,
    pending_feedback: Option<FeedbackTicket>,
    latest_stable: Option<(String, StableDecision)>,
    poisoned: bool,
}

pub(crate) struct RecognizerParts {
    pub config: RecognizerConfig,
    pub classifier: Box<dyn Classifier>,
    pub feedback_gate: Option<FeedbackGate>,
}

impl Recognizer {
    pub(crate) fn from_parts(parts: RecognizerParts) -> Self {
        let config = parts.config;
        Self {
            analyzer: ConfidenceAnalyzer::from_config(&config),
            window: SequenceWindow::new(config.sequence_length),
            history: RecentPredictionHistory::new(config.history_length, config.stability_run),
            classifier: parts.classifier,
            feedback_gate: parts.feedback_gate,
            pending_feedback: None,
            latest_stable: None,
            poisoned: false,
            config,
        }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Number of frames currently buffered.
    pub fn buffered_frames(&self) -> usize {
        self.window.len()
    }

    pub fn latest_stable(&self) -> Option<&StableDecision> {
        self.latest_stable.as_ref().map(|(_, decision)| decision)
    }

    /// Feeds one captured frame through the pipeline.
    ///
    /// A frame without a hand resets the window and yields `Waiting`. Malformed
    /// landmarks are rejected without touching any state. A classifier failure
    /// is returned once and poisons the recognizer for every later call.
    pub fn submit_frame(
        &mut self,
        hand_present: bool,
        landmarks: Option<&LandmarkFrame>,
    ) -> Result<FrameOutcome, RecognitionError> {
        if self.poisoned {
            return Err(RecognitionError::Poisoned);
        }

        let frame = match (hand_present, landmarks) {
            (true, Some(frame)) => frame,
            (true, None) => {
                return Err(RecognitionError::MalformedLandmarks {
                    expected: self.config.num_landmarks,
                    actual: 0,
                })
            }
            (false, _) => {
                if !self.window.is_empty() {
                    tracing::debug!(
                        dropped = self.window.len(),
                        "recognizer: hand lost, window cleared"
                    );
                }
                self.window.clear();
                self.latest_stable = None;
                return Ok(FrameOutcome::Waiting);
            }
        };

        self.check_landmarks(frame)?;
        self.window.push(normalize_landmarks(frame));

        let Some(flat) = self.window.flatten() else {
            return Ok(FrameOutcome::Waiting);
        };

        match self.classify(&flat) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.poisoned = true;
                self.latest_stable = None;
                self.pending_feedback = None;
                tracing::warn!(error = %err, "recognizer: classifier failure, recognizer poisoned");
                Err(err)
            }
        }
    }

    /// Drops the window, the smoothing history and any in-flight feedback so
    /// the recognizer can serve a new stream. A poisoned recognizer stays poisoned.
    pub fn reset(&mut self) {
        self.window.clear();
        self.history.clear();
        self.latest_stable = None;
        self.pending_feedback = None;
    }

    /// Asks the feedback gate for coaching on the latest stable decision.
    ///
    /// Returns `Idle` when no gate is configured, nothing is stable, or the
    /// learner signed `target_label` cleanly. While an earlier request is still
    /// pending, no new one is issued.
    pub fn request_feedback(&mut self, target_label: &str) -> FeedbackPoll {
        if self.pending_feedback.as_ref().is_some_and(FeedbackTicket::is_pending) {
            return FeedbackPoll::Pending;
        }
        let Some(gate) = self.feedback_gate.as_ref() else {
            return FeedbackPoll::Idle;
        };
        let Some((raw_label, decision)) = self.latest_stable.as_ref() else {
            return FeedbackPoll::Idle;
        };
        if !FeedbackRequest::is_warranted(decision, target_label) {
            return FeedbackPoll::Idle;
        }

        let request = FeedbackRequest::from_decision(raw_label, decision, target_label);
        self.pending_feedback = Some(gate.dispatch(&request));
        self.poll_feedback()
    }

    /// Reports the outcome of the last feedback request. `Ready` is handed out
    /// once; afterwards the recognizer is back to `Idle`.
    pub fn poll_feedback(&mut self) -> FeedbackPoll {
        let Some(ticket) = self.pending_feedback.as_mut() else {
            return FeedbackPoll::Idle;
        };
        let poll = ticket.poll();
        if matches!(poll, FeedbackPoll::Ready(_)) {
            self.pending_feedback = None;
        }
        poll
    }

    fn check_landmarks(&self, frame: &LandmarkFrame) -> Result<(), RecognitionError> {
        if frame.len() != self.config.num_landmarks {
            return Err(RecognitionError::MalformedLandmarks {
                expected: self.config.num_landmarks,
                actual: frame.len(),
            });
        }
        if let Some(index) = frame
            .points()
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(RecognitionError::NonFiniteLandmark { index });
        }
        Ok(())
    }

    fn classify(&mut self, flat: &[f32]) -> Result<FrameOutcome, RecognitionError> {
        let raw_label = self.classifier.predict(flat)?;
        let distribution = self.classifier.predict_proba(flat)?;
        check_distribution(&raw_label, &distribution)?;

        let verdict = self.history.push(raw_label.clone());
        tracing::debug!(
            raw_label = raw_label.as_str(),
            stable = verdict.is_stable(),
            "recognizer: window classified"
        );

        match self.analyzer.analyze(&verdict, &distribution) {
            Analysis::InsufficientAgreement => {
                self.latest_stable = None;
                Ok(FrameOutcome::Undetermined)
            }
            Analysis::Stable(decision) => {
                self.latest_stable = Some((raw_label.clone(), decision.clone()));
                Ok(FrameOutcome::Stable {
                    raw_label,
                    decision,
                })
            }
        }
    }
}

/// Rejects classifier output that cannot be trusted for confidence analysis.
fn check_distribution(
    raw_label: &str,
    distribution: &PredictionDistribution,
) -> Result<(), RecognitionError> {
    let PredictionDistribution {
        labels,
        probabilities,
    } = distribution;
    if labels.is_empty() || labels.len() != probabilities.len() {
        return Err(RecognitionError::model_output(format!(
            "{} labels for {} probabilities",
            labels.len(),
            probabilities.len()
        )));
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(RecognitionError::model_output(format!(
            "probability {bad} is not a finite non-negative value"
        )));
    }
    let sum: f32 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(RecognitionError::model_output(format!(
            "probabilities sum to {sum}"
        )));
    }
    let Some(predicted) = distribution.probability_of(raw_label) else {
        return Err(RecognitionError::model_output(format!(
            "predicted label {raw_label:?} is not a known class"
        )));
    };
    let max = probabilities.iter().copied().fold(f32::MIN, f32::max);
    if predicted < max {
        return Err(RecognitionError::model_output(format!(
            "predicted label {raw_label:?} has probability {predicted}, below the maximum {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, f32)]) -> PredictionDistribution {
        PredictionDistribution::new(
            pairs.iter().map(|(l, _)| l.to_string()).collect(),
            pairs.iter().map(|(_, p)| *p).collect(),
        )
    }

    #[test]
    fn well_formed_distribution_passes() {
        assert!(check_distribution("A", &dist(&[("A", 0.7), ("B", 0.3)])).is_ok());
        assert!(check_distribution("B", &dist(&[("A", 0.5), ("B", 0.5)])).is_ok());
    }

    #[test]
    fn malformed_distributions_are_rejected() {
        let cases = [
            ("A", dist(&[])),
            ("A", PredictionDistribution::new(vec!["A".into()], vec![0.5, 0.5])),
            ("A", dist(&[("A", 1.2), ("B", -0.2)])),
            ("A", dist(&[("A", 0.4), ("B", 0.4)])),
            ("A", dist(&[("A", f32::NAN), ("B", 1.0)])),
            ("Z", dist(&[("A", 0.6), ("B", 0.4)])),
            ("B", dist(&[("A", 0.6), ("B", 0.4)])),
        ];
        for (label, d) in cases {
            assert!(
                matches!(
                    check_distribution(label, &d),
                    Err(RecognitionError::ModelOutput { .. })
                ),
                "expected rejection for {label} / {d:?}"
            );
        }
    }
}
