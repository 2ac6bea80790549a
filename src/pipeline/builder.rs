use std::path::Path;

use crate::config::RecognizerConfig;
use crate::error::RecognitionError;
use crate::feedback::FeedbackGate;
use crate::model::NearestNeighborClassifier;
use crate::pipeline::runtime::{Recognizer, RecognizerParts};
use crate::pipeline::traits::Classifier;

pub struct RecognizerBuilder {
    config: RecognizerConfig,
    classifier: Option<Box<dyn Classifier>>,
    feedback_gate: Option<FeedbackGate>,
}

impl RecognizerBuilder {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            config,
            classifier: None,
            feedback_gate: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Shares a gate (and its cooldown) with this recognizer.
    pub fn with_feedback_gate(mut self, gate: FeedbackGate) -> Self {
        self.feedback_gate = Some(gate);
        self
    }

    pub fn build(self) -> Result<Recognizer, RecognitionError> {
        self.config.validate()?;

        let classifier = match self.classifier {
            Some(classifier) => classifier,
            None => Box::new(load_default_classifier(&self.config)?),
        };

        tracing::info!(
            sequence_length = self.config.sequence_length,
            num_landmarks = self.config.num_landmarks,
            history_length = self.config.history_length,
            stability_run = self.config.stability_run,
            confusable_sets = self.config.confusable_sets.len(),
            feedback = self.feedback_gate.is_some(),
            "recognizer built"
        );

        Ok(Recognizer::from_parts(RecognizerParts {
            config: self.config,
            classifier,
            feedback_gate: self.feedback_gate,
        }))
    }
}

fn load_default_classifier(
    config: &RecognizerConfig,
) -> Result<NearestNeighborClassifier, RecognitionError> {
    let Some(model_path) = config.model_path.as_deref() else {
        return Err(RecognitionError::invalid_config(
            "no classifier supplied and no model_path configured",
        ));
    };
    let classifier = NearestNeighborClassifier::load(Path::new(model_path))?;
    if classifier.feature_len() != config.window_len() {
        return Err(RecognitionError::invalid_config(format!(
            "reference features have {} values, windows have {}",
            classifier.feature_len(),
            config.window_len()
        )));
    }
    Ok(classifier)
}
