use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    #[error("malformed landmarks: expected {expected} points, got {actual}")]
    MalformedLandmarks { expected: usize, actual: usize },
    #[error("malformed landmarks: {values} flat values do not form (x, y) pairs")]
    UnpairedCoordinate { values: usize },
    #[error("malformed landmarks: point {index} has a non-finite coordinate")]
    NonFiniteLandmark { index: usize },
    #[error("classifier failed while {context}: {message}")]
    Classifier {
        context: &'static str,
        message: String,
    },
    #[error("classifier returned a malformed distribution: {message}")]
    ModelOutput { message: String },
    #[error("recognizer is unusable after an earlier classifier failure")]
    Poisoned,
}

impl RecognitionError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn classifier(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Classifier {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn model_output(message: impl Into<String>) -> Self {
        Self::ModelOutput {
            message: message.into(),
        }
    }

    /// True for errors that leave the recognizer unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Classifier { .. } | Self::ModelOutput { .. } | Self::Poisoned
        )
    }
}

/// Failure reported by an advice provider. Never surfaces past the feedback gate.
#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("advice provider error: {message}")]
    Provider { message: String },
    #[error("advice provider unavailable: {message}")]
    Unavailable { message: String },
}

impl AdviceError {
    pub fn provider(err: impl std::fmt::Display) -> Self {
        Self::Provider {
            message: err.to_string(),
        }
    }

    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_classifier_side() {
        assert!(RecognitionError::classifier("predict", "boom").is_fatal());
        assert!(RecognitionError::model_output("sum is 0.5").is_fatal());
        assert!(RecognitionError::Poisoned.is_fatal());
        assert!(!RecognitionError::MalformedLandmarks {
            expected: 21,
            actual: 20
        }
        .is_fatal());
        assert!(!RecognitionError::invalid_config("x").is_fatal());
    }

    #[test]
    fn messages_carry_context() {
        let err = RecognitionError::classifier("predict_proba", "model unavailable");
        assert_eq!(
            err.to_string(),
            "classifier failed while predict_proba: model unavailable"
        );
        let err = RecognitionError::MalformedLandmarks {
            expected: 21,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "malformed landmarks: expected 21 points, got 3"
        );
    }
}
