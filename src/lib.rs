pub mod config;
pub mod error;
pub mod feedback;
pub mod model;
pub mod pipeline;
pub mod recognition;
pub mod types;

pub use config::{ConfusableSet, FeedbackConfig, RecognizerConfig};
pub use error::{AdviceError, RecognitionError};
pub use feedback::{
    AdvicePrompt, FeedbackGate, FeedbackOutcome, FeedbackPoll, FeedbackRequest, FeedbackTicket,
    GateStatus,
};
pub use model::{NearestNeighborClassifier, ReferenceSample, ReferenceSet};
pub use pipeline::builder::RecognizerBuilder;
pub use pipeline::defaults::{LocalCoach, STATIC_ALPHABET};
pub use pipeline::runtime::Recognizer;
pub use pipeline::traits::{AdviceFuture, AdviceProvider, Classifier};
pub use types::{
    FrameOutcome, Hint, LandmarkFrame, NormalizedFeatureVector, Point2, PredictionDistribution,
    RankedLabel, StableDecision,
};
