use std::future::Future;
use std::pin::Pin;

use crate::error::{AdviceError, RecognitionError};
use crate::feedback::AdvicePrompt;
use crate::types::PredictionDistribution;

/// Externally trained model over one flattened window.
///
/// Implementations must be deterministic and side-effect free: the recognizer
/// calls both methods once per full window and does no caching of its own.
pub trait Classifier: Send + Sync {
    fn predict(&self, window: &[f32]) -> Result<String, RecognitionError>;

    fn predict_proba(&self, window: &[f32]) -> Result<PredictionDistribution, RecognitionError>;
}

pub type AdviceFuture = Pin<Box<dyn Future<Output = Result<String, AdviceError>> + Send + 'static>>;

/// Something that turns a coaching prompt into a short tip, e.g. a hosted
/// text-generation model. The returned future must not borrow `self`; the gate
/// runs it on a spawned task under its own timeout.
pub trait AdviceProvider: Send + Sync {
    fn advise(&self, prompt: AdvicePrompt) -> AdviceFuture;
}
