pub mod analysis;
pub mod normalize;
pub mod smoothing;
pub mod window;

pub use analysis::{Analysis, ConfidenceAnalyzer};
pub use normalize::normalize_landmarks;
pub use smoothing::{RecentPredictionHistory, SmoothingVerdict};
pub use window::SequenceWindow;
