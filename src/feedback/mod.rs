//! Rate-limited coaching feedback.

pub mod gate;
pub mod prompt;

pub use gate::{FeedbackGate, FeedbackOutcome, FeedbackPoll, FeedbackTicket, GateStatus};
pub use prompt::{AdvicePrompt, FeedbackRequest};
