use serde::Serialize;

use crate::types::StableDecision;

/// The five values that fully determine a coaching prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackRequest {
    pub raw_label: String,
    pub stable_label: String,
    pub confidence_pct: u32,
    pub second_label: Option<String>,
    pub target_label: String,
}

impl FeedbackRequest {
    pub fn from_decision(raw_label: &str, decision: &StableDecision, target_label: &str) -> Self {
        Self {
            raw_label: raw_label.to_string(),
            stable_label: decision.label.clone(),
            confidence_pct: decision.confidence_pct,
            second_label: decision.runner_up_label().map(str::to_string),
            target_label: target_label.to_string(),
        }
    }

    /// Coaching is worth asking for when the learner missed the target or the
    /// analyzer flagged the decision as a close or confusable call.
    pub fn is_warranted(decision: &StableDecision, target_label: &str) -> bool {
        decision.label != target_label || !decision.hints.is_empty()
    }

    pub fn is_match(&self) -> bool {
        self.stable_label == self.target_label
    }

    pub fn prompt(&self) -> AdvicePrompt {
        AdvicePrompt {
            text: render_prompt(self),
            request: self.clone(),
        }
    }
}

/// Prompt sent to an advice provider, with the request it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvicePrompt {
    pub request: FeedbackRequest,
    pub text: String,
}

impl std::fmt::Display for AdvicePrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

fn render_prompt(request: &FeedbackRequest) -> String {
    let runner_up = request.second_label.as_deref().unwrap_or("none");
    let verdict = if request.is_match() {
        "matches the target, but the call was close"
    } else {
        "does not match the target"
    };
    format!(
        "A learner is practicing the American Sign Language fingerspelling letter \"{target}\".\n\
         Latest raw classifier output: \"{raw}\".\n\
         Smoothed prediction: \"{stable}\" at {confidence}% confidence \
         (runner-up: \"{runner_up}\").\n\
         The smoothed prediction {verdict}.\n\
         In at most two short sentences, give one concrete hand-shape tip \
         that helps them sign \"{target}\".",
        target = request.target_label,
        raw = request.raw_label,
        stable = request.stable_label,
        confidence = request.confidence_pct,
    )
}
