use crate::config::{ConfusableSet, RecognizerConfig};
use crate::recognition::smoothing::SmoothingVerdict;
use crate::types::{Hint, PredictionDistribution, RankedLabel, StableDecision};

#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// The smoother has not seen a run of agreement; carries no label or hints.
    InsufficientAgreement,
    Stable(StableDecision),
}

/// Turns a stable verdict plus its window's distribution into a user-facing
/// decision with close-call and confusable-set hints.
#[derive(Debug, Clone)]
pub struct ConfidenceAnalyzer {
    ambiguity_margin: f32,
    confusable_sets: Vec<ConfusableSet>,
}

impl ConfidenceAnalyzer {
    pub fn new(ambiguity_margin: f32, confusable_sets: Vec<ConfusableSet>) -> Self {
        Self {
            ambiguity_margin,
            confusable_sets,
        }
    }

    pub fn from_config(config: &RecognizerConfig) -> Self {
        Self::new(config.ambiguity_margin, config.confusable_sets.clone())
    }

    /// `distribution` must be the one produced for the window that triggered
    /// `verdict`. A stable label missing from the distribution is treated as
    /// probability zero; the recognizer rejects such output before calling this.
    pub fn analyze(
        &self,
        verdict: &SmoothingVerdict,
        distribution: &PredictionDistribution,
    ) -> Analysis {
        let SmoothingVerdict::Stable(label) = verdict else {
            return Analysis::InsufficientAgreement;
        };

        let top = RankedLabel {
            label: label.clone(),
            probability: distribution.probability_of(label).unwrap_or(0.0),
        };
        let runner_up = distribution.runner_up(label);

        let mut hints = Vec::new();
        if let Some(second) = runner_up.as_ref() {
            if top.probability - second.probability < self.ambiguity_margin {
                hints.push(Hint::CloseCall {
                    alternative: second.label.clone(),
                });
            }
            for set in &self.confusable_sets {
                if set.contains_pair(&top.label, &second.label) {
                    hints.push(Hint::Confusable {
                        tip: set.tip.clone(),
                    });
                }
            }
        }

        Analysis::Stable(StableDecision {
            confidence_pct: top.percent(),
            confidence: top.probability,
            label: top.label,
            runner_up,
            hints,
        })
    }
}

impl Default for ConfidenceAnalyzer {
    fn default() -> Self {
        Self::from_config(&RecognizerConfig::default())
    }
}
