use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;
use crate::pipeline::traits::Classifier;
use crate::types::PredictionDistribution;

pub const DEFAULT_NEIGHBORS: usize = 3;

/// One labelled, flattened reference window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSample {
    pub label: String,
    pub features: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSet {
    #[serde(default = "default_neighbors")]
    pub k: usize,
    pub samples: Vec<ReferenceSample>,
}

fn default_neighbors() -> usize {
    DEFAULT_NEIGHBORS
}

/// Uniform-weight k-nearest-neighbour classifier over flattened windows.
///
/// Classes are the sorted distinct labels of the reference set. The
/// probability of a class is the share of the `k` nearest samples carrying it;
/// equal distances keep reference-set order.
#[derive(Debug, Clone)]
pub struct NearestNeighborClassifier {
    k: usize,
    classes: Vec<String>,
    samples: Vec<(usize, Vec<f32>)>,
    feature_len: usize,
}

impl NearestNeighborClassifier {
    pub fn new(reference: ReferenceSet) -> Result<Self, RecognitionError> {
        let ReferenceSet { k, samples } = reference;
        if k == 0 {
            return Err(RecognitionError::invalid_config("nearest-neighbour k must be >= 1"));
        }
        let Some(first) = samples.first() else {
            return Err(RecognitionError::invalid_config(
                "nearest-neighbour reference set has no samples",
            ));
        };
        let feature_len = first.features.len();
        if feature_len == 0 {
            return Err(RecognitionError::invalid_config(
                "nearest-neighbour reference samples have no features",
            ));
        }
        if let Some((i, bad)) = samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.features.len() != feature_len)
        {
            return Err(RecognitionError::invalid_config(format!(
                "reference sample {i} ({}) has {} features, expected {feature_len}",
                bad.label,
                bad.features.len()
            )));
        }

        let classes: Vec<String> = samples
            .iter()
            .map(|s| s.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let samples = samples
            .into_iter()
            .map(|s| {
                let class = classes
                    .binary_search(&s.label)
                    .unwrap_or_default();
                (class, s.features)
            })
            .collect::<Vec<_>>();

        tracing::info!(
            k,
            classes = classes.len(),
            samples = samples.len(),
            feature_len,
            "nearest-neighbour classifier loaded"
        );

        Ok(Self {
            k,
            classes,
            samples,
            feature_len,
        })
    }

    pub fn load(path: &Path) -> Result<Self, RecognitionError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| RecognitionError::io("read reference set", e))?;
        let reference: ReferenceSet = serde_json::from_str(&data)
            .map_err(|e| RecognitionError::json("parse reference set", e))?;
        Self::new(reference)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn feature_len(&self) -> usize {
        self.feature_len
    }

    fn class_votes(&self, window: &[f32]) -> Result<Vec<usize>, RecognitionError> {
        if window.len() != self.feature_len {
            return Err(RecognitionError::classifier(
                "nearest-neighbour lookup",
                format!(
                    "window has {} values, reference features have {}",
                    window.len(),
                    self.feature_len
                ),
            ));
        }

        let mut distances: Vec<(f32, usize)> = self
            .samples
            .iter()
            .map(|(class, features)| (squared_distance(window, features), *class))
            .collect();
        // Stable sort keeps reference order for equal distances.
        // NaN distances order after every finite one.
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut votes = vec![0usize; self.classes.len()];
        for &(_, class) in distances.iter().take(self.k) {
            votes[class] += 1;
        }
        Ok(votes)
    }
}

impl Classifier for NearestNeighborClassifier {
    fn predict(&self, window: &[f32]) -> Result<String, RecognitionError> {
        let votes = self.class_votes(window)?;
        let mut best = 0usize;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = class;
            }
        }
        Ok(self.classes[best].clone())
    }

    fn predict_proba(&self, window: &[f32]) -> Result<PredictionDistribution, RecognitionError> {
        let votes = self.class_votes(window)?;
        let total = votes.iter().sum::<usize>().max(1) as f32;
        Ok(PredictionDistribution::new(
            self.classes.clone(),
            votes.iter().map(|&v| v as f32 / total).collect(),
        ))
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: &str, value: f32) -> ReferenceSample {
        ReferenceSample {
            label: label.to_string(),
            features: vec![value; 4],
        }
    }

    fn classifier(k: usize) -> NearestNeighborClassifier {
        NearestNeighborClassifier::new(ReferenceSet {
            k,
            samples: vec![
                sample("V", 0.0),
                sample("R", 0.1),
                sample("R", 0.2),
                sample("U", 0.9),
                sample("U", 1.0),
            ],
        })
        .expect("valid reference set")
    }

    #[test]
    fn classes_are_sorted_and_deduplicated() {
        assert_eq!(classifier(3).classes(), ["R", "U", "V"]);
    }

    #[test]
    fn proba_is_neighbour_share() {
        let knn = classifier(3);
        let dist = knn.predict_proba(&[0.05; 4]).expect("predict_proba");
        assert_eq!(dist.labels, ["R", "U", "V"]);
        let expected = [2.0 / 3.0, 0.0, 1.0 / 3.0];
        for (got, want) in dist.probabilities.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
        assert_eq!(knn.predict(&[0.05; 4]).expect("predict"), "R");
    }

    #[test]
    fn predict_agrees_with_proba_argmax() {
        let knn = classifier(3);
        for v in [0.0, 0.15, 0.5, 0.95, 2.0] {
            let window = [v; 4];
            let label = knn.predict(&window).expect("predict");
            let dist = knn.predict_proba(&window).expect("predict_proba");
            assert_eq!(dist.argmax().map(|r| r.label), Some(label));
            let sum: f32 = dist.probabilities.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn vote_ties_go_to_class_order() {
        let knn = classifier(2);
        // Nearest two are V (0.0) and R (0.1): one vote each, R sorts first.
        assert_eq!(knn.predict(&[0.0; 4]).expect("predict"), "R");
    }

    #[test]
    fn k_larger_than_reference_set_uses_all_samples() {
        let knn = classifier(50);
        let dist = knn.predict_proba(&[0.0; 4]).expect("predict_proba");
        assert!((dist.probabilities[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn wrong_window_length_is_a_classifier_error() {
        let knn = classifier(3);
        assert!(matches!(
            knn.predict(&[0.0; 3]),
            Err(RecognitionError::Classifier { .. })
        ));
    }

    #[test]
    fn rejects_degenerate_reference_sets() {
        assert!(NearestNeighborClassifier::new(ReferenceSet {
            k: 3,
            samples: Vec::new()
        })
        .is_err());
        assert!(NearestNeighborClassifier::new(ReferenceSet {
            k: 0,
            samples: vec![sample("A", 0.0)]
        })
        .is_err());
        let mut short = sample("B", 0.0);
        short.features.pop();
        assert!(NearestNeighborClassifier::new(ReferenceSet {
            k: 1,
            samples: vec![sample("A", 0.0), short]
        })
        .is_err());
    }

    #[test]
    fn load_reads_json_reference_set() {
        let path = std::env::temp_dir().join("fingerspell_knn_reference.json");
        std::fs::write(
            &path,
            concat!(
                r#"{"samples": [{"label": "A", "features": [0.0, 0.0]}, "#,
                r#"{"label": "B", "features": [1.0, 1.0]}]}"#
            ),
        )
        .expect("write reference set");
        let knn = NearestNeighborClassifier::load(&path).expect("load reference set");
        assert_eq!(knn.feature_len(), 2);
        assert_eq!(knn.classes(), ["A", "B"]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn nan_distances_rank_behind_every_other_sample() {
        let knn = NearestNeighborClassifier::new(ReferenceSet {
            k: 1,
            samples: vec![
                ReferenceSample {
                    label: "A".to_string(),
                    features: vec![f32::INFINITY, 0.0],
                },
                ReferenceSample {
                    label: "B".to_string(),
                    features: vec![0.0, 0.0],
                },
                ReferenceSample {
                    label: "C".to_string(),
                    features: vec![1.0, 1.0],
                },
            ],
        })
        .expect("reference set");
        // inf - inf gives a NaN distance to A; B and C are both infinitely far.
        let window = [f32::INFINITY, 0.0];
        assert_eq!(knn.predict(&window).expect("predict"), "B");
        let dist = knn.predict_proba(&window).expect("predict_proba");
        assert_eq!(dist.probability_of("A"), Some(0.0));
    }
}
