//! Run-of-agreement voting over recent raw predictions.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmoothingVerdict {
    Stable(String),
    Undetermined,
}

impl SmoothingVerdict {
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable(_))
    }
}

/// Ring buffer of raw arg-max labels.
///
/// The verdict is stable only when the newest `run_length` entries are all the
/// same label; older entries are kept but never vote.
#[derive(Debug, Clone)]
pub struct RecentPredictionHistory {
    capacity: usize,
    run_length: usize,
    labels: VecDeque<String>,
}

impl RecentPredictionHistory {
    pub fn new(capacity: usize, run_length: usize) -> Self {
        Self {
            capacity,
            run_length,
            labels: VecDeque::with_capacity(capacity),
        }
    }

    /// Records one raw prediction and returns the verdict that follows from it.
    pub fn push(&mut self, label: impl Into<String>) -> SmoothingVerdict {
        if self.capacity > 0 {
            if self.labels.len() == self.capacity {
                self.labels.pop_front();
            }
            self.labels.push_back(label.into());
        }
        self.verdict()
    }

    pub fn verdict(&self) -> SmoothingVerdict {
        if self.run_length == 0 || self.labels.len() < self.run_length {
            return SmoothingVerdict::Undetermined;
        }
        let mut recent = self.labels.iter().rev().take(self.run_length);
        let Some(newest) = recent.next() else {
            return SmoothingVerdict::Undetermined;
        };
        if recent.all(|l| l == newest) {
            SmoothingVerdict::Stable(newest.clone())
        } else {
            SmoothingVerdict::Undetermined
        }
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(labels: &[&str]) -> SmoothingVerdict {
        let mut history = RecentPredictionHistory::new(5, 3);
        let mut verdict = history.verdict();
        for label in labels {
            verdict = history.push(*label);
        }
        verdict
    }

    #[test]
    fn empty_and_short_histories_are_undetermined() {
        assert_eq!(feed(&[]), SmoothingVerdict::Undetermined);
        assert_eq!(feed(&["A"]), SmoothingVerdict::Undetermined);
        assert_eq!(feed(&["A", "A"]), SmoothingVerdict::Undetermined);
    }

    #[test]
    fn three_in_a_row_is_stable() {
        assert_eq!(feed(&["A", "A", "A"]), SmoothingVerdict::Stable("A".into()));
    }

    #[test]
    fn single_flicker_resets_the_run() {
        assert_eq!(feed(&["A", "A", "A", "B"]), SmoothingVerdict::Undetermined);
        assert_eq!(feed(&["A", "A", "B", "A"]), SmoothingVerdict::Undetermined);
        assert_eq!(feed(&["A", "A", "B", "A", "A"]), SmoothingVerdict::Undetermined);
    }

    #[test]
    fn only_newest_entries_vote() {
        assert_eq!(
            feed(&["A", "B", "A", "A", "A"]),
            SmoothingVerdict::Stable("A".into())
        );
        assert_eq!(
            feed(&["B", "A", "A", "A"]),
            SmoothingVerdict::Stable("A".into())
        );
    }

    #[test]
    fn window_slides_past_capacity() {
        let mut history = RecentPredictionHistory::new(5, 3);
        for label in ["A", "A", "A", "A", "A", "B", "B"] {
            history.push(label);
        }
        assert_eq!(history.len(), 5);
        assert_eq!(history.verdict(), SmoothingVerdict::Undetermined);
        assert_eq!(history.push("B"), SmoothingVerdict::Stable("B".into()));
    }

    #[test]
    fn clear_returns_to_undetermined() {
        let mut history = RecentPredictionHistory::new(5, 3);
        for _ in 0..3 {
            history.push("C");
        }
        assert!(history.verdict().is_stable());
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.verdict(), SmoothingVerdict::Undetermined);
    }
}
