//! Rolling window of per-frame feature vectors.

use std::collections::VecDeque;

use crate::types::NormalizedFeatureVector;

/// Fixed-capacity FIFO of the most recent feature vectors for one stream.
#[derive(Debug, Clone)]
pub struct SequenceWindow {
    capacity: usize,
    frames: VecDeque<NormalizedFeatureVector>,
}

impl SequenceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            frames: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a vector, evicting the oldest one once the window is at capacity.
    pub fn push(&mut self, features: NormalizedFeatureVector) {
        if self.capacity == 0 {
            return;
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(features);
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.frames.len() == self.capacity
    }

    /// Drops every held vector. Called on each detection gap.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Concatenates all vectors oldest-first. `None` until the window is full.
    pub fn flatten(&self) -> Option<Vec<f32>> {
        if !self.is_full() {
            return None;
        }
        let total = self.frames.iter().map(NormalizedFeatureVector::len).sum();
        let mut flat = Vec::with_capacity(total);
        for frame in &self.frames {
            flat.extend_from_slice(frame.as_slice());
        }
        Some(flat)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedFeatureVector> {
        self.frames.iter()
    }
}
