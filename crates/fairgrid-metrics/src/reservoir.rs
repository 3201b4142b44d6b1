//! Fixed-size sample reservoir.
//!
//! Keeps the most recent `capacity` samples in insertion order and drops
//! the oldest once full. Retention is by count, never by age.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SampleReservoir {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleReservoir {
    /// Create an empty reservoir. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest if over capacity.
    pub fn push(&mut self, value: f64) {
        self.samples.push_back(value);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of retained samples, or 0.0 when empty.
    ///
    /// Recomputed from scratch on each call; n is bounded by capacity.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum() / self.samples.len() as f64
    }

    pub fn sum(&self) -> f64 {
        self.samples.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}
