use crate::domain::models::RawSample;
use std::collections::VecDeque;

/// Samples needed before the classifier will compare anything
pub const WINDOW_CAPACITY: usize = 10;

/// Integer mean of each raw field across a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AveragedSample {
    pub w: i64,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

/// Bounded FIFO of the most recent motion samples
#[derive(Debug, Clone)]
pub struct MotionWindow {
    samples: VecDeque<RawSample>,
    capacity: usize,
}

impl Default for MotionWindow {
    fn default() -> Self {
        Self::new(WINDOW_CAPACITY)
    }
}

impl MotionWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when over capacity
    pub fn push(&mut self, sample: RawSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawSample> {
        self.samples.iter()
    }

    /// Truncating per-field mean, `None` for an empty window
    pub fn average(&self) -> Option<AveragedSample> {
        if self.samples.is_empty() {
            return None;
        }
        let count = self.samples.len() as i64;
        let (w, x, y, z) = self.samples.iter().fold((0i64, 0i64, 0i64, 0i64), |acc, s| {
            (
                acc.0 + s.w as i64,
                acc.1 + s.x as i64,
                acc.2 + s.y as i64,
                acc.3 + s.z as i64,
            )
        });
        Some(AveragedSample {
            w: w / count,
            x: x / count,
            y: y / count,
            z: z / count,
        })
    }
}
