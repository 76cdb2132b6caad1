//! Gesture Classifier
//!
//! Compares the orientation of the averaged motion window against a baseline
//! captured at the start of each gesture episode.

use crate::domain::models::{Gesture, RawSample};
use crate::domain::motion_window::{AveragedSample, MotionWindow};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Strictly greater on every axis
    pub fn all_greater(&self, other: &Self) -> bool {
        self.x > other.x && self.y > other.y && self.z > other.z
    }

    /// Strictly less on every axis
    pub fn all_less(&self, other: &Self) -> bool {
        self.x < other.x && self.y < other.y && self.z < other.z
    }
}

/// Direction, up and left axes of one averaged orientation.
///
/// The all-zero value marks a baseline that has not been captured yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OriginTriplet {
    pub direction: Vec3,
    pub up: Vec3,
    pub left: Vec3,
}

impl OriginTriplet {
    pub const UNSET: Self = Self {
        direction: Vec3::ZERO,
        up: Vec3::ZERO,
        left: Vec3::ZERO,
    };

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    /// Axes of `avg`. The third `up` component is weighted by the raw `w` of
    /// the newest sample rather than the averaged one.
    pub fn from_average(avg: &AveragedSample, current_w: u16) -> Self {
        let w = avg.w as f64;
        let x = avg.x as f64;
        let y = avg.y as f64;
        let z = avg.z as f64;
        let cur_w = current_w as f64;

        Self {
            direction: Vec3::new(
                2.0 * (x * z + w * y),
                2.0 * (y * z - w * w),
                1.0 - 2.0 * (x * x + y * y),
            ),
            up: Vec3::new(
                2.0 * (x * y - w * z),
                1.0 - 2.0 * (x * x + z * z),
                cur_w * (y * z + w * x),
            ),
            left: Vec3::new(
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y + w * z),
                2.0 * (x * z + w * y),
            ),
        }
    }
}

/// Per-episode classifier state: the motion window and its baseline
#[derive(Debug, Default)]
pub struct GestureClassifier {
    window: MotionWindow,
    origin: OriginTriplet,
}

impl GestureClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one held-button sample and return the candidate it produces
    pub fn classify(&mut self, sample: RawSample) -> Gesture {
        self.window.push(sample);

        if !self.window.is_full() {
            return Gesture::Noop;
        }

        let avg = match self.window.average() {
            Some(avg) => avg,
            None => return Gesture::Noop,
        };
        let current = OriginTriplet::from_average(&avg, sample.w);

        if self.origin.is_unset() {
            self.origin = current;
            tracing::trace!(?avg, "Gesture baseline captured");
            return Gesture::Noop;
        }

        let candidate = if current.up.all_greater(&self.origin.up) {
            Gesture::Up
        } else if current.up.all_less(&self.origin.up) {
            Gesture::Down
        } else if current.left.all_greater(&self.origin.left) {
            Gesture::Left
        } else if current.left.all_less(&self.origin.left) {
            Gesture::Right
        } else {
            Gesture::Noop
        };

        if !candidate.is_noop() {
            // Next sample re-baselines
            self.origin = OriginTriplet::UNSET;
        }

        candidate
    }

    pub fn origin(&self) -> &OriginTriplet {
        &self.origin
    }

    pub fn window(&self) -> &MotionWindow {
        &self.window
    }

    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    /// Drop all episode state
    pub fn reset(&mut self) {
        self.window.clear();
        self.origin = OriginTriplet::UNSET;
    }
}
