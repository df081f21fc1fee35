//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use cgmath::num_traits::Float;
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval contains the value, including its end points.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// Returns true if the interval is non-empty.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

impl<T: std::ops::Sub<T, Output = T> + Copy> Interval<T> {
    /// Gets the magnitude of the interval.
    pub fn length(&self) -> T {
        self.max - self.min
    }
}

impl<T: Float> Interval<T> {
    pub fn lerp(&self, t: T) -> T {
        self.min + t * (self.max - self.min)
    }

    pub fn inv_lerp(&self, value: T) -> T {
        (value - self.min) / (self.max - self.min)
    }

    /// Maps `value` onto `[0, 1]`, saturating outside of the interval.
    pub fn ramp(&self, value: T) -> T {
        self.inv_lerp(value).max(T::zero()).min(T::one())
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

/// A countdown timer, in seconds, which blocks an event from repeating while it runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cooldown {
    remaining: f64,
}

impl Cooldown {
    /// Starts the countdown from `duration` seconds.
    pub fn arm(&mut self, duration: f64) {
        self.remaining = duration;
    }

    /// Advances the countdown by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        self.remaining = f64::max(self.remaining - dt, 0.0);
    }

    /// Whether the countdown is still running.
    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }
}
