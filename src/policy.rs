//! Driving policies which turn sensor readings into control inputs.

use crate::config::RaceConfig;
use crate::sensor::SensorReading;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub use fuzzy::{FuzzyMode, FuzzyParams, FuzzyPolicy};
pub use rule::{RuleBasedPolicy, RuleParams};

mod fuzzy;
mod rule;

/// The driving inputs applied to a vehicle on a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Control {
    /// Steering in `[-1, 1]`; positive turns clockwise on screen.
    pub steer: f64,
    /// Throttle in `[-1, 1]`; negative values request reverse.
    pub throttle: f64,
    /// Brake in `[0, 1]`.
    pub brake: f64,
}

impl Control {
    /// Full braking with no throttle, keeping the given steering.
    pub fn hard_stop(steer: f64) -> Self {
        Self {
            steer,
            throttle: 0.0,
            brake: 1.0,
        }
    }
}

/// A driver which maps each frame's sensor reading to control inputs.
///
/// Policies keep whatever state they need between frames (previous errors,
/// stall counters) privately; nothing is shared between vehicles.
pub trait ControlPolicy: Debug {
    /// Decides the control inputs for the current frame.
    fn act(&mut self, reading: &SensorReading) -> Control;

    /// The kind of policy.
    fn kind(&self) -> PolicyKind;
}

/// The available driving policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// A PD lane-centering controller with obstacle overrides.
    Rule,
    /// A fuzzy-style clearance scoring controller with stall recovery.
    Fuzzy,
}

impl PolicyKind {
    /// Creates a fresh policy of this kind.
    pub fn build(self, config: &RaceConfig) -> Box<dyn ControlPolicy> {
        match self {
            Self::Rule => Box::new(RuleBasedPolicy::new(
                config.rule.clone(),
                config.vehicle.max_speed,
            )),
            Self::Fuzzy => Box::new(FuzzyPolicy::new(
                config.fuzzy.clone(),
                config.sensors.range,
                config.vehicle.max_speed,
            )),
        }
    }
}

/// Normalised imbalance between two clearances, in `[-1, 1]`.
/// Positive when the right side is more open.
fn balance(left: f64, right: f64) -> f64 {
    (right - left) / f64::max(left + right, 1.0)
}
