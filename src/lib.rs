//! A simulation of autonomous cars racing around a raster track, each driven by a
//! reactive policy from ray-cast distance sensors.

pub use cgmath;
pub use config::{CollisionConfig, EntrantConfig, RaceConfig, ReshufflePolicy};
pub use error::{ConfigError, RaceError, TrackError};
pub use history::{EntrantSummary, RaceHistory, RaceRecord, Winner};
pub use metrics::{write_csv, Metrics, VehicleReport};
pub use obstacle::{Cone, ObstacleConfig, ObstacleField};
pub use policy::{
    Control, ControlPolicy, FuzzyParams, FuzzyPolicy, PolicyKind, RuleBasedPolicy, RuleParams,
};
pub use sensor::{Hitbox, SensorConfig, SensorReading, SensorScan, Surroundings, SENSOR_COUNT};
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use track::{RoadPalette, TrackSurface};
pub use util::{Cooldown, Interval};
pub use vehicle::{LapEvent, Pose, RecoveryConfig, Vehicle, VehicleAttributes};

mod config;
mod error;
mod history;
pub mod math;
mod metrics;
mod obstacle;
pub mod policy;
mod sensor;
mod simulation;
mod track;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
