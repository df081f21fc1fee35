//! Race configuration, loadable from TOML.

use crate::error::ConfigError;
use crate::math::Point2d;
use crate::obstacle::ObstacleConfig;
use crate::policy::{FuzzyParams, PolicyKind, RuleParams};
use crate::sensor::SensorConfig;
use crate::track::RoadPalette;
use crate::util::Interval;
use crate::vehicle::{RecoveryConfig, VehicleAttributes};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// When cones are moved between races.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReshufflePolicy {
    /// Cones stay put unless a reshuffle is forced.
    Never,
    /// Cones move when a race is restarted after it has finished.
    #[default]
    AfterFinish,
    /// Cones move on every restart.
    EveryRestart,
}

/// Speed penalties and cooldowns applied on contact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Seconds after a cone hit during which further cone hits are ignored.
    pub cone_cooldown: f64,
    /// Velocity multiplier on a cone hit.
    pub cone_speed_factor: f64,
    /// Seconds after contact between vehicles during which further contact is ignored.
    pub car_cooldown: f64,
    /// Velocity multiplier applied to both vehicles on contact.
    pub car_speed_factor: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            cone_cooldown: 1.0,
            cone_speed_factor: 0.4,
            car_cooldown: 1.5,
            car_speed_factor: 0.3,
        }
    }
}

/// A vehicle taking part in the race.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntrantConfig {
    pub label: String,
    pub policy: PolicyKind,
    /// The starting position as `[x, y]`.
    pub spawn: [f64; 2],
    /// The starting heading in radians.
    #[serde(default)]
    pub heading: f64,
}

impl EntrantConfig {
    pub fn new(label: impl Into<String>, policy: PolicyKind, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            policy,
            spawn: [x, y],
            heading: 0.0,
        }
    }

    /// The starting position.
    pub fn spawn_point(&self) -> Point2d {
        Point2d::new(self.spawn[0], self.spawn[1])
    }
}

/// Every tunable parameter of a race.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Simulation frames per second.
    pub tick_rate: f64,
    /// The x-coordinate of the start line.
    pub start_line_x: f64,
    /// The number of laps which completes the race.
    pub lap_target: u32,
    /// Seconds after the start during which line crossings are not counted.
    pub grace_period: f64,
    /// Seed for cone placement. Taken from the OS when absent.
    pub seed: Option<u64>,
    /// The steering change above which a frame counts as a correction.
    pub correction_threshold: f64,
    pub reshuffle: ReshufflePolicy,
    pub track: RoadPalette,
    pub vehicle: VehicleAttributes,
    pub sensors: SensorConfig,
    pub recovery: RecoveryConfig,
    pub obstacles: ObstacleConfig,
    pub collisions: CollisionConfig,
    pub rule: RuleParams,
    pub fuzzy: FuzzyParams,
    pub entrants: Vec<EntrantConfig>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            start_line_x: 490.0,
            lap_target: 5,
            grace_period: 3.0,
            seed: None,
            correction_threshold: 0.35,
            reshuffle: ReshufflePolicy::default(),
            track: RoadPalette::default(),
            vehicle: VehicleAttributes::default(),
            sensors: SensorConfig::default(),
            recovery: RecoveryConfig::default(),
            obstacles: ObstacleConfig::default(),
            collisions: CollisionConfig::default(),
            rule: RuleParams::default(),
            fuzzy: FuzzyParams::default(),
            entrants: vec![
                EntrantConfig::new("RED (Rule)", PolicyKind::Rule, 520.0, 110.0),
                EntrantConfig::new("BLUE (Fuzzy)", PolicyKind::Fuzzy, 520.0, 140.0),
            ],
        }
    }
}

impl RaceConfig {
    /// Parses and validates a TOML document. Missing keys take their default values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The duration of one frame in s.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate
    }

    /// Checks that every parameter lies within the range the simulation can handle.
    ///
    /// # Errors
    ///
    /// Returns the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entrants.is_empty() {
            return Err(ConfigError::NoEntrants);
        }
        at_least("tick_rate", self.tick_rate, f64::MIN_POSITIVE)?;
        at_least("lap_target", self.lap_target as f64, 1.0)?;
        at_least("grace_period", self.grace_period, 0.0)?;
        at_least("correction_threshold", self.correction_threshold, 0.0)?;

        let v = &self.vehicle;
        at_least("vehicle.max_speed", v.max_speed, f64::MIN_POSITIVE)?;
        at_least("vehicle.accel", v.accel, 0.0)?;
        at_least("vehicle.brake_accel", v.brake_accel, 0.0)?;
        at_least("vehicle.turn_rate", v.turn_rate, 0.0)?;
        at_least("vehicle.hit_radius", v.hit_radius, 0.0)?;
        between("vehicle.drag", v.drag, f64::MIN_POSITIVE, 1.0)?;
        between("vehicle.finish_decay", v.finish_decay, 0.0, 1.0)?;
        between("vehicle.wall_speed_factor", v.wall_speed_factor, 0.0, 1.0)?;

        let s = &self.sensors;
        if s.offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::SensorOrder);
        }
        at_least("sensors.range", s.range, f64::MIN_POSITIVE)?;
        at_least("sensors.long_range_factor", s.long_range_factor, 1.0)?;
        at_least("sensors.step", s.step, f64::MIN_POSITIVE)?;

        let r = &self.recovery;
        ordered("recovery.angles", &r.angles)?;
        ordered("recovery.distances", &r.distances)?;
        at_least("recovery.angle_step", r.angle_step, f64::MIN_POSITIVE)?;
        at_least("recovery.distance_step", r.distance_step, f64::MIN_POSITIVE)?;

        let o = &self.obstacles;
        at_least("obstacles.radius", o.radius, 0.0)?;
        at_least("obstacles.keepout", o.keepout, 0.0)?;
        at_least("obstacles.max_attempts", o.max_attempts as f64, 1.0)?;
        at_least("obstacles.collision_shrink", o.collision_shrink, 0.0)?;

        let c = &self.collisions;
        at_least("collisions.cone_cooldown", c.cone_cooldown, 0.0)?;
        at_least("collisions.car_cooldown", c.car_cooldown, 0.0)?;
        between("collisions.cone_speed_factor", c.cone_speed_factor, 0.0, 1.0)?;
        between("collisions.car_speed_factor", c.car_speed_factor, 0.0, 1.0)?;

        ordered("track.brightness", &self.track.brightness)?;
        self.validate_rule()?;
        self.validate_fuzzy()
    }

    fn validate_rule(&self) -> Result<(), ConfigError> {
        let r = &self.rule;
        at_least("rule.obstacle_trigger", r.obstacle_trigger, f64::MIN_POSITIVE)?;
        at_least("rule.brake_span", r.brake_span, f64::MIN_POSITIVE)?;
        between("rule.steer_smoothing", r.steer_smoothing, f64::MIN_POSITIVE, 1.0)?;
        between("rule.steer_deadzone", r.steer_deadzone, 0.0, 0.99)?;
        between("rule.corner_penalty", r.corner_penalty, 0.0, 1.0)?;
        between("rule.taper_throttle", r.taper_throttle, 0.0, 1.0)?;
        at_least("rule.braking_factor", r.braking_factor, 0.0)?;
        at_least("rule.brake_curve_exponent", r.brake_curve_exponent, f64::MIN_POSITIVE)?;
        at_least("rule.critical_distance", r.critical_distance, 0.0)?;
        at_least("rule.brake_deadband", r.brake_deadband, 0.0)?;
        at_least("rule.hard_stop_distance", r.hard_stop_distance, 0.0)?;
        at_least("rule.panic_distance", r.panic_distance, 0.0)?;
        at_least("rule.stuck_speed", r.stuck_speed, 0.0)?;
        at_least("rule.stuck_distance", r.stuck_distance, 0.0)
    }

    fn validate_fuzzy(&self) -> Result<(), ConfigError> {
        let f = &self.fuzzy;
        at_least("fuzzy.stall_frames", f.stall_frames as f64, 1.0)?;
        at_least("fuzzy.reverse_frames", f.reverse_frames as f64, 1.0)?;
        at_least("fuzzy.stall_speed", f.stall_speed, 0.0)?;
        between("fuzzy.stall_clearance", f.stall_clearance, 0.0, 1.0)?;
        between("fuzzy.hard_stop_front", f.hard_stop_front, 0.0, 1.0)?;
        between("fuzzy.indecision_steer", f.indecision_steer, 0.0, 1.0)?;
        between("fuzzy.cautious_throttle", f.cautious_throttle, 0.0, 1.0)?;
        at_least("fuzzy.near_gain", f.near_gain, 0.0)?;
        at_least("fuzzy.fast_gain", f.fast_gain, 0.0)?;
        at_least("fuzzy.brake_gain", f.brake_gain, 0.0)?;
        spanning("fuzzy.safety", &f.safety)?;
        ordered("fuzzy.target_speed", &f.target_speed)
    }
}

fn at_least(field: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    // Also rejects NaN
    if !(value >= min) {
        return Err(ConfigError::MinViolation { field, min, value });
    }
    Ok(())
}

fn between(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

fn ordered(field: &'static str, range: &Interval<f64>) -> Result<(), ConfigError> {
    if !range.is_ordered() {
        return Err(ConfigError::EmptyRange {
            field,
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}

/// Like [ordered], but the range must also have a non-zero length.
fn spanning(field: &'static str, range: &Interval<f64>) -> Result<(), ConfigError> {
    if !(range.length() > 0.0) {
        return Err(ConfigError::EmptyRange {
            field,
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}
