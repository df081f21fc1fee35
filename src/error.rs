//! Error types.

use crate::VehicleId;
use thiserror::Error;

/// Errors raised while loading a track raster.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to load track image: {0}")]
    Image(#[from] image::ImageError),
    #[error("track raster has {actual} bytes, expected {expected} for its dimensions")]
    Malformed { expected: usize, actual: usize },
    #[error("track raster is {width}x{height}, it must be at least 3x3")]
    TooSmall { width: u32, height: u32 },
}

/// Errors raised when race configuration invariants are violated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} is an empty range ({min} to {max})")]
    EmptyRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("sensor offsets must be strictly ascending")]
    SensorOrder,
    #[error("a race needs at least one entrant")]
    NoEntrants,
}

/// Errors raised by commands issued to a running [Simulation](crate::Simulation).
#[derive(Debug, Error)]
pub enum RaceError {
    #[error("vehicles can only be placed in placement mode")]
    NotPlacing,
    #[error("({x:.1}, {y:.1}) is not on the road")]
    OffRoad { x: f64, y: f64 },
    #[error("no vehicle with ID {0:?}")]
    UnknownVehicle(VehicleId),
    #[error("obstacles cannot be moved while a race is in progress")]
    RaceInProgress,
}
