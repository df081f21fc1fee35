use super::{Pose, VehicleAttributes};
use crate::math::{advance, raster_cell, Point2d};
use crate::policy::Control;
use crate::track::TrackSurface;
use crate::util::Interval;
use serde::{Deserialize, Serialize};

/// The search pattern used to put an off-road vehicle back onto the road.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Offsets from the vehicle's heading to search, in degrees, inclusive.
    pub angles: Interval<f64>,
    /// The spacing of the searched offsets in degrees.
    pub angle_step: f64,
    /// Distances to search along each offset; `max` is exclusive.
    pub distances: Interval<f64>,
    /// The spacing of the searched distances.
    pub distance_step: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            angles: Interval::new(-90.0, 90.0),
            angle_step: 15.0,
            distances: Interval::new(18.0, 80.0),
            distance_step: 6.0,
        }
    }
}

/// Advances a pose by one explicit Euler step.
///
/// Velocity is clamped to `[0, max_speed]`, so a negative throttle only slows the vehicle.
pub fn integrate(pose: &mut Pose, attributes: &VehicleAttributes, dt: f64, control: &Control) {
    pose.heading += control.steer * attributes.turn_rate * dt;

    let mut vel = pose.velocity;
    vel += control.throttle * attributes.accel * dt;
    vel -= control.brake * attributes.brake_accel * dt;
    vel *= attributes.drag;
    pose.velocity = vel.clamp(0.0, attributes.max_speed);

    pose.position = advance(pose.position, pose.heading, pose.velocity * dt);
}

/// Searches a fan of rays around the vehicle's heading for the nearest road cell.
///
/// Each offset is searched outwards and contributes its first road cell; the
/// closest of these wins, with ties going to the leftmost offset.
/// Returns the cell and the heading along the winning offset.
pub fn fan_search(
    track: &TrackSurface,
    pose: &Pose,
    config: &RecoveryConfig,
) -> Option<(Point2d, f64)> {
    let offsets = steps(config.angles.min, config.angle_step)
        .take_while(|deg| *deg <= config.angles.max);
    offsets
        .filter_map(|deg| {
            let heading = pose.heading + deg.to_radians();
            steps(config.distances.min, config.distance_step)
                .take_while(|dist| *dist < config.distances.max)
                .map(|dist| (dist, raster_cell(advance(pose.position, heading, dist))))
                .find(|(_, (x, y))| track.is_road(*x, *y))
                .map(|(dist, (x, y))| (dist, Point2d::new(x as f64, y as f64), heading))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, cell, heading)| (cell, heading))
}

/// An unbounded arithmetic sequence, computed by multiplication to avoid drift.
fn steps(start: f64, step: f64) -> impl Iterator<Item = f64> {
    (0..).map(move |i| start + i as f64 * step)
}
