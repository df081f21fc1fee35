//! Ray-cast distance sensors.

use crate::math::{advance, raster_cell, within, Point2d};
use crate::obstacle::ObstacleField;
use crate::track::TrackSurface;
use serde::{Deserialize, Serialize};

/// The number of rays in a vehicle's sensor fan, excluding the long range front ray.
pub const SENSOR_COUNT: usize = 9;

/// The geometry of a vehicle's sensor fan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Ray directions relative to the vehicle's heading in degrees, ordered left to right.
    /// The fan is read as: far left, two left rays, left diagonal, front,
    /// right diagonal, two right rays, far right.
    pub offsets: [f64; SENSOR_COUNT],
    /// The maximum length of each ray.
    pub range: f64,
    /// The length of the long range front ray, as a multiple of `range`.
    pub long_range_factor: f64,
    /// The distance a ray advances between samples.
    pub step: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            offsets: [-90.0, -70.0, -40.0, -20.0, 0.0, 20.0, 40.0, 70.0, 90.0],
            range: 320.0,
            long_range_factor: 1.5,
            step: 3.0,
        }
    }
}

impl SensorConfig {
    /// The length of the long range front ray.
    pub fn long_range(&self) -> f64 {
        self.long_range_factor * self.range
    }
}

/// The distances reported by a vehicle's sensors on a single frame.
///
/// The two rays nearest each flank are folded into `left` and `right`
/// by taking their minimum, so flank clearance errs on the side of caution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub far_left: f64,
    pub left: f64,
    pub lmid: f64,
    pub front: f64,
    pub front_long: f64,
    pub rmid: f64,
    pub right: f64,
    pub far_right: f64,
    /// `right - left`
    pub bias: f64,
    /// The vehicle's speed.
    pub speed: f64,
}

impl SensorReading {
    /// Assembles a reading from the raw ray distances of a sensor fan.
    pub fn from_rays(rays: [f64; SENSOR_COUNT], front_long: f64, speed: f64) -> Self {
        let left = f64::min(rays[1], rays[2]);
        let right = f64::min(rays[6], rays[7]);
        Self {
            far_left: rays[0],
            left,
            lmid: rays[3],
            front: rays[4],
            front_long,
            rmid: rays[5],
            right,
            far_right: rays[8],
            bias: right - left,
            speed,
        }
    }

    /// The nearest reading among the front and both diagonal rays.
    pub fn min_front(&self) -> f64 {
        self.front.min(self.lmid).min(self.rmid)
    }
}

/// A sensor reading along with the end point of every ray, for debug overlays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorScan {
    pub reading: SensorReading,
    pub endpoints: [Point2d; SENSOR_COUNT],
    pub long_endpoint: Point2d,
}

/// The collision footprint of another vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hitbox {
    pub centre: Point2d,
    pub radius: f64,
}

/// Everything a vehicle's sensors can see on a given frame.
#[derive(Clone, Copy)]
pub struct Surroundings<'a> {
    /// The track surface.
    pub track: &'a TrackSurface,
    /// The cones on the track.
    pub obstacles: &'a ObstacleField,
    /// The other vehicles on the track.
    pub vehicles: &'a [Hitbox],
}

impl<'a> Surroundings<'a> {
    /// Marches a ray from `origin` in the direction `angle`, returning the distance
    /// travelled when it first leaves the road, enters a cone, or comes within
    /// `own_radius` of another vehicle's hitbox. Returns `max_length` if nothing is hit.
    ///
    /// # Parameters
    /// * `origin` - The start of the ray
    /// * `angle` - The direction of the ray in radians
    /// * `max_length` - The maximum distance to march
    /// * `step` - The distance between samples, must be positive
    /// * `own_radius` - The hit radius of the vehicle casting the ray
    pub fn cast(
        &self,
        origin: Point2d,
        angle: f64,
        max_length: f64,
        step: f64,
        own_radius: f64,
    ) -> f64 {
        (0..)
            .map(|i| i as f64 * step)
            .take_while(|dist| *dist < max_length)
            .find(|dist| self.is_blocked(advance(origin, angle, *dist), own_radius))
            .unwrap_or(max_length)
    }

    /// Reads the full sensor fan of a vehicle.
    pub fn scan(
        &self,
        origin: Point2d,
        heading: f64,
        speed: f64,
        config: &SensorConfig,
        own_radius: f64,
    ) -> SensorScan {
        let angles = config.offsets.map(|deg| heading + deg.to_radians());
        let rays = angles.map(|angle| self.cast(origin, angle, config.range, config.step, own_radius));
        let long_range = config.long_range();
        let front_long = self.cast(origin, heading, long_range, config.step, own_radius);
        SensorScan {
            reading: SensorReading::from_rays(rays, front_long, speed),
            endpoints: std::array::from_fn(|i| advance(origin, angles[i], rays[i])),
            long_endpoint: advance(origin, heading, front_long),
        }
    }

    /// Whether the raster cell containing `point` is off the road or occupied.
    fn is_blocked(&self, point: Point2d, own_radius: f64) -> bool {
        let (x, y) = raster_cell(point);
        if !self.track.is_road(x, y) {
            return true;
        }
        let cell = Point2d::new(x as f64, y as f64);
        self.obstacles.contains(cell)
            || self
                .vehicles
                .iter()
                .any(|other| within(other.centre, cell, own_radius + other.radius))
    }
}
