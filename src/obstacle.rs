//! Cone obstacles scattered over the track.

use crate::math::{within, Point2d};
use crate::track::TrackSurface;
use cgmath::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The parameters used to place and collide with cones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// The number of cones on the track.
    pub count: usize,
    /// The radius of each cone.
    pub radius: f64,
    /// The minimum distance between a newly placed cone and any vehicle.
    pub keepout: f64,
    /// The number of random samples tried before giving up on placing a cone.
    pub max_attempts: usize,
    /// The fraction of the combined vehicle and cone radii within which
    /// a vehicle is considered to have hit a cone.
    pub collision_shrink: f64,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            count: 10,
            radius: 8.0,
            keepout: 40.0,
            max_attempts: 2000,
            collision_shrink: 0.70,
        }
    }
}

/// A circular obstacle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cone {
    /// The centre of the cone.
    pub position: Point2d,
    /// The radius of the cone.
    pub radius: f64,
}

/// A fixed-size set of cones.
///
/// Cone positions only change through [ObstacleField::reshuffle], which the
/// simulation calls between races; during a race the field is read-only.
#[derive(Clone, Debug, Default)]
pub struct ObstacleField {
    cones: Vec<Cone>,
    keepout: f64,
    max_attempts: usize,
    collision_shrink: f64,
}

impl ObstacleField {
    /// Places `config.count` cones on random road cells, each at least
    /// `config.keepout` away from every position in `vehicles`.
    pub fn place(
        config: &ObstacleConfig,
        track: &TrackSurface,
        vehicles: &[Point2d],
        rng: &mut impl Rng,
    ) -> Self {
        let mut field = Self::from_positions(config, std::iter::empty());
        for _ in 0..config.count {
            let position = field.random_road_point(track, vehicles, rng);
            field.cones.push(Cone {
                position,
                radius: config.radius,
            });
        }
        field
    }

    /// Creates a field with cones at the given positions.
    pub fn from_positions(
        config: &ObstacleConfig,
        positions: impl IntoIterator<Item = Point2d>,
    ) -> Self {
        Self {
            cones: positions
                .into_iter()
                .map(|position| Cone {
                    position,
                    radius: config.radius,
                })
                .collect(),
            keepout: config.keepout,
            max_attempts: config.max_attempts,
            collision_shrink: config.collision_shrink,
        }
    }

    /// Moves every cone to a new random position, following the same rules as [ObstacleField::place].
    pub fn reshuffle(&mut self, track: &TrackSurface, vehicles: &[Point2d], rng: &mut impl Rng) {
        for idx in 0..self.cones.len() {
            let position = self.random_road_point(track, vehicles, rng);
            self.cones[idx].position = position;
        }
        log::debug!("Reshuffled {} cones", self.cones.len());
    }

    /// Samples random raster cells until one is on the road and clear of all vehicles.
    /// Falls back to the centre of the raster if every attempt fails.
    fn random_road_point(
        &self,
        track: &TrackSurface,
        vehicles: &[Point2d],
        rng: &mut impl Rng,
    ) -> Point2d {
        let keepout2 = self.keepout * self.keepout;
        (0..self.max_attempts)
            .map(|_| {
                let x = rng.gen_range(0..track.width());
                let y = rng.gen_range(0..track.height());
                Point2d::new(x as f64, y as f64)
            })
            .find(|point| {
                track.is_road_at(*point)
                    && vehicles.iter().all(|v| v.distance2(*point) >= keepout2)
            })
            .unwrap_or_else(|| {
                log::warn!(
                    "No legal cone position found in {} attempts, using the track centre",
                    self.max_attempts
                );
                track.centre()
            })
    }

    /// The cones in the field.
    pub fn cones(&self) -> &[Cone] {
        &self.cones
    }

    /// The number of cones in the field.
    pub fn len(&self) -> usize {
        self.cones.len()
    }

    /// Whether the field has no cones.
    pub fn is_empty(&self) -> bool {
        self.cones.is_empty()
    }

    /// Whether `point` lies inside any cone.
    pub fn contains(&self, point: Point2d) -> bool {
        self.cones
            .iter()
            .any(|cone| within(cone.position, point, cone.radius))
    }

    /// Whether a vehicle at `centre` with the given hit radius has struck a cone.
    /// The combined radius is shrunk so that grazing a cone does not count.
    pub fn collides(&self, centre: Point2d, hit_radius: f64) -> bool {
        self.cones.iter().any(|cone| {
            let threshold = self.collision_shrink * (hit_radius + cone.radius);
            within(cone.position, centre, threshold)
        })
    }
}
