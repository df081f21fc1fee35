use crate::config::{EntrantConfig, RaceConfig, ReshufflePolicy};
use crate::error::{ConfigError, RaceError};
use crate::history::RaceHistory;
use crate::math::Point2d;
use crate::metrics::{Metrics, VehicleReport};
use crate::obstacle::ObstacleField;
use crate::policy::Control;
use crate::sensor::{Hitbox, Surroundings};
use crate::track::TrackSurface;
use crate::vehicle::{LapEvent, Vehicle};
use crate::{VehicleId, VehicleSet};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;

/// A race between one or more autonomous vehicles around a raster track.
pub struct Simulation {
    /// The track being raced on.
    track: Rc<TrackSurface>,
    /// The race parameters.
    config: RaceConfig,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The vehicle IDs in entrant order, which is also the order they are updated in.
    order: Vec<VehicleId>,
    /// The cones on the track.
    obstacles: ObstacleField,
    /// The source of randomness for cone placement.
    rng: StdRng,
    /// The results of previous races.
    history: RaceHistory,
    /// Whether vehicles are being positioned by hand, which pauses the race.
    placing: bool,
    /// The current frame of the race.
    frame: usize,
    /// The race time in s.
    elapsed: f64,
    /// Whether every vehicle has finished.
    finished: bool,
    /// Whether the current race has been added to the history.
    recorded: bool,
}

impl Simulation {
    /// Creates a new race with vehicles at their spawn points and cones placed around them.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(track: Rc<TrackSurface>, config: RaceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut vehicles = VehicleSet::with_key();
        let order = config
            .entrants
            .iter()
            .map(|entrant| vehicles.insert_with_key(|id| build_vehicle(id, entrant, &config)))
            .collect();
        let spawns: Vec<Point2d> = config.entrants.iter().map(EntrantConfig::spawn_point).collect();
        let obstacles = ObstacleField::place(&config.obstacles, &track, &spawns, &mut rng);

        Ok(Self {
            track,
            config,
            vehicles,
            order,
            obstacles,
            rng,
            history: RaceHistory::new(),
            placing: false,
            frame: 0,
            elapsed: 0.0,
            finished: false,
            recorded: false,
        })
    }

    /// Advances the race by `dt` seconds. Does nothing in placement mode.
    pub fn step(&mut self, dt: f64) {
        if self.placing {
            return;
        }
        let was_finished = self.finished;
        self.drive_vehicles(dt);
        if !was_finished {
            self.collide_vehicles();
        }
        self.frame += 1;
        if !was_finished {
            self.elapsed += dt;
        }
        if !self.finished && self.vehicles.values().all(Vehicle::has_finished) {
            self.finished = true;
            log::info!("Race finished after {:.2}s", self.elapsed);
        }
    }

    /// Steps the race until it finishes, `max_ticks` frames have passed, or `should_stop`
    /// returns `true`. The predicate is checked before every frame.
    /// Returns the number of frames simulated.
    pub fn run(
        &mut self,
        dt: f64,
        max_ticks: usize,
        mut should_stop: impl FnMut(&Simulation) -> bool,
    ) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && !self.finished && !self.placing && !should_stop(self) {
            self.step(dt);
            ticks += 1;
        }
        ticks
    }

    /// Enters or leaves placement mode.
    pub fn set_placing(&mut self, placing: bool) {
        self.placing = placing;
    }

    /// Whether the race is paused for placement.
    pub fn is_placing(&self) -> bool {
        self.placing
    }

    /// Moves a vehicle to a point on the road, bringing it to rest.
    ///
    /// # Errors
    ///
    /// Fails outside of placement mode, for an unknown vehicle, or for a point off the road.
    pub fn place_vehicle(
        &mut self,
        vehicle_id: VehicleId,
        position: Point2d,
        heading: f64,
    ) -> Result<(), RaceError> {
        if !self.placing {
            return Err(RaceError::NotPlacing);
        }
        let vehicle = self
            .vehicles
            .get_mut(vehicle_id)
            .ok_or(RaceError::UnknownVehicle(vehicle_id))?;
        if !self.track.is_road_at(position) {
            return Err(RaceError::OffRoad {
                x: position.x,
                y: position.y,
            });
        }
        vehicle.set_pose(position, heading);
        Ok(())
    }

    /// Turns a vehicle on the spot by `delta` radians.
    ///
    /// # Errors
    ///
    /// Fails outside of placement mode or for an unknown vehicle.
    pub fn rotate_vehicle(&mut self, vehicle_id: VehicleId, delta: f64) -> Result<(), RaceError> {
        if !self.placing {
            return Err(RaceError::NotPlacing);
        }
        self.vehicles
            .get_mut(vehicle_id)
            .ok_or(RaceError::UnknownVehicle(vehicle_id))?
            .rotate(delta);
        Ok(())
    }

    /// Starts a new race. A finished race is added to the history first, and cones are
    /// moved according to the configured [ReshufflePolicy].
    pub fn restart(&mut self) {
        let reshuffle = match self.config.reshuffle {
            ReshufflePolicy::Never => false,
            ReshufflePolicy::AfterFinish => self.finished,
            ReshufflePolicy::EveryRestart => true,
        };
        self.reset(reshuffle);
    }

    /// Starts a new race with freshly placed cones.
    pub fn restart_with_reshuffle(&mut self) {
        self.reset(true);
    }

    /// Moves every cone, keeping clear of the vehicles' current positions.
    ///
    /// # Errors
    ///
    /// Fails once the race has started, until it has finished.
    pub fn reshuffle_obstacles(&mut self) -> Result<(), RaceError> {
        if self.frame > 0 && !self.finished {
            return Err(RaceError::RaceInProgress);
        }
        let positions: Vec<Point2d> = self.iter_vehicles().map(Vehicle::position).collect();
        self.obstacles.reshuffle(&self.track, &positions, &mut self.rng);
        Ok(())
    }

    /// Adds the current race to the history if it has finished and is not there yet.
    /// Returns the full history.
    pub fn close(&mut self) -> &RaceHistory {
        self.record_race();
        &self.history
    }

    /// Gets the current race frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The race time in s. Stops when the race finishes.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Whether every vehicle has finished.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The race parameters.
    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// The track being raced on.
    pub fn track(&self) -> &TrackSurface {
        &self.track
    }

    /// The cones on the track.
    pub fn obstacles(&self) -> &ObstacleField {
        &self.obstacles
    }

    /// The results of previous races.
    pub fn history(&self) -> &RaceHistory {
        &self.history
    }

    /// Returns an iterator over all the vehicles, in entrant order.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.order.iter().map(|id| &self.vehicles[*id])
    }

    /// The vehicle IDs, in entrant order.
    pub fn vehicle_ids(&self) -> &[VehicleId] {
        &self.order
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// The current figures of every vehicle, in entrant order.
    pub fn reports(&self) -> Vec<VehicleReport> {
        self.iter_vehicles().map(Vehicle::report).collect()
    }

    /// Senses, drives and integrates each vehicle in turn, then resolves wall and cone
    /// collisions and counts laps.
    fn drive_vehicles(&mut self, dt: f64) {
        let mut hitboxes: Vec<Hitbox> = self.iter_vehicles().map(Vehicle::hitbox).collect();
        let Some(last) = hitboxes.len().checked_sub(1) else {
            return;
        };
        for (idx, &id) in self.order.iter().enumerate() {
            // Park the vehicle's own hitbox past the end of the slice it senses
            hitboxes.swap(idx, last);
            let vehicle = &mut self.vehicles[id];
            if vehicle.has_finished() {
                vehicle.update(dt, Control::default());
            } else {
                let env = Surroundings {
                    track: &self.track,
                    obstacles: &self.obstacles,
                    vehicles: &hitboxes[..last],
                };
                race_frame(vehicle, &env, &self.config, dt);
            }
            hitboxes[last] = vehicle.hitbox();
            hitboxes.swap(idx, last);
        }
    }

    /// Checks every pair of vehicles for contact, once per pair.
    fn collide_vehicles(&mut self) {
        let collisions = &self.config.collisions;
        for (a, b) in self.order.iter().copied().tuple_combinations() {
            let Some([va, vb]) = self.vehicles.get_disjoint_mut([a, b]) else {
                continue;
            };
            if va.collides_with_car(vb, collisions.car_cooldown) {
                log::debug!("{} and {} collided", va.label(), vb.label());
                for vehicle in [va, vb] {
                    vehicle.scale_velocity(collisions.car_speed_factor);
                    vehicle.record_collision();
                }
            }
        }
    }

    /// Rebuilds the vehicles at their spawn points, optionally moving the cones.
    fn reset(&mut self, reshuffle: bool) {
        self.record_race();
        for (entrant, &id) in self.config.entrants.iter().zip(&self.order) {
            self.vehicles[id] = build_vehicle(id, entrant, &self.config);
        }
        if reshuffle {
            let spawns: Vec<Point2d> =
                self.config.entrants.iter().map(EntrantConfig::spawn_point).collect();
            self.obstacles.reshuffle(&self.track, &spawns, &mut self.rng);
        }
        self.frame = 0;
        self.elapsed = 0.0;
        self.finished = false;
        self.recorded = false;
        log::info!("Race {} ready", self.history.len() + 1);
    }

    /// Adds the current race to the history if it has finished and is not there yet.
    fn record_race(&mut self) {
        if !self.finished || self.recorded {
            return;
        }
        let results = self.reports();
        let record = self.history.record(self.config.lap_target, results);
        log::info!("Race {} recorded", record.number);
        self.recorded = true;
    }
}

/// Runs one frame for a racing vehicle: sense, drive, collide, then count laps.
fn race_frame(vehicle: &mut Vehicle, env: &Surroundings, config: &RaceConfig, dt: f64) {
    let scan = vehicle.sense(env);
    vehicle.drive(dt, scan);

    let hit_wall = vehicle.collide_wall(env.track, &config.recovery);
    if hit_wall {
        log::debug!("{} left the road", vehicle.label());
    }
    let collisions = &config.collisions;
    let hit_cone = vehicle.collide_cones(
        env.obstacles,
        collisions.cone_cooldown,
        collisions.cone_speed_factor,
    );
    if hit_cone {
        log::debug!("{} hit a cone", vehicle.label());
    }
    vehicle.record_frame(dt, hit_wall || hit_cone);

    match vehicle.check_lap(config.start_line_x, config.grace_period, config.lap_target) {
        Some(LapEvent::Completed(lap)) => log::info!("{} completed lap {}", vehicle.label(), lap),
        Some(LapEvent::Finished) => log::info!(
            "{} finished in {:.2}s",
            vehicle.label(),
            vehicle.metrics().elapsed()
        ),
        None => {}
    }
}

/// Creates a vehicle at rest at the entrant's spawn point.
fn build_vehicle(id: VehicleId, entrant: &EntrantConfig, config: &RaceConfig) -> Vehicle {
    let mut vehicle = Vehicle::new(
        id,
        entrant.label.as_str(),
        &config.vehicle,
        &config.sensors,
        entrant.policy.build(config),
        Metrics::new(config.correction_threshold),
    );
    vehicle.set_pose(entrant.spawn_point(), entrant.heading);
    vehicle
}
