use self::dynamics::{fan_search, integrate};
use crate::math::Point2d;
use crate::metrics::{Metrics, VehicleReport};
use crate::obstacle::ObstacleField;
use crate::policy::{Control, ControlPolicy, PolicyKind};
use crate::sensor::{Hitbox, SensorConfig, SensorScan, Surroundings};
use crate::track::TrackSurface;
use crate::util::Cooldown;
use crate::VehicleId;
use cgmath::prelude::*;
use serde::{Deserialize, Serialize};

pub use dynamics::RecoveryConfig;

mod dynamics;

/// The physical constants of a vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleAttributes {
    /// The top speed.
    pub max_speed: f64,
    /// Acceleration at full throttle.
    pub accel: f64,
    /// Deceleration at full brake.
    pub brake_accel: f64,
    /// Multiplier applied to the velocity every frame, in `(0, 1]`.
    pub drag: f64,
    /// Heading change per second at full steering lock, in radians.
    pub turn_rate: f64,
    /// The radius used for collisions and other vehicles' sensors.
    pub hit_radius: f64,
    /// Multiplier applied to the velocity every frame once the vehicle has finished.
    pub finish_decay: f64,
    /// Multiplier applied to the velocity when the vehicle leaves the road.
    pub wall_speed_factor: f64,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            max_speed: 900.0,
            accel: 2100.0,
            brake_accel: 3400.0,
            drag: 0.986,
            turn_rate: 2.2,
            hit_radius: 12.0,
            finish_decay: 0.9,
            wall_speed_factor: 0.5,
        }
    }
}

/// Where a vehicle is, which way it faces and how fast it is going.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Point2d,
    /// The heading in radians; positive turns clockwise on screen.
    pub heading: f64,
    /// The forward speed, never negative.
    pub velocity: f64,
}

/// The outcome of a vehicle crossing the start line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LapEvent {
    /// A lap was completed; holds the new lap count.
    Completed(u32),
    /// The final lap was completed.
    Finished,
}

/// A simulated race car.
#[derive(Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// The name shown on the scoreboard.
    label: String,
    /// The vehicle's physical constants.
    attributes: VehicleAttributes,
    /// The geometry of the vehicle's sensors.
    sensors: SensorConfig,
    /// The driver.
    driver: Box<dyn ControlPolicy>,
    /// The vehicle's current pose.
    pose: Pose,
    /// The number of completed laps.
    lap_count: u32,
    /// The x-coordinate on the previous frame, for start line crossings.
    last_x: f64,
    /// Whether the vehicle has completed the race. Once set, never cleared.
    finished: bool,
    /// Blocks repeated cone hits.
    cone_cooldown: Cooldown,
    /// Blocks repeated vehicle hits.
    car_cooldown: Cooldown,
    /// The most recent sensor scan.
    scan: Option<SensorScan>,
    /// The most recent control inputs.
    control: Control,
    /// The vehicle's race metrics.
    metrics: Metrics,
}

impl Vehicle {
    /// Creates a new vehicle at rest.
    pub(crate) fn new(
        id: VehicleId,
        label: impl Into<String>,
        attributes: &VehicleAttributes,
        sensors: &SensorConfig,
        driver: Box<dyn ControlPolicy>,
        metrics: Metrics,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            attributes: attributes.clone(),
            sensors: sensors.clone(),
            driver,
            pose: Pose {
                position: Point2d::new(0.0, 0.0),
                heading: 0.0,
                velocity: 0.0,
            },
            lap_count: 0,
            last_x: 0.0,
            finished: false,
            cone_cooldown: Cooldown::default(),
            car_cooldown: Cooldown::default(),
            scan: None,
            control: Control::default(),
            metrics,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The name shown on the scoreboard.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The kind of driver controlling the vehicle.
    pub fn policy(&self) -> PolicyKind {
        self.driver.kind()
    }

    /// The vehicle's physical constants.
    pub fn attributes(&self) -> &VehicleAttributes {
        &self.attributes
    }

    /// The vehicle's current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// The coordinates of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.pose.position
    }

    /// The vehicle's heading in radians.
    pub fn heading(&self) -> f64 {
        self.pose.heading
    }

    /// The vehicle's speed.
    pub fn vel(&self) -> f64 {
        self.pose.velocity
    }

    /// The number of laps completed.
    pub fn lap_count(&self) -> u32 {
        self.lap_count
    }

    /// Whether the vehicle has completed the race.
    pub fn has_finished(&self) -> bool {
        self.finished
    }

    /// The most recent sensor scan, including ray end points.
    pub fn scan(&self) -> Option<&SensorScan> {
        self.scan.as_ref()
    }

    /// The end points of every sensor ray from the most recent scan, for overlays.
    /// The final point belongs to the long-range front ray.
    pub fn ray_endpoints(&self) -> Vec<Point2d> {
        self.scan
            .iter()
            .flat_map(|scan| scan.endpoints.iter().copied().chain([scan.long_endpoint]))
            .collect()
    }

    /// The control inputs applied on the most recent frame.
    pub fn control(&self) -> Control {
        self.control
    }

    /// The vehicle's race metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The vehicle's collision footprint.
    pub fn hitbox(&self) -> Hitbox {
        Hitbox {
            centre: self.pose.position,
            radius: self.attributes.hit_radius,
        }
    }

    /// The vehicle's final figures.
    pub fn report(&self) -> VehicleReport {
        VehicleReport {
            time_s: self.metrics.elapsed(),
            collisions: self.metrics.collisions(),
            corrections: self.metrics.corrections(),
            laps: self.lap_count,
            label: self.label.clone(),
        }
    }

    /// Moves the vehicle, bringing it to rest. Also resets start line tracking,
    /// so that a placement never counts as a crossing.
    pub(crate) fn set_pose(&mut self, position: Point2d, heading: f64) {
        self.pose = Pose {
            position,
            heading,
            velocity: 0.0,
        };
        self.last_x = position.x;
    }

    /// Turns the vehicle on the spot.
    pub(crate) fn rotate(&mut self, delta: f64) {
        self.pose.heading += delta;
    }

    /// Multiplies the vehicle's speed by `factor`.
    pub(crate) fn scale_velocity(&mut self, factor: f64) {
        self.pose.velocity *= factor;
    }

    /// Reads the vehicle's sensors.
    pub(crate) fn sense(&self, env: &Surroundings) -> SensorScan {
        env.scan(
            self.pose.position,
            self.pose.heading,
            self.pose.velocity,
            &self.sensors,
            self.attributes.hit_radius,
        )
    }

    /// Lets the driver act on a sensor scan, then integrates.
    pub(crate) fn drive(&mut self, dt: f64, scan: SensorScan) -> Control {
        let control = self.driver.act(&scan.reading);
        self.scan = Some(scan);
        self.update(dt, control);
        control
    }

    /// Integrates the vehicle's heading, velocity and position.
    ///
    /// A finished vehicle ignores the control inputs and only slows down.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    /// * `control` - The driver's inputs
    pub(crate) fn update(&mut self, dt: f64, control: Control) {
        self.cone_cooldown.tick(dt);
        self.car_cooldown.tick(dt);
        if self.finished {
            self.pose.velocity *= self.attributes.finish_decay;
            self.control = Control::default();
            return;
        }
        self.control = control;
        integrate(&mut self.pose, &self.attributes, dt, &control);
    }

    /// Checks whether the vehicle has left the road. If so, halves its speed and
    /// moves it back onto the nearest road found by a fan search.
    /// Returns `true` iff the vehicle was off the road.
    pub(crate) fn collide_wall(&mut self, track: &TrackSurface, recovery: &RecoveryConfig) -> bool {
        if track.is_road_at(self.pose.position) {
            return false;
        }
        self.scale_velocity(self.attributes.wall_speed_factor);
        match fan_search(track, &self.pose, recovery) {
            Some((position, heading)) => {
                self.pose.position = position;
                self.pose.heading = heading;
            }
            None => log::warn!(
                "{} is off the road at ({:.0}, {:.0}) with no road nearby",
                self.label,
                self.pose.position.x,
                self.pose.position.y
            ),
        }
        true
    }

    /// Checks for a cone hit, unless one was registered recently.
    /// A hit slows the vehicle and starts the cone cooldown.
    pub(crate) fn collide_cones(
        &mut self,
        obstacles: &ObstacleField,
        cooldown: f64,
        speed_factor: f64,
    ) -> bool {
        if self.cone_cooldown.is_active()
            || !obstacles.collides(self.pose.position, self.attributes.hit_radius)
        {
            return false;
        }
        self.scale_velocity(speed_factor);
        self.cone_cooldown.arm(cooldown);
        true
    }

    /// Checks for contact with another vehicle, unless either vehicle registered
    /// contact recently. On contact both vehicles' cooldowns are started; slowing
    /// them down is left to the caller.
    pub(crate) fn collides_with_car(&mut self, other: &mut Vehicle, cooldown: f64) -> bool {
        if self.car_cooldown.is_active() || other.car_cooldown.is_active() {
            return false;
        }
        let min_dist = self.attributes.hit_radius + other.attributes.hit_radius;
        if self.pose.position.distance2(other.pose.position) < min_dist * min_dist {
            self.car_cooldown.arm(cooldown);
            other.car_cooldown.arm(cooldown);
            true
        } else {
            false
        }
    }

    /// Records one frame in the vehicle's metrics.
    pub(crate) fn record_frame(&mut self, dt: f64, collided: bool) {
        self.metrics.update(dt, collided, self.control.steer);
    }

    /// Records contact with another vehicle in the vehicle's metrics.
    pub(crate) fn record_collision(&mut self) {
        self.metrics.record_collision();
    }

    /// Checks whether the vehicle crossed the start line, moving in the positive
    /// x direction, since the previous call.
    ///
    /// # Parameters
    /// * `line_x` - The x-coordinate of the start line
    /// * `grace` - Crossings before this much race time has passed are ignored
    /// * `lap_target` - The number of laps which completes the race
    pub(crate) fn check_lap(&mut self, line_x: f64, grace: f64, lap_target: u32) -> Option<LapEvent> {
        let x = self.pose.position.x;
        let crossed = self.last_x < line_x && line_x <= x;
        self.last_x = x;
        if self.finished || !crossed || self.metrics.elapsed() <= grace {
            return None;
        }
        self.lap_count += 1;
        if self.lap_count >= lap_target {
            self.finished = true;
            self.metrics.finish();
            Some(LapEvent::Finished)
        } else {
            Some(LapEvent::Completed(self.lap_count))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::RaceConfig;
    use crate::track::test::{ASPHALT, GRASS};
    use crate::track::RoadPalette;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn vehicle(kind: PolicyKind, x: f64, y: f64) -> Vehicle {
        let config = RaceConfig::default();
        let mut vehicle = Vehicle::new(
            VehicleId::default(),
            "test",
            &config.vehicle,
            &config.sensors,
            kind.build(&config),
            Metrics::new(config.correction_threshold),
        );
        vehicle.set_pose(Point2d::new(x, y), 0.0);
        vehicle
    }

    /// Moves the vehicle to `x` over one frame of `dt` seconds.
    fn drive_to(vehicle: &mut Vehicle, x: f64, dt: f64) -> Option<LapEvent> {
        vehicle.pose.position.x = x;
        vehicle.metrics.update(dt, false, 0.0);
        vehicle.check_lap(100.0, 3.0, 3)
    }

    #[test]
    fn counts_laps_after_grace_period() {
        let mut v = vehicle(PolicyKind::Rule, 90.0, 0.0);
        // Crossing during the grace period is ignored
        assert_eq!(drive_to(&mut v, 105.0, 1.0), None);
        assert_eq!(v.lap_count(), 0);
        // Going around and crossing again counts
        assert_eq!(drive_to(&mut v, 20.0, 2.0), None);
        assert_eq!(drive_to(&mut v, 99.0, 1.0), None);
        assert_eq!(drive_to(&mut v, 100.0, 1.0), Some(LapEvent::Completed(1)));
        // Reversing back over the line does nothing, nor does crossing it forwards again
        // without first going back
        assert_eq!(drive_to(&mut v, 95.0, 1.0), None);
        assert_eq!(v.lap_count(), 1);
        assert_eq!(drive_to(&mut v, 110.0, 1.0), Some(LapEvent::Completed(2)));
        assert_eq!(drive_to(&mut v, 150.0, 1.0), None);
        assert_eq!(drive_to(&mut v, 50.0, 1.0), None);
        assert_eq!(drive_to(&mut v, 101.0, 1.0), Some(LapEvent::Finished));
        assert!(v.has_finished());
        assert_eq!(v.metrics().finish_time(), Some(v.metrics().elapsed()));
    }

    #[test]
    fn finished_vehicles_only_slow_down() {
        let mut v = vehicle(PolicyKind::Fuzzy, 90.0, 0.0);
        v.pose.velocity = 600.0;
        v.finished = true;
        let laps = v.lap_count();
        let mut rng = StdRng::seed_from_u64(9);
        let mut vel = v.vel();
        for _ in 0..200 {
            let control = Control {
                steer: rng.gen_range(-1.0..=1.0),
                throttle: 1.0,
                brake: 0.0,
            };
            v.update(1.0 / 60.0, control);
            v.pose.position.x = rng.gen_range(0.0..200.0);
            v.check_lap(100.0, 0.0, 1);
            assert!(v.vel() <= vel);
            assert_eq!(v.lap_count(), laps);
            vel = v.vel();
        }
        assert!(v.vel() < 1.0);
    }

    #[test]
    fn car_contact_has_a_cooldown() {
        let mut a = vehicle(PolicyKind::Rule, 100.0, 100.0);
        let mut b = vehicle(PolicyKind::Fuzzy, 110.0, 100.0);
        let dt = 1.0 / 60.0;
        let mut hits = vec![];
        for tick in 0..180 {
            a.car_cooldown.tick(dt);
            b.car_cooldown.tick(dt);
            if a.collides_with_car(&mut b, 1.5) {
                hits.push(tick);
            }
        }
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], 0);
        assert!(hits[1] - hits[0] >= 90);
    }

    #[test]
    fn cars_apart_do_not_collide() {
        let mut a = vehicle(PolicyKind::Rule, 100.0, 100.0);
        let mut b = vehicle(PolicyKind::Rule, 124.0, 100.0);
        assert!(!a.collides_with_car(&mut b, 1.5));
        b.set_pose(Point2d::new(123.9, 100.0), 0.0);
        assert!(a.collides_with_car(&mut b, 1.5));
    }

    #[test]
    fn cone_hits_have_a_cooldown() {
        let config = RaceConfig::default();
        let field = ObstacleField::from_positions(&config.obstacles, [Point2d::new(105.0, 100.0)]);
        let mut v = vehicle(PolicyKind::Rule, 100.0, 100.0);
        v.pose.velocity = 500.0;
        assert!(v.collide_cones(&field, 1.0, 0.4));
        assert_approx_eq!(v.vel(), 200.0);
        assert!(!v.collide_cones(&field, 1.0, 0.4));
        v.update(1.0, Control::hard_stop(0.0));
        v.set_pose(Point2d::new(100.0, 100.0), 0.0);
        assert!(v.collide_cones(&field, 1.0, 0.4));
    }

    #[test]
    fn wall_hit_recovers_onto_the_road() {
        // Road only in a band 100 <= y <= 200
        let track = TrackSurface::from_fn(300, 300, &RoadPalette::default(), |_, y| {
            if (100..=200).contains(&y) { ASPHALT } else { GRASS }
        })
        .unwrap();
        let mut v = vehicle(PolicyKind::Rule, 150.0, 150.0);
        v.pose.velocity = 400.0;
        assert!(!v.collide_wall(&track, &RecoveryConfig::default()));
        assert_eq!(v.vel(), 400.0);

        v.set_pose(Point2d::new(150.0, 90.0), 0.0);
        v.pose.velocity = 400.0;
        assert!(v.collide_wall(&track, &RecoveryConfig::default()));
        assert_eq!(v.vel(), 200.0);
        assert!(track.is_road_at(v.position()));
    }

    #[test]
    fn wall_hit_without_road_nearby_stays_put() {
        let track = TrackSurface::from_fn(300, 300, &RoadPalette::default(), |_, _| GRASS).unwrap();
        let mut v = vehicle(PolicyKind::Rule, 150.0, 150.0);
        v.pose.velocity = 400.0;
        assert!(v.collide_wall(&track, &RecoveryConfig::default()));
        assert_eq!(v.position(), Point2d::new(150.0, 150.0));
        assert_eq!(v.vel(), 200.0);
    }
}
