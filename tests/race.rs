//! Tests which drive a whole race on synthetic tracks.

use assert_approx_eq::assert_approx_eq;
use autoracer::{
    cgmath::MetricSpace, math::Point2d, ConfigError, EntrantConfig, PolicyKind, RaceConfig,
    RaceError, ReshufflePolicy, RoadPalette, Simulation, TrackSurface, VehicleId, Winner,
};
use std::rc::Rc;

const ASPHALT: [u8; 3] = [100, 100, 100];
const GRASS: [u8; 3] = [40, 160, 40];

/// A 600x600 ring of road between radii 100 and 200 around the centre.
fn ring_track() -> Rc<TrackSurface> {
    let track = TrackSurface::from_fn(600, 600, &RoadPalette::default(), |x, y| {
        let (dx, dy) = (x as f64 - 300.0, y as f64 - 300.0);
        let r = (dx * dx + dy * dy).sqrt();
        if (100.0..=200.0).contains(&r) {
            ASPHALT
        } else {
            GRASS
        }
    })
    .unwrap();
    Rc::new(track)
}

fn ring_config() -> RaceConfig {
    RaceConfig {
        start_line_x: 300.0,
        seed: Some(42),
        entrants: vec![
            EntrantConfig::new("RED", PolicyKind::Rule, 280.0, 140.0),
            EntrantConfig::new("BLUE", PolicyKind::Fuzzy, 280.0, 170.0),
        ],
        ..Default::default()
    }
}

fn cone_positions(sim: &Simulation) -> Vec<Point2d> {
    sim.obstacles().cones().iter().map(|c| c.position).collect()
}

fn assert_cones_legal(sim: &Simulation, vehicles: &[Point2d]) {
    let keepout = sim.config().obstacles.keepout;
    assert_eq!(sim.obstacles().len(), sim.config().obstacles.count);
    for cone in sim.obstacles().cones() {
        assert!(sim.track().is_road_at(cone.position));
        for v in vehicles {
            assert!(cone.position.distance(*v) >= keepout);
        }
    }
}

#[test]
fn rejects_invalid_config() {
    let mut config = ring_config();
    config.lap_target = 0;
    assert!(matches!(
        Simulation::new(ring_track(), config),
        Err(ConfigError::MinViolation { field: "lap_target", .. })
    ));

    let mut config = ring_config();
    config.entrants.clear();
    assert!(matches!(
        Simulation::new(ring_track(), config),
        Err(ConfigError::NoEntrants)
    ));
}

#[test]
fn vehicles_start_at_rest_on_their_spawns() {
    let sim = Simulation::new(ring_track(), ring_config()).unwrap();
    let labels: Vec<&str> = sim.iter_vehicles().map(|v| v.label()).collect();
    assert_eq!(labels, ["RED", "BLUE"]);
    let red = sim.get_vehicle(sim.vehicle_ids()[0]).unwrap();
    assert_eq!(red.position(), Point2d::new(280.0, 140.0));
    assert_eq!(red.vel(), 0.0);
    assert_eq!(red.policy(), PolicyKind::Rule);
    assert_eq!(sim.frame(), 0);
    assert!(!sim.is_finished());
}

#[test]
fn cones_are_placed_legally() {
    let mut sim = Simulation::new(ring_track(), ring_config()).unwrap();
    let spawns = [Point2d::new(280.0, 140.0), Point2d::new(280.0, 170.0)];
    assert_cones_legal(&sim, &spawns);
    sim.restart_with_reshuffle();
    assert_cones_legal(&sim, &spawns);
}

#[test]
fn speed_stays_within_limits() {
    let mut sim = Simulation::new(ring_track(), ring_config()).unwrap();
    let dt = sim.config().dt();
    let max_speed = sim.config().vehicle.max_speed;
    for _ in 0..900 {
        sim.step(dt);
        for vehicle in sim.iter_vehicles() {
            assert!(vehicle.vel() >= 0.0);
            assert!(vehicle.vel() <= max_speed);
            assert!(vehicle.position().x.is_finite());
            assert!(vehicle.position().y.is_finite());
            assert!(vehicle.heading().is_finite());
        }
    }
    assert_eq!(sim.frame(), 900);
}

#[test]
fn sensors_report_ray_endpoints() {
    let mut sim = Simulation::new(ring_track(), ring_config()).unwrap();
    assert!(sim.iter_vehicles().all(|v| v.ray_endpoints().is_empty()));
    sim.step(sim.config().dt());
    for vehicle in sim.iter_vehicles() {
        assert_eq!(vehicle.ray_endpoints().len(), 10);
        let scan = vehicle.scan().unwrap();
        assert!(scan.reading.front_long >= scan.reading.front);
    }
}

#[test]
fn placement_mode() {
    let mut sim = Simulation::new(ring_track(), ring_config()).unwrap();
    let id = sim.vehicle_ids()[1];
    let on_road = Point2d::new(300.0, 450.0);

    assert!(matches!(
        sim.place_vehicle(id, on_road, 0.0),
        Err(RaceError::NotPlacing)
    ));
    assert!(matches!(sim.rotate_vehicle(id, 0.5), Err(RaceError::NotPlacing)));

    sim.set_placing(true);
    assert!(matches!(
        sim.place_vehicle(id, Point2d::new(300.0, 300.0), 0.0),
        Err(RaceError::OffRoad { .. })
    ));
    assert!(matches!(
        sim.place_vehicle(VehicleId::default(), on_road, 0.0),
        Err(RaceError::UnknownVehicle(_))
    ));
    sim.place_vehicle(id, on_road, std::f64::consts::PI).unwrap();
    sim.rotate_vehicle(id, 0.25).unwrap();

    // Stepping does nothing while placing
    sim.step(1.0 / 60.0);
    assert_eq!(sim.frame(), 0);
    assert_eq!(sim.run(1.0 / 60.0, 100, |_| false), 0);

    let vehicle = sim.get_vehicle(id).unwrap();
    assert_eq!(vehicle.position(), on_road);
    assert_approx_eq!(vehicle.heading(), std::f64::consts::PI + 0.25);

    sim.set_placing(false);
    sim.step(1.0 / 60.0);
    assert_eq!(sim.frame(), 1);
}

#[test]
fn restart_keeps_cones_unless_reshuffled() {
    let mut config = ring_config();
    config.reshuffle = ReshufflePolicy::Never;
    let mut sim = Simulation::new(ring_track(), config).unwrap();
    let cones = cone_positions(&sim);

    sim.run(sim.config().dt(), 60, |_| false);
    assert_eq!(sim.frame(), 60);
    assert!(matches!(sim.reshuffle_obstacles(), Err(RaceError::RaceInProgress)));

    sim.restart();
    assert_eq!(sim.frame(), 0);
    assert_eq!(sim.elapsed(), 0.0);
    assert_eq!(cone_positions(&sim), cones);
    assert!(sim.iter_vehicles().all(|v| v.vel() == 0.0 && v.lap_count() == 0));
    // An unfinished race is not recorded
    assert!(sim.history().is_empty());

    sim.restart_with_reshuffle();
    assert_ne!(cone_positions(&sim), cones);

    let cones = cone_positions(&sim);
    sim.reshuffle_obstacles().unwrap();
    assert_ne!(cone_positions(&sim), cones);
}

#[test]
fn every_restart_policy_reshuffles() {
    let mut config = ring_config();
    config.reshuffle = ReshufflePolicy::EveryRestart;
    let mut sim = Simulation::new(ring_track(), config).unwrap();
    let cones = cone_positions(&sim);
    sim.restart();
    assert_ne!(cone_positions(&sim), cones);
}

#[test]
fn same_seed_same_race() {
    let mut a = Simulation::new(ring_track(), ring_config()).unwrap();
    let mut b = Simulation::new(ring_track(), ring_config()).unwrap();
    assert_eq!(cone_positions(&a), cone_positions(&b));
    for _ in 0..300 {
        a.step(1.0 / 60.0);
        b.step(1.0 / 60.0);
    }
    let poses: Vec<_> = a.iter_vehicles().map(|v| v.pose()).collect();
    assert_eq!(poses, b.iter_vehicles().map(|v| v.pose()).collect::<Vec<_>>());
    assert_eq!(a.reports(), b.reports());
}

#[test]
fn reports_time_for_unfinished_vehicles() {
    let mut sim = Simulation::new(ring_track(), ring_config()).unwrap();
    sim.run(1.0 / 60.0, 120, |_| false);
    let reports = sim.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].label, "RED");
    assert_eq!(reports[1].label, "BLUE");
    for report in &reports {
        assert_approx_eq!(report.time_s, 2.0);
        // Inside the grace period, so no laps yet
        assert_eq!(report.laps, 0);
    }
    assert_approx_eq!(sim.elapsed(), 2.0);
}

#[test]
fn honours_stop_signal() {
    let mut sim = Simulation::new(ring_track(), ring_config()).unwrap();
    let ticks = sim.run(1.0 / 60.0, 1000, |sim| sim.frame() >= 10);
    assert_eq!(ticks, 10);
    assert_eq!(sim.frame(), 10);
    assert_eq!(sim.run(1.0 / 60.0, 5, |_| false), 5);
    assert_eq!(sim.frame(), 15);
}

/// A solo car on a wide open straight crosses the line once and finishes.
#[test]
fn solo_sprint_finishes() {
    let track = TrackSurface::from_fn(2000, 400, &RoadPalette::default(), |_, _| ASPHALT).unwrap();
    let config = RaceConfig {
        start_line_x: 1200.0,
        lap_target: 1,
        grace_period: 0.5,
        seed: Some(3),
        obstacles: autoracer::ObstacleConfig {
            count: 0,
            ..Default::default()
        },
        entrants: vec![EntrantConfig::new("SOLO", PolicyKind::Rule, 100.0, 200.0)],
        ..Default::default()
    };
    let mut sim = Simulation::new(Rc::new(track), config).unwrap();
    sim.run(1.0 / 60.0, 600, |_| false);

    assert!(sim.is_finished());
    let vehicle = sim.iter_vehicles().next().unwrap();
    assert!(vehicle.has_finished());
    assert_eq!(vehicle.lap_count(), 1);
    assert!(vehicle.position().x >= 1200.0);
    let finish_time = vehicle.metrics().finish_time().unwrap();
    assert_eq!(finish_time, sim.elapsed());

    // Stepping a finished race only lets the car roll to a stop
    let x = vehicle.position().x;
    for _ in 0..60 {
        sim.step(1.0 / 60.0);
    }
    let vehicle = sim.iter_vehicles().next().unwrap();
    assert_eq!(vehicle.position().x, x);
    assert_eq!(vehicle.metrics().elapsed(), finish_time);

    let history = sim.close();
    assert_eq!(history.len(), 1);
    assert_eq!(history.races()[0].winner(), Winner::Entrant(0));
    assert_eq!(history.races()[0].results[0].laps, 1);

    // Restarting records nothing new
    sim.restart();
    assert_eq!(sim.history().len(), 1);
    assert!(!sim.is_finished());
}

/// An open 2000x400 straight with a single car and no cones.
fn straight_config(policy: PolicyKind, x: f64) -> RaceConfig {
    RaceConfig {
        seed: Some(5),
        obstacles: autoracer::ObstacleConfig {
            count: 0,
            ..Default::default()
        },
        entrants: vec![EntrantConfig::new("SOLO", policy, x, 200.0)],
        ..Default::default()
    }
}

fn open_straight() -> Rc<TrackSurface> {
    Rc::new(TrackSurface::from_fn(2000, 400, &RoadPalette::default(), |_, _| ASPHALT).unwrap())
}

/// Runs the race for ten seconds, returning the top speed reached.
fn top_speed(sim: &mut Simulation) -> f64 {
    let mut top: f64 = 0.0;
    for _ in 0..600 {
        sim.step(1.0 / 60.0);
        top = sim.iter_vehicles().map(|v| v.vel()).fold(top, f64::max);
    }
    top
}

/// Parked nose-first against the end wall, the rule driver pivots away and drives off.
#[test]
fn rule_driver_escapes_a_wall() {
    let mut sim = Simulation::new(open_straight(), straight_config(PolicyKind::Rule, 1945.0)).unwrap();
    sim.step(1.0 / 60.0);
    let vehicle = sim.iter_vehicles().next().unwrap();
    assert_eq!(vehicle.control().brake, 1.0);
    assert!(top_speed(&mut sim) > 100.0);
}

/// Wedged against the end wall, the fuzzy driver backs round and drives off.
#[test]
fn fuzzy_driver_escapes_a_wall() {
    let mut sim = Simulation::new(open_straight(), straight_config(PolicyKind::Fuzzy, 1960.0)).unwrap();
    sim.step(1.0 / 60.0);
    let vehicle = sim.iter_vehicles().next().unwrap();
    assert_eq!(vehicle.control().brake, 1.0);
    assert!(top_speed(&mut sim) > 100.0);
}

#[test]
fn vehicles_sense_each_other_but_not_themselves() {
    let mut config = straight_config(PolicyKind::Rule, 100.0);
    config
        .entrants
        .push(EntrantConfig::new("AHEAD", PolicyKind::Rule, 160.0, 200.0));
    let mut sim = Simulation::new(open_straight(), config).unwrap();
    sim.step(1.0 / 60.0);
    let fronts: Vec<f64> = sim
        .iter_vehicles()
        .map(|v| v.scan().unwrap().reading.front)
        .collect();
    // The trailing car stops short of the combined hit radii
    assert_eq!(fronts, [36.0, 320.0]);
}

/// The default rule-versus-fuzzy race with cones runs to completion.
#[test]
fn default_race_finishes() {
    for seed in [1, 4, 42] {
        let config = RaceConfig {
            seed: Some(seed),
            ..ring_config()
        };
        let mut sim = Simulation::new(ring_track(), config).unwrap();
        let dt = sim.config().dt();
        sim.run(dt, 240 * 60, |_| false);
        assert!(sim.is_finished(), "seed {seed} did not finish: {:?}", sim.reports());
        for vehicle in sim.iter_vehicles() {
            assert_eq!(vehicle.lap_count(), 5);
        }
    }
}
