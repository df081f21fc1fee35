use super::{Control, ControlPolicy, PolicyKind};
use crate::sensor::SensorReading;
use crate::util::Interval;
use serde::{Deserialize, Serialize};

/// The thresholds of the fuzzy driver. Clearances and speeds are normalised to `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyParams {
    /// Speed, in world units, below which the car counts as stalled.
    pub stall_speed: f64,
    /// Forward or diagonal clearance below which a stalled car is blocked.
    pub stall_clearance: f64,
    /// Consecutive blocked frames before reversing.
    pub stall_frames: u32,
    /// Number of frames spent reversing.
    pub reverse_frames: u32,
    /// Weight of the side rays in a flank's space score.
    pub side_weight: f64,
    /// Weight of the diagonal rays in a flank's space score.
    pub diagonal_weight: f64,
    /// Forward clearance below which a near-tie in space scores is broken.
    pub indecision_front: f64,
    /// Space score difference which counts as a near-tie.
    pub indecision_margin: f64,
    /// Steering forced when breaking a near-tie.
    pub indecision_steer: f64,
    /// Clearance below which steering becomes more sensitive.
    pub near_clearance: f64,
    /// Steering gain when something is near.
    pub near_gain: f64,
    /// Speed above which steering becomes less sensitive.
    pub fast_speed: f64,
    /// Steering gain at speed.
    pub fast_gain: f64,
    /// Clearances mapped onto a safety factor of zero to one.
    pub safety: Interval<f64>,
    /// Target speeds at a safety factor of zero and one.
    pub target_speed: Interval<f64>,
    /// Steering magnitude above which the car slows for a corner.
    pub corner_steer: f64,
    /// Target speed multiplier in corners.
    pub corner_factor: f64,
    /// Safety factor at or below which the throttle is eased off.
    pub cautious_safety: f64,
    /// The eased-off throttle.
    pub cautious_throttle: f64,
    /// Overspeed tolerated before braking.
    pub brake_margin: f64,
    /// Forward clearance below which any overspeed is braked.
    pub caution_front: f64,
    /// Brake strength per unit of overspeed.
    pub brake_gain: f64,
    /// Forward clearance below which the car brakes fully.
    pub hard_stop_front: f64,
}

impl Default for FuzzyParams {
    fn default() -> Self {
        Self {
            stall_speed: 10.0,
            stall_clearance: 0.2,
            stall_frames: 30,
            reverse_frames: 40,
            side_weight: 0.4,
            diagonal_weight: 0.6,
            indecision_front: 0.5,
            indecision_margin: 0.15,
            indecision_steer: 0.8,
            near_clearance: 0.4,
            near_gain: 2.5,
            fast_speed: 0.8,
            fast_gain: 0.7,
            safety: Interval::new(0.2, 0.8),
            target_speed: Interval::new(0.1, 1.0),
            corner_steer: 0.4,
            corner_factor: 0.6,
            cautious_safety: 0.5,
            cautious_throttle: 0.5,
            brake_margin: 0.1,
            caution_front: 0.3,
            brake_gain: 4.0,
            hard_stop_front: 0.2,
        }
    }
}

/// Whether the fuzzy driver is driving normally or backing out of a stall.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FuzzyMode {
    Driving,
    /// Backing out for `remaining` more frames, with the steering fixed
    /// towards the flank that was more open when the stall was detected.
    Reversing { remaining: u32, steer: f64 },
}

/// A driver which scores the open space on each flank and steers towards the larger,
/// with a stall detector that backs the car out when it gets wedged.
#[derive(Clone, Debug)]
pub struct FuzzyPolicy {
    params: FuzzyParams,
    sensor_range: f64,
    max_speed: f64,
    mode: FuzzyMode,
    /// Consecutive frames spent stalled in front of something.
    stalled: u32,
}

/// Normalised clearances of a single reading.
struct Clearance {
    front: f64,
    lmid: f64,
    rmid: f64,
    left: f64,
    right: f64,
    speed: f64,
}

impl FuzzyPolicy {
    pub fn new(params: FuzzyParams, sensor_range: f64, max_speed: f64) -> Self {
        Self {
            params,
            sensor_range,
            max_speed,
            mode: FuzzyMode::Driving,
            stalled: 0,
        }
    }

    /// The current driving mode.
    pub fn mode(&self) -> FuzzyMode {
        self.mode
    }

    fn normalise(&self, s: &SensorReading) -> Clearance {
        let norm = |dist: f64| (dist / self.sensor_range).clamp(0.0, 1.0);
        Clearance {
            front: norm(s.front),
            lmid: norm(s.lmid),
            rmid: norm(s.rmid),
            left: norm(s.left),
            right: norm(s.right),
            speed: (s.speed.abs() / self.max_speed).clamp(0.0, 1.0),
        }
    }

    /// Updates the stall counter, returning true if the car should start reversing.
    fn detect_stall(&mut self, s: &SensorReading, c: &Clearance) -> bool {
        let p = &self.params;
        let blocked = [c.front, c.lmid, c.rmid]
            .iter()
            .any(|&clearance| clearance < p.stall_clearance);
        if s.speed.abs() < p.stall_speed && blocked {
            self.stalled += 1;
        } else {
            self.stalled = 0;
        }
        self.stalled >= p.stall_frames
    }

    fn steer(&self, c: &Clearance) -> f64 {
        let p = &self.params;
        let space_left = p.side_weight * c.left + p.diagonal_weight * c.lmid;
        let space_right = p.side_weight * c.right + p.diagonal_weight * c.rmid;
        let mut raw = space_right - space_left;

        // Never drive straight at something out of indecision. An exact tie goes right.
        if c.front < p.indecision_front && raw.abs() < p.indecision_margin {
            raw = if space_right >= space_left {
                p.indecision_steer
            } else {
                -p.indecision_steer
            };
        }

        let nearest = c.front.min(c.lmid).min(c.rmid);
        let gain = if nearest < p.near_clearance {
            p.near_gain
        } else if c.speed > p.fast_speed {
            p.fast_gain
        } else {
            1.0
        };
        (raw * gain).clamp(-1.0, 1.0)
    }

    fn speed_control(&self, c: &Clearance, steer: f64) -> (f64, f64) {
        let p = &self.params;
        let nearest = c.front.min(c.lmid).min(c.rmid);
        let safety = p.safety.ramp(nearest);
        let mut target = p.target_speed.lerp(safety);
        if steer.abs() > p.corner_steer {
            target *= p.corner_factor;
        }

        let (mut throttle, mut brake) = (0.0, 0.0);
        if c.speed < target {
            throttle = if safety > p.cautious_safety {
                1.0
            } else {
                p.cautious_throttle
            };
        } else {
            let overspeed = c.speed - target;
            if overspeed > p.brake_margin || c.front < p.caution_front {
                brake = (overspeed * p.brake_gain).clamp(0.0, 1.0);
            }
        }

        if c.front < p.hard_stop_front {
            (throttle, brake) = (0.0, 1.0);
        }
        (throttle, brake)
    }
}

impl ControlPolicy for FuzzyPolicy {
    fn act(&mut self, s: &SensorReading) -> Control {
        let c = self.normalise(s);

        if let FuzzyMode::Reversing { remaining, steer } = self.mode {
            let remaining = remaining.saturating_sub(1);
            self.mode = if remaining == 0 {
                self.stalled = 0;
                FuzzyMode::Driving
            } else {
                FuzzyMode::Reversing { remaining, steer }
            };
            return Control {
                steer,
                throttle: -1.0,
                brake: 0.0,
            };
        }

        if self.detect_stall(s, &c) {
            log::debug!("Stalled for {} frames, reversing", self.stalled);
            self.mode = FuzzyMode::Reversing {
                remaining: self.params.reverse_frames,
                steer: if s.right >= s.left { 1.0 } else { -1.0 },
            };
            return Control::default();
        }

        let steer = self.steer(&c);
        let (throttle, brake) = self.speed_control(&c, steer);
        Control {
            steer,
            throttle,
            brake,
        }
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Fuzzy
    }
}
