use super::{balance, Control, ControlPolicy, PolicyKind};
use crate::sensor::SensorReading;
use crate::util::Interval;
use serde::{Deserialize, Serialize};

/// The gains and thresholds of the rule-based driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    /// Proportional gain on the lane-centering error.
    pub kp: f64,
    /// Derivative gain on the lane-centering error.
    pub kd: f64,
    /// Weight of the far sensor imbalance added to the PD term.
    pub lookahead_weight: f64,
    /// Forward clearance below which obstacle avoidance is considered.
    pub obstacle_trigger: f64,
    /// Steering applied away from the narrower side when avoiding an obstacle.
    pub avoid_steer: f64,
    /// Difference in side space which flags an obstacle.
    pub asymmetry_threshold: f64,
    /// Forward clearance which always flags an obstacle.
    pub critical_distance: f64,
    /// Weight of the new target in the exponential steering filter, in `(0, 1]`.
    pub steer_smoothing: f64,
    /// Steering magnitude below which no cornering penalty applies.
    pub steer_deadzone: f64,
    /// Fraction of the target speed lost at full steering lock.
    pub corner_penalty: f64,
    /// Braking distance per unit of speed.
    pub braking_factor: f64,
    /// Exponent of the view/braking distance ratio when limiting speed.
    pub brake_curve_exponent: f64,
    /// The speed the driver keeps through corners.
    pub min_corner_speed: f64,
    /// The view distance above which `min_corner_speed` is enforced.
    pub momentum_view_distance: f64,
    /// Within this much of the target speed the throttle is eased off.
    pub taper_band: f64,
    /// The eased-off throttle.
    pub taper_throttle: f64,
    /// Overspeed tolerated before braking; below it the car coasts.
    pub brake_deadband: f64,
    /// Overspeed at which braking reaches full strength.
    pub brake_span: f64,
    /// Forward clearance below which a fast car brakes fully.
    pub panic_distance: f64,
    /// Speed above which the panic brake applies.
    pub panic_speed: f64,
    /// Front ray clearance below which the car brakes fully at any speed.
    pub hard_stop_distance: f64,
    /// Frames the hard stop holds before the normal and stuck logic take over again.
    /// While held, the car pivots towards the more open side.
    pub hard_stop_frames: u32,
    /// Speed below which the car may be stuck.
    pub stuck_speed: f64,
    /// Forward clearance below which a slow car is stuck.
    pub stuck_distance: f64,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            kp: 0.8,
            kd: 1.5,
            lookahead_weight: 0.85,
            obstacle_trigger: 280.0,
            avoid_steer: 1.5,
            asymmetry_threshold: 40.0,
            critical_distance: 140.0,
            steer_smoothing: 0.2,
            steer_deadzone: 0.08,
            corner_penalty: 0.4,
            braking_factor: 0.45,
            brake_curve_exponent: 1.2,
            min_corner_speed: 350.0,
            momentum_view_distance: 80.0,
            taper_band: 30.0,
            taper_throttle: 0.7,
            brake_deadband: 40.0,
            brake_span: 80.0,
            panic_distance: 60.0,
            panic_speed: 80.0,
            hard_stop_distance: 60.0,
            hard_stop_frames: 15,
            stuck_speed: 10.0,
            stuck_distance: 40.0,
        }
    }
}

/// A PD lane-centering driver with a lookahead term, obstacle overrides
/// and momentum-preserving speed targets.
#[derive(Clone, Debug)]
pub struct RuleBasedPolicy {
    params: RuleParams,
    max_speed: f64,
    /// The lane-centering error on the previous frame.
    prev_error: f64,
    /// Consecutive frames with the front ray inside `hard_stop_distance`.
    blocked: u32,
    /// The steering held while the hard stop is engaged.
    pivot: f64,
    /// The filtered steering on the previous frame, before clamping.
    last_steer: f64,
}

impl RuleBasedPolicy {
    pub fn new(params: RuleParams, max_speed: f64) -> Self {
        Self {
            params,
            max_speed,
            prev_error: 0.0,
            last_steer: 0.0,
            blocked: 0,
            pivot: 0.0,
        }
    }

    /// Returns a hard steering command away from the narrower side
    /// if something ahead is worth avoiding.
    fn avoidance(&self, s: &SensorReading, min_front: f64) -> Option<f64> {
        let p = &self.params;
        if min_front >= p.obstacle_trigger {
            return None;
        }
        let space_left = (s.left + s.far_left + s.lmid) / 3.0;
        let space_right = (s.right + s.far_right + s.rmid) / 3.0;
        let asymmetric = (space_left - space_right).abs() > p.asymmetry_threshold;
        if !asymmetric && min_front >= p.critical_distance {
            return None;
        }
        if space_left > space_right {
            Some(-p.avoid_steer)
        } else {
            Some(p.avoid_steer)
        }
    }

    /// The steering target before smoothing.
    fn steer_target(&mut self, s: &SensorReading) -> f64 {
        let p = &self.params;
        let min_front = s.min_front();
        let avoid = self.avoidance(s, min_front);

        let error = balance(s.left, s.right);
        let d_error = error - self.prev_error;
        self.prev_error = error;
        let pd_steer = p.kp * error + p.kd * d_error;

        match avoid {
            Some(avoid_steer) => {
                let risk = (1.0 - min_front / p.obstacle_trigger).clamp(0.0, 1.0);
                (1.0 - risk) * pd_steer + risk * avoid_steer
            }
            None => pd_steer + p.lookahead_weight * balance(s.far_left, s.far_right),
        }
    }

    /// The speed to aim for given the current view ahead and steering.
    fn target_speed(&self, s: &SensorReading, steer: f64) -> f64 {
        let p = &self.params;
        let mut target = self.max_speed;

        let steer_mag = steer.abs();
        if steer_mag > p.steer_deadzone {
            let corner = Interval::new(p.steer_deadzone, 1.0).inv_lerp(steer_mag);
            target *= 1.0 - corner * p.corner_penalty;
        }

        let braking_dist = s.speed * p.braking_factor;
        let view_dist = f64::min(s.front, f64::max(s.far_left, s.far_right));
        if view_dist < braking_dist {
            let ratio = view_dist / braking_dist;
            target = target.min(self.max_speed * ratio.powf(p.brake_curve_exponent));
        }

        // Keep rolling through corners unless the view ahead is critical
        if view_dist > p.momentum_view_distance {
            target = target.max(p.min_corner_speed);
        }
        target
    }

    /// Throttle and brake to approach `target` from `speed`.
    fn actuate(&self, speed: f64, target: f64) -> (f64, f64) {
        let p = &self.params;
        if speed < target {
            let throttle = if speed > target - p.taper_band {
                p.taper_throttle
            } else {
                1.0
            };
            (throttle, 0.0)
        } else {
            let overspeed = speed - target;
            let brake = if overspeed > p.brake_deadband {
                (overspeed / p.brake_span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (0.0, brake)
        }
    }
}

impl ControlPolicy for RuleBasedPolicy {
    fn act(&mut self, s: &SensorReading) -> Control {
        let target = self.steer_target(s);
        let alpha = self.params.steer_smoothing;
        let steer = (1.0 - alpha) * self.last_steer + alpha * target;
        self.last_steer = steer;
        let steer = steer.clamp(-1.0, 1.0);

        let target_speed = self.target_speed(s, steer);
        let (throttle, brake) = self.actuate(s.speed, target_speed);
        let mut control = Control {
            steer,
            throttle,
            brake,
        };

        let p = &self.params;
        let min_front = s.min_front();
        if s.front < p.hard_stop_distance {
            self.blocked += 1;
        } else {
            self.blocked = 0;
        }
        if self.blocked == 1 {
            self.pivot = open_side(s);
        }
        let panic = min_front < p.panic_distance && s.speed > p.panic_speed;
        if self.blocked > 0 && self.blocked <= p.hard_stop_frames {
            self.last_steer = self.pivot;
            control = Control::hard_stop(self.pivot);
        } else if panic {
            control = Control::hard_stop(steer);
        }
        if s.speed < p.stuck_speed && min_front < p.stuck_distance {
            control = Control {
                steer: open_side(s),
                throttle: 1.0,
                brake: 0.0,
            };
        }
        control
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Rule
    }
}

/// Full steering towards the flank with more room; right on a tie.
fn open_side(s: &SensorReading) -> f64 {
    if s.left + s.lmid > s.right + s.rmid {
        -1.0
    } else {
        1.0
    }
}
