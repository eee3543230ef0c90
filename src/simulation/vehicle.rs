//! Vehicle state and per-step motion planning
//!
//! A vehicle plans its next step in isolation; whether that step is taken
//! is decided by [`super::kinematics::VehicleKinematics`], which knows
//! about everyone else.

use super::config::MotionConfig;
use super::geometry::{is_inside_box, is_past_exit_boundary, plan_route, smoothstep, Route};
use super::types::{Direction, ExitLane, LaneId, Position, VehicleId, VehicleStatus};

/// Which part of its route an active vehicle is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    /// Between the admission point and the box (or turn trigger)
    Approach,
    /// Inside the box
    Crossing,
    /// On the exit road
    Departure,
}

/// A proposed next state for one vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub position: Position,
    pub heading: f32,
    pub speed: f32,
    pub status: VehicleStatus,
    pub leg: Leg,
    pub turn_clock: f32,
}

/// A vehicle in the junction simulation
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub intent: Direction,
    pub lane: LaneId,
    pub target: ExitLane,
    pub position: Position,
    /// Radians from +x, screen coordinates
    pub heading: f32,
    pub speed: f32,
    /// Speed on the open road, set on admission
    pub cruise_speed: f32,
    pub status: VehicleStatus,
    pub wait_time: f32,
    /// Simulated time the vehicle entered its queue
    pub spawned_at: f32,
    pub emergency: bool,
    pub route: Route,
    pub leg: Leg,
    turn_clock: f32,
    turn_duration: f32,
}

impl SimVehicle {
    /// A freshly queued vehicle. It sits at its lane's admission point
    /// until admitted.
    pub fn queued(
        id: VehicleId,
        lane: LaneId,
        intent: Direction,
        emergency: bool,
        spawned_at: f32,
    ) -> Self {
        let route = plan_route(lane, intent);
        Self {
            id,
            intent,
            lane,
            target: route.exit,
            position: route.start,
            heading: route.inbound.angle(),
            speed: 0.0,
            cruise_speed: 0.0,
            status: VehicleStatus::Queued,
            wait_time: 0.0,
            spawned_at,
            emergency,
            route,
            leg: Leg::Approach,
            turn_clock: 0.0,
            turn_duration: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, VehicleStatus::Moving | VehicleStatus::Turning)
    }

    pub fn accumulate_wait(&mut self, dt: f32) {
        if self.status == VehicleStatus::Queued {
            self.wait_time += dt;
        }
    }

    /// Leave the queue: placed at the admission point, rolling at launch speed
    pub fn admit(&mut self, cruise_speed: f32, motion: &MotionConfig) {
        self.status = VehicleStatus::Moving;
        self.leg = Leg::Approach;
        self.position = self.route.start;
        self.heading = self.route.inbound.angle();
        self.cruise_speed = cruise_speed;
        self.speed = cruise_speed * motion.launch_factor;
        self.turn_clock = 0.0;
        self.turn_duration = match &self.route.turn {
            Some(curve) => {
                let nominal = cruise_speed * motion.crossing_factor;
                (curve.approx_length(32) / nominal).max(motion.min_turn_duration)
            }
            None => 0.0,
        };
    }

    /// Fraction of the turn completed, before easing
    pub fn turn_progress(&self) -> f32 {
        if self.turn_duration > 0.0 {
            (self.turn_clock / self.turn_duration).min(1.0)
        } else {
            0.0
        }
    }

    pub fn turn_duration(&self) -> f32 {
        self.turn_duration
    }

    fn target_speed(&self, motion: &MotionConfig) -> f32 {
        match self.leg {
            Leg::Approach if !is_inside_box(&self.position) => {
                self.cruise_speed * motion.approach_factor
            }
            Leg::Approach | Leg::Crossing => self.cruise_speed * motion.crossing_factor,
            Leg::Departure => self.cruise_speed,
        }
    }

    /// Where this vehicle would be after `dt` if nothing were in the way
    pub fn plan_step(&self, dt: f32, motion: &MotionConfig) -> MotionStep {
        let target = self.target_speed(motion);
        let blend = 1.0 - (-motion.speed_response * dt).exp();
        let speed = (self.speed + (target - self.speed) * blend).max(0.0);

        let mut step = MotionStep {
            position: self.position,
            heading: self.heading,
            speed,
            status: self.status,
            leg: self.leg,
            turn_clock: self.turn_clock,
        };

        if self.status == VehicleStatus::Turning {
            self.plan_turn(dt, motion, &mut step);
            return step;
        }

        let travel = speed * dt;
        match (self.leg, &self.route.turn) {
            (Leg::Approach, Some(_)) => {
                let remaining = (self.route.trigger - self.position).dot(&self.route.inbound);
                if travel >= remaining {
                    step.position = self.route.trigger;
                    step.status = VehicleStatus::Turning;
                    step.leg = Leg::Crossing;
                    step.turn_clock = 0.0;
                } else {
                    step.position = self.position + self.route.inbound * travel;
                }
            }
            (Leg::Departure, _) => {
                step.position = self.position + self.route.outbound * travel;
            }
            _ => {
                step.position = self.position + self.route.inbound * travel;
                let inside = is_inside_box(&step.position);
                step.leg = match self.leg {
                    Leg::Approach if inside => Leg::Crossing,
                    Leg::Crossing if !inside => Leg::Departure,
                    leg => leg,
                };
            }
        }
        step
    }

    fn plan_turn(&self, dt: f32, motion: &MotionConfig, step: &mut MotionStep) {
        let Some(curve) = &self.route.turn else {
            step.status = VehicleStatus::Moving;
            return;
        };
        let nominal = self.cruise_speed * motion.crossing_factor;
        let pace = if nominal > 0.0 {
            (step.speed / nominal).min(1.0)
        } else {
            1.0
        };
        step.turn_clock = self.turn_clock + dt * pace;

        if step.turn_clock >= self.turn_duration {
            step.position = curve.end();
            step.heading = self.route.outbound.angle();
            step.status = VehicleStatus::Moving;
            step.leg = Leg::Departure;
            step.turn_clock = self.turn_duration;
        } else {
            let t = smoothstep(step.turn_clock / self.turn_duration);
            step.position = curve.sample(t);
            let tangent = curve.sample_dt(t);
            if tangent.length() > f32::EPSILON {
                step.heading = tangent.angle();
            }
        }
    }

    /// Take a planned step. Marks the vehicle exited once it is clear of the world.
    pub fn commit(&mut self, step: MotionStep) {
        self.position = step.position;
        self.heading = step.heading;
        self.speed = step.speed;
        self.status = step.status;
        self.leg = step.leg;
        self.turn_clock = step.turn_clock;
        if self.leg == Leg::Departure && is_past_exit_boundary(&self.position) {
            self.status = VehicleStatus::Exited;
        }
    }

    /// Stay put and bleed off speed
    pub fn reject(&mut self, decay: f32) {
        self.speed *= decay;
    }
}
