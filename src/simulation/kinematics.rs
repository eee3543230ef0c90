//! Motion integration for admitted vehicles
//!
//! Vehicles are moved one at a time in admission order. Each planned step
//! is checked against the current position of every other active vehicle
//! and dropped if it would bring them too close.

use ordered_float::OrderedFloat;
use std::collections::HashMap;

use super::config::MotionConfig;
use super::error::SimError;
use super::geometry::{is_inside_box, plan_route, Route};
use super::types::{Direction, LaneId, LaneRole, Position, VehicleId, VehicleStatus};
use super::vehicle::{MotionStep, SimVehicle};

/// Below this speed (px/s) a vehicle counts as stopped
pub const MOVING_SPEED_EPSILON: f32 = 1.0;

type RouteKey = (LaneId, Direction);

/// Two active vehicles found closer than the separation floor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationViolation {
    pub first: VehicleId,
    pub second: VehicleId,
    pub distance: f32,
    pub required: f32,
}

/// Routes any lane actually sends traffic down
fn served_routes() -> Vec<RouteKey> {
    LaneId::all()
        .into_iter()
        .flat_map(|lane| {
            let intents: &[Direction] = match lane.role {
                LaneRole::FreeTurn => &[Direction::Left],
                LaneRole::Controlled => &[Direction::Straight],
                LaneRole::Incoming => &[Direction::Straight, Direction::Right],
            };
            intents.iter().map(move |intent| (lane, *intent))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct VehicleKinematics {
    config: MotionConfig,
    /// Admission order, which is also integration order
    active: Vec<VehicleId>,
    /// Pairs of routes whose paths through the box come too close to share it
    conflicts: HashMap<(RouteKey, RouteKey), bool>,
}

impl VehicleKinematics {
    pub fn new(config: MotionConfig) -> Self {
        let clearance = config.intersection_margin * config.moving_factor;
        let routes: Vec<(RouteKey, Route)> = served_routes()
            .into_iter()
            .map(|key| (key, plan_route(key.0, key.1)))
            .collect();
        let mut conflicts = HashMap::new();
        for (a, route_a) in &routes {
            for (b, route_b) in &routes {
                conflicts.insert((*a, *b), a != b && route_a.conflicts_with(route_b, clearance));
            }
        }
        Self {
            config,
            active: Vec::new(),
            conflicts,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn activate(&mut self, id: VehicleId) {
        if !self.active.contains(&id) {
            self.active.push(id);
        }
    }

    pub fn active_ids(&self) -> &[VehicleId] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.active.contains(&id)
    }

    /// Whether two routes may not be inside the box at the same time
    pub fn routes_conflict(&self, a: &Route, b: &Route) -> bool {
        let key = ((a.lane, a.intent), (b.lane, b.intent));
        match self.conflicts.get(&key) {
            Some(conflict) => *conflict,
            None => {
                key.0 != key.1
                    && a.conflicts_with(b, self.config.intersection_margin * self.config.moving_factor)
            }
        }
    }

    /// Distance two vehicles must keep in their current context
    pub fn required_separation(
        &self,
        a_in_box: bool,
        a_moving: bool,
        b_in_box: bool,
        b_moving: bool,
    ) -> f32 {
        let base = self.separation_floor(a_in_box, b_in_box);
        if a_moving && b_moving {
            base * self.config.moving_factor
        } else {
            base
        }
    }

    /// Separation that must hold between any two active vehicles at all times
    pub fn separation_floor(&self, a_in_box: bool, b_in_box: bool) -> f32 {
        if a_in_box || b_in_box {
            self.config.intersection_margin
        } else {
            self.config.min_distance
        }
    }

    /// Closest active vehicle to `point`
    pub fn nearest_vehicle(
        &self,
        point: &Position,
        vehicles: &HashMap<VehicleId, SimVehicle>,
    ) -> Result<Option<(VehicleId, f32)>, SimError> {
        let mut distances = Vec::with_capacity(self.active.len());
        for id in &self.active {
            let vehicle = lookup(vehicles, *id, "nearest vehicle")?;
            distances.push((*id, vehicle.position.distance(point)));
        }
        Ok(distances.into_iter().min_by_key(|(_, d)| OrderedFloat(*d)))
    }

    /// Whether a vehicle could be placed at `point` without crowding anyone
    pub fn is_clear(
        &self,
        point: &Position,
        vehicles: &HashMap<VehicleId, SimVehicle>,
    ) -> Result<bool, SimError> {
        let clearance = self.config.intersection_margin * self.config.moving_factor;
        Ok(match self.nearest_vehicle(point, vehicles)? {
            Some((_, distance)) => distance >= clearance,
            None => true,
        })
    }

    /// Move every active vehicle by `dt`, returning the ones that left the world
    pub fn integrate(
        &mut self,
        dt: f32,
        vehicles: &mut HashMap<VehicleId, SimVehicle>,
    ) -> Result<Vec<VehicleId>, SimError> {
        for index in 0..self.active.len() {
            let id = self.active[index];
            let vehicle = lookup(vehicles, id, "integrate")?;
            let step = vehicle.plan_step(dt, &self.config);
            let accepted = self.step_is_clear(vehicle, &step, vehicles)?;
            let in_box = is_inside_box(&vehicle.position);

            let vehicle = vehicles.get_mut(&id).ok_or(SimError::UnknownVehicle {
                id,
                context: "integrate",
            })?;
            if accepted {
                vehicle.commit(step);
            } else if in_box {
                vehicle.reject(self.config.box_decay);
            } else {
                vehicle.reject(self.config.road_decay);
            }
        }

        let mut exited = Vec::new();
        for id in &self.active {
            if lookup(vehicles, *id, "retire")?.status == VehicleStatus::Exited {
                exited.push(*id);
            }
        }
        self.active.retain(|id| !exited.contains(id));
        Ok(exited)
    }

    fn step_is_clear(
        &self,
        vehicle: &SimVehicle,
        step: &MotionStep,
        vehicles: &HashMap<VehicleId, SimVehicle>,
    ) -> Result<bool, SimError> {
        let was_in_box = is_inside_box(&vehicle.position);
        let in_box = is_inside_box(&step.position);
        let moving = step.speed > MOVING_SPEED_EPSILON;

        for other_id in &self.active {
            if *other_id == vehicle.id {
                continue;
            }
            let other = lookup(vehicles, *other_id, "separation check")?;
            let other_in_box = is_inside_box(&other.position);

            // Box entry waits until no conflicting route is inside.
            if in_box
                && !was_in_box
                && other_in_box
                && self.routes_conflict(&vehicle.route, &other.route)
            {
                return Ok(false);
            }

            let before = vehicle.position.distance(&other.position);
            let after = step.position.distance(&other.position);
            let floor = self.separation_floor(in_box, other_in_box);
            let required = self.required_separation(
                in_box,
                moving,
                other_in_box,
                other.speed > MOVING_SPEED_EPSILON,
            );
            // A step that does not close the gap is fine as long as the floor holds.
            if after < floor || (after < required && after < before) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Every pair of active vehicles closer than their separation floor
    pub fn verify_separation(
        &self,
        vehicles: &HashMap<VehicleId, SimVehicle>,
    ) -> Result<Vec<SeparationViolation>, SimError> {
        let mut placed = Vec::with_capacity(self.active.len());
        for id in &self.active {
            let vehicle = lookup(vehicles, *id, "verify separation")?;
            placed.push((*id, vehicle.position, is_inside_box(&vehicle.position)));
        }

        let mut violations = Vec::new();
        for (i, (a, pos_a, box_a)) in placed.iter().enumerate() {
            for (b, pos_b, box_b) in &placed[i + 1..] {
                let distance = pos_a.distance(pos_b);
                let required = self.separation_floor(*box_a, *box_b);
                // Small tolerance for float error on the boundary
                if distance + 1e-3 < required {
                    violations.push(SeparationViolation {
                        first: *a,
                        second: *b,
                        distance,
                        required,
                    });
                }
            }
        }
        Ok(violations)
    }
}

fn lookup<'a>(
    vehicles: &'a HashMap<VehicleId, SimVehicle>,
    id: VehicleId,
    context: &'static str,
) -> Result<&'a SimVehicle, SimError> {
    vehicles
        .get(&id)
        .ok_or(SimError::UnknownVehicle { id, context })
}
