//! Junction layout and route geometry
//!
//! Screen coordinates, y pointing down, with the junction centred in an
//! 800×800 world. Each road carries three inbound lanes on the driver's
//! right and three outbound lanes on the left, 50 px apart. The box is
//! wider than the six lanes so that traffic waiting at one stop line stays
//! clear of vehicles crossing in front of it.

use super::types::{Approach, Direction, ExitLane, LaneId, Position};

pub const WORLD_SIZE: f32 = 800.0;
pub const CENTER: Position = Position::new(400.0, 400.0);
pub const LANE_WIDTH: f32 = 50.0;

/// Half the side of the square intersection box
pub const BOX_HALF_SIZE: f32 = 200.0;

/// Distance of the admission point before the stop line
pub const ADMISSION_OFFSET: f32 = 20.0;

/// How far past the world edge a vehicle travels before it is retired
pub const EXIT_MARGIN: f32 = 30.0;

/// Unit direction of travel for vehicles arriving on `approach`
pub fn inbound_direction(approach: Approach) -> Position {
    match approach {
        Approach::North => Position::new(0.0, 1.0),
        Approach::East => Position::new(-1.0, 0.0),
        Approach::South => Position::new(0.0, -1.0),
        Approach::West => Position::new(1.0, 0.0),
    }
}

/// Unit vector to the driver's right when travelling along `direction`
fn right_of(direction: Position) -> Position {
    Position::new(-direction.y, direction.x)
}

/// Lateral distance of a lane slot from the road centre line
pub fn lane_offset(slot: usize) -> f32 {
    (slot as f32 + 0.5) * LANE_WIDTH
}

/// Point where an inbound lane meets the box
pub fn stop_line(lane: LaneId) -> Position {
    let d = inbound_direction(lane.approach);
    CENTER - d * BOX_HALF_SIZE + right_of(d) * lane_offset(lane.role.slot())
}

/// Where an admitted vehicle is placed when it leaves its queue
pub fn admission_point(lane: LaneId) -> Position {
    stop_line(lane) - inbound_direction(lane.approach) * ADMISSION_OFFSET
}

/// Unit direction of travel on the outbound side of `road`
pub fn outbound_direction(road: Approach) -> Position {
    inbound_direction(road) * -1.0
}

/// Point where an outbound lane leaves the box
pub fn box_exit(exit: ExitLane) -> Position {
    let d = inbound_direction(exit.road);
    CENTER - d * BOX_HALF_SIZE - right_of(d) * lane_offset(exit.slot)
}

pub fn is_inside_box(position: &Position) -> bool {
    (position.x - CENTER.x).abs() <= BOX_HALF_SIZE && (position.y - CENTER.y).abs() <= BOX_HALF_SIZE
}

pub fn is_past_exit_boundary(position: &Position) -> bool {
    let min = -EXIT_MARGIN;
    let max = WORLD_SIZE + EXIT_MARGIN;
    position.x < min || position.x > max || position.y < min || position.y > max
}

/// Cubic ease with zero slope at both ends
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// A quadratic bezier curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticBezier {
    points: [Position; 3],
}

impl QuadraticBezier {
    pub const fn new(points: [Position; 3]) -> Self {
        Self { points }
    }

    pub fn start(&self) -> Position {
        self.points[0]
    }

    pub fn control(&self) -> Position {
        self.points[1]
    }

    pub fn end(&self) -> Position {
        self.points[2]
    }

    pub fn sample(&self, t: f32) -> Position {
        let t1 = 1.0 - t;
        self.points[0] * (t1 * t1) + self.points[1] * (2.0 * t1 * t) + self.points[2] * (t * t)
    }

    /// First derivative with respect to `t`
    pub fn sample_dt(&self, t: f32) -> Position {
        let t1 = 1.0 - t;
        (self.points[1] - self.points[0]) * (2.0 * t1) + (self.points[2] - self.points[1]) * (2.0 * t)
    }

    /// Polyline approximation of the arc length
    pub fn approx_length(&self, segments: usize) -> f32 {
        let segments = segments.max(1);
        let mut length = 0.0;
        let mut prev = self.points[0];
        for i in 1..=segments {
            let next = self.sample(i as f32 / segments as f32);
            length += prev.distance(&next);
            prev = next;
        }
        length
    }
}

/// Everything kinematics needs to drive one vehicle from its stop line to
/// the edge of the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub lane: LaneId,
    pub intent: Direction,
    pub exit: ExitLane,
    /// Admission point, where the vehicle appears when dequeued
    pub start: Position,
    pub inbound: Position,
    pub outbound: Position,
    /// Box entry on the lane centre; turns begin here
    pub trigger: Position,
    pub box_exit: Position,
    pub turn: Option<QuadraticBezier>,
}

impl Route {
    /// Points along the part of the route inside the box
    pub fn box_path(&self, samples: usize) -> Vec<Position> {
        let samples = samples.max(2);
        (0..samples)
            .map(|i| {
                let t = i as f32 / (samples - 1) as f32;
                match &self.turn {
                    Some(curve) => curve.sample(t),
                    None => self.trigger.lerp(&self.box_exit, t),
                }
            })
            .collect()
    }

    /// True if the two box paths ever come within `clearance` of each other
    pub fn conflicts_with(&self, other: &Route, clearance: f32) -> bool {
        let ours = self.box_path(48);
        let theirs = other.box_path(48);
        ours.iter()
            .any(|a| theirs.iter().any(|b| a.distance(b) < clearance))
    }
}

/// Lay out the route for a vehicle leaving `lane` with `intent`.
///
/// The exit lane keeps the inbound lane's slot. Turns use the corner where
/// the inbound and outbound lane centre lines cross as control point.
pub fn plan_route(lane: LaneId, intent: Direction) -> Route {
    let inbound = inbound_direction(lane.approach);
    let exit = ExitLane {
        road: lane.approach.exit_road(intent),
        slot: lane.role.slot(),
    };
    let trigger = stop_line(lane);
    let exit_point = box_exit(exit);
    let turn = match intent {
        Direction::Straight => None,
        Direction::Left | Direction::Right => {
            let corner = trigger + inbound * (exit_point - trigger).dot(&inbound);
            Some(QuadraticBezier::new([trigger, corner, exit_point]))
        }
    };
    Route {
        lane,
        intent,
        exit,
        start: admission_point(lane),
        inbound,
        outbound: outbound_direction(exit.road),
        trigger,
        box_exit: exit_point,
        turn,
    }
}
