//! Core types for the junction simulation
//!
//! Identifiers, lane naming and small geometry helpers shared by every
//! other module. Nothing in here knows about ticks or scheduling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs. Assigned monotonically by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub SimId);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0 .0)
    }
}

/// One of the four roads feeding the intersection.
///
/// The name is the side the traffic arrives *from*: vehicles on the
/// `North` approach travel southwards into the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Approach {
    North,
    East,
    South,
    West,
}

impl Approach {
    /// All approaches in round-robin service order
    pub const ALL: [Approach; 4] = [
        Approach::North,
        Approach::East,
        Approach::South,
        Approach::West,
    ];

    /// Position in [`Approach::ALL`]
    pub fn index(self) -> usize {
        match self {
            Approach::North => 0,
            Approach::East => 1,
            Approach::South => 2,
            Approach::West => 3,
        }
    }

    /// The approach served after this one in normal rotation
    pub fn successor(self) -> Approach {
        Approach::ALL[(self.index() + 1) % 4]
    }

    /// The road a vehicle from this approach leaves on for a given intent
    pub fn exit_road(self, intent: Direction) -> Approach {
        use Approach::*;
        match (self, intent) {
            (North, Direction::Straight) => South,
            (North, Direction::Left) => East,
            (North, Direction::Right) => West,
            (East, Direction::Straight) => West,
            (East, Direction::Left) => South,
            (East, Direction::Right) => North,
            (South, Direction::Straight) => North,
            (South, Direction::Left) => West,
            (South, Direction::Right) => East,
            (West, Direction::Straight) => East,
            (West, Direction::Left) => North,
            (West, Direction::Right) => South,
        }
    }

    /// Single-letter tag used in logs and spawn lines
    pub fn letter(self) -> char {
        match self {
            Approach::North => 'N',
            Approach::East => 'E',
            Approach::South => 'S',
            Approach::West => 'W',
        }
    }
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// What a lane is used for on its approach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneRole {
    /// Outer lane: right turns and overflow straight traffic. Follows the light.
    Incoming,
    /// Middle lane: straight traffic. Follows the light.
    Controlled,
    /// Inner lane: always green, always turns left.
    FreeTurn,
}

impl LaneRole {
    pub const ALL: [LaneRole; 3] = [LaneRole::Incoming, LaneRole::Controlled, LaneRole::FreeTurn];

    /// Lateral slot counted outwards from the road centre line
    pub fn slot(self) -> usize {
        match self {
            LaneRole::FreeTurn => 0,
            LaneRole::Controlled => 1,
            LaneRole::Incoming => 2,
        }
    }

    fn index(self) -> usize {
        match self {
            LaneRole::Incoming => 0,
            LaneRole::Controlled => 1,
            LaneRole::FreeTurn => 2,
        }
    }
}

/// Total number of queue lanes at the junction
pub const LANE_COUNT: usize = 12;

/// Canonical lane identity: approach × role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneId {
    pub approach: Approach,
    pub role: LaneRole,
}

impl LaneId {
    pub const fn new(approach: Approach, role: LaneRole) -> Self {
        Self { approach, role }
    }

    /// Every lane, ordered by [`LaneId::index`]
    pub fn all() -> [LaneId; LANE_COUNT] {
        std::array::from_fn(LaneId::from_index)
    }

    /// Dense index in `0..LANE_COUNT`
    pub fn index(self) -> usize {
        self.approach.index() * 3 + self.role.index()
    }

    /// Inverse of [`LaneId::index`]. Wraps out-of-range values.
    pub fn from_index(index: usize) -> Self {
        let index = index % LANE_COUNT;
        Self {
            approach: Approach::ALL[index / 3],
            role: LaneRole::ALL[index % 3],
        }
    }

    pub fn is_free_turn(self) -> bool {
        self.role == LaneRole::FreeTurn
    }

    /// True for lanes whose right-of-way comes from the signal
    pub fn is_light_controlled(self) -> bool {
        !self.is_free_turn()
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            LaneRole::Incoming => "incoming",
            LaneRole::Controlled => "controlled",
            LaneRole::FreeTurn => "free-turn",
        };
        write!(f, "{}/{}", self.approach, role)
    }
}

/// Lane a vehicle leaves the junction on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitLane {
    pub road: Approach,
    pub slot: usize,
}

/// Movement a vehicle intends to make through the box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Straight,
    Left,
    Right,
}

/// Lifecycle state of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleStatus {
    /// Waiting in a lane queue
    Queued,
    /// Admitted and travelling in a straight line
    Moving,
    /// Following a turn curve inside the box
    Turning,
    /// Past the exit boundary, about to be retired
    Exited,
}

/// A 2D position (or direction vector) in screen pixels, y pointing down
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn dot(&self, other: &Position) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalized(&self) -> Position {
        let len = self.length();
        if len > 0.0 {
            Position::new(self.x / len, self.y / len)
        } else {
            Position::default()
        }
    }

    /// Angle of this vector in radians, measured from +x
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Calculate the angle from this position to another
    pub fn angle_to(&self, other: &Position) -> f32 {
        (*other - *self).angle()
    }

    /// Unit vector pointing along `angle`
    pub fn from_angle(angle: f32) -> Position {
        Position::new(angle.cos(), angle.sin())
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

/// Priority mode switches on above this many vehicles in the priority lane
pub const HIGH_THRESHOLD: usize = 10;

/// Priority mode switches off once the priority lane drops below this
pub const LOW_THRESHOLD: usize = 5;

/// Length of the all-red clearance phase in seconds
pub const ALL_RED_DURATION: f32 = 2.0;

/// Green time granted per queued vehicle in seconds
pub const PER_VEHICLE_TIME: f32 = 2.0;

/// Shortest green phase in seconds
pub const MIN_GREEN_DURATION: f32 = 3.0;

/// Longest green phase in seconds
pub const MAX_GREEN_DURATION: f32 = 15.0;

/// Simulated seconds a vehicle may wait before it is force-admitted
pub const MAX_WAIT_TIME: f32 = 45.0;

/// Separation between active vehicles on the open road, in pixels
pub const MIN_DISTANCE: f32 = 30.0;

/// Separation when either vehicle is inside the intersection box
pub const INTERSECTION_MARGIN: f32 = 40.0;

/// Extra separation multiplier applied when both vehicles are moving
pub const MOVING_SEPARATION_FACTOR: f32 = 1.2;
